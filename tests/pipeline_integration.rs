//! Integration tests for the full analysis pipeline.
//!
//! Each test builds a small project in a temp directory and runs discovery,
//! concurrent analysis, graph construction, cycle detection and aggregation.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use code_auditor::{
    AnalysisDepth, AnalysisOptions, AnalysisPipeline, CycleSeverity, IssueType, PipelineOutput,
    Priority, Severity,
};

/// Writes `content` to `root/name`, creating parent directories.
fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

async fn run(root: &Path, options: AnalysisOptions) -> PipelineOutput {
    AnalysisPipeline::new(root, options)
        .expect("Failed to create pipeline")
        .run()
        .await
        .expect("Pipeline run failed")
}

fn no_cache() -> AnalysisOptions {
    AnalysisOptions {
        use_cache: false,
        ..Default::default()
    }
}

// ============================================================================
// Project-level scenarios
// ============================================================================

#[tokio::test]
async fn test_empty_project() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(temp_dir.path(), AnalysisOptions::default()).await;

    assert_eq!(output.report.analyzed_files, 0);
    assert_eq!(output.report.total_issues, 0);
    assert_eq!(output.report.errored_files, 0);
    assert!(output.report.cycles.is_empty());
    assert_eq!(output.report.summary.security, 100.0);
    assert!(output.graph.nodes.is_empty());
}

#[tokio::test]
async fn test_eval_emits_high_security_issue() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "danger.js", "const result = eval(userInput);\n");

    let output = run(temp_dir.path(), no_cache()).await;
    let report = &output.report.files["danger.js"];

    let security: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::Security)
        .collect();
    assert_eq!(security.len(), 1);
    assert_eq!(security[0].severity, Severity::High);
    assert_eq!(security[0].line, 1);
    assert_eq!(report.scores.security, 85.0);
    assert!(report.requires_optimization);
    assert_eq!(report.optimization_priority, Priority::Medium);
}

#[tokio::test]
async fn test_security_below_fifty_is_high_priority() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "worse.js",
        "eval(a);\neval(b);\nconst fn2 = new Function(c);\nel.innerHTML = d;\n",
    );

    let output = run(temp_dir.path(), no_cache()).await;
    let report = &output.report.files["worse.js"];

    assert!(report.scores.security < 50.0);
    assert_eq!(report.optimization_priority, Priority::High);
    assert_eq!(output.report.priorities.high, 1);
}

#[tokio::test]
async fn test_total_issues_is_exact_sum() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a.ts", "console.log('a');\nconsole.log('b');\n");
    write(temp_dir.path(), "b.ts", "document.write(x);\n");
    write(temp_dir.path(), "c.ts", "// helper\nexport const c = 1;\n");

    let output = run(temp_dir.path(), no_cache()).await;
    let summed: usize = output.report.files.values().map(|r| r.issues.len()).sum();

    assert_eq!(output.report.analyzed_files, 3);
    assert_eq!(output.report.total_issues, summed);
    assert!(summed >= 3);
    let flagged = output
        .report
        .files
        .values()
        .filter(|r| r.requires_optimization)
        .count();
    assert_eq!(output.report.files_requiring_optimization, flagged);
}

#[tokio::test]
async fn test_report_keys_are_relative() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "src/app/main.ts", "export const main = 1;\n");

    let output = run(temp_dir.path(), no_cache()).await;
    assert!(output.report.files.contains_key("src/app/main.ts"));
    assert_eq!(output.report.files["src/app/main.ts"].relative_path, "src/app/main.ts");
}

// ============================================================================
// Fault isolation
// ============================================================================

#[tokio::test]
async fn test_unreadable_file_does_not_abort_run() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "good.ts", "export const ok = 1;\n");
    write(temp_dir.path(), "also_good.py", "def ok():\n    return 1\n");
    fs::write(temp_dir.path().join("broken.ts"), [0xff, 0xfe, 0x00, 0xc3, 0x28]).unwrap();

    let output = run(temp_dir.path(), no_cache()).await;

    assert_eq!(output.report.analyzed_files, 2);
    assert_eq!(output.report.errored_files, 1);
    assert_eq!(output.report.errors[0].file_path, "broken.ts");
    assert!(!output.report.files.contains_key("broken.ts"));
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test]
async fn test_warm_cache_returns_identical_reports() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a.ts", "import { b } from './b';\neval(b);\n");
    write(temp_dir.path(), "b.ts", "import { a } from './a';\nexport const b = 2;\n");
    write(temp_dir.path(), "tool.py", "import os\nos.system('ls')\n");

    let cold = run(temp_dir.path(), AnalysisOptions::default()).await;
    let warm = run(temp_dir.path(), AnalysisOptions::default()).await;

    assert_eq!(cold.report.files, warm.report.files);
    assert_eq!(cold.report.summary, warm.report.summary);
    assert_eq!(cold.report.cycles, warm.report.cycles);
    assert_eq!(cold.graph.edges, warm.graph.edges);

    let cold_json = serde_json::to_string(&cold.report.files).unwrap();
    let warm_json = serde_json::to_string(&warm.report.files).unwrap();
    assert_eq!(cold_json, warm_json);
}

#[tokio::test]
async fn test_modified_file_is_reanalyzed() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a.ts", "export const a = 1;\n");

    let first = run(temp_dir.path(), AnalysisOptions::default()).await;
    assert_eq!(first.report.total_issues, 0);

    // Size changes even if mtime resolution is coarse
    write(temp_dir.path(), "a.ts", "export const a = 1;\neval(a);\n");
    let second = run(temp_dir.path(), AnalysisOptions::default()).await;
    assert_eq!(second.report.files["a.ts"].scores.security, 85.0);
}

#[tokio::test]
async fn test_depth_change_bypasses_cache() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "a.ts", "console.log('x');\n");

    let basic = AnalysisOptions {
        analysis_depth: AnalysisDepth::Basic,
        ..Default::default()
    };
    let first = run(temp_dir.path(), basic).await;
    assert_eq!(first.report.total_issues, 0);

    let second = run(temp_dir.path(), AnalysisOptions::default()).await;
    assert_eq!(second.report.total_issues, 1);
    assert_eq!(second.report.files["a.ts"].depth, AnalysisDepth::Standard);
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_overlapping_include_dirs_analyzed_once() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "src/a.ts", "export const a = 1;\n");
    write(temp_dir.path(), "src/lib/b.ts", "export const b = 1;\n");
    write(temp_dir.path(), "other/c.ts", "export const c = 1;\n");

    let options = AnalysisOptions {
        include_dirs: vec!["src".into(), "src/lib".into(), "missing".into()],
        use_cache: false,
        ..Default::default()
    };
    let output = run(temp_dir.path(), options).await;

    let keys: Vec<_> = output.report.files.keys().cloned().collect();
    assert_eq!(keys, vec!["src/a.ts", "src/lib/b.ts"]);
}

#[tokio::test]
async fn test_concurrency_does_not_change_report() {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..12 {
        write(
            temp_dir.path(),
            &format!("m{:02}.ts", i),
            &format!("import {{ x }} from './m{:02}';\nconsole.log(x);\n", (i + 1) % 12),
        );
    }

    let serial = run(
        temp_dir.path(),
        AnalysisOptions {
            concurrency: Some(1),
            use_cache: false,
            ..Default::default()
        },
    )
    .await;
    let parallel = run(
        temp_dir.path(),
        AnalysisOptions {
            concurrency: Some(6),
            use_cache: false,
            ..Default::default()
        },
    )
    .await;

    assert_eq!(serial.report.files, parallel.report.files);
    assert_eq!(serial.report.summary, parallel.report.summary);
    assert_eq!(serial.report.cycles, parallel.report.cycles);
    assert_eq!(serial.report.cycles.len(), 1);
    assert_eq!(serial.report.cycles[0].length, 12);
    assert_eq!(serial.report.cycles[0].severity, CycleSeverity::Minor);
}
