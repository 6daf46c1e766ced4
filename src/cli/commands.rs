use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use code_auditor::config::AnalysisDepth;
use code_auditor::coordinator::ProgressSnapshot;
use code_auditor::error::Result;
use code_auditor::{AnalysisOptions, AnalysisPipeline, CycleReport, ProjectReport};

#[derive(Parser)]
#[command(name = "code-auditor")]
#[command(about = "Audit a source tree: per-file quality heuristics, dependency graph and import cycles")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Analyze current directory and print a summary
    code-auditor analyze

    # Deep analysis with JSON report and graph export
    code-auditor analyze ./web --depth deep --output report.json --graph graph.json

    # Only look at src/, skip tests
    code-auditor analyze --include-dir src --exclude "*.test.ts"

    # Print import cycles
    code-auditor cycles ./web --max-depth 30

    # Drop cached results
    code-auditor clear-cache ./web

Options may also be set in <root>/.code-auditor.yml; flags take precedence.
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a project and produce the quality report
    Analyze {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        args: AuditArgs,

        /// Write the JSON report to this file instead of printing a summary
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also write the dependency graph export to this file
        #[arg(long)]
        graph: Option<PathBuf>,
    },

    /// Export the dependency graph as JSON
    Graph {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        args: AuditArgs,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List import cycles
    Cycles {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        args: AuditArgs,

        /// Maximum DFS depth before a branch is truncated
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Remove cached discovery and analysis results
    ClearCache {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Flags shared by every command that runs the analysis
#[derive(Args, Debug, Clone, Default)]
pub struct AuditArgs {
    /// Analysis depth: basic, standard or deep
    #[arg(long)]
    pub depth: Option<AnalysisDepth>,

    /// Number of analysis workers
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Directory to scan, relative to the root (repeatable)
    #[arg(long = "include-dir")]
    pub include_dirs: Vec<String>,

    /// Directory name or relative path to skip (repeatable)
    #[arg(long = "exclude-dir")]
    pub exclude_dirs: Vec<String>,

    /// File glob a file must match (repeatable)
    #[arg(long = "include")]
    pub include_patterns: Vec<String>,

    /// File glob that rejects a file (repeatable)
    #[arg(long = "exclude")]
    pub exclude_patterns: Vec<String>,

    #[arg(long)]
    pub min_size_kb: Option<u64>,

    #[arg(long)]
    pub max_size_kb: Option<u64>,

    /// Ignore and do not write caches
    #[arg(long)]
    pub no_cache: bool,
}

impl AuditArgs {
    /// Config file values overridden by whatever flags were given.
    pub fn resolve_options(&self, root: &Path) -> Result<AnalysisOptions> {
        let mut options = AnalysisOptions::load(root)?;

        if let Some(depth) = self.depth {
            options.analysis_depth = depth;
        }
        if self.concurrency.is_some() {
            options.concurrency = self.concurrency;
        }
        if !self.include_dirs.is_empty() {
            options.include_dirs = self.include_dirs.clone();
        }
        // Extra excludes add to the configured defaults
        options.exclude_dirs.extend(self.exclude_dirs.iter().cloned());
        if !self.include_patterns.is_empty() {
            options.include_file_patterns = self.include_patterns.clone();
        }
        options
            .exclude_file_patterns
            .extend(self.exclude_patterns.iter().cloned());
        if self.min_size_kb.is_some() {
            options.min_file_size_kb = self.min_size_kb;
        }
        if self.max_size_kb.is_some() {
            options.max_file_size_kb = self.max_size_kb;
        }
        if self.no_cache {
            options.use_cache = false;
        }

        Ok(options)
    }
}

/// Drives `future` on a fresh multi-thread runtime. Blocking tasks still
/// running afterwards, such as parses whose timeout already fired, get at most
/// `grace` before the runtime is dropped without them.
pub fn run_to_completion<F: Future>(grace: Duration, future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn build_pipeline(
    path: &Path,
    options: AnalysisOptions,
    cancel: CancellationToken,
) -> Result<(AnalysisPipeline, ProgressBar)> {
    let pb = progress_bar();
    let sink = pb.clone();

    let pipeline = AnalysisPipeline::new(path, options)?
        .with_cancellation(cancel)
        .with_progress_callback(Arc::new(move |snap: &ProgressSnapshot| {
            sink.set_length(snap.files_total as u64);
            sink.set_position(snap.files_processed as u64);
        }));

    Ok((pipeline, pb))
}

async fn write_json(path: &Path, json: String) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}

pub async fn analyze(
    path: &Path,
    args: &AuditArgs,
    output: Option<&Path>,
    graph: Option<&Path>,
    cancel: CancellationToken,
) -> Result<()> {
    let (pipeline, pb) = build_pipeline(path, args.resolve_options(path)?, cancel)?;
    let result = pipeline.run().await;
    pb.finish_and_clear();
    let result = result?;

    if let Some(graph_path) = graph {
        write_json(graph_path, result.graph.to_json()?).await?;
        println!("Dependency graph written to {}", graph_path.display());
    }

    match output {
        Some(output_path) => {
            write_json(output_path, result.report.to_json()?).await?;
            println!("Report written to {}", output_path.display());
        }
        None => print_summary(&result.report),
    }

    Ok(())
}

pub async fn export_graph(
    path: &Path,
    args: &AuditArgs,
    output: Option<&Path>,
    cancel: CancellationToken,
) -> Result<()> {
    let (pipeline, pb) = build_pipeline(path, args.resolve_options(path)?, cancel)?;
    let result = pipeline.run().await;
    pb.finish_and_clear();
    let json = result?.graph.to_json()?;

    match output {
        Some(output_path) => {
            write_json(output_path, json).await?;
            println!("Dependency graph written to {}", output_path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

pub async fn show_cycles(
    path: &Path,
    args: &AuditArgs,
    max_depth: Option<usize>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut options = args.resolve_options(path)?;
    if let Some(depth) = max_depth {
        options.max_cycle_depth = depth;
    }

    let (pipeline, pb) = build_pipeline(path, options, cancel)?;
    let result = pipeline.build_graph().await;
    pb.finish_and_clear();
    print_cycles(&result?.cycles);

    Ok(())
}

pub async fn clear_cache(path: &Path) -> Result<()> {
    let options = AnalysisOptions::load(path)?;
    AnalysisPipeline::new(path, options)?.clear_cache().await?;
    println!("Cache cleared");
    Ok(())
}

fn print_summary(report: &ProjectReport) {
    println!("Project: {}", report.project_name);
    println!("  Analyzed files: {}", report.analyzed_files);
    println!("  Requiring optimization: {}", report.files_requiring_optimization);
    println!("  Total issues: {}", report.total_issues);
    if report.errored_files > 0 {
        println!("  Errored files: {}", report.errored_files);
    }

    println!("\n  Average scores:");
    println!("    complexity: {:.1}", report.summary.complexity);
    println!("    maintainability: {:.1}", report.summary.maintainability);
    println!("    security: {:.1}", report.summary.security);
    println!("    performance: {:.1}", report.summary.performance);

    let p = &report.priorities;
    println!("\n  Priority: high {} / medium {} / low {} / none {}", p.high, p.medium, p.low, p.none);

    if !report.errors.is_empty() {
        println!("\n  Errors:");
        for error in &report.errors {
            println!("    {}: {}", error.file_path, error.message);
        }
    }

    println!();
    print_cycles(&CycleReport {
        cycles: report.cycles.clone(),
        possibly_incomplete: report.cycles_possibly_incomplete,
    });
}

fn print_cycles(report: &CycleReport) {
    if report.cycles.is_empty() {
        println!("No import cycles found");
    } else {
        println!("Import cycles: {}", report.cycles.len());
        for cycle in &report.cycles {
            let mut path = cycle.members.join(" -> ");
            if let Some(first) = cycle.members.first() {
                path.push_str(" -> ");
                path.push_str(first);
            }
            println!("  [{}] {}", cycle.severity, path);
            if let Some(hint) = cycle.suggestions.last() {
                println!("      {}", hint);
            }
        }
    }
    if report.possibly_incomplete {
        println!("(search hit the depth limit; some cycles may be missing)");
    }
}
