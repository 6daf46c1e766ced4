//! Textual issue rules, grouped by the analysis depth that enables them.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::metrics::{LineKind, SourceLine};
use crate::analysis::models::{Issue, IssueType, LineMetrics, Severity};
use crate::config::AnalysisDepth;

const MAX_LINE_LENGTH: usize = 120;
const MAX_CYCLOMATIC: usize = 20;
const MAX_NESTING: usize = 4;

struct LineRule {
    pattern: Lazy<Regex>,
    issue_type: IssueType,
    severity: Severity,
    message: &'static str,
    recommendation: &'static str,
}

macro_rules! line_rule {
    ($re:expr, $ty:expr, $sev:expr, $msg:expr, $rec:expr) => {
        LineRule {
            pattern: Lazy::new(|| Regex::new($re).expect("valid regex")),
            issue_type: $ty,
            severity: $sev,
            message: $msg,
            recommendation: $rec,
        }
    };
}

static SECURITY_RULES: [LineRule; 8] = [
    line_rule!(
        r"\beval\s*\(",
        IssueType::Security,
        Severity::High,
        "Use of eval()",
        "Avoid eval; parse data explicitly or dispatch through a lookup table"
    ),
    line_rule!(
        r"\bnew\s+Function\s*\(",
        IssueType::Security,
        Severity::High,
        "Dynamic code construction with new Function()",
        "Replace generated functions with static code paths"
    ),
    line_rule!(
        r"\.innerHTML\s*=",
        IssueType::Security,
        Severity::Medium,
        "Direct innerHTML assignment",
        "Use textContent or a sanitizer before inserting markup"
    ),
    line_rule!(
        r"\bdocument\.write\s*\(",
        IssueType::Security,
        Severity::Medium,
        "Use of document.write()",
        "Build DOM nodes explicitly instead of writing raw markup"
    ),
    line_rule!(
        r#"(?i)\b(?:password|passwd|secret|api[_-]?key|access[_-]?token|private[_-]?key)\b\s*[:=]\s*['"][^'"]{4,}['"]"#,
        IssueType::Security,
        Severity::Critical,
        "Hard-coded credential",
        "Load secrets from the environment or a secret store"
    ),
    line_rule!(
        r"\b(?:child_process|cp)\.exec(?:Sync)?\s*\(|\bexecSync\s*\(",
        IssueType::Security,
        Severity::High,
        "Shell command execution",
        "Use execFile/spawn with an argument list instead of a shell string"
    ),
    line_rule!(
        r"\bos\.system\s*\(|shell\s*=\s*True",
        IssueType::Security,
        Severity::High,
        "Shell command execution",
        "Pass an argument list to subprocess without shell=True"
    ),
    line_rule!(
        r"\bpickle\.loads?\s*\(",
        IssueType::Security,
        Severity::Medium,
        "Deserialization of untrusted data with pickle",
        "Use a data-only format such as JSON for untrusted input"
    ),
];

static PERFORMANCE_RULES: [LineRule; 2] = [
    line_rule!(
        r"\bfs\.\w+Sync\s*\(|\b(?:readFileSync|writeFileSync|existsSync|readdirSync|statSync)\s*\(",
        IssueType::Performance,
        Severity::Medium,
        "Synchronous filesystem call",
        "Use the async fs API so the event loop is not blocked"
    ),
    line_rule!(
        r"JSON\.parse\s*\(\s*JSON\.stringify\s*\(",
        IssueType::Performance,
        Severity::Low,
        "Deep clone through JSON round trip",
        "Use structuredClone or a targeted copy"
    ),
];

static MAINTAINABILITY_RULES: [LineRule; 2] = [
    line_rule!(
        r"\bconsole\.log\s*\(",
        IssueType::Maintainability,
        Severity::Low,
        "console.log left in source",
        "Route diagnostics through a logger or remove them"
    ),
    line_rule!(
        r"@ts-ignore|eslint-disable",
        IssueType::Maintainability,
        Severity::Low,
        "Suppressed type or lint check",
        "Fix the underlying diagnostic instead of suppressing it"
    ),
];

static LOOP_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:for|while)\b|\.forEach\s*\(").expect("valid regex"));

static ANY_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s*any\b").expect("valid regex"));

static TODO_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:TODO|FIXME|HACK|XXX)\b").expect("valid regex"));

/// Runs every rule enabled at `depth` over the classified lines.
pub fn detect_issues(
    lines: &[SourceLine],
    metrics: &LineMetrics,
    depth: AnalysisDepth,
) -> Vec<Issue> {
    let mut issues = Vec::new();

    apply_line_rules(lines, &SECURITY_RULES, &mut issues);

    if depth != AnalysisDepth::Basic {
        apply_line_rules(lines, &PERFORMANCE_RULES, &mut issues);
        detect_nested_loops(lines, &mut issues);
        apply_line_rules(lines, &MAINTAINABILITY_RULES, &mut issues);
        detect_file_level_smells(lines, &mut issues);
    }

    if depth == AnalysisDepth::Deep {
        detect_complexity(lines, metrics, &mut issues);
    }

    issues.sort_by_key(|i| i.line);
    issues
}

fn apply_line_rules(lines: &[SourceLine], rules: &[LineRule], issues: &mut Vec<Issue>) {
    for line in lines.iter().filter(|l| l.kind == LineKind::Code) {
        for rule in rules {
            if rule.pattern.is_match(line.text) {
                issues.push(Issue::new(
                    rule.issue_type,
                    rule.severity,
                    line.number,
                    rule.message,
                    rule.recommendation,
                ));
            }
        }
    }
}

/// A loop whose line starts deeper than a still-open enclosing loop.
fn detect_nested_loops(lines: &[SourceLine], issues: &mut Vec<Issue>) {
    let mut open_loops: Vec<usize> = Vec::new();

    for line in lines.iter().filter(|l| l.kind == LineKind::Code) {
        while open_loops.last().is_some_and(|d| *d >= line.depth) {
            open_loops.pop();
        }

        if LOOP_START.is_match(line.text) {
            if !open_loops.is_empty() {
                issues.push(Issue::new(
                    IssueType::Performance,
                    Severity::Medium,
                    line.number,
                    "Nested loop",
                    "Index the inner collection in a map or set to avoid quadratic work",
                ));
            }
            open_loops.push(line.depth);
        }
    }
}

/// Smells reported at most once per file
fn detect_file_level_smells(lines: &[SourceLine], issues: &mut Vec<Issue>) {
    let long_lines: Vec<&SourceLine> = lines
        .iter()
        .filter(|l| l.kind != LineKind::Blank && l.text.chars().count() > MAX_LINE_LENGTH)
        .collect();
    if let Some(first) = long_lines.first() {
        issues.push(Issue::new(
            IssueType::Maintainability,
            Severity::Low,
            first.number,
            format!(
                "{} line(s) longer than {} characters",
                long_lines.len(),
                MAX_LINE_LENGTH
            ),
            "Wrap long lines or extract intermediate variables",
        ));
    }

    if let Some(line) = lines
        .iter()
        .find(|l| l.kind == LineKind::Code && ANY_TYPE.is_match(l.text))
    {
        issues.push(Issue::new(
            IssueType::Maintainability,
            Severity::Low,
            line.number,
            "Explicit any type",
            "Replace any with a concrete type or unknown",
        ));
    }

    let markers: Vec<&SourceLine> = lines
        .iter()
        .filter(|l| l.kind == LineKind::Comment && TODO_MARKER.is_match(l.text))
        .collect();
    if let Some(first) = markers.first() {
        issues.push(Issue::new(
            IssueType::Maintainability,
            Severity::Low,
            first.number,
            format!("{} unresolved TODO/FIXME marker(s)", markers.len()),
            "Resolve the marker or move it to the issue tracker",
        ));
    }
}

fn detect_complexity(lines: &[SourceLine], metrics: &LineMetrics, issues: &mut Vec<Issue>) {
    if metrics.cyclomatic > MAX_CYCLOMATIC {
        issues.push(Issue::new(
            IssueType::Complexity,
            Severity::Medium,
            1,
            format!(
                "File has {} decision points (limit {})",
                metrics.cyclomatic, MAX_CYCLOMATIC
            ),
            "Split the file into smaller modules with focused responsibilities",
        ));
    }

    if metrics.max_nesting > MAX_NESTING {
        let line = lines
            .iter()
            .find(|l| l.kind == LineKind::Code && l.depth >= MAX_NESTING)
            .map(|l| l.number)
            .unwrap_or(1);
        issues.push(Issue::new(
            IssueType::Complexity,
            Severity::Medium,
            line,
            format!(
                "Nesting depth {} exceeds {}",
                metrics.max_nesting, MAX_NESTING
            ),
            "Use early returns or extract nested blocks into functions",
        ));
    }
}
