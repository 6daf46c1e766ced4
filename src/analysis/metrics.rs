//! Line classification, size/complexity metrics, and the score formulas.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::models::{Issue, IssueType, LineMetrics, Priority, Scores, Severity};
use crate::analysis::patterns::PatternFlavor;

static DECISION_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:if|for|while|case|catch|elif|except)\b|&&|\|\||\s\?\s").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Code,
}

/// One source line with its classification and the nesting depth in effect
/// when the line starts.
#[derive(Debug, Clone)]
pub struct SourceLine<'a> {
    pub number: usize,
    pub text: &'a str,
    pub kind: LineKind,
    pub depth: usize,
}

/// Splits the source into classified lines. Brace depth is tracked for
/// script sources; Python uses indentation (four columns per level).
pub fn classify_lines(source: &str, flavor: PatternFlavor) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut in_block_comment = false;
    let mut brace_depth: usize = 0;

    for (idx, text) in source.lines().enumerate() {
        let trimmed = text.trim();

        let kind = if in_block_comment {
            if trimmed.contains("*/") {
                in_block_comment = false;
            }
            LineKind::Comment
        } else if trimmed.is_empty() {
            LineKind::Blank
        } else if flavor == PatternFlavor::Python && trimmed.starts_with('#') {
            LineKind::Comment
        } else if flavor == PatternFlavor::Script && trimmed.starts_with("//") {
            LineKind::Comment
        } else if flavor == PatternFlavor::Script && trimmed.starts_with("/*") {
            if !trimmed.contains("*/") {
                in_block_comment = true;
            }
            LineKind::Comment
        } else {
            LineKind::Code
        };

        let depth = match flavor {
            PatternFlavor::Script => brace_depth,
            PatternFlavor::Python => indentation(text) / 4,
        };

        if kind == LineKind::Code && flavor == PatternFlavor::Script {
            for c in text.chars() {
                match c {
                    '{' => brace_depth += 1,
                    '}' => brace_depth = brace_depth.saturating_sub(1),
                    _ => {}
                }
            }
        }

        lines.push(SourceLine {
            number: idx + 1,
            text,
            kind,
            depth,
        });
    }

    lines
}

fn indentation(text: &str) -> usize {
    text.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

pub fn line_metrics(lines: &[SourceLine], flavor: PatternFlavor) -> LineMetrics {
    let mut metrics = LineMetrics {
        total_lines: lines.len(),
        ..Default::default()
    };

    for line in lines {
        match line.kind {
            LineKind::Blank => metrics.blank_lines += 1,
            LineKind::Comment => metrics.comment_lines += 1,
            LineKind::Code => {
                metrics.code_lines += 1;
                metrics.cyclomatic += DECISION_POINT.find_iter(line.text).count();
                let reached = match flavor {
                    // Depth after the line's own opening braces
                    PatternFlavor::Script => line.depth + line.text.matches('{').count(),
                    PatternFlavor::Python => line.depth,
                };
                metrics.max_nesting = metrics.max_nesting.max(reached);
            }
        }
    }

    metrics
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn weighted_penalty(issues: &[Issue], issue_type: IssueType) -> f64 {
    issues
        .iter()
        .filter(|i| i.issue_type == issue_type)
        .map(|i| i.severity.weight())
        .sum()
}

pub fn complexity_score(metrics: &LineMetrics) -> f64 {
    clamp_score(
        100.0
            - (metrics.total_lines as f64 / 10.0
                + metrics.cyclomatic as f64 * 2.0
                + metrics.max_nesting as f64 * 5.0),
    )
}

pub fn maintainability_score(metrics: &LineMetrics, issues: &[Issue]) -> f64 {
    let issue_count = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::Maintainability)
        .count();
    let comment_penalty = if metrics.comment_ratio() < 0.1 { 20.0 } else { 0.0 };
    let size_penalty = if metrics.code_lines > 1000 { 20.0 } else { 0.0 };
    clamp_score(100.0 - (issue_count as f64 * 10.0 + comment_penalty + size_penalty))
}

pub fn security_score(issues: &[Issue]) -> f64 {
    clamp_score(100.0 - weighted_penalty(issues, IssueType::Security))
}

pub fn performance_score(issues: &[Issue]) -> f64 {
    clamp_score(100.0 - weighted_penalty(issues, IssueType::Performance))
}

pub fn compute_scores(metrics: &LineMetrics, issues: &[Issue]) -> Scores {
    Scores {
        complexity: complexity_score(metrics),
        maintainability: maintainability_score(metrics, issues),
        security: security_score(issues),
        performance: performance_score(issues),
    }
}

pub fn requires_optimization(scores: &Scores, issues: &[Issue]) -> bool {
    !issues.is_empty()
        || scores.complexity < 60.0
        || scores.maintainability < 60.0
        || scores.security < 70.0
        || scores.performance < 70.0
}

pub fn optimization_priority(scores: &Scores, issues: &[Issue]) -> Priority {
    let has = |severity: Severity| issues.iter().any(|i| i.severity == severity);

    if has(Severity::Critical)
        || scores.security < 50.0
        || scores.performance < 60.0
        || issues.len() > 10
        || scores.complexity < 40.0
        || scores.maintainability < 40.0
    {
        Priority::High
    } else if has(Severity::High)
        || scores.complexity < 60.0
        || scores.maintainability < 60.0
        || scores.performance < 70.0
    {
        Priority::Medium
    } else if !issues.is_empty() {
        Priority::Low
    } else {
        Priority::None
    }
}
