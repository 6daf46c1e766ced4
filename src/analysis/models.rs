use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisDepth;

/// Category of a detected issue. Security and performance issues feed their
/// own scores; maintainability issues feed the maintainability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Security,
    Performance,
    Maintainability,
    Complexity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Score penalty used by the security and performance formulas
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 25.0,
            Severity::High => 15.0,
            Severity::Medium => 7.0,
            Severity::Low => 3.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    /// 1-based line number
    pub line: usize,
    pub message: String,
    pub recommendation: String,
}

impl Issue {
    pub fn new(
        issue_type: IssueType,
        severity: Severity,
        line: usize,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            severity,
            line,
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMetrics {
    pub total_lines: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    pub cyclomatic: usize,
    /// Deepest brace nesting reached on any line
    pub max_nesting: usize,
}

impl LineMetrics {
    pub fn comment_ratio(&self) -> f64 {
        self.comment_lines as f64 / self.code_lines.max(1) as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub complexity: f64,
    pub maintainability: f64,
    pub security: f64,
    pub performance: f64,
}

impl Default for Scores {
    fn default() -> Self {
        Self {
            complexity: 100.0,
            maintainability: 100.0,
            security: 100.0,
            performance: 100.0,
        }
    }
}

/// Raw facts about one file. Superseded, never mutated, when the file is
/// analyzed again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: PathBuf,
    pub relative_path: String,
    pub size: u64,
    /// Unix milliseconds
    pub modified: u64,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub content_hash: Option<String>,
}

/// Per-file result of the analysis, keyed by root-relative path in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysisReport {
    pub relative_path: String,
    /// Grammar used, or `None` when the pattern fallback was used
    pub language: Option<String>,
    pub size: u64,
    pub depth: AnalysisDepth,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub content_hash: Option<String>,
    pub issues: Vec<Issue>,
    pub metrics: LineMetrics,
    pub scores: Scores,
    pub requires_optimization: bool,
    pub optimization_priority: Priority,
}

/// A file that could not be analyzed. Counted, never averaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub file_path: String,
    pub message: String,
}

impl FileError {
    pub fn new(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            message: message.into(),
        }
    }
}

/// What a worker hands back for one successfully analyzed file
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub record: FileRecord,
    pub report: FileAnalysisReport,
}
