//! Project-level report assembled from per-file results and cycle findings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{FileAnalysisReport, FileError, Priority, Scores, Severity};
use crate::graph::{Cycle, CycleReport};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub none: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl PriorityBreakdown {
    fn record(&mut self, priority: Priority) {
        match priority {
            Priority::None => self.none += 1,
            Priority::Low => self.low += 1,
            Priority::Medium => self.medium += 1,
            Priority::High => self.high += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl SeverityBreakdown {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReport {
    pub project_name: String,
    pub analyzed_files: usize,
    pub files_requiring_optimization: usize,
    pub total_issues: usize,
    pub errored_files: usize,
    pub errors: Vec<FileError>,
    /// Keyed by root-relative path
    pub files: BTreeMap<String, FileAnalysisReport>,
    /// Mean scores over successfully analyzed files
    pub summary: Scores,
    pub priorities: PriorityBreakdown,
    pub issues_by_severity: SeverityBreakdown,
    pub cycles: Vec<Cycle>,
    pub cycles_possibly_incomplete: bool,
    /// Unix milliseconds
    pub generated_at: u64,
}

impl ProjectReport {
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct ReportAggregator {
    project_name: String,
}

impl ReportAggregator {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
        }
    }

    /// Merges file reports, failures and cycles. The result does not depend
    /// on the order of `reports` or `errors`.
    pub fn aggregate<I>(&self, reports: I, errors: Vec<FileError>, cycles: CycleReport) -> ProjectReport
    where
        I: IntoIterator<Item = FileAnalysisReport>,
    {
        let files: BTreeMap<String, FileAnalysisReport> = reports
            .into_iter()
            .map(|r| (r.relative_path.clone(), r))
            .collect();

        let mut errors = errors;
        errors.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let mut totals = Scores {
            complexity: 0.0,
            maintainability: 0.0,
            security: 0.0,
            performance: 0.0,
        };
        let mut priorities = PriorityBreakdown::default();
        let mut issues_by_severity = SeverityBreakdown::default();
        let mut files_requiring_optimization = 0;
        let mut total_issues = 0;

        for report in files.values() {
            totals.complexity += report.scores.complexity;
            totals.maintainability += report.scores.maintainability;
            totals.security += report.scores.security;
            totals.performance += report.scores.performance;

            priorities.record(report.optimization_priority);
            for issue in &report.issues {
                issues_by_severity.record(issue.severity);
            }
            if report.requires_optimization {
                files_requiring_optimization += 1;
            }
            total_issues += report.issues.len();
        }

        let summary = if files.is_empty() {
            Scores::default()
        } else {
            let n = files.len() as f64;
            Scores {
                complexity: totals.complexity / n,
                maintainability: totals.maintainability / n,
                security: totals.security / n,
                performance: totals.performance / n,
            }
        };

        ProjectReport {
            project_name: self.project_name.clone(),
            analyzed_files: files.len(),
            files_requiring_optimization,
            total_issues,
            errored_files: errors.len(),
            errors,
            files,
            summary,
            priorities,
            issues_by_severity,
            cycles: cycles.cycles,
            cycles_possibly_incomplete: cycles.possibly_incomplete,
            generated_at: paths::now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FileAnalyzer, FileRecord};
    use crate::config::AnalysisDepth;

    fn report(name: &str, source: &str) -> FileAnalysisReport {
        let mut record = FileRecord {
            path: format!("/p/{}", name).into(),
            relative_path: name.to_string(),
            size: source.len() as u64,
            modified: 0,
            imports: Vec::new(),
            exports: Vec::new(),
            content_hash: None,
        };
        FileAnalyzer::default()
            .analyze_source(source, &mut record, AnalysisDepth::Standard)
            .unwrap()
    }

    #[test]
    fn test_empty_project_defaults() {
        let report = ReportAggregator::new("empty").aggregate(Vec::new(), Vec::new(), CycleReport::default());
        assert_eq!(report.analyzed_files, 0);
        assert_eq!(report.total_issues, 0);
        assert_eq!(report.summary, Scores::default());
        assert!(report.cycles.is_empty());
    }

    #[test]
    fn test_totals_are_exact_sums() {
        let reports = vec![
            report("a.ts", "// clean\nconst a = 1;\n"),
            report("b.ts", "eval(x);\nconsole.log(x);\n"),
            report("c.ts", "document.write(y);\n"),
        ];
        let expected_issues: usize = reports.iter().map(|r| r.issues.len()).sum();
        let expected_flagged = reports.iter().filter(|r| r.requires_optimization).count();

        let project = ReportAggregator::new("demo").aggregate(reports, Vec::new(), CycleReport::default());
        assert_eq!(project.total_issues, expected_issues);
        assert_eq!(project.files_requiring_optimization, expected_flagged);
        assert_eq!(
            project.issues_by_severity.low
                + project.issues_by_severity.medium
                + project.issues_by_severity.high
                + project.issues_by_severity.critical,
            expected_issues
        );
        let p = project.priorities;
        assert_eq!(p.none + p.low + p.medium + p.high, 3);
    }

    #[test]
    fn test_errored_files_excluded_from_averages() {
        let reports = vec![report("a.ts", "eval(x);\n")];
        let security = reports[0].scores.security;
        let errors = vec![FileError::new("broken.ts", "invalid UTF-8")];

        let project = ReportAggregator::new("demo").aggregate(reports, errors, CycleReport::default());
        assert_eq!(project.analyzed_files, 1);
        assert_eq!(project.errored_files, 1);
        assert_eq!(project.errors[0].file_path, "broken.ts");
        assert_eq!(project.summary.security, security);
    }

    #[test]
    fn test_order_independent() {
        let a = report("a.ts", "eval(x);\n");
        let b = report("b.ts", "innerHTML = y;\nconst z = 1;\n");
        let c = report("c.ts", "const ok = true;\n");

        let agg = ReportAggregator::new("demo");
        let first = agg.aggregate(vec![a.clone(), b.clone(), c.clone()], Vec::new(), CycleReport::default());
        let second = agg.aggregate(vec![c, a, b], Vec::new(), CycleReport::default());

        assert_eq!(first.files, second.files);
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.total_issues, second.total_issues);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let project = ReportAggregator::new("demo").aggregate(Vec::new(), Vec::new(), CycleReport::default());
        let value: serde_json::Value = serde_json::from_str(&project.to_json().unwrap()).unwrap();
        assert_eq!(value["projectName"], "demo");
        assert_eq!(value["analyzedFiles"], 0);
        assert_eq!(value["cyclesPossiblyIncomplete"], false);
        assert!(value["summary"]["security"].is_number());
    }
}
