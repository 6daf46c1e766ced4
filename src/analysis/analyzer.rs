use std::path::Path;
use std::time::Instant;

use crate::analysis::extractor::MetadataExtractor;
use crate::analysis::metrics::{
    classify_lines, compute_scores, line_metrics, optimization_priority, requires_optimization,
};
use crate::analysis::models::{FileAnalysis, FileAnalysisReport, FileRecord};
use crate::analysis::patterns::PatternFlavor;
use crate::analysis::rules::detect_issues;
use crate::config::AnalysisDepth;
use crate::error::{AuditError, Result};
use crate::languages::LanguageRegistry;
use crate::paths;

/// Analyzes one file from disk: stat, read, extract, score.
pub struct FileAnalyzer {
    extractor: MetadataExtractor,
}

impl FileAnalyzer {
    pub fn new(registry: LanguageRegistry) -> Self {
        Self {
            extractor: MetadataExtractor::new(registry),
        }
    }

    /// Abandons parsing once `deadline` passes, failing with `AuditError::Timeout`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.extractor = self.extractor.with_deadline(deadline);
        self
    }

    pub fn analyze_file(&self, path: &Path, root: &Path, depth: AnalysisDepth) -> Result<FileAnalysis> {
        let metadata = std::fs::metadata(path)?;
        let bytes = std::fs::read(path)?;
        let source = String::from_utf8(bytes)
            .map_err(|_| AuditError::Parse(format!("{} is not valid UTF-8", path.display())))?;

        let mut record = FileRecord {
            path: path.to_path_buf(),
            relative_path: paths::relative_path(root, path),
            size: metadata.len(),
            modified: paths::modified_millis(&metadata),
            imports: Vec::new(),
            exports: Vec::new(),
            content_hash: Some(content_hash(&source)),
        };

        let report = self.analyze_source(&source, &mut record, depth)?;
        Ok(FileAnalysis { record, report })
    }

    /// Fills the record's imports/exports and produces the report for `source`.
    pub fn analyze_source(
        &self,
        source: &str,
        record: &mut FileRecord,
        depth: AnalysisDepth,
    ) -> Result<FileAnalysisReport> {
        let extraction = self.extractor.extract(source, &record.path)?;
        let flavor = PatternFlavor::for_language(extraction.language.as_deref());

        let lines = classify_lines(source, flavor);
        let metrics = line_metrics(&lines, flavor);
        let issues = detect_issues(&lines, &metrics, depth);
        let scores = compute_scores(&metrics, &issues);

        record.imports = extraction.imports;
        record.exports = extraction.exports;

        Ok(FileAnalysisReport {
            relative_path: record.relative_path.clone(),
            language: extraction.language,
            size: record.size,
            depth,
            imports: record.imports.clone(),
            exports: record.exports.clone(),
            content_hash: record.content_hash.clone(),
            requires_optimization: requires_optimization(&scores, &issues),
            optimization_priority: optimization_priority(&scores, &issues),
            issues,
            metrics,
            scores,
        })
    }
}

impl Default for FileAnalyzer {
    fn default() -> Self {
        Self::new(LanguageRegistry::new())
    }
}

pub fn content_hash(source: &str) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(source.as_bytes()))
}
