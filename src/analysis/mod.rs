pub mod analyzer;
pub mod cache;
pub mod extractor;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod patterns;
pub mod rules;

pub use analyzer::{content_hash, FileAnalyzer};
pub use cache::{AnalysisCache, AnalysisCacheEntry};
pub use extractor::{ExtractionResult, MetadataExtractor};
pub use models::{
    FileAnalysis, FileAnalysisReport, FileError, FileRecord, Issue, IssueType, LineMetrics,
    Priority, Scores, Severity,
};
