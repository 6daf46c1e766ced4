pub mod analysis;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod languages;
pub mod paths;
pub mod pipeline;
pub mod report;

pub use analysis::{
    AnalysisCache, FileAnalysis, FileAnalysisReport, FileAnalyzer, FileError, FileRecord, Issue,
    IssueType, LineMetrics, MetadataExtractor, Priority, Scores, Severity,
};
pub use config::{AnalysisDepth, AnalysisOptions};
pub use coordinator::{
    AnalysisCoordinator, AnalysisProgress, AnalysisTask, CoordinatorConfig, CoordinatorOutcome,
    FileProcessor, ProgressCallback, ProgressSnapshot, WorkerResult,
};
pub use discovery::{discover_files, DiscoveryCache, FileDiscovery};
pub use error::{AuditError, Result};
pub use graph::{
    Cycle, CycleDetector, CycleReport, CycleSeverity, DependencyEdge, DependencyGraph,
    DependencyGraphBuilder, DependencyNode, EdgeKind, GraphExport, NodeMetrics,
};
pub use languages::{LanguageGrammar, LanguageRegistry};
pub use pipeline::{AnalysisPipeline, GraphOutput, PipelineOutput};
pub use report::{PriorityBreakdown, ProjectReport, ReportAggregator, SeverityBreakdown};
