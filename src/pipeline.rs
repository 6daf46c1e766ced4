//! End-to-end run: discovery, concurrent analysis, graph, cycles, report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisCache, FileRecord};
use crate::config::AnalysisOptions;
use crate::coordinator::{AnalysisCoordinator, CoordinatorConfig, CoordinatorOutcome, ProgressCallback};
use crate::discovery::{self, DiscoveryCache};
use crate::error::{AuditError, Result};
use crate::graph::{CycleDetector, CycleReport, DependencyGraph, DependencyGraphBuilder, GraphExport};
use crate::report::{ProjectReport, ReportAggregator};

pub struct PipelineOutput {
    pub report: ProjectReport,
    pub graph: GraphExport,
}

/// Graph-level results without the per-file report
pub struct GraphOutput {
    pub graph: DependencyGraph,
    pub cycles: CycleReport,
    pub outcome: CoordinatorOutcome,
}

/// One analysis run over one project root. Constructed per run; holds no
/// state shared with other runs.
pub struct AnalysisPipeline {
    root: PathBuf,
    options: AnalysisOptions,
    on_progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl AnalysisPipeline {
    /// Fails with `ProjectRoot` when `root` is missing or not a directory.
    pub fn new(root: &Path, options: AnalysisOptions) -> Result<Self> {
        let canonical = std::fs::canonicalize(root)
            .map_err(|e| AuditError::ProjectRoot(format!("{}: {}", root.display(), e)))?;
        if !canonical.is_dir() {
            return Err(AuditError::ProjectRoot(format!(
                "{}: not a directory",
                root.display()
            )));
        }

        Ok(Self {
            root: canonical,
            options,
            on_progress: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn project_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    /// Discovers files and analyzes each one through the worker pool.
    pub async fn analyze_files(&self) -> Result<CoordinatorOutcome> {
        let files = discovery::discover_files(&self.root, &self.options).await?;
        if self.cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }

        let mut coordinator = AnalysisCoordinator::new(&self.root, CoordinatorConfig::from_options(&self.options))
            .with_cancellation(self.cancel.clone());
        if let Some(callback) = &self.on_progress {
            coordinator = coordinator.with_progress_callback(callback.clone());
        }

        coordinator.run(files).await
    }

    /// Builds the dependency graph and finds its cycles.
    pub async fn build_graph(&self) -> Result<GraphOutput> {
        let outcome = self.analyze_files().await?;
        let records: Vec<FileRecord> = outcome.analyses.iter().map(|a| a.record.clone()).collect();

        let graph = DependencyGraphBuilder::from_options(&self.options).build(&records);
        let cycles = CycleDetector::new(self.options.max_cycle_depth).detect(&graph);
        tracing::info!(
            "Dependency graph: {} files, {} edges, {} cycles",
            graph.node_count(),
            graph.edge_count(),
            cycles.cycles.len()
        );

        Ok(GraphOutput { graph, cycles, outcome })
    }

    pub async fn run(&self) -> Result<PipelineOutput> {
        let GraphOutput { graph, cycles, outcome } = self.build_graph().await?;
        let export = GraphExport::new(&graph, &cycles);

        let report = ReportAggregator::new(self.project_name()).aggregate(
            outcome.analyses.into_iter().map(|a| a.report),
            outcome.errors,
            cycles,
        );

        tracing::info!(
            "Report ready: {} files analyzed, {} need optimization, {} issues, {} errors",
            report.analyzed_files,
            report.files_requiring_optimization,
            report.total_issues,
            report.errored_files
        );

        Ok(PipelineOutput { report, graph: export })
    }

    /// Removes both on-disk caches for this root.
    pub async fn clear_cache(&self) -> Result<()> {
        DiscoveryCache::new(&self.root, Duration::from_secs(self.options.discovery_cache_ttl_secs))
            .clear()
            .await?;
        AnalysisCache::new(&self.root, Duration::from_secs(self.options.analysis_cache_ttl_secs))
            .clear()
            .await?;
        tracing::info!("Cleared caches under {}", self.root.display());
        Ok(())
    }
}
