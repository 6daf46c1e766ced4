//! Concurrent per-file analysis.
//!
//! The coordinator owns all shared state. Workers receive one task message at
//! a time over a bounded queue and answer with exactly one result message;
//! they never touch the caches or the result list. The analysis cache is
//! consulted before dispatch and written only after collection.

pub mod progress;
pub mod worker;

pub use progress::{AnalysisProgress, FileOutcome, ProgressSnapshot};
pub use worker::{AnalysisTask, DefaultProcessor, FileProcessor, WorkerResult};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisCache, FileAnalysis, FileError};
use crate::config::{AnalysisDepth, AnalysisOptions};
use crate::error::{AuditError, Result};
use crate::paths;

/// Called after every file with a snapshot whose percentage never decreases.
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub concurrency: usize,
    pub depth: AnalysisDepth,
    pub file_timeout: Duration,
    pub use_cache: bool,
    pub cache_ttl: Duration,
}

impl CoordinatorConfig {
    pub fn from_options(options: &AnalysisOptions) -> Self {
        Self {
            concurrency: options.effective_concurrency(),
            depth: options.analysis_depth,
            file_timeout: Duration::from_secs(options.file_timeout_secs.max(1)),
            use_cache: options.use_cache,
            cache_ttl: Duration::from_secs(options.analysis_cache_ttl_secs),
        }
    }
}

/// Everything a run produced: successes sorted by relative path, failures
/// sorted by file path.
#[derive(Debug, Default)]
pub struct CoordinatorOutcome {
    pub analyses: Vec<FileAnalysis>,
    pub errors: Vec<FileError>,
    pub cache_hits: usize,
}

/// Splits `items` into `ceil(N / C)`-sized chunks.
pub fn partition<T: Clone>(items: &[T], concurrency: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    items
        .chunks(chunk_size(items.len(), concurrency))
        .map(|c| c.to_vec())
        .collect()
}

fn chunk_size(total: usize, concurrency: usize) -> usize {
    total.div_ceil(concurrency.max(1)).max(1)
}

pub struct AnalysisCoordinator {
    root: PathBuf,
    config: CoordinatorConfig,
    cache: AnalysisCache,
    processor: Arc<dyn FileProcessor>,
    progress: AnalysisProgress,
    on_progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl AnalysisCoordinator {
    pub fn new(root: &Path, config: CoordinatorConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            cache: AnalysisCache::new(root, config.cache_ttl),
            config,
            processor: Arc::new(DefaultProcessor),
            progress: AnalysisProgress::new(),
            on_progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_processor(mut self, processor: Arc<dyn FileProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(&self) -> &AnalysisProgress {
        &self.progress
    }

    /// Analyzes every file once. Per-file failures are collected, never
    /// raised; only cancellation aborts the run.
    pub async fn run(&self, files: Vec<PathBuf>) -> Result<CoordinatorOutcome> {
        self.progress.start(files.len());
        let mut outcome = CoordinatorOutcome::default();
        let discovered: HashSet<PathBuf> = if self.config.use_cache {
            files.iter().cloned().collect()
        } else {
            HashSet::new()
        };

        let fresh = match self.check_cache(files, &mut outcome).await {
            Ok(pending) => self.dispatch(pending, &mut outcome).await,
            Err(e) => Err(e),
        };
        self.progress.finish();
        let fresh = fresh?;

        if self.config.use_cache {
            for analysis in &fresh {
                if let Err(e) = self.cache.store(analysis).await {
                    tracing::warn!("Failed to cache {}: {}", analysis.record.relative_path, e);
                }
            }
            match self.cache.prune(&discovered).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Pruned {} cache entries for deleted files", n),
                Err(e) => tracing::warn!("Failed to prune analysis cache: {}", e),
            }
        }

        outcome.analyses.extend(fresh);
        outcome
            .analyses
            .sort_by(|a, b| a.record.relative_path.cmp(&b.record.relative_path));
        outcome.errors.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        tracing::info!(
            "Analyzed {} files ({} cached, {} failed)",
            outcome.analyses.len(),
            outcome.cache_hits,
            outcome.errors.len()
        );
        Ok(outcome)
    }

    /// Resolves cache hits up front and returns the files that still need work.
    async fn check_cache(
        &self,
        files: Vec<PathBuf>,
        outcome: &mut CoordinatorOutcome,
    ) -> Result<Vec<PathBuf>> {
        let mut pending = Vec::with_capacity(files.len());

        for file in files {
            if self.cancel.is_cancelled() {
                return Err(AuditError::Cancelled);
            }

            let metadata = match tokio::fs::metadata(&file).await {
                Ok(m) => m,
                Err(e) => {
                    outcome
                        .errors
                        .push(FileError::new(paths::relative_path(&self.root, &file), e.to_string()));
                    self.progress.record(FileOutcome::Failed);
                    self.notify();
                    continue;
                }
            };

            if self.config.use_cache {
                let modified = paths::modified_millis(&metadata);
                if let Some(hit) = self
                    .cache
                    .lookup(&file, metadata.len(), modified, self.config.depth)
                    .await
                {
                    outcome.analyses.push(hit);
                    outcome.cache_hits += 1;
                    self.progress.record(FileOutcome::Cached);
                    self.notify();
                    continue;
                }
            }

            pending.push(file);
        }

        Ok(pending)
    }

    /// Feeds pending files through the worker pool and collects one result
    /// per file.
    async fn dispatch(
        &self,
        pending: Vec<PathBuf>,
        outcome: &mut CoordinatorOutcome,
    ) -> Result<Vec<FileAnalysis>> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let workers_count = self.config.concurrency.max(1).min(pending.len());
        let capacity = chunk_size(pending.len(), self.config.concurrency);
        let chunks = partition(&pending, self.config.concurrency);
        tracing::debug!(
            "Dispatching {} files to {} workers in {} chunks",
            pending.len(),
            workers_count,
            chunks.len()
        );

        let run_token = self.cancel.child_token();
        let (task_tx, task_rx) = mpsc::channel::<AnalysisTask>(capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<WorkerResult>(capacity);
        let queue = Arc::new(Mutex::new(task_rx));

        let mut tasks = JoinSet::new();
        for id in 0..workers_count {
            tasks.spawn(worker::run_worker(
                id,
                Arc::clone(&queue),
                result_tx.clone(),
                Arc::clone(&self.processor),
                self.config.file_timeout,
                run_token.clone(),
            ));
        }
        drop(result_tx);

        let feeder_token = run_token.clone();
        let root = self.root.clone();
        let depth = self.config.depth;
        tasks.spawn(async move {
            for chunk in chunks {
                for file_path in chunk {
                    let task = AnalysisTask {
                        file_path,
                        root_dir: root.clone(),
                        depth,
                    };
                    tokio::select! {
                        _ = feeder_token.cancelled() => return,
                        sent = task_tx.send(task) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        let mut fresh = Vec::with_capacity(pending.len());
        loop {
            tokio::select! {
                biased;
                _ = run_token.cancelled() => {
                    tasks.abort_all();
                    tracing::info!("Analysis cancelled");
                    return Err(AuditError::Cancelled);
                }
                message = result_rx.recv() => match message {
                    Some(Ok(analysis)) => {
                        fresh.push(analysis);
                        self.progress.record(FileOutcome::Analyzed);
                        self.notify();
                    }
                    Some(Err(error)) => {
                        tracing::warn!("Failed to analyze {}: {}", error.file_path, error.message);
                        outcome.errors.push(error);
                        self.progress.record(FileOutcome::Failed);
                        self.notify();
                    }
                    None => break,
                },
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Worker exited abnormally: {}", e);
            }
        }

        Ok(fresh)
    }

    fn notify(&self) {
        if let Some(callback) = &self.on_progress {
            callback(&self.progress.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FileAnalyzer;
    use crate::languages::LanguageRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tempfile::TempDir;

    fn config(concurrency: usize) -> CoordinatorConfig {
        CoordinatorConfig {
            concurrency,
            depth: AnalysisDepth::Standard,
            file_timeout: Duration::from_secs(10),
            use_cache: true,
            cache_ttl: Duration::from_secs(3600),
        }
    }

    fn write_files(root: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = root.join(format!("f{:02}.ts", i));
                std::fs::write(&path, format!("export const v{} = {};\n", i, i)).unwrap();
                path
            })
            .collect()
    }

    /// Counts invocations and delegates to the real analyzer.
    struct Counting {
        calls: AtomicUsize,
    }

    impl FileProcessor for Counting {
        fn process(&self, task: &AnalysisTask, _deadline: Instant) -> Result<FileAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FileAnalyzer::new(LanguageRegistry::new()).analyze_file(
                &task.file_path,
                &task.root_dir,
                task.depth,
            )
        }
    }

    /// Panics on one specific file name.
    struct PanicsOn(&'static str);

    impl FileProcessor for PanicsOn {
        fn process(&self, task: &AnalysisTask, deadline: Instant) -> Result<FileAnalysis> {
            if task.file_path.ends_with(self.0) {
                panic!("cannot analyze {}", self.0);
            }
            DefaultProcessor.process(task, deadline)
        }
    }

    struct Sleeps;

    impl FileProcessor for Sleeps {
        fn process(&self, task: &AnalysisTask, deadline: Instant) -> Result<FileAnalysis> {
            std::thread::sleep(Duration::from_millis(200));
            DefaultProcessor.process(task, deadline)
        }
    }

    #[test]
    fn test_partition_sizes() {
        let items: Vec<usize> = (0..10).collect();
        let chunks = partition(&items, 3);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(chunks.concat(), items);

        assert_eq!(partition(&items, 1).len(), 1);
        assert_eq!(partition(&items, 0).len(), 1);
        assert_eq!(partition(&items, 64).len(), 10);
        assert!(partition::<usize>(&[], 4).is_empty());
    }

    #[tokio::test]
    async fn test_every_file_analyzed_exactly_once() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_files(temp_dir.path(), 17);
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });

        let coordinator = AnalysisCoordinator::new(temp_dir.path(), config(4))
            .with_processor(counting.clone());
        let outcome = coordinator.run(files).await.unwrap();

        assert_eq!(counting.calls.load(Ordering::SeqCst), 17);
        assert_eq!(outcome.analyses.len(), 17);
        assert!(outcome.errors.is_empty());

        let names: Vec<_> = outcome
            .analyses
            .iter()
            .map(|a| a.record.relative_path.clone())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_results() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_files(temp_dir.path(), 9);

        let mut no_cache = config(1);
        no_cache.use_cache = false;
        let serial = AnalysisCoordinator::new(temp_dir.path(), no_cache.clone())
            .run(files.clone())
            .await
            .unwrap();

        no_cache.concurrency = 8;
        let parallel = AnalysisCoordinator::new(temp_dir.path(), no_cache)
            .run(files)
            .await
            .unwrap();

        let reports = |o: &CoordinatorOutcome| o.analyses.iter().map(|a| a.report.clone()).collect::<Vec<_>>();
        assert_eq!(reports(&serial), reports(&parallel));
    }

    #[tokio::test]
    async fn test_second_run_served_from_cache() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_files(temp_dir.path(), 5);
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });

        let first = AnalysisCoordinator::new(temp_dir.path(), config(2))
            .with_processor(counting.clone())
            .run(files.clone())
            .await
            .unwrap();
        let second = AnalysisCoordinator::new(temp_dir.path(), config(2))
            .with_processor(counting.clone())
            .run(files)
            .await
            .unwrap();

        assert_eq!(counting.calls.load(Ordering::SeqCst), 5);
        assert_eq!(second.cache_hits, 5);
        let reports = |o: &CoordinatorOutcome| o.analyses.iter().map(|a| a.report.clone()).collect::<Vec<_>>();
        assert_eq!(reports(&first), reports(&second));
    }

    #[tokio::test]
    async fn test_deleted_file_entry_pruned_after_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = write_files(temp_dir.path(), 3);

        AnalysisCoordinator::new(temp_dir.path(), config(2))
            .run(files.clone())
            .await
            .unwrap();
        let cache_dir = AnalysisCache::new(temp_dir.path(), Duration::from_secs(60))
            .dir()
            .to_path_buf();
        assert_eq!(std::fs::read_dir(&cache_dir).unwrap().count(), 3);

        let removed = files.pop().unwrap();
        std::fs::remove_file(removed).unwrap();
        let outcome = AnalysisCoordinator::new(temp_dir.path(), config(2))
            .run(files)
            .await
            .unwrap();

        assert_eq!(outcome.cache_hits, 2);
        assert_eq!(std::fs::read_dir(&cache_dir).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_panicking_file_is_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_files(temp_dir.path(), 6);

        let outcome = AnalysisCoordinator::new(temp_dir.path(), config(3))
            .with_processor(Arc::new(PanicsOn("f03.ts")))
            .run(files)
            .await
            .unwrap();

        assert_eq!(outcome.analyses.len(), 5);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].file_path, "f03.ts");
    }

    #[tokio::test]
    async fn test_missing_file_is_recorded_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = write_files(temp_dir.path(), 2);
        files.push(temp_dir.path().join("gone.ts"));

        let outcome = AnalysisCoordinator::new(temp_dir.path(), config(2))
            .run(files)
            .await
            .unwrap();

        assert_eq!(outcome.analyses.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].file_path, "gone.ts");
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_complete() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_files(temp_dir.path(), 12);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let coordinator = AnalysisCoordinator::new(temp_dir.path(), config(4))
            .with_progress_callback(Arc::new(move |snap: &ProgressSnapshot| {
                sink.lock().unwrap().push(snap.progress_pct());
            }));
        coordinator.run(files).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 12);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100.0);
        assert!(!coordinator.progress().snapshot().is_active);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = AnalysisCoordinator::new(temp_dir.path(), config(4))
            .run(Vec::new())
            .await
            .unwrap();
        assert!(outcome.analyses.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        let files = write_files(temp_dir.path(), 8);
        let cancel = CancellationToken::new();

        let coordinator = AnalysisCoordinator::new(temp_dir.path(), config(1))
            .with_processor(Arc::new(Sleeps))
            .with_cancellation(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = coordinator.run(files).await;
        assert!(matches!(result, Err(AuditError::Cancelled)));
        assert!(!coordinator.progress().snapshot().is_active);
    }
}
