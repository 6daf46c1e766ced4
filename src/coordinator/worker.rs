//! Worker protocol: one task message in, one result message out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::analysis::{FileAnalysis, FileAnalyzer, FileError};
use crate::config::AnalysisDepth;
use crate::error::{AuditError, Result};
use crate::languages::LanguageRegistry;
use crate::paths;

/// Work item sent to the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTask {
    pub file_path: PathBuf,
    pub root_dir: PathBuf,
    pub depth: AnalysisDepth,
}

impl AnalysisTask {
    pub fn relative_path(&self) -> String {
        paths::relative_path(&self.root_dir, &self.file_path)
    }
}

/// Message a worker sends back for every task it takes
pub type WorkerResult = std::result::Result<FileAnalysis, FileError>;

/// The per-file computation a worker runs. It must not keep state between
/// calls; the default builds a fresh analyzer for every task.
///
/// `deadline` is when the worker stops waiting for the result. Long-running
/// work should give up once it has passed, since the blocking thread cannot
/// be reclaimed until `process` returns.
pub trait FileProcessor: Send + Sync + 'static {
    fn process(&self, task: &AnalysisTask, deadline: Instant) -> Result<FileAnalysis>;
}

pub struct DefaultProcessor;

impl FileProcessor for DefaultProcessor {
    fn process(&self, task: &AnalysisTask, deadline: Instant) -> Result<FileAnalysis> {
        FileAnalyzer::new(LanguageRegistry::new())
            .with_deadline(deadline)
            .analyze_file(&task.file_path, &task.root_dir, task.depth)
    }
}

/// Runs one task on the blocking pool under `timeout`. Failures of any kind,
/// panics included, come back as a `FileError` for that file.
pub async fn execute_task(
    processor: Arc<dyn FileProcessor>,
    task: AnalysisTask,
    timeout: Duration,
) -> WorkerResult {
    let relative = task.relative_path();
    let deadline = Instant::now() + timeout;
    let handle = tokio::task::spawn_blocking(move || processor.process(&task, deadline));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(analysis))) => Ok(analysis),
        Ok(Ok(Err(AuditError::Timeout(_)))) | Err(_) => Err(FileError::new(
            relative,
            format!("analysis timed out after {} ms", timeout.as_millis()),
        )),
        Ok(Ok(Err(e))) => Err(FileError::new(relative, e.to_string())),
        Ok(Err(join_error)) => {
            let message = if join_error.is_panic() {
                format!("worker panicked: {}", panic_message(join_error.into_panic()))
            } else {
                "worker task was cancelled".to_string()
            };
            Err(FileError::new(relative, message))
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Worker loop: pull a task from the shared queue, execute it, send the
/// result. Exits when the queue closes, the result channel closes, or the
/// run is cancelled.
pub async fn run_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<AnalysisTask>>>,
    results: mpsc::Sender<WorkerResult>,
    processor: Arc<dyn FileProcessor>,
    timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        let task = {
            let mut rx = queue.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                task = rx.recv() => task,
            }
        };

        let Some(task) = task else {
            break;
        };

        tracing::trace!("worker {} analyzing {}", id, task.file_path.display());
        let result = execute_task(Arc::clone(&processor), task, timeout).await;

        if cancel.is_cancelled() || results.send(result).await.is_err() {
            break;
        }
    }
    tracing::trace!("worker {} stopped", id);
}
