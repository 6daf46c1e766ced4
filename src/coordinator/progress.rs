//! Live counters for one coordinator run, shared between the coordinator and
//! whoever renders progress.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// How a single file left the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Analyzed,
    Cached,
    Failed,
}

#[derive(Default)]
struct Counters {
    total: AtomicUsize,
    analyzed: AtomicUsize,
    cached: AtomicUsize,
    failed: AtomicUsize,
    running: AtomicBool,
}

impl Counters {
    fn slot(&self, outcome: FileOutcome) -> &AtomicUsize {
        match outcome {
            FileOutcome::Analyzed => &self.analyzed,
            FileOutcome::Cached => &self.cached,
            FileOutcome::Failed => &self.failed,
        }
    }
}

#[derive(Clone, Default)]
pub struct AnalysisProgress {
    counters: Arc<Counters>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub is_active: bool,
    pub files_total: usize,
    pub files_processed: usize,
    pub cache_hits: usize,
    pub errors: usize,
}

impl ProgressSnapshot {
    /// Share of files finished, 100 when the run had nothing to do.
    pub fn progress_pct(&self) -> f64 {
        if self.files_total == 0 {
            return 100.0;
        }
        self.files_processed.min(self.files_total) as f64 * 100.0 / self.files_total as f64
    }
}

impl AnalysisProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, total_files: usize) {
        let c = &self.counters;
        for slot in [&c.analyzed, &c.cached, &c.failed] {
            slot.store(0, Ordering::Release);
        }
        c.total.store(total_files, Ordering::Release);
        c.running.store(true, Ordering::Release);
    }

    pub fn record(&self, outcome: FileOutcome) {
        self.counters.slot(outcome).fetch_add(1, Ordering::AcqRel);
    }

    pub fn finish(&self) {
        self.counters.running.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let c = &self.counters;
        let analyzed = c.analyzed.load(Ordering::Acquire);
        let cache_hits = c.cached.load(Ordering::Acquire);
        let errors = c.failed.load(Ordering::Acquire);

        ProgressSnapshot {
            is_active: c.running.load(Ordering::Acquire),
            files_total: c.total.load(Ordering::Acquire),
            files_processed: analyzed + cache_hits + errors,
            cache_hits,
            errors,
        }
    }
}
