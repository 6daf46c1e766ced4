//! Per-file analysis cache.
//!
//! One JSON entry per analyzed file under `<root>/.code-auditor/analysis/`,
//! named by the xxh3 hash of the absolute path. An entry is reused only when
//! the file's size and mtime still match the recorded snapshot, the entry was
//! produced at the same analysis depth, and it is younger than the TTL.
//! Entries are written to a temporary file and renamed into place so a reader
//! never observes a partial entry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::models::{FileAnalysis, FileAnalysisReport, FileRecord};
use crate::config::{AnalysisDepth, CACHE_DIR};
use crate::error::Result;
use crate::paths;

const ANALYSIS_DIR: &str = "analysis";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCacheEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: u64,
    /// Unix milliseconds
    pub recorded_at: u64,
    pub report: FileAnalysisReport,
}

impl AnalysisCacheEntry {
    pub fn is_valid_for(
        &self,
        size: u64,
        modified: u64,
        depth: AnalysisDepth,
        now: u64,
        ttl: Duration,
    ) -> bool {
        let age = now.saturating_sub(self.recorded_at);
        self.size == size
            && self.modified == modified
            && self.report.depth == depth
            && u128::from(age) <= ttl.as_millis()
    }

    /// Rebuilds the file record the entry was produced from.
    pub fn into_analysis(self) -> FileAnalysis {
        let record = FileRecord {
            path: self.path,
            relative_path: self.report.relative_path.clone(),
            size: self.size,
            modified: self.modified,
            imports: self.report.imports.clone(),
            exports: self.report.exports.clone(),
            content_hash: self.report.content_hash.clone(),
        };
        FileAnalysis {
            record,
            report: self.report,
        }
    }
}

pub struct AnalysisCache {
    dir: PathBuf,
    ttl: Duration,
}

impl AnalysisCache {
    pub fn new(root: &Path, ttl: Duration) -> Self {
        Self {
            dir: root.join(CACHE_DIR).join(ANALYSIS_DIR),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, path: &Path) -> PathBuf {
        let key = xxhash_rust::xxh3::xxh3_64(path.to_string_lossy().as_bytes());
        self.dir.join(format!("{:016x}.json", key))
    }

    /// Returns the cached analysis if it is still valid for the given snapshot.
    /// Unreadable or corrupt entries are treated as misses.
    pub async fn lookup(
        &self,
        path: &Path,
        size: u64,
        modified: u64,
        depth: AnalysisDepth,
    ) -> Option<FileAnalysis> {
        let entry_path = self.entry_path(path);
        let content = match tokio::fs::read(&entry_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read cache entry {}: {}", entry_path.display(), e);
                return None;
            }
        };

        let entry: AnalysisCacheEntry = match serde_json::from_slice(&content) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Corrupt cache entry {}: {}", entry_path.display(), e);
                return None;
            }
        };

        if entry.path != path {
            tracing::debug!("Cache key collision for {}", path.display());
            return None;
        }

        if !entry.is_valid_for(size, modified, depth, paths::now_millis(), self.ttl) {
            tracing::debug!("Stale cache entry for {}", path.display());
            return None;
        }

        Some(entry.into_analysis())
    }

    /// Writes (or replaces) the entry for one analyzed file.
    pub async fn store(&self, analysis: &FileAnalysis) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let entry = AnalysisCacheEntry {
            path: analysis.record.path.clone(),
            size: analysis.record.size,
            modified: analysis.record.modified,
            recorded_at: paths::now_millis(),
            report: analysis.report.clone(),
        };

        let entry_path = self.entry_path(&analysis.record.path);
        let tmp_path = entry_path.with_extension("json.tmp");
        let content = serde_json::to_vec(&entry)?;
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &entry_path).await?;
        Ok(())
    }

    /// Deletes entries whose source file is gone. Entries for `discovered`
    /// files are kept unread; any other entry is opened to check its path, so
    /// files merely outside this run's include dirs keep their entries.
    pub async fn prune(&self, discovered: &HashSet<PathBuf>) -> Result<usize> {
        let keep: HashSet<PathBuf> = discovered.iter().map(|p| self.entry_path(p)).collect();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let entry_path = item.path();
            if keep.contains(&entry_path)
                || entry_path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }

            let orphaned = match tokio::fs::read(&entry_path).await {
                Ok(content) => match serde_json::from_slice::<AnalysisCacheEntry>(&content) {
                    Ok(entry) => !tokio::fs::try_exists(&entry.path).await.unwrap_or(true),
                    Err(_) => true,
                },
                Err(_) => false,
            };

            if orphaned {
                match tokio::fs::remove_file(&entry_path).await {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::debug!("Failed to remove {}: {}", entry_path.display(), e),
                }
            }
        }
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
