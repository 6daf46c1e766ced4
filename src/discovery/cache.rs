use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CACHE_DIR;
use crate::error::Result;
use crate::paths;

pub const DISCOVERY_CACHE_FILENAME: &str = "discovery.json";

/// On-disk snapshot of one discovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySnapshot {
    /// Unix milliseconds
    pub timestamp: u64,
    pub root: PathBuf,
    pub options_fingerprint: String,
    pub files: Vec<PathBuf>,
}

/// Time-windowed cache of the discovered file list
pub struct DiscoveryCache {
    path: PathBuf,
    ttl: Duration,
}

impl DiscoveryCache {
    pub fn new(root: &Path, ttl: Duration) -> Self {
        Self {
            path: root.join(CACHE_DIR).join(DISCOVERY_CACHE_FILENAME),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached file list when the snapshot belongs to `root`, was
    /// produced with the same discovery options, and is inside the validity
    /// window. Missing or corrupt snapshots are misses.
    pub async fn load(&self, root: &Path, fingerprint: &str) -> Option<Vec<PathBuf>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read discovery cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let snapshot: DiscoverySnapshot = match serde_json::from_slice(&content) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Corrupt discovery cache {}, rebuilding: {}", self.path.display(), e);
                return None;
            }
        };

        if snapshot.root != root || snapshot.options_fingerprint != fingerprint {
            tracing::debug!("Discovery cache belongs to different options, ignoring");
            return None;
        }

        let age = paths::now_millis().saturating_sub(snapshot.timestamp);
        if u128::from(age) > self.ttl.as_millis() {
            tracing::debug!("Discovery cache expired ({} ms old)", age);
            return None;
        }

        Some(snapshot.files)
    }

    pub async fn store(&self, root: &Path, fingerprint: &str, files: &[PathBuf]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let snapshot = DiscoverySnapshot {
            timestamp: paths::now_millis(),
            root: root.to_path_buf(),
            options_fingerprint: fingerprint.to_string(),
            files: files.to_vec(),
        };

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(&snapshot)?).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
