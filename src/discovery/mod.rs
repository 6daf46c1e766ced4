pub mod cache;
pub mod walker;

pub use cache::{DiscoveryCache, DiscoverySnapshot};
pub use walker::FileDiscovery;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::AnalysisOptions;
use crate::error::{AuditError, Result};
use crate::languages::LanguageRegistry;

/// Discovers candidate files, reusing the on-disk file list while it is
/// inside its validity window. The walk itself runs on the blocking pool.
pub async fn discover_files(root: &Path, options: &AnalysisOptions) -> Result<Vec<PathBuf>> {
    let fingerprint = options.discovery_fingerprint();
    let cache = DiscoveryCache::new(root, Duration::from_secs(options.discovery_cache_ttl_secs));

    if options.use_cache {
        if let Some(cached) = cache.load(root, &fingerprint).await {
            let mut files = Vec::with_capacity(cached.len());
            for file in cached {
                // Files deleted inside the window drop out silently
                if tokio::fs::metadata(&file).await.map(|m| m.is_file()).unwrap_or(false) {
                    files.push(file);
                }
            }
            tracing::info!("Using cached file list ({} files)", files.len());
            return Ok(files);
        }
    }

    let discovery = FileDiscovery::new(LanguageRegistry::new(), options)?;
    let walk_root = root.to_path_buf();
    let files = tokio::task::spawn_blocking(move || discovery.discover(&walk_root))
        .await
        .map_err(|e| AuditError::Worker(format!("discovery task failed: {}", e)))??;

    tracing::info!("Discovered {} files under {}", files.len(), root.display());

    if options.use_cache {
        if let Err(e) = cache.store(root, &fingerprint, &files).await {
            tracing::warn!("Failed to write discovery cache: {}", e);
        }
    }

    Ok(files)
}
