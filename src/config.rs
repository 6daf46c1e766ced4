//! Analysis options loaded from `.code-auditor.yml`.
//!
//! Every field is optional in the file; missing fields take their defaults.
//! CLI flags are applied on top of the loaded options.
//!
//! ```yaml
//! include_dirs: [src, lib]
//! exclude_dirs: [vendor]
//! exclude_file_patterns: ["*.test.ts"]
//! analysis_depth: deep
//! concurrency: 4
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Name of the per-project options file
pub const CONFIG_FILENAME: &str = ".code-auditor.yml";

/// Directory holding discovery and analysis caches, relative to the project root
pub const CACHE_DIR: &str = ".code-auditor";

/// How many issue rules run per file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Basic,
    #[default]
    Standard,
    Deep,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDepth::Basic => "basic",
            AnalysisDepth::Standard => "standard",
            AnalysisDepth::Deep => "deep",
        }
    }
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(AnalysisDepth::Basic),
            "standard" => Ok(AnalysisDepth::Standard),
            "deep" => Ok(AnalysisDepth::Deep),
            other => Err(format!("unknown analysis depth: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Directories (relative to the root) to scan. Empty means the root itself.
    pub include_dirs: Vec<String>,
    /// Directory names or relative directory paths never descended into
    pub exclude_dirs: Vec<String>,
    /// File globs a candidate must match. Empty means every supported source file.
    pub include_file_patterns: Vec<String>,
    /// File globs that reject a candidate; also applied to directory names
    pub exclude_file_patterns: Vec<String>,
    pub min_file_size_kb: Option<u64>,
    pub max_file_size_kb: Option<u64>,
    pub analysis_depth: AnalysisDepth,
    /// Worker count. `None` uses available parallelism minus one.
    pub concurrency: Option<usize>,
    /// Extensions tried when resolving relative imports, in order
    pub resolve_extensions: Vec<String>,
    pub max_cycle_depth: usize,
    pub file_timeout_secs: u64,
    pub discovery_cache_ttl_secs: u64,
    pub analysis_cache_ttl_secs: u64,
    pub use_cache: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            exclude_dirs: vec![
                "node_modules".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "coverage".to_string(),
                CACHE_DIR.to_string(),
            ],
            include_file_patterns: Vec::new(),
            exclude_file_patterns: vec!["*.min.js".to_string(), "*.d.ts".to_string()],
            min_file_size_kb: None,
            max_file_size_kb: None,
            analysis_depth: AnalysisDepth::default(),
            concurrency: None,
            resolve_extensions: [".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_cycle_depth: 20,
            file_timeout_secs: 30,
            discovery_cache_ttl_secs: 3600,
            analysis_cache_ttl_secs: 24 * 3600,
            use_cache: true,
        }
    }
}

impl AnalysisOptions {
    /// Loads options from `<root>/.code-auditor.yml`, falling back to defaults
    /// when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILENAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Number of workers in the analysis pool.
    pub fn effective_concurrency(&self) -> usize {
        match self.concurrency {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }

    /// Stable fingerprint of the options that affect which files are discovered.
    pub fn discovery_fingerprint(&self) -> String {
        let material = format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.include_dirs,
            self.exclude_dirs,
            self.include_file_patterns,
            self.exclude_file_patterns,
            self.min_file_size_kb,
            self.max_file_size_kb,
        );
        format!("{:016x}", xxhash_rust::xxh3::xxh3_64(material.as_bytes()))
    }
}
