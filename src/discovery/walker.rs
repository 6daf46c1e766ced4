use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use ignore::WalkBuilder;

use crate::config::AnalysisOptions;
use crate::error::{AuditError, Result};
use crate::languages::{is_source_file, LanguageRegistry};
use crate::paths;

/// Compiled include/exclude rules
#[derive(Debug, Clone)]
struct Rules {
    include_dirs: Vec<String>,
    exclude_dirs: Vec<String>,
    include_patterns: Vec<Pattern>,
    exclude_patterns: Vec<Pattern>,
    min_bytes: Option<u64>,
    max_bytes: Option<u64>,
}

impl Rules {
    fn compile(options: &AnalysisOptions) -> Result<Self> {
        let compile_all = |patterns: &[String]| -> Result<Vec<Pattern>> {
            patterns
                .iter()
                .map(|p| Pattern::new(p).map_err(AuditError::from))
                .collect()
        };

        Ok(Self {
            include_dirs: options.include_dirs.clone(),
            exclude_dirs: options
                .exclude_dirs
                .iter()
                .map(|d| d.trim_matches('/').to_string())
                .collect(),
            include_patterns: compile_all(&options.include_file_patterns)?,
            exclude_patterns: compile_all(&options.exclude_file_patterns)?,
            min_bytes: options.min_file_size_kb.map(|kb| kb * 1024),
            max_bytes: options.max_file_size_kb.map(|kb| kb * 1024),
        })
    }

    /// Directory names, relative directory paths, and exclude globs all prune
    /// a directory.
    fn is_excluded_dir(&self, name: &str, rel: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name || d == rel)
            || self
                .exclude_patterns
                .iter()
                .any(|p| p.matches(name) || p.matches(rel))
    }

    fn matches_any(patterns: &[Pattern], name: &str, rel: &str) -> bool {
        patterns.iter().any(|p| p.matches(rel) || p.matches(name))
    }

    fn within_size(&self, size: u64) -> bool {
        self.min_bytes.map_or(true, |min| size >= min) && self.max_bytes.map_or(true, |max| size <= max)
    }
}

pub struct FileDiscovery {
    registry: LanguageRegistry,
    rules: Rules,
}

impl FileDiscovery {
    pub fn new(registry: LanguageRegistry, options: &AnalysisOptions) -> Result<Self> {
        Ok(Self {
            registry,
            rules: Rules::compile(options)?,
        })
    }

    /// Walks the include directories under `root` and returns the sorted,
    /// deduplicated absolute paths of candidate files.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(AuditError::ProjectRoot(root.display().to_string()));
        }

        let bases: Vec<PathBuf> = if self.rules.include_dirs.is_empty() {
            vec![root.to_path_buf()]
        } else {
            self.rules
                .include_dirs
                .iter()
                .map(|d| paths::normalize(&root.join(d)))
                .collect()
        };

        let mut files = BTreeSet::new();

        for base in bases {
            if !base.is_dir() {
                tracing::warn!("Include directory not found, skipping: {}", base.display());
                continue;
            }
            self.walk_base(root, &base, &mut files);
        }

        Ok(files.into_iter().collect())
    }

    fn walk_base(&self, root: &Path, base: &Path, files: &mut BTreeSet<PathBuf>) {
        let rules = Arc::new(self.rules.clone());
        let filter_rules = Arc::clone(&rules);
        let filter_root = root.to_path_buf();

        let walker = WalkBuilder::new(base)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                let rel = paths::relative_path(&filter_root, entry.path());
                !filter_rules.is_excluded_dir(&name, &rel)
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if self.accepts(root, path, &rules) {
                files.insert(path.to_path_buf());
            }
        }
    }

    fn accepts(&self, root: &Path, path: &Path, rules: &Rules) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let rel = paths::relative_path(root, path);

        let included = if rules.include_patterns.is_empty() {
            is_source_file(&self.registry, path)
        } else {
            Rules::matches_any(&rules.include_patterns, &name, &rel)
        };
        if !included || Rules::matches_any(&rules.exclude_patterns, &name, &rel) {
            return false;
        }

        if rules.min_bytes.is_some() || rules.max_bytes.is_some() {
            return match std::fs::metadata(path) {
                Ok(m) => rules.within_size(m.len()),
                Err(_) => false,
            };
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn discover(root: &Path, options: &AnalysisOptions) -> Vec<String> {
        FileDiscovery::new(LanguageRegistry::new(), options)
            .unwrap()
            .discover(root)
            .unwrap()
            .iter()
            .map(|p| paths::relative_path(root, p))
            .collect()
    }

    #[test]
    fn test_discover_supported_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/app.ts", "export const a = 1;");
        create_file(temp_dir.path(), "src/view.tsx", "export const V = () => null;");
        create_file(temp_dir.path(), "scripts/tool.py", "print('x')");
        create_file(temp_dir.path(), "README.md", "# Readme");
        create_file(temp_dir.path(), "data.json", "{}");

        let files = discover(temp_dir.path(), &AnalysisOptions::default());
        assert_eq!(files, vec!["scripts/tool.py", "src/app.ts", "src/view.tsx"]);
    }

    #[test]
    fn test_default_excludes_node_modules_and_declarations() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "index.js", "");
        create_file(temp_dir.path(), "node_modules/lib/index.js", "");
        create_file(temp_dir.path(), "types/global.d.ts", "");
        create_file(temp_dir.path(), "vendor.min.js", "");

        let files = discover(temp_dir.path(), &AnalysisOptions::default());
        assert_eq!(files, vec!["index.js"]);
    }

    #[test]
    fn test_include_dirs_and_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/a.ts", "");
        create_file(temp_dir.path(), "lib/b.ts", "");
        create_file(temp_dir.path(), "other/c.ts", "");

        let options = AnalysisOptions {
            include_dirs: vec!["src".into(), "lib".into(), "does-not-exist".into()],
            ..Default::default()
        };
        let files = discover(temp_dir.path(), &options);
        assert_eq!(files, vec!["lib/b.ts", "src/a.ts"]);
    }

    #[test]
    fn test_overlapping_include_dirs_deduplicated() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/a.ts", "");
        create_file(temp_dir.path(), "src/nested/b.ts", "");

        let options = AnalysisOptions {
            include_dirs: vec!["src".into(), "src/nested".into(), "./src".into()],
            ..Default::default()
        };
        let files = discover(temp_dir.path(), &options);
        assert_eq!(files, vec!["src/a.ts", "src/nested/b.ts"]);
    }

    #[test]
    fn test_include_and_exclude_patterns() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/a.ts", "");
        create_file(temp_dir.path(), "src/a.test.ts", "");
        create_file(temp_dir.path(), "src/b.js", "");
        create_file(temp_dir.path(), "notes.txt", "");

        let options = AnalysisOptions {
            include_file_patterns: vec!["*.ts".into(), "*.txt".into()],
            exclude_file_patterns: vec!["*.test.ts".into()],
            ..Default::default()
        };
        let files = discover(temp_dir.path(), &options);
        assert_eq!(files, vec!["notes.txt", "src/a.ts"]);
    }

    #[test]
    fn test_exclude_pattern_prunes_directories() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/a.ts", "");
        create_file(temp_dir.path(), "src/__generated__/b.ts", "");
        create_file(temp_dir.path(), "legacy/old/c.ts", "");

        let options = AnalysisOptions {
            exclude_dirs: vec!["legacy/old".into()],
            exclude_file_patterns: vec!["__generated__".into()],
            ..Default::default()
        };
        let files = discover(temp_dir.path(), &options);
        assert_eq!(files, vec!["src/a.ts"]);
    }

    #[test]
    fn test_size_bounds() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "tiny.ts", "x");
        create_file(temp_dir.path(), "medium.ts", &"x".repeat(2048));
        create_file(temp_dir.path(), "large.ts", &"x".repeat(8192));

        let options = AnalysisOptions {
            min_file_size_kb: Some(1),
            max_file_size_kb: Some(4),
            ..Default::default()
        };
        let files = discover(temp_dir.path(), &options);
        assert_eq!(files, vec!["medium.ts"]);
    }

    #[test]
    fn test_hidden_files_ignored() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "visible.ts", "");
        create_file(temp_dir.path(), ".hidden.ts", "");
        create_file(temp_dir.path(), ".code-auditor/cache.ts", "");

        let files = discover(temp_dir.path(), &AnalysisOptions::default());
        assert_eq!(files, vec!["visible.ts"]);
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover(temp_dir.path(), &AnalysisOptions::default()).is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let discovery = FileDiscovery::new(LanguageRegistry::new(), &AnalysisOptions::default()).unwrap();
        let result = discovery.discover(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(AuditError::ProjectRoot(_))));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let options = AnalysisOptions {
            include_file_patterns: vec!["[".into()],
            ..Default::default()
        };
        assert!(matches!(
            FileDiscovery::new(LanguageRegistry::new(), &options),
            Err(AuditError::Pattern(_))
        ));
    }

    #[test]
    fn test_returns_absolute_paths() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "a.ts", "");
        let files = FileDiscovery::new(LanguageRegistry::new(), &AnalysisOptions::default())
            .unwrap()
            .discover(temp_dir.path())
            .unwrap();
        assert!(files.iter().all(|p| p.is_absolute()));
    }
}
