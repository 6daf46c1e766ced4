use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::analysis::FileRecord;
use crate::config::AnalysisOptions;
use crate::paths;

use super::{DependencyEdge, DependencyGraph, DependencyNode, EdgeKind, NodeMetrics};

/// Directory entry files tried when a specifier names a directory
const INDEX_STEMS: &[&str] = &["index", "__init__"];

pub struct DependencyGraphBuilder {
    extensions: Vec<String>,
}

impl DependencyGraphBuilder {
    pub fn new(extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                if e.is_empty() || e.starts_with('.') {
                    e
                } else {
                    format!(".{}", e)
                }
            })
            .collect();
        Self { extensions }
    }

    pub fn from_options(options: &AnalysisOptions) -> Self {
        Self::new(options.resolve_extensions.clone())
    }

    /// Builds the graph over `records`. Only relative specifiers that resolve
    /// to one of the records produce edges; everything else is dropped.
    pub fn build(&self, records: &[FileRecord]) -> DependencyGraph {
        let known: HashSet<PathBuf> = records.iter().map(|r| paths::normalize(&r.path)).collect();

        let mut edge_set: BTreeSet<(PathBuf, PathBuf)> = BTreeSet::new();
        let mut unresolved = 0usize;

        for record in records {
            let source = paths::normalize(&record.path);
            for specifier in &record.imports {
                if !specifier.starts_with('.') {
                    continue;
                }
                match self.resolve(&source, specifier, &known) {
                    Some(target) => {
                        edge_set.insert((source.clone(), target));
                    }
                    None => {
                        unresolved += 1;
                        tracing::trace!("Unresolved import '{}' in {}", specifier, record.relative_path);
                    }
                }
            }
        }

        let mut nodes: BTreeMap<PathBuf, DependencyNode> = records
            .iter()
            .map(|r| {
                let id = paths::normalize(&r.path);
                (
                    id.clone(),
                    DependencyNode {
                        id,
                        relative_path: r.relative_path.clone(),
                        incoming: Vec::new(),
                        outgoing: Vec::new(),
                        metrics: NodeMetrics::default(),
                    },
                )
            })
            .collect();

        let mut edges = Vec::with_capacity(edge_set.len());
        for (source, target) in edge_set {
            if let Some(node) = nodes.get_mut(&source) {
                node.outgoing.push(target.clone());
            }
            if let Some(node) = nodes.get_mut(&target) {
                node.incoming.push(source.clone());
            }
            edges.push(DependencyEdge {
                source,
                target,
                kind: EdgeKind::Direct,
            });
        }

        for node in nodes.values_mut() {
            node.incoming.sort();
            node.metrics = NodeMetrics::new(node.incoming.len(), node.outgoing.len());
        }

        tracing::debug!(
            "Built dependency graph: {} nodes, {} edges, {} unresolved relative imports",
            nodes.len(),
            edges.len(),
            unresolved
        );

        DependencyGraph::from_parts(nodes, edges)
    }

    /// Resolves a relative specifier from `importer` against the known files.
    /// Candidates in order: the literal path, the path with each extension,
    /// then an index file inside the path with each extension.
    pub fn resolve(&self, importer: &Path, specifier: &str, known: &HashSet<PathBuf>) -> Option<PathBuf> {
        let dir = importer.parent()?;
        let base = paths::normalize(&dir.join(specifier));

        if known.contains(&base) {
            return Some(base);
        }

        // `.`, `..` and `./dir/` name a directory, never a sibling file
        let names_directory = specifier.ends_with('/')
            || matches!(specifier.rsplit('/').next(), Some(".") | Some(".."));

        if !names_directory {
            for ext in &self.extensions {
                let candidate = with_suffix(&base, ext);
                if known.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }

        for stem in INDEX_STEMS {
            let index = base.join(stem);
            for ext in &self.extensions {
                let candidate = with_suffix(&index, ext);
                if known.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }

        None
    }
}

impl Default for DependencyGraphBuilder {
    fn default() -> Self {
        Self::from_options(&AnalysisOptions::default())
    }
}

/// Appends `suffix` to the final component (`./a.test` + `.ts` → `./a.test.ts`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}
