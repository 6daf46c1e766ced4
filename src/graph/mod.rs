//! File-level dependency graph built from resolved relative imports.

pub mod builder;
pub mod cycles;
pub mod export;

pub use builder::DependencyGraphBuilder;
pub use cycles::{Cycle, CycleDetector, CycleReport, CycleSeverity};
pub use export::GraphExport;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetrics {
    pub fan_in: usize,
    pub fan_out: usize,
    /// fanOut / (fanIn + fanOut), 0 for isolated nodes
    pub instability: f64,
}

impl NodeMetrics {
    pub fn new(fan_in: usize, fan_out: usize) -> Self {
        let total = fan_in + fan_out;
        let instability = if total == 0 {
            0.0
        } else {
            fan_out as f64 / total as f64
        };
        Self {
            fan_in,
            fan_out,
            instability,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyNode {
    /// Absolute path of the file
    pub id: PathBuf,
    pub relative_path: String,
    /// Importers of this file, sorted
    pub incoming: Vec<PathBuf>,
    /// Files this file imports, sorted
    pub outgoing: Vec<PathBuf>,
    pub metrics: NodeMetrics,
}

/// Read-only once built. Nodes iterate in id order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<PathBuf, DependencyNode>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    pub(crate) fn from_parts(nodes: BTreeMap<PathBuf, DependencyNode>, edges: Vec<DependencyEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &Path) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn outgoing(&self, id: &Path) -> &[PathBuf] {
        self.nodes.get(id).map(|n| n.outgoing.as_slice()).unwrap_or(&[])
    }

    pub fn relative_path<'a>(&'a self, id: &'a Path) -> std::borrow::Cow<'a, str> {
        match self.nodes.get(id) {
            Some(node) => std::borrow::Cow::Borrowed(node.relative_path.as_str()),
            None => id.to_string_lossy(),
        }
    }
}
