use serde::{Deserialize, Serialize};

use super::{CycleReport, CycleSeverity, DependencyGraph, EdgeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExport {
    pub id: String,
    pub relative_path: String,
    pub fan_in: usize,
    pub fan_out: usize,
    pub instability: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeExport {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleExport {
    pub members: Vec<String>,
    pub severity: CycleSeverity,
    pub suggestions: Vec<String>,
}

/// Serializable view of the graph and its cycles for external tooling
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphExport {
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
    pub cycles: Vec<CycleExport>,
    pub possibly_incomplete: bool,
}

impl GraphExport {
    pub fn new(graph: &DependencyGraph, cycles: &CycleReport) -> Self {
        let nodes = graph
            .nodes()
            .map(|n| NodeExport {
                id: n.id.to_string_lossy().to_string(),
                relative_path: n.relative_path.clone(),
                fan_in: n.metrics.fan_in,
                fan_out: n.metrics.fan_out,
                instability: n.metrics.instability,
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .map(|e| EdgeExport {
                source: e.source.to_string_lossy().to_string(),
                target: e.target.to_string_lossy().to_string(),
                kind: e.kind,
            })
            .collect();

        let cycles_out = cycles
            .cycles
            .iter()
            .map(|c| CycleExport {
                members: c.ids.iter().map(|id| id.to_string_lossy().to_string()).collect(),
                severity: c.severity,
                suggestions: c.suggestions.clone(),
            })
            .collect();

        Self {
            nodes,
            edges,
            cycles: cycles_out,
            possibly_incomplete: cycles.possibly_incomplete,
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
