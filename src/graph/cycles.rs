//! Import cycle detection.
//!
//! Iterative depth-first search over the dependency graph. The open path is
//! the explicit frame stack; reaching a node that is still on the stack closes
//! a cycle. Cycles are keyed by their rotation that starts at the smallest
//! member, so the same loop entered from different nodes is reported once.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::DependencyGraph;

pub const DEFAULT_MAX_DEPTH: usize = 20;

const GENERIC_SUGGESTIONS: &[&str] = &[
    "Extract the shared types or constants into a separate module both sides can import",
    "Invert one dependency through an interface or callback (dependency injection)",
    "Move the import into the function that needs it if it is only used lazily",
    "Merge the modules if they always change together",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleSeverity {
    Critical,
    Major,
    Minor,
}

impl CycleSeverity {
    pub fn for_length(len: usize) -> Self {
        match len {
            0..=2 => CycleSeverity::Critical,
            3..=4 => CycleSeverity::Major,
            _ => CycleSeverity::Minor,
        }
    }
}

impl fmt::Display for CycleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleSeverity::Critical => "critical",
            CycleSeverity::Major => "major",
            CycleSeverity::Minor => "minor",
        };
        f.write_str(s)
    }
}

/// One import loop. The closing edge runs from the last member to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    /// Node ids in canonical rotation
    #[serde(skip)]
    pub ids: Vec<PathBuf>,
    /// Root-relative paths, same order as `ids`
    pub members: Vec<String>,
    pub length: usize,
    pub severity: CycleSeverity,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub cycles: Vec<Cycle>,
    /// Set when some branch hit the depth limit and was not expanded
    pub possibly_incomplete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    OnPath,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    cursor: usize,
}

pub struct CycleDetector {
    max_depth: usize,
}

impl CycleDetector {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn detect(&self, graph: &DependencyGraph) -> CycleReport {
        let ids: Vec<&PathBuf> = graph.nodes().map(|n| &n.id).collect();
        let index: HashMap<&PathBuf, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let adjacency: Vec<Vec<usize>> = ids
            .iter()
            .map(|id| {
                graph
                    .outgoing(id)
                    .iter()
                    .filter_map(|target| index.get(target).copied())
                    .collect()
            })
            .collect();

        let mut state = vec![VisitState::Unvisited; ids.len()];
        let mut found: BTreeSet<Vec<usize>> = BTreeSet::new();
        let mut truncated = false;

        for start in 0..ids.len() {
            if state[start] != VisitState::Unvisited {
                continue;
            }

            let mut stack = vec![Frame { node: start, cursor: 0 }];
            state[start] = VisitState::OnPath;

            while let Some(&Frame { node, cursor }) = stack.last() {
                let neighbors = &adjacency[node];
                if cursor >= neighbors.len() {
                    stack.pop();
                    state[node] = VisitState::Done;
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.cursor += 1;
                }

                let next = neighbors[cursor];
                match state[next] {
                    VisitState::OnPath => {
                        if let Some(pos) = stack.iter().position(|f| f.node == next) {
                            let members: Vec<usize> = stack[pos..].iter().map(|f| f.node).collect();
                            if members.len() >= 2 {
                                found.insert(canonical_rotation(&members));
                            }
                        }
                    }
                    VisitState::Done => {}
                    VisitState::Unvisited => {
                        if stack.len() >= self.max_depth {
                            truncated = true;
                        } else {
                            state[next] = VisitState::OnPath;
                            stack.push(Frame { node: next, cursor: 0 });
                        }
                    }
                }
            }
        }

        if truncated {
            tracing::warn!(
                "Cycle search hit the depth limit of {}; results may be incomplete",
                self.max_depth
            );
        }

        let cycles: Vec<Cycle> = found
            .into_iter()
            .map(|members| {
                let member_ids: Vec<PathBuf> = members.iter().map(|&i| ids[i].clone()).collect();
                self.build_cycle(graph, member_ids)
            })
            .collect();

        tracing::debug!("Found {} import cycles", cycles.len());

        CycleReport {
            cycles,
            possibly_incomplete: truncated,
        }
    }

    fn build_cycle(&self, graph: &DependencyGraph, ids: Vec<PathBuf>) -> Cycle {
        let members: Vec<String> = ids.iter().map(|id| graph.relative_path(id).into_owned()).collect();
        let length = ids.len();

        let mut suggestions: Vec<String> = GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect();

        // Ties go to the first member in canonical order
        let candidate = ids
            .iter()
            .zip(&members)
            .filter_map(|(id, rel)| graph.node(id).map(|n| (n.metrics.fan_out, rel)))
            .fold(None, |best: Option<(usize, &String)>, (fan_out, rel)| match best {
                Some((best_fan_out, _)) if best_fan_out >= fan_out => best,
                _ => Some((fan_out, rel)),
            });
        if let Some((fan_out, rel)) = candidate {
            suggestions.push(format!(
                "Consider refactoring {} (highest fan-out in cycle: {})",
                rel, fan_out
            ));
        }

        Cycle {
            ids,
            members,
            length,
            severity: CycleSeverity::for_length(length),
            suggestions,
        }
    }
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Rotates the cycle so it starts at its smallest member. Node indices follow
/// id order, so this is the lexicographically smallest rotation start.
fn canonical_rotation(members: &[usize]) -> Vec<usize> {
    let start = members
        .iter()
        .enumerate()
        .min_by_key(|(_, m)| **m)
        .map(|(i, _)| i)
        .unwrap_or(0);
    members[start..].iter().chain(&members[..start]).copied().collect()
}
