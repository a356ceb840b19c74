//! Circular reference detection over the selected plot blocks.
//!
//! The graph is induced by the selection: an edge exists only when both ends are
//! selected. Edges come from `requires` and from the hierarchy (child -> parent,
//! declared by either `parent_id` or `children`).
//!
//! Traversal is an iterative three-color DFS with an explicit stack, so depth is
//! bounded by the heap rather than the call stack.

use pathway_catalog::PlotBlock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::Selection;
use crate::error::ValidationFault;
use crate::findings::{Conflict, ConflictKind, ElementRef, FindingLevel, Severity};

/// A cycle among selected plot blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircularReference {
    /// Ids along the cycle, closed by repeating the first id.
    pub path: Vec<String>,

    /// The blocks on the cycle, in path order, without the closing repeat.
    pub blocks: Vec<PlotBlock>,
}

impl CircularReference {
    /// The conflict reported for this cycle. Never auto-fixable.
    pub fn to_conflict(&self) -> Conflict {
        let names: Vec<&str> = self
            .path
            .iter()
            .map(|id| {
                self.blocks
                    .iter()
                    .find(|b| &b.id == id)
                    .map(|b| b.name.as_str())
                    .unwrap_or(id.as_str())
            })
            .collect();

        let source = self
            .blocks
            .first()
            .map(|b| ElementRef::new(b.id.clone(), b.name.clone()))
            .unwrap_or_else(|| ElementRef::new("", ""));

        let mut conflict = Conflict::new(
            ConflictKind::CircularReference,
            &self.path.join("->"),
            FindingLevel::Error,
            Severity::Critical,
            format!("Circular dependency: {}", names.join(" -> ")),
            source,
        );
        for block in self.blocks.iter().skip(1) {
            conflict = conflict.with_target(ElementRef::new(block.id.clone(), block.name.clone()));
        }
        conflict
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Finds requirement and hierarchy cycles among selected plot blocks.
#[derive(Debug, Clone, Default)]
pub struct CircularReferenceDetector;

impl CircularReferenceDetector {
    pub fn new() -> Self {
        Self
    }

    /// Report every distinct cycle once.
    ///
    /// Returns nothing when fewer than two plot blocks are selected.
    pub fn detect(&self, selection: &Selection<'_>) -> Result<Vec<CircularReference>, ValidationFault> {
        let blocks = &selection.plot_blocks;
        if blocks.len() < 2 {
            return Ok(Vec::new());
        }

        let graph = build_graph(blocks);
        let mut marks = vec![Mark::Unvisited; blocks.len()];
        let mut seen_cycles: HashSet<Vec<usize>> = HashSet::new();
        let mut cycles = Vec::new();

        for start in 0..blocks.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            // (node, index of the next edge to follow)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::InProgress;

            while let Some(&(node, next)) = stack.last() {
                let Some(&neighbor) = graph[node].get(next) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                match marks[neighbor] {
                    Mark::Unvisited => {
                        marks[neighbor] = Mark::InProgress;
                        stack.push((neighbor, 0));
                    }
                    Mark::InProgress => {
                        let cycle_start = stack
                            .iter()
                            .position(|&(n, _)| n == neighbor)
                            .ok_or_else(|| ValidationFault::CycleTracking(blocks[neighbor].id.clone()))?;
                        let nodes: Vec<usize> = stack[cycle_start..].iter().map(|&(n, _)| n).collect();

                        if seen_cycles.insert(canonical(&nodes)) {
                            cycles.push(to_reference(blocks, &nodes));
                        }
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(cycles)
    }
}

/// Adjacency lists over selection indices, each edge added once.
fn build_graph(blocks: &[&PlotBlock]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id.as_str(), i))
        .collect();

    let mut graph: Vec<Vec<usize>> = vec![Vec::new(); blocks.len()];
    let mut add_edge = |from: usize, to: usize| {
        if !graph[from].contains(&to) {
            graph[from].push(to);
        }
    };

    for (i, block) in blocks.iter().enumerate() {
        for required in &block.requires {
            if let Some(&j) = index.get(required.as_str()) {
                add_edge(i, j);
            }
        }
        if let Some(&parent) = block.parent_id.as_deref().and_then(|p| index.get(p)) {
            add_edge(i, parent);
        }
        for child in &block.children {
            if let Some(&c) = index.get(child.as_str()) {
                add_edge(c, i);
            }
        }
    }

    graph
}

/// Rotate a cycle so its smallest index comes first.
fn canonical(nodes: &[usize]) -> Vec<usize> {
    let Some(min_pos) = nodes
        .iter()
        .enumerate()
        .min_by_key(|&(_, n)| *n)
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };
    nodes[min_pos..]
        .iter()
        .chain(&nodes[..min_pos])
        .copied()
        .collect()
}

fn to_reference(blocks: &[&PlotBlock], nodes: &[usize]) -> CircularReference {
    let mut path: Vec<String> = nodes.iter().map(|&n| blocks[n].id.clone()).collect();
    if let Some(first) = path.first().cloned() {
        path.push(first);
    }
    CircularReference {
        path,
        blocks: nodes.iter().map(|&n| blocks[n].clone()).collect(),
    }
}
