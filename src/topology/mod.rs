//! Depth-first topological ordering over predecessor graphs.
//!
//! Nodes expose their direct predecessors through [`TopologicalNode`]. The
//! sort walks the graph iteratively with the classic three-colour scheme so
//! deep task chains cannot exhaust the call stack. Predecessors that are not
//! part of the input collection are ignored: callers sort subsets of a graph
//! (for example only the tasks that completed before a restart).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

#[cfg(test)]
mod tests;

/// A graph node that can report the identifiers of its direct predecessors.
pub trait TopologicalNode {
    /// Identifier type used to reference other nodes.
    type Id: Copy + Eq + Hash + fmt::Debug + fmt::Display;

    /// Returns this node's identifier.
    fn node_id(&self) -> Self::Id;

    /// Returns the identifiers of nodes that must precede this one.
    fn predecessors(&self) -> impl Iterator<Item = Self::Id> + '_;
}

/// Error returned when the input graph contains a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cycle detected in task graph at node {node}")]
pub struct CycleDetected<Id: fmt::Display> {
    /// Node reached a second time while still on the traversal path.
    pub node: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders `nodes` so that every node follows all of its predecessors.
///
/// Ties between independent nodes are not broken in any guaranteed way.
///
/// # Errors
///
/// Returns [`CycleDetected`] when a node is re-entered while it is still in
/// progress. No partial ordering is returned in that case.
pub fn sort<N: TopologicalNode>(nodes: &[N]) -> Result<Vec<&N>, CycleDetected<N::Id>> {
    let positions: HashMap<N::Id, usize> = nodes
        .iter()
        .enumerate()
        .map(|(position, node)| (node.node_id(), position))
        .collect();
    let edges: Vec<Vec<usize>> = nodes
        .iter()
        .map(|node| {
            node.predecessors()
                .filter_map(|id| positions.get(&id).copied())
                .collect()
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut ordered = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..nodes.len() {
        if marks.get(root) != Some(&Mark::Unvisited) {
            continue;
        }
        set_mark(&mut marks, root, Mark::InProgress);
        stack.push((root, 0));

        while let Some((current, cursor)) = stack.pop() {
            let next = edges
                .get(current)
                .and_then(|predecessors| predecessors.get(cursor))
                .copied();
            let Some(predecessor) = next else {
                set_mark(&mut marks, current, Mark::Done);
                if let Some(node) = nodes.get(current) {
                    ordered.push(node);
                }
                continue;
            };
            stack.push((current, cursor + 1));
            match marks.get(predecessor) {
                Some(Mark::Unvisited) => {
                    set_mark(&mut marks, predecessor, Mark::InProgress);
                    stack.push((predecessor, 0));
                }
                Some(Mark::InProgress) => {
                    if let Some(node) = nodes.get(predecessor) {
                        return Err(CycleDetected {
                            node: node.node_id(),
                        });
                    }
                }
                Some(Mark::Done) | None => {}
            }
        }
    }

    Ok(ordered)
}

fn set_mark(marks: &mut [Mark], position: usize, mark: Mark) {
    if let Some(slot) = marks.get_mut(position) {
        *slot = mark;
    }
}
