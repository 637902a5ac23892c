//! Ordering and cycle detection tests for the topological sorter.

use super::{CycleDetected, TopologicalNode, sort};
use rstest::rstest;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node {
    id: u32,
    parents: Vec<u32>,
}

impl Node {
    fn new(id: u32, parents: &[u32]) -> Self {
        Self {
            id,
            parents: parents.to_vec(),
        }
    }
}

impl TopologicalNode for Node {
    type Id = u32;

    fn node_id(&self) -> u32 {
        self.id
    }

    fn predecessors(&self) -> impl Iterator<Item = u32> + '_ {
        self.parents.iter().copied()
    }
}

fn assert_respects_edges(nodes: &[Node], ordered: &[&Node]) {
    let positions: HashMap<u32, usize> = ordered
        .iter()
        .enumerate()
        .map(|(position, node)| (node.id, position))
        .collect();
    assert_eq!(positions.len(), nodes.len(), "every node appears exactly once");
    for node in nodes {
        let own = positions.get(&node.id).copied().expect("node is ordered");
        for parent in &node.parents {
            if let Some(parent_position) = positions.get(parent) {
                assert!(
                    *parent_position < own,
                    "{parent} must precede {}",
                    node.id
                );
            }
        }
    }
}

#[rstest]
fn empty_input_yields_empty_order() {
    let nodes: Vec<Node> = Vec::new();
    let ordered = sort(&nodes).expect("empty graph sorts");
    assert!(ordered.is_empty());
}

#[rstest]
#[case::chain(vec![Node::new(3, &[2]), Node::new(2, &[1]), Node::new(1, &[])])]
#[case::diamond(vec![
    Node::new(4, &[2, 3]),
    Node::new(3, &[1]),
    Node::new(2, &[1]),
    Node::new(1, &[]),
])]
#[case::forest(vec![
    Node::new(10, &[]),
    Node::new(11, &[10]),
    Node::new(20, &[]),
    Node::new(21, &[20, 10]),
])]
#[case::joined_branches(vec![
    Node::new(6, &[4, 5]),
    Node::new(5, &[2]),
    Node::new(4, &[3]),
    Node::new(3, &[2]),
    Node::new(2, &[1]),
    Node::new(1, &[]),
])]
fn predecessors_come_first(#[case] nodes: Vec<Node>) {
    let ordered = sort(&nodes).expect("acyclic graph sorts");
    assert_respects_edges(&nodes, &ordered);
}

#[rstest]
fn predecessors_outside_the_input_are_ignored() {
    let nodes = vec![Node::new(7, &[99]), Node::new(8, &[7, 100])];
    let ordered = sort(&nodes).expect("dangling predecessors are skipped");
    let ids: Vec<u32> = ordered.iter().map(|node| node.id).collect();
    assert_eq!(ids, vec![7, 8]);
}

#[rstest]
#[case::self_loop(vec![Node::new(1, &[1])])]
#[case::two_cycle(vec![Node::new(1, &[2]), Node::new(2, &[1])])]
#[case::long_cycle(vec![
    Node::new(1, &[]),
    Node::new(2, &[1, 4]),
    Node::new(3, &[2]),
    Node::new(4, &[3]),
])]
fn cycles_are_rejected(#[case] nodes: Vec<Node>) {
    let result = sort(&nodes);
    assert!(matches!(result, Err(CycleDetected { .. })));
}

#[rstest]
fn deep_chains_do_not_recurse() {
    let nodes: Vec<Node> = (0..50_000_u32)
        .rev()
        .map(|id| {
            if id == 0 {
                Node::new(id, &[])
            } else {
                Node::new(id, &[id - 1])
            }
        })
        .collect();
    let ordered = sort(&nodes).expect("long chain sorts");
    assert_eq!(ordered.first().map(|node| node.id), Some(0));
    assert_eq!(ordered.last().map(|node| node.id), Some(49_999));
}
