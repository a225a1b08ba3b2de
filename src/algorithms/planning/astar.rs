//! Generic A* search.
//!
//! One invocation is one search; nothing persists between calls. Nodes and
//! edges are whatever the [`SearchProblem`] says they are, which lets the
//! grid planner reuse the same search for frontier seeking and goal seeking.
//!
//! - Open set: min-`f` binary heap, ties broken by insertion order
//! - A node is closed the first time it is popped and never reopened
//! - An open node is only updated when the new `f` is not worse

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::marker::PhantomData;

/// Describes the graph being searched.
pub trait SearchProblem {
    type Node: Clone + Eq + Hash;
    type Edge: Clone;

    /// Estimated remaining cost from `node` to the nearest goal.
    fn heuristic(&self, node: &Self::Node) -> f64;

    /// Cost of moving from `from` to `to` along `edge`.
    fn cost(&self, edge: &Self::Edge, from: &Self::Node, to: &Self::Node) -> f64;

    /// Successors of `node` with the edges leading to them.
    fn neighbors(&self, node: &Self::Node) -> Vec<(Self::Node, Self::Edge)>;

    /// Whether `node` ends the search.
    fn is_goal(&self, node: &Self::Node) -> bool;
}

/// Search problem assembled from closures.
pub struct ClosureProblem<Node, Edge, H, C, N, G> {
    heuristic: H,
    cost: C,
    neighbors: N,
    is_goal: G,
    _types: PhantomData<fn() -> (Node, Edge)>,
}

impl<Node, Edge, H, C, N, G> ClosureProblem<Node, Edge, H, C, N, G>
where
    H: Fn(&Node) -> f64,
    C: Fn(&Edge, &Node, &Node) -> f64,
    N: Fn(&Node) -> Vec<(Node, Edge)>,
    G: Fn(&Node) -> bool,
{
    pub fn new(heuristic: H, cost: C, neighbors: N, is_goal: G) -> Self {
        Self {
            heuristic,
            cost,
            neighbors,
            is_goal,
            _types: PhantomData,
        }
    }
}

impl<Node, Edge, H, C, N, G> SearchProblem for ClosureProblem<Node, Edge, H, C, N, G>
where
    Node: Clone + Eq + Hash,
    Edge: Clone,
    H: Fn(&Node) -> f64,
    C: Fn(&Edge, &Node, &Node) -> f64,
    N: Fn(&Node) -> Vec<(Node, Edge)>,
    G: Fn(&Node) -> bool,
{
    type Node = Node;
    type Edge = Edge;

    fn heuristic(&self, node: &Node) -> f64 {
        (self.heuristic)(node)
    }

    fn cost(&self, edge: &Edge, from: &Node, to: &Node) -> f64 {
        (self.cost)(edge, from, to)
    }

    fn neighbors(&self, node: &Node) -> Vec<(Node, Edge)> {
        (self.neighbors)(node)
    }

    fn is_goal(&self, node: &Node) -> bool {
        (self.is_goal)(node)
    }
}

/// Nodes from start to goal and the edges between them.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath<N, E> {
    /// Start first, goal last
    pub node_path: Vec<N>,
    /// `edge_path[i]` leads from `node_path[i]` to `node_path[i + 1]`
    pub edge_path: Vec<E>,
    /// Accumulated cost of the path
    pub cost: f64,
}

struct NodeRecord<N, E> {
    node: N,
    from: Option<(usize, E)>,
    g_cost: f64,
    h_cost: f64,
    f_cost: f64,
    closed: bool,
}

/// Open-set entry ordered so the heap pops the smallest `f` first.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f_cost: f64,
    sequence: u64,
    index: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; earlier insertions win ties
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* search from `start`, unbounded.
///
/// Returns `None` when the open set empties without reaching a goal.
pub fn search<P: SearchProblem>(
    start: P::Node,
    problem: &P,
) -> Option<SearchPath<P::Node, P::Edge>> {
    search_bounded(start, problem, usize::MAX)
}

/// A* search that gives up after closing `max_expansions` nodes.
pub fn search_bounded<P: SearchProblem>(
    start: P::Node,
    problem: &P,
    max_expansions: usize,
) -> Option<SearchPath<P::Node, P::Edge>> {
    let mut records: Vec<NodeRecord<P::Node, P::Edge>> = Vec::new();
    let mut index_of: HashMap<P::Node, usize> = HashMap::new();
    let mut open = BinaryHeap::new();
    let mut sequence = 0u64;

    let h = problem.heuristic(&start);
    index_of.insert(start.clone(), 0);
    records.push(NodeRecord {
        node: start,
        from: None,
        g_cost: 0.0,
        h_cost: h,
        f_cost: h,
        closed: false,
    });
    open.push(OpenEntry {
        f_cost: h,
        sequence,
        index: 0,
    });

    let mut expansions = 0usize;
    while let Some(entry) = open.pop() {
        let current = entry.index;
        if records[current].closed {
            continue;
        }
        records[current].closed = true;

        if problem.is_goal(&records[current].node) {
            log::debug!("A* reached goal after {} expansions", expansions);
            return Some(reconstruct(&records, current));
        }

        expansions += 1;
        if expansions > max_expansions {
            log::debug!("A* gave up after {} expansions", max_expansions);
            return None;
        }

        let node = records[current].node.clone();
        let g_from = records[current].g_cost;
        for (neighbor, edge) in problem.neighbors(&node) {
            let existing = index_of.get(&neighbor).copied();
            if existing.is_some_and(|i| records[i].closed) {
                continue;
            }
            let g_cost = g_from + problem.cost(&edge, &node, &neighbor);
            let h_cost = match existing {
                Some(i) => records[i].h_cost,
                None => problem.heuristic(&neighbor),
            };
            let f_cost = g_cost + h_cost;

            let index = match existing {
                Some(i) if records[i].f_cost < f_cost => continue,
                Some(i) => {
                    let record = &mut records[i];
                    record.from = Some((current, edge));
                    record.g_cost = g_cost;
                    record.f_cost = f_cost;
                    i
                }
                None => {
                    let i = records.len();
                    index_of.insert(neighbor.clone(), i);
                    records.push(NodeRecord {
                        node: neighbor,
                        from: Some((current, edge)),
                        g_cost,
                        h_cost,
                        f_cost,
                        closed: false,
                    });
                    i
                }
            };
            sequence += 1;
            open.push(OpenEntry {
                f_cost,
                sequence,
                index,
            });
        }
    }
    None
}

fn reconstruct<N: Clone, E: Clone>(records: &[NodeRecord<N, E>], goal: usize) -> SearchPath<N, E> {
    let mut node_path = Vec::new();
    let mut edge_path = Vec::new();
    let mut current = Some(goal);
    while let Some(index) = current {
        let record = &records[index];
        node_path.push(record.node.clone());
        current = record.from.as_ref().map(|(prev, edge)| {
            edge_path.push(edge.clone());
            *prev
        });
    }
    node_path.reverse();
    edge_path.reverse();
    SearchPath {
        node_path,
        edge_path,
        cost: records[goal].g_cost,
    }
}
