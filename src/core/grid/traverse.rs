//! Nearest-first traversal of a spatial grid.
//!
//! Best-first search over tree blocks keyed by the squared Euclidean distance
//! from the query point to the nearest cell of each block. A block's key is a
//! lower bound for every cell inside it and exact for the cell it is reported
//! at, so cells come out in non-decreasing distance order.
//!
//! ```text
//!   pop block ──► internal?  push children
//!            └──► value, nearest cell inside min bound?  push 3^D sub-blocks
//!            └──► value otherwise                         yield (cell, level, value)
//! ```

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::node::{Cell, GridNode, child_centre, child_count, half_extent};
use super::Coord;

/// Euclidean distance window for traversal and nearest-cell queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceBounds {
    /// Cells closer than this are skipped
    pub min: f64,
    /// Traversal stops beyond this distance
    pub max: f64,
}

impl DistanceBounds {
    /// Window `[min, max]`.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Everything up to `max`.
    pub fn within(max: f64) -> Self {
        Self { min: 0.0, max }
    }
}

impl Default for DistanceBounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
        }
    }
}

enum Entry<'a, T, const D: usize> {
    /// A tree node centred at the given coordinate.
    Node(&'a GridNode<T>, Coord<D>),
    /// A virtual sub-block of a uniform leaf.
    Block(u32, Coord<D>, &'a T),
}

/// Lazy iterator over `(cell, level, value)` in order of increasing distance.
///
/// `cell` is the nearest unit cell of the reported block and `level` is the
/// level of the block that holds the value there.
pub struct TraverseOutward<'a, T, const D: usize> {
    query: Coord<D>,
    min_sq: f64,
    max_sq: f64,
    entries: Vec<Option<Entry<'a, T, D>>>,
    heap: BinaryHeap<Reverse<(i128, usize)>>,
}

impl<'a, T, const D: usize> TraverseOutward<'a, T, D> {
    pub(crate) fn new(root: &'a GridNode<T>, query: Coord<D>, bounds: DistanceBounds) -> Self {
        let mut traversal = Self {
            query,
            min_sq: bounds.min.max(0.0).powi(2),
            max_sq: bounds.max.powi(2),
            entries: Vec::new(),
            heap: BinaryHeap::new(),
        };
        traversal.push(Entry::Node(root, [0; D]));
        traversal
    }

    /// Nearest unit cell of the block `(level, centre)` and its squared distance.
    fn nearest_in_block(&self, level: u32, centre: &Coord<D>) -> (Coord<D>, i128) {
        let h = half_extent(level);
        let mut nearest = [0i64; D];
        let mut dist_sq = 0i128;
        for k in 0..D {
            nearest[k] = self.query[k].clamp(centre[k] - h, centre[k] + h);
            let d = (nearest[k] - self.query[k]) as i128;
            dist_sq += d * d;
        }
        (nearest, dist_sq)
    }

    fn push(&mut self, entry: Entry<'a, T, D>) {
        let (level, centre) = match &entry {
            Entry::Node(node, centre) => (node.level, centre),
            Entry::Block(level, centre, _) => (*level, centre),
        };
        let (_, dist_sq) = self.nearest_in_block(level, centre);
        if dist_sq as f64 > self.max_sq {
            return;
        }
        let id = self.entries.len();
        self.entries.push(Some(entry));
        self.heap.push(Reverse((dist_sq, id)));
    }

    fn push_sub_blocks(&mut self, level: u32, centre: &Coord<D>, value: &'a T) {
        for index in 0..child_count::<D>() {
            let c = child_centre(level, centre, index);
            self.push(Entry::Block(level - 1, c, value));
        }
    }
}

impl<'a, T, const D: usize> Iterator for TraverseOutward<'a, T, D> {
    type Item = (Coord<D>, u32, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(Reverse((dist_sq, id))) = self.heap.pop() {
            let Some(entry) = self.entries[id].take() else {
                continue;
            };
            let (level, centre, value) = match entry {
                Entry::Node(node, centre) => match &node.cell {
                    Cell::Leaf(None) => continue,
                    Cell::Leaf(Some(value)) => (node.level, centre, value),
                    Cell::Internal(children) => {
                        for (index, child) in children.iter().enumerate() {
                            if let Some(child) = child {
                                let c = child_centre(node.level, &centre, index);
                                self.push(Entry::Node(&**child, c));
                            }
                        }
                        continue;
                    }
                },
                Entry::Block(level, centre, value) => (level, centre, value),
            };
            if (dist_sq as f64) < self.min_sq {
                if level > 0 {
                    self.push_sub_blocks(level, &centre, value);
                }
                continue;
            }
            let (cell, _) = self.nearest_in_block(level, &centre);
            return Some((cell, level, value));
        }
        None
    }
}
