//! Sparse adaptive n-dimensional grid.
//!
//! Every map representation in the crate is a [`SpatialGrid`]: a base-3 tree
//! keyed by integer coordinates. The root is centred on the origin and grows
//! ("elevates") one level at a time when a write lands outside its extent.
//! Uniform regions collapse into single leaves, so a large free area costs a
//! handful of nodes instead of one entry per cell.
//!
//! ```text
//! level 2 root (9×9 cells)
//! ┌───────┬───────┬───────┐
//! │ L1    │ L1    │ absent│
//! │ leaf  │ split │       │
//! ├───────┼───────┼───────┤
//! │ absent│ L1    │ ...   │
//! │       │ leaf  │       │
//! └───────┴───────┴───────┘
//! ```
//!
//! # Invariants
//!
//! - An internal node whose `3^D` children are all leaves with one common
//!   value is collapsed into a leaf with that value.
//! - An internal node whose children are all absent is collapsed into an
//!   absent leaf.
//! - Splitting a level-0 node is a programming error and panics.
//!
//! # Example
//!
//! ```
//! use marga_slam::core::grid::SpatialGrid;
//!
//! let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
//! grid.set([5, -3], 1);
//! assert_eq!(grid.get([5, -3]), Some(&1));
//! assert_eq!(grid.get([0, 0]), None);
//! grid.clear([5, -3]);
//! assert!(grid.is_empty());
//! ```

mod node;
mod traverse;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{MargaError, Result};

pub use node::{Cell, GridNode};
pub use traverse::{DistanceBounds, TraverseOutward};

use node::{block_contains, child_centre, half_extent, pow3};

/// Integer cell coordinate.
pub type Coord<const D: usize> = [i64; D];

/// Deepest root level whose extent still fits in `i64` coordinates.
const MAX_LEVEL: u32 = 39;

/// Largest absolute coordinate per axis that [`SpatialGrid::set`] accepts.
pub const MAX_COORD: i64 = half_extent(MAX_LEVEL);

/// Sparse base-3 tree over `D`-dimensional integer coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGrid<T, const D: usize> {
    root: GridNode<T>,
}

impl<T, const D: usize> Default for SpatialGrid<T, D> {
    fn default() -> Self {
        Self {
            root: GridNode::empty(0),
        }
    }
}

/// Serialized form: dimensionality plus the nested node records.
#[derive(Serialize)]
struct GridRecordRef<'a, T> {
    dimensions: usize,
    root: &'a GridNode<T>,
}

#[derive(Deserialize)]
struct GridRecord<T> {
    dimensions: usize,
    root: GridNode<T>,
}

/// Neighbour lookup handed to [`SpatialGrid::convolve`].
///
/// Offsets are resolved against the grid being convolved, never against the
/// output under construction.
pub struct Neighborhood<'g, T, const D: usize> {
    grid: &'g SpatialGrid<T, D>,
    centre: Coord<D>,
}

impl<'g, T, const D: usize> Neighborhood<'g, T, D> {
    /// Cell the kernel is evaluated at.
    pub fn centre(&self) -> Coord<D> {
        self.centre
    }

    /// Value at `centre + offset`.
    pub fn get(&self, offset: Coord<D>) -> Option<&'g T> {
        let mut coord = self.centre;
        for k in 0..D {
            coord[k] += offset[k];
        }
        self.grid.get(coord)
    }
}

impl<T, const D: usize> SpatialGrid<T, D> {
    /// Empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every axis of `coord` is addressable.
    pub fn in_range(coord: &Coord<D>) -> bool {
        block_contains(MAX_LEVEL, coord)
    }

    /// Current root level.
    pub fn level(&self) -> u32 {
        self.root.level
    }

    /// Root node, for inspection.
    pub fn root(&self) -> &GridNode<T> {
        &self.root
    }

    /// Whether no cell holds a value.
    pub fn is_empty(&self) -> bool {
        self.root.is_absent()
    }

    /// Number of tree nodes.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Value at `coord`, `None` if absent or outside the current extent.
    pub fn get(&self, coord: Coord<D>) -> Option<&T> {
        self.root.get(&coord)
    }

    /// Present leaves as `(block centre, level, value)`.
    ///
    /// A leaf at level `L` covers `3^L` cells per axis around its centre.
    pub fn iter(&self) -> Leaves<'_, T, D> {
        Leaves {
            stack: vec![(&self.root, [0; D])],
        }
    }

    /// Number of present leaves.
    pub fn len_leaves(&self) -> usize {
        self.iter().count()
    }

    /// Every present unit cell with its value, expanding uniform blocks.
    pub fn cells(&self) -> impl Iterator<Item = (Coord<D>, &T)> + '_ {
        self.iter().flat_map(|(centre, level, value)| {
            block_cells::<D>(centre, level).map(move |c| (c, value))
        })
    }

    /// Number of present unit cells.
    ///
    /// Saturates at `usize::MAX`: a single high-level leaf in three or more
    /// dimensions can cover more cells than `usize` counts.
    pub fn cell_count(&self) -> usize {
        self.iter()
            .map(|(_, level, _)| {
                3usize
                    .checked_pow(level * D as u32)
                    .unwrap_or(usize::MAX)
            })
            .fold(0usize, usize::saturating_add)
    }

    /// Blocks ordered by increasing Euclidean distance from `coord`.
    pub fn traverse_outward(
        &self,
        coord: Coord<D>,
        bounds: DistanceBounds,
    ) -> TraverseOutward<'_, T, D> {
        TraverseOutward::new(&self.root, coord, bounds)
    }

    /// Nearest cell within `bounds` whose value satisfies `predicate`.
    pub fn find_closest<P>(
        &self,
        coord: Coord<D>,
        predicate: P,
        bounds: DistanceBounds,
    ) -> Option<Coord<D>>
    where
        P: Fn(&T) -> bool,
    {
        self.traverse_outward(coord, bounds)
            .find(|(_, _, value)| predicate(value))
            .map(|(cell, _, _)| cell)
    }
}

impl<T: Clone + PartialEq, const D: usize> SpatialGrid<T, D> {
    /// Store `value` at `coord`, elevating the root as needed.
    ///
    /// # Panics
    ///
    /// Panics if any axis of `coord` lies outside `-MAX_COORD..=MAX_COORD`.
    /// Use [`SpatialGrid::in_range`] to check untrusted coordinates first.
    pub fn set(&mut self, coord: Coord<D>, value: T) {
        self.write(coord, Some(value));
    }

    /// Remove the value at `coord`. Out-of-range coordinates are a no-op.
    pub fn clear(&mut self, coord: Coord<D>) {
        self.write(coord, None);
    }

    fn write(&mut self, coord: Coord<D>, value: Option<T>) {
        if !block_contains(self.root.level, &coord) {
            if value.is_none() {
                return;
            }
            self.elevate_to(&coord);
        }
        self.root.write(&coord, value);
        self.shrink();
    }

    /// Raise the root until `coord` lies inside it.
    fn elevate_to(&mut self, coord: &Coord<D>) {
        while !block_contains(self.root.level, coord) {
            assert!(
                self.root.level < MAX_LEVEL,
                "grid coordinate out of range: {coord:?}"
            );
            let level = self.root.level + 1;
            if self.root.is_absent() {
                self.root.level = level;
                continue;
            }
            let old = std::mem::replace(&mut self.root, GridNode::empty(level));
            let mut children: Vec<Option<Box<GridNode<T>>>> =
                (0..node::child_count::<D>()).map(|_| None).collect();
            children[node::child_index::<D>(&[0; D])] = Some(Box::new(old));
            self.root.cell = Cell::Internal(children);
        }
    }

    /// Drop root levels that only hold their centre child.
    fn shrink(&mut self) {
        loop {
            if self.root.is_absent() {
                self.root.level = 0;
                return;
            }
            let centre = node::child_index::<D>(&[0; D]);
            let Cell::Internal(children) = &mut self.root.cell else {
                return;
            };
            let only_centre = children
                .iter()
                .enumerate()
                .all(|(i, slot)| (i == centre) == slot.is_some());
            if !only_centre {
                return;
            }
            let Some(child) = children[centre].take() else {
                return;
            };
            self.root = *child;
        }
    }

    /// Apply `f` to every value; `None` results become absent cells.
    pub fn map<U, F>(&self, f: F) -> SpatialGrid<U, D>
    where
        U: Clone + PartialEq,
        F: Fn(&T) -> Option<U>,
    {
        let mut grid = SpatialGrid {
            root: self.root.map(&f),
        };
        grid.shrink();
        grid
    }

    /// Evaluate `kernel` at every present cell with access to its neighbours.
    pub fn convolve<U, F>(&self, kernel: F) -> SpatialGrid<U, D>
    where
        U: Clone + PartialEq,
        F: Fn(&T, &Neighborhood<'_, T, D>) -> Option<U>,
    {
        let mut out = SpatialGrid::new();
        for (coord, value) in self.cells() {
            let neighborhood = Neighborhood {
                grid: self,
                centre: coord,
            };
            if let Some(result) = kernel(value, &neighborhood) {
                out.set(coord, result);
            }
        }
        out
    }

    /// Combine several grids cell by cell.
    ///
    /// `combine` receives one entry per input grid, in input order, for every
    /// cell present in at least one input.
    pub fn merge<U, F>(grids: &[&SpatialGrid<T, D>], combine: F) -> SpatialGrid<U, D>
    where
        U: Clone + PartialEq,
        F: Fn(&[Option<&T>]) -> Option<U>,
    {
        let coords: BTreeSet<Coord<D>> = grids
            .iter()
            .flat_map(|grid| grid.cells().map(|(coord, _)| coord))
            .collect();
        let mut out = SpatialGrid::new();
        let mut values = Vec::with_capacity(grids.len());
        for coord in coords {
            values.clear();
            values.extend(grids.iter().map(|grid| grid.get(coord)));
            if let Some(result) = combine(&values) {
                out.set(coord, result);
            }
        }
        out
    }
}

impl<T: Serialize, const D: usize> SpatialGrid<T, D> {
    /// Encode the tree as nested tagged leaf/internal records.
    pub fn serialize(&self) -> Result<String> {
        let record = GridRecordRef {
            dimensions: D,
            root: &self.root,
        };
        Ok(serde_json::to_string(&record)?)
    }
}

impl<T: for<'de> Deserialize<'de> + Clone + PartialEq, const D: usize> SpatialGrid<T, D> {
    /// Decode a tree produced by [`SpatialGrid::serialize`].
    pub fn deserialize(payload: &str) -> Result<Self> {
        let record: GridRecord<T> = serde_json::from_str(payload)?;
        if record.dimensions != D {
            return Err(MargaError::GridFormat(format!(
                "payload has {} dimensions, expected {}",
                record.dimensions, D
            )));
        }
        if record.root.level > MAX_LEVEL {
            return Err(MargaError::GridFormat(format!(
                "root level {} exceeds {}",
                record.root.level, MAX_LEVEL
            )));
        }
        record.root.validate::<D>().map_err(MargaError::GridFormat)?;
        Ok(Self { root: record.root })
    }
}

/// Depth-first iterator over present leaves.
pub struct Leaves<'a, T, const D: usize> {
    stack: Vec<(&'a GridNode<T>, Coord<D>)>,
}

impl<'a, T, const D: usize> Iterator for Leaves<'a, T, D> {
    type Item = (Coord<D>, u32, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, centre)) = self.stack.pop() {
            match &node.cell {
                Cell::Leaf(Some(value)) => return Some((centre, node.level, value)),
                Cell::Leaf(None) => {}
                Cell::Internal(children) => {
                    for (index, child) in children.iter().enumerate().rev() {
                        if let Some(child) = child {
                            let child_centre = child_centre(node.level, &centre, index);
                            self.stack.push((&**child, child_centre));
                        }
                    }
                }
            }
        }
        None
    }
}

/// Unit cells of the block at `level` centred on `centre`.
fn block_cells<const D: usize>(
    centre: Coord<D>,
    level: u32,
) -> impl Iterator<Item = Coord<D>> {
    let h = half_extent(level);
    let side = (2 * h + 1) as usize;
    let total = side.pow(D as u32);
    (0..total).map(move |mut n| {
        let mut c = centre;
        for axis in c.iter_mut() {
            *axis += (n % side) as i64 - h;
            n /= side;
        }
        c
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(cells: &[([i64; 2], u8)]) -> SpatialGrid<u8, 2> {
        let mut grid = SpatialGrid::new();
        for &(c, v) in cells {
            grid.set(c, v);
        }
        grid
    }

    #[test]
    fn test_set_get_clear_roundtrip() {
        let mut grid: SpatialGrid<u32, 2> = SpatialGrid::new();
        let coords = [[0, 0], [1, 1], [-13, 4], [100, -250], [3, 3]];
        for (i, c) in coords.iter().enumerate() {
            grid.set(*c, i as u32);
        }
        for (i, c) in coords.iter().enumerate() {
            assert_eq!(grid.get(*c), Some(&(i as u32)), "at {c:?}");
        }
        assert_eq!(grid.get([2, 2]), None);
        for c in coords {
            grid.clear(c);
            assert_eq!(grid.get(c), None);
        }
        assert!(grid.is_empty());
        assert_eq!(grid.level(), 0);
    }

    #[test]
    fn test_elevates_when_outside_extent() {
        let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
        grid.set([0, 0], 1);
        assert_eq!(grid.level(), 0);
        grid.set([5, 0], 2);
        // Level 2 covers -4..=4, level 3 covers -13..=13
        assert_eq!(grid.level(), 3);
        assert_eq!(grid.get([0, 0]), Some(&1));
        assert_eq!(grid.get([5, 0]), Some(&2));
    }

    #[test]
    fn test_get_outside_extent_is_none() {
        let grid = grid_with(&[([1, 1], 3)]);
        assert_eq!(grid.get([1_000_000, 0]), None);
    }

    #[test]
    fn test_root_shrinks_after_clear() {
        let mut grid = grid_with(&[([0, 0], 1), ([20, 20], 2)]);
        assert!(grid.level() >= 3);
        grid.clear([20, 20]);
        assert_eq!(grid.level(), 0);
        assert_eq!(grid.get([0, 0]), Some(&1));
    }

    #[test]
    fn test_unifies_identical_children() {
        let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
        grid.set([5, 5], 9); // force a deep root
        grid.clear([5, 5]);
        // Fill the 3x3 block around the origin
        for x in -1..=1 {
            for y in -1..=1 {
                grid.set([x, y], 4);
            }
        }
        assert_eq!(grid.level(), 1);
        assert!(matches!(grid.root().cell, Cell::Leaf(Some(4))));
        assert_eq!(grid.node_count(), 1);
        assert_eq!(grid.cell_count(), 9);

        // Changing one cell splits the block again
        grid.set([1, 0], 5);
        assert!(matches!(grid.root().cell, Cell::Internal(_)));
        assert_eq!(grid.get([1, 0]), Some(&5));
        assert_eq!(grid.get([-1, -1]), Some(&4));
    }

    #[test]
    fn test_clearing_all_children_collapses_to_absent() {
        let mut grid = grid_with(&[([-1, 0], 1), ([1, 0], 2), ([0, 1], 3)]);
        grid.clear([-1, 0]);
        grid.clear([1, 0]);
        grid.clear([0, 1]);
        assert!(grid.is_empty());
        assert!(matches!(grid.root().cell, Cell::Leaf(None)));
    }

    #[test]
    fn test_clear_inside_uniform_block() {
        let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
        for x in -1..=1 {
            for y in -1..=1 {
                grid.set([x, y], 7);
            }
        }
        grid.clear([0, 0]);
        assert_eq!(grid.get([0, 0]), None);
        assert_eq!(grid.get([1, 1]), Some(&7));
        assert_eq!(grid.cell_count(), 8);
    }

    #[test]
    fn test_map_unifies_result() {
        let grid = grid_with(&[([-1, 0], 1), ([1, 0], 2), ([0, 0], 3)]);
        let mapped = grid.map(|v| if *v > 1 { Some(*v * 10) } else { None });
        assert_eq!(mapped.get([-1, 0]), None);
        assert_eq!(mapped.get([1, 0]), Some(&20));
        assert_eq!(mapped.get([0, 0]), Some(&30));

        let empty = grid.map(|_| None::<u8>);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_convolve_reads_original_grid() {
        // Count horizontal neighbours in the input; output must not feed back
        let grid = grid_with(&[([0, 0], 1), ([1, 0], 1), ([2, 0], 1)]);
        let counts = grid.convolve(|_, n| {
            let count = [[-1, 0], [1, 0]].iter().filter(|o| n.get(**o).is_some()).count();
            Some(count as u8)
        });
        assert_eq!(counts.get([0, 0]), Some(&1));
        assert_eq!(counts.get([1, 0]), Some(&2));
        assert_eq!(counts.get([2, 0]), Some(&1));
        assert_eq!(counts.get([3, 0]), None);
    }

    #[test]
    fn test_convolve_expands_uniform_blocks() {
        let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
        for x in -1..=1 {
            for y in -1..=1 {
                grid.set([x, y], 1);
            }
        }
        let edge = grid.convolve(|_, n| {
            let open = [[-1, 0], [1, 0], [0, -1], [0, 1]].iter().any(|o| n.get(*o).is_none());
            open.then_some(true)
        });
        assert_eq!(edge.cell_count(), 8);
        assert_eq!(edge.get([0, 0]), None);
    }

    #[test]
    fn test_merge_union_of_cells() {
        let a = grid_with(&[([0, 0], 1), ([1, 0], 2)]);
        let b = grid_with(&[([1, 0], 5), ([7, 7], 6)]);
        let sum = SpatialGrid::merge(&[&a, &b], |values| {
            Some(values.iter().flatten().map(|v| **v as u32).sum::<u32>())
        });
        assert_eq!(sum.get([0, 0]), Some(&1));
        assert_eq!(sum.get([1, 0]), Some(&7));
        assert_eq!(sum.get([7, 7]), Some(&6));
        assert_eq!(sum.cell_count(), 3);
    }

    #[test]
    fn test_traverse_outward_is_ordered() {
        let grid = grid_with(&[([10, 0], 1), ([2, 2], 2), ([-5, 0], 3), ([0, 1], 4)]);
        let distances: Vec<f64> = grid
            .traverse_outward([0, 0], DistanceBounds::default())
            .map(|(c, _, _)| ((c[0] * c[0] + c[1] * c[1]) as f64).sqrt())
            .collect();
        assert_eq!(distances.len(), 4);
        assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{distances:?}");
    }

    #[test]
    fn test_find_closest_respects_predicate_and_bounds() {
        let grid = grid_with(&[([1, 0], 1), ([3, 0], 2), ([0, 6], 2)]);
        assert_eq!(grid.find_closest([0, 0], |v| *v == 2, DistanceBounds::default()), Some([3, 0]));
        let near = DistanceBounds::new(2.0, 10.0);
        let far = DistanceBounds::new(4.0, 10.0);
        assert_eq!(grid.find_closest([0, 0], |_| true, near), Some([3, 0]));
        assert_eq!(grid.find_closest([0, 0], |v| *v == 2, far), Some([0, 6]));
        assert_eq!(grid.find_closest([0, 0], |_| true, DistanceBounds::within(0.5)), None);
    }

    #[test]
    fn test_find_closest_inside_uniform_block() {
        let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
        for x in -4..=4 {
            for y in -4..=4 {
                grid.set([x, y], 1);
            }
        }
        assert_eq!(grid.node_count(), 1);
        // Query far away hits the nearest edge cell of the block
        assert_eq!(grid.find_closest([20, 0], |_| true, DistanceBounds::default()), Some([4, 0]));
        // Minimum distance forces the search to look inside the block
        let found = grid
            .find_closest([0, 0], |_| true, DistanceBounds::new(3.0, 10.0))
            .unwrap();
        let d = ((found[0] * found[0] + found[1] * found[1]) as f64).sqrt();
        assert!((3.0..3.5).contains(&d), "found {found:?} at {d}");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut grid = grid_with(&[([0, 0], 1), ([9, -3], 2), ([-40, 12], 3)]);
        for x in -1..=1 {
            for y in -1..=1 {
                grid.set([x + 30, y], 8);
            }
        }
        let payload = grid.serialize().unwrap();
        let restored: SpatialGrid<u8, 2> = SpatialGrid::deserialize(&payload).unwrap();
        assert_eq!(restored, grid);
    }

    #[test]
    fn test_deserialize_rejects_wrong_dimensions() {
        let grid: SpatialGrid<u8, 3> = {
            let mut g = SpatialGrid::new();
            g.set([1, 2, 3], 1);
            g
        };
        let payload = grid.serialize().unwrap();
        let result: Result<SpatialGrid<u8, 2>> = SpatialGrid::deserialize(&payload);
        assert!(matches!(result, Err(MargaError::GridFormat(_))));
        assert!(SpatialGrid::<u8, 2>::deserialize("{not json").is_err());
    }

    #[test]
    fn test_three_dimensional_grid() {
        let mut grid: SpatialGrid<&'static str, 3> = SpatialGrid::new();
        grid.set([1, -2, 3], "a");
        grid.set([-30, 0, 8], "b");
        assert_eq!(grid.get([1, -2, 3]), Some(&"a"));
        assert_eq!(grid.get([-30, 0, 8]), Some(&"b"));
        assert_eq!(grid.get([1, -2, 2]), None);
    }

    #[test]
    fn test_coordinate_range_limits() {
        let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
        assert!(SpatialGrid::<u8, 2>::in_range(&[MAX_COORD, -MAX_COORD]));
        assert!(!SpatialGrid::<u8, 2>::in_range(&[MAX_COORD + 1, 0]));

        grid.set([MAX_COORD, -MAX_COORD], 4);
        assert_eq!(grid.get([MAX_COORD, -MAX_COORD]), Some(&4));
        assert_eq!(grid.level(), MAX_LEVEL);

        // Clearing outside the extent never elevates
        grid.clear([i64::MIN, 0]);
        assert_eq!(grid.get([i64::MIN, 0]), None);
        assert_eq!(grid.cell_count(), 1);
    }

    #[test]
    #[should_panic(expected = "grid coordinate out of range")]
    fn test_set_beyond_range_panics() {
        let mut grid: SpatialGrid<u8, 2> = SpatialGrid::new();
        grid.set([i64::MAX, 0], 1);
    }

    #[test]
    fn test_cell_count_saturates_for_huge_blocks() {
        let grid: SpatialGrid<u8, 3> = SpatialGrid {
            root: GridNode::leaf(30, Some(1)),
        };
        assert_eq!(grid.cell_count(), usize::MAX);

        let small: SpatialGrid<u8, 3> = SpatialGrid {
            root: GridNode::leaf(2, Some(1)),
        };
        assert_eq!(small.cell_count(), 729);
    }
}
