//! Tree nodes of the spatial grid.
//!
//! A node at level `L` covers a block of `3^L` cells per axis centred on its
//! own origin. An internal node has `3^D` child slots, one per sub-block;
//! slot `i` holds the sub-block at relative offset `r` where
//!
//! ```text
//! i = Σ (r_k + 1) · 3^k,   r_k ∈ {-1, 0, 1}
//! ```
//!
//! Coordinates passed into a node are always relative to that node's centre.

use serde::{Deserialize, Serialize};

use super::Coord;

/// Leaf value or child slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell<T> {
    /// Uniform block; `None` means the whole block is absent.
    Leaf(Option<T>),
    /// `3^D` child slots, `None` for absent children.
    Internal(Vec<Option<Box<GridNode<T>>>>),
}

/// A node of the base-3 tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridNode<T> {
    /// Cell edge length of this block is `3^level`.
    pub level: u32,
    /// Node contents.
    pub cell: Cell<T>,
}

/// `3^exp` as a signed coordinate scale.
#[inline]
pub(crate) const fn pow3(exp: u32) -> i64 {
    3i64.pow(exp)
}

/// Number of child slots of an internal node in `D` dimensions.
#[inline]
pub(crate) fn child_count<const D: usize>() -> usize {
    3usize.pow(D as u32)
}

/// Largest |coordinate| covered by a block at `level`.
#[inline]
pub(crate) const fn half_extent(level: u32) -> i64 {
    (pow3(level) - 1) / 2
}

/// Nearest integer of `value / divisor` for an odd positive divisor.
///
/// Odd divisors never produce ties, so this matches round-half-up exactly.
#[inline]
pub(crate) fn round_div(value: i64, divisor: i64) -> i64 {
    (value + (divisor - 1) / 2).div_euclid(divisor)
}

/// Whether `coord` (relative to the centre) falls inside a block at `level`.
#[inline]
pub(crate) fn block_contains<const D: usize>(level: u32, coord: &Coord<D>) -> bool {
    let h = half_extent(level).unsigned_abs();
    coord.iter().all(|c| c.unsigned_abs() <= h)
}

/// Child slot index for a relative offset in `{-1, 0, 1}^D`.
#[inline]
pub(crate) fn child_index<const D: usize>(offset: &Coord<D>) -> usize {
    offset
        .iter()
        .enumerate()
        .map(|(k, r)| ((r + 1) as usize) * 3usize.pow(k as u32))
        .sum()
}

/// Relative offset in `{-1, 0, 1}^D` of child slot `index`.
#[inline]
pub(crate) fn child_offset<const D: usize>(index: usize) -> Coord<D> {
    let mut offset = [0i64; D];
    let mut rest = index;
    for r in offset.iter_mut() {
        *r = (rest % 3) as i64 - 1;
        rest /= 3;
    }
    offset
}

/// Slot index and child-relative coordinate for `coord` at `level` (> 0).
///
/// Returns `None` when `coord` is outside the block.
#[inline]
pub(crate) fn locate<const D: usize>(
    level: u32,
    coord: &Coord<D>,
) -> Option<(usize, Coord<D>)> {
    debug_assert!(level > 0);
    let scale = pow3(level - 1);
    let mut offset = [0i64; D];
    let mut inner = [0i64; D];
    for k in 0..D {
        let r = round_div(coord[k], scale);
        if r.abs() > 1 {
            return None;
        }
        offset[k] = r;
        inner[k] = coord[k] - r * scale;
    }
    Some((child_index(&offset), inner))
}

/// Centre of child slot `index` of a block at `level` centred on `centre`.
#[inline]
pub(crate) fn child_centre<const D: usize>(
    level: u32,
    centre: &Coord<D>,
    index: usize,
) -> Coord<D> {
    let scale = pow3(level - 1);
    let offset = child_offset::<D>(index);
    let mut c = *centre;
    for k in 0..D {
        c[k] += offset[k] * scale;
    }
    c
}

impl<T> GridNode<T> {
    /// Absent leaf at `level`.
    pub(crate) fn empty(level: u32) -> Self {
        Self {
            level,
            cell: Cell::Leaf(None),
        }
    }

    /// Leaf holding `value` at `level`.
    pub(crate) fn leaf(level: u32, value: Option<T>) -> Self {
        Self {
            level,
            cell: Cell::Leaf(value),
        }
    }

    /// Whether this node is a leaf without a value.
    #[inline]
    pub(crate) fn is_absent(&self) -> bool {
        matches!(self.cell, Cell::Leaf(None))
    }

    /// Value stored for `coord` relative to this node's centre.
    pub(crate) fn get<const D: usize>(&self, coord: &Coord<D>) -> Option<&T> {
        if !block_contains(self.level, coord) {
            return None;
        }
        match &self.cell {
            Cell::Leaf(value) => value.as_ref(),
            Cell::Internal(children) => {
                let (index, inner) = locate(self.level, coord)?;
                children[index].as_ref()?.get(&inner)
            }
        }
    }

    /// Number of nodes in this subtree.
    pub(crate) fn node_count(&self) -> usize {
        match &self.cell {
            Cell::Leaf(_) => 1,
            Cell::Internal(children) => {
                1 + children
                    .iter()
                    .flatten()
                    .map(|child| child.node_count())
                    .sum::<usize>()
            }
        }
    }
}

impl<T: Clone + PartialEq> GridNode<T> {
    /// Replace a leaf by `3^D` children carrying the leaf's value.
    ///
    /// # Panics
    ///
    /// Panics on a level-0 node (a unit cell cannot be subdivided) or on a
    /// node that is already internal.
    pub(crate) fn split<const D: usize>(&mut self) {
        assert!(self.level > 0, "cannot split a level-0 grid node");
        let value = match &self.cell {
            Cell::Leaf(value) => value.clone(),
            Cell::Internal(_) => panic!("grid node is already split"),
        };
        let child_level = self.level - 1;
        let children = (0..child_count::<D>())
            .map(|_| {
                value
                    .as_ref()
                    .map(|v| Box::new(GridNode::leaf(child_level, Some(v.clone()))))
            })
            .collect();
        self.cell = Cell::Internal(children);
    }

    /// Write `value` at `coord` (relative to this node) and simplify the path.
    ///
    /// `coord` must lie inside this block.
    pub(crate) fn write<const D: usize>(&mut self, coord: &Coord<D>, value: Option<T>) {
        if self.level == 0 {
            self.cell = Cell::Leaf(value);
            return;
        }
        if let Cell::Leaf(existing) = &self.cell {
            if *existing == value {
                return;
            }
            self.split::<D>();
        }
        let Some((index, inner)) = locate(self.level, coord) else {
            return;
        };
        let child_level = self.level - 1;
        if let Cell::Internal(children) = &mut self.cell {
            let child =
                children[index].get_or_insert_with(|| Box::new(GridNode::empty(child_level)));
            child.write(&inner, value);
            if child.is_absent() {
                children[index] = None;
            }
        }
        self.try_unify();
    }

    /// Collapse an internal node whose children are all absent, or all
    /// present leaves with one common value.
    pub(crate) fn try_unify(&mut self) {
        let Cell::Internal(children) = &mut self.cell else {
            return;
        };
        for slot in children.iter_mut() {
            if slot.as_ref().is_some_and(|child| child.is_absent()) {
                *slot = None;
            }
        }
        if children.iter().all(Option::is_none) {
            self.cell = Cell::Leaf(None);
            return;
        }
        let common = match children[0].as_deref() {
            Some(GridNode {
                cell: Cell::Leaf(Some(first)),
                ..
            }) => first,
            _ => return,
        };
        let uniform = children.iter().all(|slot| {
            matches!(
                slot.as_deref(),
                Some(GridNode { cell: Cell::Leaf(Some(v)), .. }) if v == common
            )
        });
        if uniform {
            let value = common.clone();
            self.cell = Cell::Leaf(Some(value));
        }
    }

    /// Apply `f` to every leaf value, simplifying the result bottom-up.
    pub(crate) fn map<U, F>(&self, f: &F) -> GridNode<U>
    where
        U: Clone + PartialEq,
        F: Fn(&T) -> Option<U>,
    {
        let cell = match &self.cell {
            Cell::Leaf(value) => Cell::Leaf(value.as_ref().and_then(f)),
            Cell::Internal(children) => Cell::Internal(
                children
                    .iter()
                    .map(|slot| slot.as_ref().map(|child| Box::new(child.map(f))))
                    .collect(),
            ),
        };
        let mut node = GridNode {
            level: self.level,
            cell,
        };
        node.try_unify();
        node
    }

    /// Check structural invariants of a tree received from outside.
    pub(crate) fn validate<const D: usize>(&self) -> Result<(), String> {
        match &self.cell {
            Cell::Leaf(_) => Ok(()),
            Cell::Internal(children) => {
                if self.level == 0 {
                    return Err("level-0 node has children".to_string());
                }
                if children.len() != child_count::<D>() {
                    return Err(format!(
                        "internal node has {} child slots, expected {}",
                        children.len(),
                        child_count::<D>()
                    ));
                }
                for child in children.iter().flatten() {
                    if child.level + 1 != self.level {
                        return Err(format!(
                            "child level {} under parent level {}",
                            child.level, self.level
                        ));
                    }
                    child.validate::<D>()?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_div_matches_float_rounding() {
        for divisor in [1i64, 3, 9, 27] {
            for value in -100i64..=100 {
                let expected = (value as f64 / divisor as f64).round() as i64;
                assert_eq!(round_div(value, divisor), expected, "{value}/{divisor}");
            }
        }
    }

    #[test]
    fn test_child_index_roundtrip() {
        for index in 0..9 {
            let offset = child_offset::<2>(index);
            assert_eq!(child_index(&offset), index);
        }
        assert_eq!(child_index(&[0i64, 0]), 4);
        assert_eq!(child_index(&[0i64, 0, 0]), 13);
    }

    #[test]
    fn test_locate_inside_and_outside() {
        // Level 1 block covers -1..=1
        assert_eq!(locate::<2>(1, &[1, -1]), Some((2, [0, 0])));
        assert_eq!(locate::<2>(1, &[2, 0]), None);
        // Level 2 block covers -4..=4 in 3x3 sub-blocks
        assert_eq!(locate::<1>(2, &[4]), Some((2, [1])));
        assert_eq!(locate::<1>(2, &[-2]), Some((0, [1])));
        assert_eq!(locate::<1>(2, &[5]), None);
    }

    #[test]
    fn test_half_extent() {
        assert_eq!(half_extent(0), 0);
        assert_eq!(half_extent(1), 1);
        assert_eq!(half_extent(2), 4);
        assert_eq!(half_extent(3), 13);
    }

    #[test]
    #[should_panic(expected = "cannot split a level-0 grid node")]
    fn test_split_level_zero_panics() {
        let mut node: GridNode<u8> = GridNode::leaf(0, Some(1));
        node.split::<2>();
    }

    #[test]
    fn test_split_copies_value() {
        let mut node: GridNode<u8> = GridNode::leaf(1, Some(7));
        node.split::<2>();
        match &node.cell {
            Cell::Internal(children) => {
                assert_eq!(children.len(), 9);
                assert!(children.iter().all(|c| c.as_ref().is_some_and(|c| c.level == 0)));
            }
            Cell::Leaf(_) => panic!("expected internal node"),
        }
        node.try_unify();
        assert_eq!(node.cell, Cell::Leaf(Some(7)));
    }
}
