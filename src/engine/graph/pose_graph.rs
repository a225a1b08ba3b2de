//! Pose graph with incremental relaxation.
//!
//! Nodes are robot poses identified by a monotonically increasing id. A node
//! exists once a constraint references it and is never removed. Each node's
//! estimate is the strength-weighted circular mean of the poses its incident
//! constraints imply, given the current estimates of the other endpoints.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::transform::RigidTransform2D;

/// Pose identifier.
pub type PoseId = u64;

/// Origin of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Wheel odometry between consecutive poses.
    Odometry,
    /// Scan matching between two scanned poses.
    ScanMatch,
}

/// A relative transform between two poses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Endpoints `(a, b)`.
    pub nodes: (PoseId, PoseId),

    /// Pose of `b` expressed in the frame of `a`.
    pub transform: RigidTransform2D,

    /// Relative weight (finite, >= 0). Zero-strength constraints are kept
    /// but contribute nothing to estimates.
    pub strength: f64,

    /// Origin of the constraint.
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Create an odometry constraint.
    pub fn odometry(
        from: PoseId,
        to: PoseId,
        transform: RigidTransform2D,
        strength: f64,
    ) -> Self {
        Self {
            nodes: (from, to),
            transform,
            strength,
            kind: ConstraintKind::Odometry,
        }
    }

    /// Create a scan-match constraint.
    pub fn scan_match(
        from: PoseId,
        to: PoseId,
        transform: RigidTransform2D,
        strength: f64,
    ) -> Self {
        Self {
            nodes: (from, to),
            transform,
            strength,
            kind: ConstraintKind::ScanMatch,
        }
    }

    /// The endpoint opposite `node`.
    pub fn other(&self, node: PoseId) -> PoseId {
        if self.nodes.0 == node {
            self.nodes.1
        } else {
            self.nodes.0
        }
    }

    /// Pose this constraint implies for `node` given the other endpoint's pose.
    fn implied(&self, node: PoseId, other_estimate: &RigidTransform2D) -> RigidTransform2D {
        if self.nodes.0 == node {
            RigidTransform2D::combine(other_estimate, &self.transform.inverse())
        } else {
            RigidTransform2D::combine(other_estimate, &self.transform)
        }
    }
}

/// Append-only pose graph.
#[derive(Debug, Clone, Default)]
pub struct PoseGraph {
    /// All constraints in insertion order.
    constraints: Vec<Constraint>,

    /// Constraint indices per node.
    by_node: HashMap<PoseId, Vec<usize>>,

    /// Current estimates of nodes that have been visited.
    estimates: BTreeMap<PoseId, RigidTransform2D>,
}

impl PoseGraph {
    /// Create an empty pose graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint, re-estimate both endpoints and propagate once.
    ///
    /// Returns `false` and leaves the graph untouched when the strength is
    /// negative or not finite.
    pub fn add_constraint(&mut self, constraint: Constraint) -> bool {
        if !(constraint.strength.is_finite() && constraint.strength >= 0.0) {
            log::warn!(
                "Rejecting constraint {} -> {} with strength {}",
                constraint.nodes.0,
                constraint.nodes.1,
                constraint.strength
            );
            return false;
        }
        let index = self.constraints.len();
        let (a, b) = constraint.nodes;
        self.constraints.push(constraint);
        self.by_node.entry(a).or_default().push(index);
        if b != a {
            self.by_node.entry(b).or_default().push(index);
        }
        self.estimate_node(a);
        self.estimate_node(b);
        self.propagate(a);
        true
    }

    /// Current estimate of `node`, identity when it has none.
    pub fn estimate(&self, node: PoseId) -> RigidTransform2D {
        self.estimates
            .get(&node)
            .copied()
            .unwrap_or_else(RigidTransform2D::identity)
    }

    /// Whether `node` has been estimated.
    pub fn has_estimate(&self, node: PoseId) -> bool {
        self.estimates.contains_key(&node)
    }

    /// Run `passes` relaxation sweeps from the first constraint's first node.
    ///
    /// The pass count is fixed; there is no convergence check.
    pub fn optimize(&mut self, passes: usize) {
        let Some(first) = self.constraints.first().map(|c| c.nodes.0) else {
            return;
        };
        for _ in 0..passes {
            self.propagate(first);
        }
    }

    /// All constraints in insertion order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Constraints incident to `node`.
    pub fn constraints_of(&self, node: PoseId) -> impl Iterator<Item = &Constraint> + '_ {
        self.by_node
            .get(&node)
            .into_iter()
            .flatten()
            .map(|&i| &self.constraints[i])
    }

    /// Estimated node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = PoseId> + '_ {
        self.estimates.keys().copied()
    }

    /// All node estimates keyed by id.
    pub fn estimates(&self) -> &BTreeMap<PoseId, RigidTransform2D> {
        &self.estimates
    }

    /// Number of estimated nodes.
    pub fn node_count(&self) -> usize {
        self.estimates.len()
    }

    /// Number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of constraints of the given kind.
    pub fn count_of(&self, kind: ConstraintKind) -> usize {
        self.constraints.iter().filter(|c| c.kind == kind).count()
    }

    /// Depth-first sweep re-estimating every node reachable from `start`.
    fn propagate(&mut self, start: PoseId) {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            self.estimate_node(node);
            if let Some(indices) = self.by_node.get(&node) {
                // Reverse so the first constraint is explored first
                stack.extend(
                    indices
                        .iter()
                        .rev()
                        .map(|&i| self.constraints[i].other(node))
                        .filter(|other| !visited.contains(other)),
                );
            }
        }
    }

    /// Re-estimate one node from its incident constraints.
    fn estimate_node(&mut self, node: PoseId) {
        let Some(indices) = self.by_node.get(&node) else {
            return;
        };
        let mut estimate = RigidTransform2D::identity();
        let mut total_strength = 0.0;
        let mut any = false;
        for &i in indices {
            let constraint = &self.constraints[i];
            if constraint.strength == 0.0 {
                continue;
            }
            let Some(other) = self.estimates.get(&constraint.other(node)) else {
                continue;
            };
            let implied = constraint.implied(node, other);
            total_strength += constraint.strength;
            estimate = RigidTransform2D::interpolate(
                &estimate,
                &implied,
                constraint.strength / total_strength,
            );
            any = true;
        }
        if any {
            self.estimates.insert(node, estimate);
        } else {
            self.estimates
                .entry(node)
                .or_insert_with(RigidTransform2D::identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::Point2D;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn step() -> RigidTransform2D {
        RigidTransform2D::new(0.1, Point2D::new(1.0, 10.0))
    }

    #[test]
    fn test_first_constraint_estimates_both_nodes() {
        let mut graph = PoseGraph::new();
        graph.add_constraint(Constraint::odometry(0, 1, step(), 0.1));

        assert_eq!(graph.node_count(), 2);
        assert!(graph.estimate(0).approx_eq(&RigidTransform2D::identity(), 1e-9));
        assert!(graph.estimate(1).approx_eq(&step(), 1e-9));
    }

    #[test]
    fn test_unknown_node_defaults_to_identity() {
        let graph = PoseGraph::new();
        assert!(!graph.has_estimate(7));
        assert_eq!(graph.estimate(7), RigidTransform2D::identity());
    }

    #[test]
    fn test_chain_accumulates_odometry() {
        let mut graph = PoseGraph::new();
        for id in 0..4 {
            graph.add_constraint(Constraint::odometry(id, id + 1, step(), 0.1));
        }
        let mut expected = RigidTransform2D::identity();
        for id in 1..=4 {
            expected = RigidTransform2D::combine(&expected, &step());
            assert!(graph.estimate(id).approx_eq(&expected, 1e-6), "pose {id}");
        }
    }

    #[test]
    fn test_consistent_loop_is_stable() {
        // Square loop: four quarter turns return to the start
        let side = RigidTransform2D::new(FRAC_PI_2, Point2D::new(0.0, 10.0));
        let mut graph = PoseGraph::new();
        for id in 0..3 {
            graph.add_constraint(Constraint::odometry(id, id + 1, side, 0.1));
        }
        graph.add_constraint(Constraint::scan_match(3, 0, side, 1.0));
        let before: Vec<_> = graph.estimates().values().copied().collect();
        graph.optimize(5);
        for (a, b) in before.iter().zip(graph.estimates().values()) {
            assert!(a.approx_eq(b, 1e-6));
        }
    }

    #[test]
    fn test_strong_constraint_dominates() {
        let mut graph = PoseGraph::new();
        let odometry = RigidTransform2D::new(0.0, Point2D::new(0.0, 10.0));
        graph.add_constraint(Constraint::odometry(0, 1, odometry, 0.1));
        graph.add_constraint(Constraint::scan_match(
            0,
            1,
            RigidTransform2D::new(0.0, Point2D::new(0.0, 12.0)),
            10.0,
        ));
        let y = graph.estimate(1).translation.y - graph.estimate(0).translation.y;
        assert!(y > 11.9 && y < 12.0, "relative offset {y}");
    }

    #[test]
    fn test_equal_strengths_average() {
        let mut graph = PoseGraph::new();
        let odometry = RigidTransform2D::new(0.0, Point2D::new(0.0, 10.0));
        graph.add_constraint(Constraint::odometry(0, 1, odometry, 1.0));
        graph.add_constraint(Constraint::scan_match(
            0,
            1,
            RigidTransform2D::new(0.0, Point2D::new(0.0, 20.0)),
            1.0,
        ));
        let relative = RigidTransform2D::relative(&graph.estimate(1), &graph.estimate(0));
        assert_relative_eq!(relative.translation.y, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_constraint_indexing() {
        let mut graph = PoseGraph::new();
        graph.add_constraint(Constraint::odometry(0, 1, step(), 0.1));
        graph.add_constraint(Constraint::odometry(1, 2, step(), 0.1));
        graph.add_constraint(Constraint::scan_match(0, 2, step(), 1.0));

        assert_eq!(graph.constraints_of(1).count(), 2);
        assert_eq!(graph.constraints_of(0).count(), 2);
        assert_eq!(graph.constraints_of(9).count(), 0);
        assert_eq!(graph.count_of(ConstraintKind::ScanMatch), 1);
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_strength_edge_keeps_estimate_finite() {
        let mut graph = PoseGraph::new();
        let odometry = RigidTransform2D::new(0.0, Point2D::new(10.0, 0.0));
        assert!(graph.add_constraint(Constraint::odometry(0, 1, odometry, 0.0)));

        let estimate = graph.estimate(1);
        assert!(estimate.rotation.is_finite());
        assert!(estimate.translation.x.is_finite() && estimate.translation.y.is_finite());
        assert_eq!(estimate, RigidTransform2D::identity());
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_zero_strength_edge_does_not_shift_weighted_estimate() {
        let mut graph = PoseGraph::new();
        graph.add_constraint(Constraint::odometry(0, 1, step(), 0.1));
        let far = RigidTransform2D::new(1.0, Point2D::new(500.0, -500.0));
        graph.add_constraint(Constraint::scan_match(0, 1, far, 0.0));
        graph.optimize(3);

        assert!(graph.estimate(1).approx_eq(&step(), 1e-9));
        assert_eq!(graph.constraint_count(), 2);
    }

    #[test]
    fn test_negative_or_nan_strength_is_rejected() {
        let mut graph = PoseGraph::new();
        assert!(!graph.add_constraint(Constraint::odometry(0, 1, step(), -1.0)));
        assert!(!graph.add_constraint(Constraint::odometry(0, 1, step(), f64::NAN)));
        assert!(!graph.add_constraint(Constraint::scan_match(0, 1, step(), f64::INFINITY)));

        assert_eq!(graph.constraint_count(), 0);
        assert_eq!(graph.node_count(), 0);
    }
}
