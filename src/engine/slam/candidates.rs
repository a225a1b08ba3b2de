//! Choosing which earlier scans a new scan is matched against.
//!
//! An earlier scan is a good partner when much of what it saw should also be
//! visible from the new pose. `expected_overlap` estimates that fraction by
//! moving the old hit points into the new sensor frame and keeping those
//! that face the new origin and fall inside its range and sweep.

use std::f64::consts::FRAC_PI_2;

use crate::core::math::angle_diff;
use crate::core::scan::RangingSensorScan;
use crate::core::transform::{Point2D, RigidTransform2D};
use crate::engine::graph::PoseId;

/// An earlier pose selected for scan matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub pose: PoseId,
    /// Expected overlap fraction in `[0, 1]`.
    pub overlap: f64,
    /// Ranking score, lower is better.
    pub score: f64,
}

/// Fraction of `scan.count` hit points of `scan` that would be seen again
/// from a sensor at `relative` (the new pose in the old scan's frame).
pub fn expected_overlap(scan: &RangingSensorScan, relative: &RigidTransform2D) -> f64 {
    if scan.count == 0 {
        return 0.0;
    }
    let to_new = relative.inverse();
    let old_origin = to_new.apply(&Point2D::ZERO);
    let half_angle = scan.angle / 2.0;
    let max_range = scan.distance_range.1;

    let visible = scan
        .hit_points()
        .filter(|point| {
            let p = to_new.apply(point);
            // Surfaces seen from behind are not visible from the new pose
            let facing = (-p).normalized().dot(&(old_origin - p).normalized());
            facing >= 0.0
                && p.length() <= max_range
                && angle_diff(p.heading(), FRAC_PI_2).abs() <= half_angle
        })
        .count();
    visible as f64 / scan.count as f64
}

/// Ranking score `1/overlap² + distance²·weight`, `None` when rejected.
pub fn candidate_score(
    overlap: f64,
    distance_sq: f64,
    distance_weight: f64,
    min_overlap: f64,
    max_score: f64,
) -> Option<f64> {
    if overlap < min_overlap || overlap <= 0.0 {
        return None;
    }
    let score = 1.0 / (overlap * overlap) + distance_sq * distance_weight;
    (score < max_score).then_some(score)
}
