//! Shared test utilities for scan matching, mapping and SLAM tests.
//!
//! Sweeps are ray-cast against an axis-aligned room so tests work on the same
//! kind of data the robot produces.

use crate::core::scan::RangingSensorScan;
use crate::core::transform::{Point2D, RigidTransform2D};

/// Room walls: x in [-120, 120], y in [-60, 100].
pub const ROOM_MIN: Point2D = Point2D::new(-120.0, -60.0);
pub const ROOM_MAX: Point2D = Point2D::new(120.0, 100.0);

/// 135° sweep with 68 samples.
pub const SWEEP_ANGLE: f64 = 135.0 * std::f64::consts::PI / 180.0;
pub const SWEEP_COUNT: usize = 68;
pub const DISTANCE_RANGE: (f64, f64) = (2.0, 780.0);

/// Distance from `origin` along `direction` to the room walls.
fn ray_to_wall(origin: &Point2D, direction: &Point2D) -> f64 {
    let axis = |o: f64, d: f64, lo: f64, hi: f64| {
        if d > 1e-12 {
            (hi - o) / d
        } else if d < -1e-12 {
            (lo - o) / d
        } else {
            f64::INFINITY
        }
    };
    let tx = axis(origin.x, direction.x, ROOM_MIN.x, ROOM_MAX.x);
    let ty = axis(origin.y, direction.y, ROOM_MIN.y, ROOM_MAX.y);
    tx.min(ty)
}

/// Sweep taken by a sensor at `pose` inside the room.
pub fn box_room_scan(pose: &RigidTransform2D) -> RangingSensorScan {
    let step = SWEEP_ANGLE / (SWEEP_COUNT - 1) as f64;
    let ranges: Vec<f64> = (0..SWEEP_COUNT)
        .map(|i| {
            let angle = -SWEEP_ANGLE / 2.0 + i as f64 * step;
            let direction = Point2D::new(0.0, 1.0).rotate(pose.rotation + angle);
            ray_to_wall(&pose.translation, &direction)
        })
        .collect();
    RangingSensorScan::from_ranges(SWEEP_ANGLE, step, DISTANCE_RANGE, &ranges)
}

#[test]
fn test_box_room_scan_hits_walls() {
    let scan = box_room_scan(&RigidTransform2D::identity());
    assert_eq!(scan.count, SWEEP_COUNT);
    assert_eq!(scan.valid_count(), SWEEP_COUNT);
    // Centre ray hits the far wall straight ahead
    let centre = &scan.samples[SWEEP_COUNT / 2];
    assert!((centre.distance - 100.0).abs() < 5.0);
}
