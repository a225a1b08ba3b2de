//! Differential-drive odometry.
//!
//! The robot drives forward along its local +y axis. With left and right
//! wheel travel `l` and `r` and track width `w` the motion is an arc:
//!
//! ```text
//! θ = (r − l) / w            (counter-clockwise positive)
//! d = (l + r) / 2            (arc length of the centre point)
//! R = d / θ
//! translation = (R·(cos θ − 1), R·sin θ)
//! ```

use serde::{Deserialize, Serialize};

use super::math::normalize_angle;
use super::transform::{Point2D, RigidTransform2D};

/// Odometry for wheel travel distances `left` and `right`.
pub fn arc_odometry(left: f64, right: f64, track_width: f64) -> RigidTransform2D {
    let theta = (right - left) / track_width;
    let distance = (left + right) / 2.0;
    if theta.abs() < 1e-12 {
        return RigidTransform2D::new(0.0, Point2D::new(0.0, distance));
    }
    let radius = distance / theta;
    RigidTransform2D::new(
        theta,
        Point2D::new(radius * (theta.cos() - 1.0), radius * theta.sin()),
    )
}

/// A pair of wheel travel distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelCommand {
    /// Left wheel travel
    pub left: f64,
    /// Right wheel travel
    pub right: f64,
}

impl WheelCommand {
    /// Create a new command.
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Turn in place by `angle` radians.
    pub fn rotate_in_place(angle: f64, track_width: f64) -> Self {
        let travel = angle * track_width / 2.0;
        Self::new(-travel, travel)
    }

    /// Drive straight ahead.
    pub fn straight(distance: f64) -> Self {
        Self::new(distance, distance)
    }

    /// Total absolute wheel travel.
    pub fn total_travel(&self) -> f64 {
        self.left.abs() + self.right.abs()
    }
}

/// Commands that reach the local `target` by turning in place and then
/// driving straight, with the straight leg capped at `max_distance`.
pub fn wheel_commands_to(
    target: &Point2D,
    track_width: f64,
    max_distance: f64,
) -> Vec<WheelCommand> {
    let distance = target.length();
    if distance < 1e-9 {
        return Vec::new();
    }
    let mut commands = Vec::with_capacity(2);
    let turn = normalize_angle(target.heading() - std::f64::consts::FRAC_PI_2);
    if turn.abs() > 1e-9 {
        commands.push(WheelCommand::rotate_in_place(turn, track_width));
    }
    commands.push(WheelCommand::straight(distance.min(max_distance)));
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_straight_motion() {
        let odom = arc_odometry(10.0, 10.0, 5.0);
        assert_relative_eq!(odom.rotation, 0.0);
        assert_relative_eq!(odom.translation.x, 0.0);
        assert_relative_eq!(odom.translation.y, 10.0);
    }

    #[test]
    fn test_rotate_in_place() {
        let track = 4.0;
        let cmd = WheelCommand::rotate_in_place(PI / 2.0, track);
        let odom = arc_odometry(cmd.left, cmd.right, track);
        assert_relative_eq!(odom.rotation, PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(odom.translation.length(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_right_turn_arc() {
        // Left wheel travels further: turning clockwise
        let odom = arc_odometry(20.0, 18.0, 10.0);
        assert_relative_eq!(odom.rotation, -0.2, epsilon = 1e-12);
        assert!(odom.translation.x > 0.0, "turning right drifts to +x");
        assert!(odom.translation.y > 18.0 && odom.translation.y < 20.0);
    }

    #[test]
    fn test_arc_matches_constant_curvature_scaling() {
        let full = arc_odometry(12.0, 16.0, 6.0);
        let half = arc_odometry(6.0, 8.0, 6.0);
        let scaled = full.scale_along_arc(0.5);
        assert!(scaled.approx_eq(&half, 1e-9));
    }

    #[test]
    fn test_wheel_commands_reach_target() {
        let track = 8.0;
        let target = Point2D::new(3.0, 4.0);
        let mut pose = RigidTransform2D::identity();
        for cmd in wheel_commands_to(&target, track, 100.0) {
            pose = RigidTransform2D::combine(&pose, &arc_odometry(cmd.left, cmd.right, track));
        }
        assert_relative_eq!(pose.translation.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(pose.translation.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wheel_commands_cap_distance() {
        let commands = wheel_commands_to(&Point2D::new(0.0, 50.0), 8.0, 10.0);
        assert_eq!(commands.len(), 1);
        assert_relative_eq!(commands[0].left, 10.0);
    }
}
