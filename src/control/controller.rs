//! Robot controller: drive, scan, match, map and plan.
//!
//! The controller owns the driver and the [`Slam`] state. It runs on one
//! thread at a time (the strategy thread while a strategy is active), which
//! keeps the pose graph single-writer.

use std::sync::Arc;

use crate::algorithms::planning::{GridPlanner, Plan, PlannerConfig};
use crate::core::odometry::{WheelCommand, wheel_commands_to};
use crate::core::transform::{Point2D, RigidTransform2D};
use crate::engine::slam::{MatchSummary, Slam};
use crate::error::Result;
use crate::utils::CancellationFlag;

use super::driver::RobotDriver;
use super::state::{SharedSnapshot, SlamSnapshot};
use super::strategy::StrategyKind;

/// Configuration for the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Distance between the wheels.
    pub track_width: f64,

    /// Wheel travel per manual tick is limited to this.
    pub manual_speed_limit: f64,

    /// Accumulated wheel travel that triggers a scan in manual mode.
    pub scan_travel_threshold: f64,

    /// Longest straight leg driven towards a waypoint.
    pub max_leg: f64,

    /// Waypoints skipped ahead when following a plan.
    pub plan_lookahead: usize,

    /// Distance at which a guided target counts as reached.
    pub goal_tolerance: f64,

    /// Upper bound on plan/drive/scan cycles per strategy run.
    pub max_plan_cycles: usize,

    /// Period of the manual control loop (milliseconds).
    pub manual_tick_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            track_width: 15.0,
            manual_speed_limit: 100.0,
            scan_travel_threshold: 100.0,
            max_leg: 40.0,
            plan_lookahead: 3,
            goal_tolerance: 15.0,
            max_plan_cycles: 500,
            manual_tick_ms: 33,
        }
    }
}

/// Manual drive input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManualCommand {
    /// Forward (+) / backward (-) input.
    pub longitudinal: f64,
    /// Turn right (+) / left (-) input.
    pub lateral: f64,
}

impl ManualCommand {
    pub fn new(longitudinal: f64, lateral: f64) -> Self {
        Self {
            longitudinal,
            lateral,
        }
    }

    /// Mix the inputs into wheel travel, scaled down to `limit`.
    ///
    /// Turning authority grows with forward speed so the robot does not spin
    /// on the spot at small inputs.
    pub fn wheel_command(&self, limit: f64) -> WheelCommand {
        let lateral = self.lateral * (self.longitudinal.abs() * 0.5 + 0.1);
        let mut left = self.longitudinal * 1.5 + lateral;
        let mut right = self.longitudinal * 1.5 - lateral;
        let max = left.abs().max(right.abs());
        if max > limit {
            let scale = limit / max;
            left *= scale;
            right *= scale;
        }
        WheelCommand::new(left, right)
    }
}

/// Odometry accumulated since the last scan.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct SinceLastScan {
    transform: RigidTransform2D,
    travel: f64,
}

/// Drives a robot and keeps its SLAM state.
pub struct RobotController<D> {
    driver: D,
    slam: Slam,
    config: ControllerConfig,
    planner: PlannerConfig,
    since_scan: SinceLastScan,
    shared: SharedSnapshot,
}

impl<D: RobotDriver> RobotController<D> {
    /// Create a controller.
    pub fn new(
        driver: D,
        slam: Slam,
        config: ControllerConfig,
        planner: PlannerConfig,
        shared: SharedSnapshot,
    ) -> Self {
        Self {
            driver,
            slam,
            config,
            planner,
            since_scan: SinceLastScan::default(),
            shared,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The SLAM state.
    pub fn slam(&self) -> &Slam {
        &self.slam
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Shared snapshot handle.
    pub fn shared(&self) -> &SharedSnapshot {
        &self.shared
    }

    /// Current pose estimate including unscanned motion.
    pub fn pose(&self) -> RigidTransform2D {
        RigidTransform2D::combine(&self.slam.current_pose(), &self.since_scan.transform)
    }

    /// Wheel travel since the last scan.
    pub fn travel_since_scan(&self) -> f64 {
        self.since_scan.travel
    }

    /// Drive both wheels and accumulate the odometry.
    pub fn drive(&mut self, left: f64, right: f64) -> Result<()> {
        let odometry = self.driver.drive(left, right)?;
        self.since_scan.transform =
            RigidTransform2D::combine(&self.since_scan.transform, &odometry);
        self.since_scan.travel += left.abs() + right.abs();
        Ok(())
    }

    /// Whether enough travel has accumulated to warrant a scan.
    pub fn needs_scan(&self) -> bool {
        self.since_scan.travel > self.config.scan_travel_threshold
    }

    /// Close the current pose, scan and match against earlier scans.
    ///
    /// A new pose is opened when the current one already holds a scan or the
    /// robot moved, so a scan taken before any motion lands on pose 0.
    pub fn scan_and_match(&mut self, cancel: &CancellationFlag) -> Result<MatchSummary> {
        if self.slam.scans().contains_key(&self.slam.pose_id()) || self.since_scan.travel > 0.0 {
            self.slam.move_by(self.since_scan.transform);
        }
        self.since_scan = SinceLastScan::default();
        let scan = self.driver.scan()?;
        let summary = self.slam.add_scan_with_matching(scan, cancel)?;
        self.publish(None);
        Ok(summary)
    }

    /// Rebuild the occupancy grids on a background thread and wait for them.
    pub fn rebuild_grids(&mut self, cancel: &CancellationFlag) -> Result<()> {
        let task = self.slam.spawn_rebuild(cancel.clone())?;
        let grids = task.wait()?;
        self.slam.set_grids(grids);
        self.publish_grids();
        Ok(())
    }

    /// Path from the current pose to the nearest frontier.
    pub fn plan_to_frontier(&self) -> Result<Plan> {
        let planner = GridPlanner::new(self.slam.grids(), self.planner.clone());
        Ok(planner.plan_to_frontier(&self.pose().translation)?)
    }

    /// Path from the current pose to `target`.
    pub fn plan_to_point(&self, target: &Point2D) -> Result<Plan> {
        let planner = GridPlanner::new(self.slam.grids(), self.planner.clone());
        Ok(planner.plan_to_point(&self.pose().translation, target)?)
    }

    /// Drive towards a waypoint a few cells ahead on `plan`.
    ///
    /// Returns `true` when the chosen waypoint was the last one.
    pub fn follow_plan_step(&mut self, plan: &Plan) -> Result<bool> {
        let Some(last) = plan.waypoints.len().checked_sub(1) else {
            return Ok(true);
        };
        let index = self.config.plan_lookahead.max(1).min(last);
        let target = self.pose().inverse().apply(&plan.waypoints[index]);
        log::debug!(
            "Following plan: waypoint {}/{} at local ({:.1}, {:.1})",
            index,
            last,
            target.x,
            target.y
        );
        for command in wheel_commands_to(&target, self.config.track_width, self.config.max_leg) {
            self.drive(command.left, command.right)?;
        }
        Ok(index == last)
    }

    /// Apply one manual input, scanning when enough travel accumulated.
    pub fn manual(&mut self, command: &ManualCommand, cancel: &CancellationFlag) -> Result<()> {
        let wheels = command.wheel_command(self.config.manual_speed_limit);
        if wheels.total_travel() > 0.0 {
            self.drive(wheels.left, wheels.right)?;
        }
        if self.needs_scan() {
            self.scan_and_match(cancel)?;
        }
        Ok(())
    }

    /// Publish the graph state and the current plan.
    pub fn publish(&self, plan: Option<&Plan>) {
        match self.shared.write() {
            Ok(mut shared) => {
                let grids = shared.grids.take();
                let strategy = shared.strategy;
                *shared = SlamSnapshot {
                    grids,
                    strategy,
                    plan: plan.map(|p| p.waypoints.clone()).unwrap_or_default(),
                    ..SlamSnapshot::capture(&self.slam)
                };
            }
            Err(e) => log::error!("Failed to write shared snapshot: {}", e),
        }
    }

    /// Publish the latest grids.
    fn publish_grids(&self) {
        match self.shared.write() {
            Ok(mut shared) => shared.grids = Some(Arc::new(self.slam.grids().clone())),
            Err(e) => log::error!("Failed to write shared snapshot: {}", e),
        }
    }

    /// Record which strategy currently drives the robot.
    pub(crate) fn set_strategy(&self, kind: Option<StrategyKind>) {
        if let Ok(mut shared) = self.shared.write() {
            shared.strategy = kind;
        }
    }

    /// Recover the driver and SLAM state.
    pub fn into_parts(self) -> (D, Slam) {
        (self.driver, self.slam)
    }
}
