//! Robot driver interface.

use crate::core::scan::RangingSensorScan;
use crate::core::transform::RigidTransform2D;
use crate::error::Result;

/// A physical, simulated or recorded robot.
///
/// Wheel arguments are travel distances in world units. Drivers report
/// failures as [`MargaError::Driver`](crate::error::MargaError::Driver).
pub trait RobotDriver: Send {
    /// Drive both wheels and return the measured odometry of the motion.
    fn drive(&mut self, left: f64, right: f64) -> Result<RigidTransform2D>;

    /// Take one range sweep.
    fn scan(&mut self) -> Result<RangingSensorScan>;
}
