//! Core foundation layer.
//!
//! This is the bottom layer of the stack with no internal dependencies.
//! All other layers depend on core.
//!
//! # Contents
//!
//! - [`math`]: Angle normalization and small numeric helpers
//! - [`transform`]: `Point2D` and `RigidTransform2D` with arc interpolation
//! - [`odometry`]: Differential-drive arc odometry and wheel commands
//! - [`scan`]: Range sensor sweeps and surface extraction
//! - [`grid`]: Sparse adaptive n-dimensional grid

pub mod grid;
pub mod math;
pub mod odometry;
pub mod scan;
pub mod transform;
