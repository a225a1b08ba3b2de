//! Mapping module.
//!
//! Builds occupancy grids from posed range sweeps.
//!
//! # Components
//!
//! - [`OccupancyMapper`]: probability, binary and frontier grids
//! - [`RayTracer`]: Bresenham ray tracing for free space
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use marga_slam::algorithms::mapping::{OccupancyMapper, OccupancyState, PosedScan};
//! use marga_slam::core::scan::RangingSensorScan;
//! use marga_slam::core::transform::RigidTransform2D;
//!
//! let scan = RangingSensorScan::from_ranges(1.0, 0.02, (2.0, 780.0), &[100.0; 51]);
//! let posed = PosedScan::new(Arc::new(scan), RigidTransform2D::identity());
//!
//! let grids = OccupancyMapper::default().rebuild(&[posed]);
//! assert_eq!(grids.state(&[0, 0]), Some(OccupancyState::Free));
//! ```

mod occupancy;
mod ray_tracer;

pub use occupancy::{
    AXIS_NEIGHBORS, Frontier, OccupancyCell, OccupancyConfig, OccupancyGrids, OccupancyMapper,
    OccupancyState, PosedScan, world_to_cell,
};
pub use ray_tracer::RayTracer;
