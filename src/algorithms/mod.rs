//! Algorithms layer.
//!
//! Stateless or self-contained building blocks used by the SLAM engine.
//!
//! # Contents
//!
//! - [`matching`]: Correspondence search, Procrustes alignment, trimmed ICP
//! - [`mapping`]: Ray tracing and occupancy/frontier grids
//! - [`planning`]: Generic A* and grid path planning

pub mod mapping;
pub mod matching;
pub mod planning;
