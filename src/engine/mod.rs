//! SLAM orchestration layer.
//!
//! # Contents
//!
//! - [`graph`]: Pose graph and relaxation
//! - [`slam`]: Scan bookkeeping, candidate selection and scan-match edges

pub mod graph;
pub mod slam;
