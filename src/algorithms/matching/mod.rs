//! Scan matching module.
//!
//! Aligns two range sweeps to estimate the relative motion between them.
//!
//! # Building blocks
//!
//! - [`nearest_correspondence`]: bearing-ordered nearest-point search
//! - [`align`]: closed-form rigid alignment of paired points (SVD)
//! - [`TrimmedIcp`]: iterates the two, trimming the worst pairs
//!
//! # Example
//!
//! ```
//! use marga_slam::algorithms::matching::{IcpConfig, ScanMatcher, TrimmedIcp};
//! use marga_slam::core::scan::RangingSensorScan;
//! use marga_slam::core::transform::RigidTransform2D;
//!
//! let ranges: Vec<f64> = (0..40).map(|i| 80.0 + (i as f64 * 0.2).sin() * 15.0).collect();
//! let scan = RangingSensorScan::from_ranges(1.6, 0.04, (2.0, 780.0), &ranges);
//!
//! let icp = TrimmedIcp::new(IcpConfig::default());
//! let result = icp.match_scans(&scan, &scan, &RigidTransform2D::identity());
//! assert!(result.converged);
//! ```

mod alignment;
mod correspondence;
mod icp;

#[cfg(test)]
pub(crate) mod test_utils;

pub use alignment::{Mat2, Svd2, align, svd2x2};
pub use correspondence::nearest_correspondence;
pub use icp::{IcpConfig, TrimmedIcp};

use crate::core::scan::RangingSensorScan;
use crate::core::transform::RigidTransform2D;

/// Result of a scan matching operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanMatchResult {
    /// Transform taking moving-sweep points into the reference frame.
    pub transform: RigidTransform2D,

    /// Whether correspondences stopped changing before the iteration cap.
    pub converged: bool,

    /// Mean squared error of the retained pairs.
    pub error: f64,

    /// Fraction of pairs retained by trimming.
    pub overlap: f64,

    /// Number of iterations performed.
    pub iterations: u32,
}

impl ScanMatchResult {
    /// Result for a match that produced no usable alignment.
    pub fn failed(transform: RigidTransform2D) -> Self {
        Self {
            transform,
            converged: false,
            error: f64::INFINITY,
            overlap: 0.0,
            iterations: 0,
        }
    }
}

/// Trait for scan matching algorithms.
pub trait ScanMatcher {
    /// Align `moving` onto `reference`.
    ///
    /// # Arguments
    ///
    /// * `reference` - The sweep that stays fixed
    /// * `moving` - The sweep to be transformed
    /// * `initial_guess` - Initial transform estimate (moving frame → reference frame)
    ///
    /// # Returns
    ///
    /// A `ScanMatchResult`; non-convergence is reported, not an error.
    fn match_scans(
        &self,
        reference: &RangingSensorScan,
        moving: &RangingSensorScan,
        initial_guess: &RigidTransform2D,
    ) -> ScanMatchResult;
}
