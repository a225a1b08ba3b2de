//! Trimmed Iterative Closest Point.
//!
//! Classic ICP alternates correspondence search and closed-form alignment.
//! The trimmed variant only aligns the best fraction `ξ` of the pairs, with
//! `ξ` chosen per iteration to minimise
//!
//! ```text
//! ψ(ξ) = mse(best ⌊ξ·N⌉ pairs) · ξ^−(1+λ)
//! ```
//!
//! so partially overlapping sweeps do not drag the estimate towards their
//! outliers. Larger `λ` penalises small overlaps harder.
//!
//! # Algorithm
//!
//! ```text
//! Input: reference A, moving B, initial guess T₀
//!
//! for each iteration:
//!   1. correspondences = nearest_correspondence(A, B, T)
//!   2. unchanged since last iteration?  → converged
//!   3. pairs (a, b) with |a − T(b)|², sorted ascending
//!   4. ξ = argmin ψ over [min_overlap, max_overlap]
//!   5. T = align(b's, a's) over the best ⌊ξ·N⌉ pairs
//! ```

use super::alignment::align;
use super::correspondence::nearest_correspondence;
use super::{ScanMatchResult, ScanMatcher};
use crate::core::math::mean;
use crate::core::scan::RangingSensorScan;
use crate::core::transform::{Point2D, RigidTransform2D};
use crate::utils::CancellationFlag;

/// Configuration for trimmed ICP.
#[derive(Debug, Clone, PartialEq)]
pub struct IcpConfig {
    /// Maximum number of iterations.
    pub max_iterations: u32,

    /// Smallest overlap fraction considered.
    pub min_overlap: f64,

    /// Largest overlap fraction considered.
    pub max_overlap: f64,

    /// Step between candidate overlap fractions.
    pub overlap_step: f64,

    /// Overlap penalty exponent `λ` (≥ 0).
    pub lambda: f64,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            min_overlap: 0.4,
            max_overlap: 1.0,
            overlap_step: 0.05,
            lambda: 2.0,
        }
    }
}

/// A reference/moving point pair.
#[derive(Debug, Clone, Copy)]
struct PointPair {
    reference: Point2D,
    moving: Point2D,
    dist_sq: f64,
}

fn mse(pairs: &[PointPair]) -> f64 {
    mean(pairs.iter().map(|p| p.dist_sq))
}

/// Number of pairs kept for overlap fraction `xi`.
#[inline]
fn trimmed_len(total: usize, xi: f64) -> usize {
    ((total as f64 * xi).round() as usize).min(total)
}

/// Trimmed ICP scan matcher.
#[derive(Debug, Clone, Default)]
pub struct TrimmedIcp {
    config: IcpConfig,
}

impl TrimmedIcp {
    /// Create a new matcher with the given configuration.
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Candidate overlap fractions, ascending.
    fn overlap_candidates(&self) -> impl Iterator<Item = f64> + '_ {
        let c = &self.config;
        let steps = if c.overlap_step > 0.0 {
            ((c.max_overlap - c.min_overlap) / c.overlap_step).round().max(0.0) as usize
        } else {
            0
        };
        (0..=steps).map(move |k| (c.min_overlap + k as f64 * c.overlap_step).min(c.max_overlap))
    }

    /// Overlap fraction minimising the trimmed criterion.
    ///
    /// Ties go to the larger fraction, so perfectly matching sweeps report
    /// full overlap.
    fn best_overlap(&self, pairs: &[PointPair]) -> f64 {
        let exponent = -(1.0 + self.config.lambda);
        let mut best = self.config.max_overlap;
        let mut best_psi = f64::INFINITY;
        for xi in self.overlap_candidates() {
            let kept = trimmed_len(pairs.len(), xi);
            if kept == 0 {
                continue;
            }
            let psi = mse(&pairs[..kept]) * xi.powf(exponent);
            if psi <= best_psi {
                best = xi;
                best_psi = psi;
            }
        }
        best
    }

    /// Align `moving` onto `reference`, polling `cancel` between iterations.
    ///
    /// Returns `None` when cancelled.
    pub fn match_scans_cancellable(
        &self,
        reference: &RangingSensorScan,
        moving: &RangingSensorScan,
        initial_guess: &RigidTransform2D,
        cancel: &CancellationFlag,
    ) -> Option<ScanMatchResult> {
        let mut transform = *initial_guess;
        let mut previous: Option<Vec<Option<usize>>> = None;
        let mut converged = false;
        let mut error = f64::INFINITY;
        let mut overlap = self.config.max_overlap;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            if cancel.is_cancelled() {
                log::debug!("Scan matching cancelled after {} iterations", iterations);
                return None;
            }

            let correspondences = nearest_correspondence(reference, moving, &transform);
            if previous.as_ref() == Some(&correspondences) {
                converged = true;
                break;
            }

            let mut pairs: Vec<PointPair> = correspondences
                .iter()
                .zip(&moving.samples)
                .filter_map(|(found, sample)| {
                    let target = reference.samples.get((*found)?)?.point?;
                    let local = sample.point?;
                    Some(PointPair {
                        reference: target,
                        moving: local,
                        dist_sq: target.distance_squared(&transform.apply(&local)),
                    })
                })
                .collect();
            previous = Some(correspondences);
            iterations += 1;

            if pairs.is_empty() {
                log::debug!("No correspondences at iteration {}", iterations);
                break;
            }
            pairs.sort_by(|a, b| a.dist_sq.total_cmp(&b.dist_sq));

            overlap = self.best_overlap(&pairs);
            let kept = &pairs[..trimmed_len(pairs.len(), overlap).max(1)];
            error = mse(kept);

            let source: Vec<Point2D> = kept.iter().map(|p| p.moving).collect();
            let target: Vec<Point2D> = kept.iter().map(|p| p.reference).collect();
            transform = align(&source, &target);
        }

        if converged {
            log::debug!(
                "ICP converged after {} iterations (error {:.4}, overlap {:.2})",
                iterations,
                error,
                overlap
            );
        } else {
            log::warn!(
                "ICP did not converge after {} iterations (error {:.4})",
                iterations,
                error
            );
        }

        Some(ScanMatchResult {
            transform,
            converged,
            error,
            overlap,
            iterations,
        })
    }
}

impl ScanMatcher for TrimmedIcp {
    fn match_scans(
        &self,
        reference: &RangingSensorScan,
        moving: &RangingSensorScan,
        initial_guess: &RigidTransform2D,
    ) -> ScanMatchResult {
        // A fresh flag is never cancelled
        self.match_scans_cancellable(reference, moving, initial_guess, &CancellationFlag::new())
            .unwrap_or_else(|| ScanMatchResult::failed(*initial_guess))
    }
}
