//! Fast nearest-point correspondence between two angle-ordered sweeps.
//!
//! For every moving sample the search predicts a starting index in the
//! reference sweep from the sample's bearing, then walks outwards in both
//! directions. A side is abandoned once it has moved past the predicted start
//! and the closest any further sample could possibly be,
//! `sin(Δφ)·|p|`, already exceeds the best distance found.
//!
//! ```text
//!   reference  ● ● ● ● ● ● ● ● ●
//!                    ◄─down │ up─►
//!                         start
//! ```
//!
//! Consecutive moving samples usually match consecutive reference samples,
//! so the walk starts at the previous match + 1 when there is one.

use std::f64::consts::FRAC_PI_2;

use crate::core::math::angle_diff;
use crate::core::scan::RangingSensorScan;
use crate::core::transform::{Point2D, RigidTransform2D};

/// Bearing of a point measured from the sweep centre (+y).
#[inline]
pub(crate) fn bearing(point: &Point2D) -> f64 {
    point.heading() - FRAC_PI_2
}

/// Lower bound on the distance between `point` and any reference sample at
/// angle `sample_angle`.
#[inline]
fn distance_bound(point: &Point2D, sample_angle: f64) -> f64 {
    let delta = angle_diff(sample_angle, bearing(point));
    if delta.abs() < FRAC_PI_2 {
        delta.sin().abs() * point.length()
    } else {
        point.length()
    }
}

/// Index of the closest reference sample for every sample of `moving`.
///
/// `moving` samples are transformed by `transform` into the reference frame.
/// The result has one entry per moving sample; samples without a hit point,
/// or with no reachable reference point, map to `None`.
pub fn nearest_correspondence(
    reference: &RangingSensorScan,
    moving: &RangingSensorScan,
    transform: &RigidTransform2D,
) -> Vec<Option<usize>> {
    let count = reference.samples.len();
    let Some(first) = reference.samples.first() else {
        return vec![None; moving.samples.len()];
    };
    let first_angle = first.angle;
    let angle_step = if reference.angle_step.abs() > f64::EPSILON {
        reference.angle_step
    } else {
        reference.angle / count as f64
    };

    let mut last_best: Option<usize> = None;
    let mut result = Vec::with_capacity(moving.samples.len());

    for sample in &moving.samples {
        let Some(local) = sample.point else {
            result.push(None);
            continue;
        };
        let point = transform.apply(&local);
        let predicted = (angle_diff(bearing(&point), first_angle) / angle_step).floor() as i64;
        let start = last_best
            .map(|i| i as i64 + 1)
            .unwrap_or(predicted)
            .clamp(0, count as i64 - 1);

        let mut best: Option<usize> = None;
        let mut best_dist = f64::INFINITY;
        let mut up = start + 1;
        let mut down = start;
        let mut last_up = f64::INFINITY;
        let mut last_down = f64::INFINITY;
        let mut up_stopped = false;
        let mut down_stopped = false;

        while !(up_stopped && down_stopped) {
            let go_up = !up_stopped && (down_stopped || last_up < last_down);
            if go_up {
                if up >= count as i64 {
                    up_stopped = true;
                    continue;
                }
                let candidate = &reference.samples[up as usize];
                let Some(target) = candidate.point else {
                    up += 1;
                    continue;
                };
                last_up = point.distance_squared(&target);
                if last_up < best_dist {
                    best = Some(up as usize);
                    best_dist = last_up;
                }
                if up > predicted && distance_bound(&point, candidate.angle).powi(2) > best_dist {
                    up_stopped = true;
                    continue;
                }
                up += 1;
            } else {
                if down < 0 {
                    down_stopped = true;
                    continue;
                }
                let candidate = &reference.samples[down as usize];
                let Some(target) = candidate.point else {
                    down -= 1;
                    continue;
                };
                last_down = point.distance_squared(&target);
                if last_down < best_dist {
                    best = Some(down as usize);
                    best_dist = last_down;
                }
                if down < predicted && distance_bound(&point, candidate.angle).powi(2) > best_dist {
                    down_stopped = true;
                    continue;
                }
                down -= 1;
            }
        }

        last_best = best;
        result.push(best);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scan::ScanSample;

    fn sweep(ranges: &[f64]) -> RangingSensorScan {
        let step = 0.05;
        let angle = step * ranges.len() as f64;
        RangingSensorScan::from_ranges(angle, step, (0.5, 1000.0), ranges)
    }

    /// Exhaustive reference for comparison.
    fn brute_force(reference: &RangingSensorScan, point: &Point2D) -> Option<usize> {
        reference
            .samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.point.map(|p| (i, p.distance_squared(point))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    #[test]
    fn test_identical_scans_match_index_to_index() {
        let ranges: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.3).sin() * 10.0).collect();
        let scan = sweep(&ranges);
        let matches = nearest_correspondence(&scan, &scan, &RigidTransform2D::identity());
        assert_eq!(matches.len(), 40);
        for (i, m) in matches.iter().enumerate() {
            assert_eq!(*m, Some(i));
        }
    }

    #[test]
    fn test_one_entry_per_moving_sample() {
        let reference = sweep(&[50.0; 20]);
        let mut ranges = vec![50.0; 20];
        ranges[3] = 0.0; // invalid return
        ranges[10] = f64::INFINITY;
        let moving = sweep(&ranges);
        let matches = nearest_correspondence(&reference, &moving, &RigidTransform2D::identity());
        assert_eq!(matches.len(), 20);
        assert_eq!(matches[3], None);
        assert_eq!(matches[10], None);
        assert!(matches[4].is_some());
    }

    #[test]
    fn test_matches_brute_force_on_wall() {
        // Flat wall in front of the sensor at y = 60
        let n = 60;
        let step = 0.02;
        let angle = step * n as f64;
        let ranges: Vec<f64> = (0..n)
            .map(|i| {
                let a = -angle / 2.0 + i as f64 * step;
                60.0 / a.cos()
            })
            .collect();
        let reference = RangingSensorScan::from_ranges(angle, step, (0.5, 1000.0), &ranges);
        let moving = reference.clone();
        let transform = RigidTransform2D::new(0.03, Point2D::new(1.5, -0.8));
        let matches = nearest_correspondence(&reference, &moving, &transform);
        for (sample, found) in moving.samples.iter().zip(&matches) {
            let p = transform.apply(&sample.point.unwrap());
            let expected = brute_force(&reference, &p).unwrap();
            let got = found.unwrap();
            let d_expected = reference.samples[expected].point.unwrap().distance_squared(&p);
            let d_got = reference.samples[got].point.unwrap().distance_squared(&p);
            assert!(
                (d_got - d_expected).abs() < 1e-9,
                "sample {:?}: {got} vs {expected}",
                sample.angle
            );
        }
    }

    #[test]
    fn test_empty_reference() {
        let reference = RangingSensorScan {
            angle: 1.0,
            angle_step: 0.1,
            count: 0,
            distance_range: (0.0, 10.0),
            samples: Vec::new(),
        };
        let moving = sweep(&[5.0, 5.0]);
        assert_eq!(
            nearest_correspondence(&reference, &moving, &RigidTransform2D::identity()),
            vec![None, None]
        );
    }

    #[test]
    fn test_reference_without_hits() {
        let mut reference = sweep(&[5.0; 4]);
        for s in reference.samples.iter_mut() {
            *s = ScanSample::miss(s.angle, s.distance);
        }
        let moving = sweep(&[5.0; 4]);
        let matches = nearest_correspondence(&reference, &moving, &RigidTransform2D::identity());
        assert!(matches.iter().all(Option::is_none));
    }
}
