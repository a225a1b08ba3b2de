//! Mathematical primitives for 2D SLAM operations.
//!
//! Functions for angle normalization and angular arithmetic. Angles are
//! wrapped into the half-open interval (-π, π].

use std::f64::consts::{PI, TAU};

/// Euclidean modulo: the result always has the sign of `modulus`.
#[inline]
pub fn wrap(value: f64, modulus: f64) -> f64 {
    ((value % modulus) + modulus) % modulus
}

/// Normalize angle to (-π, π].
///
/// # Example
/// ```
/// use marga_slam::core::math::normalize_angle;
/// use std::f64::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-9);
/// assert!((normalize_angle(-PI) - PI).abs() < 1e-9);
/// ```
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let a = wrap(angle, TAU);
    if a > PI { a - TAU } else { a }
}

/// Signed angular difference `first - second`, wrapped into (-π, π].
///
/// This is the rotation that takes `second` onto `first`.
///
/// # Example
/// ```
/// use marga_slam::core::math::angle_diff;
/// use std::f64::consts::PI;
///
/// assert!((angle_diff(PI / 2.0, 0.0) - PI / 2.0).abs() < 1e-9);
///
/// // Crossing the ±π boundary takes the short way
/// let diff = angle_diff(-PI + 0.1, PI - 0.1);
/// assert!((diff - 0.2).abs() < 1e-9);
/// ```
#[inline]
pub fn angle_diff(first: f64, second: f64) -> f64 {
    normalize_angle(first - second)
}

/// Mean of `values`, or NaN for an empty slice.
#[inline]
pub fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    values.sum::<f64>() / n as f64
}

/// Gaussian probability density at `x`.
#[inline]
pub fn gaussian(x: f64, mean: f64, std_dev: f64) -> f64 {
    let coeff = 1.0 / (std_dev * (2.0 * PI).sqrt());
    let exponent = -((x - mean).powi(2)) / (2.0 * std_dev * std_dev);
    coeff * exponent.exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle_zero() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn test_normalize_angle_pi_is_positive() {
        assert_relative_eq!(normalize_angle(PI), PI);
        assert_relative_eq!(normalize_angle(-PI), PI, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_angle_wrap() {
        assert_relative_eq!(normalize_angle(2.0 * PI), 0.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-2.5 * PI), -0.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_angle_very_large() {
        assert_relative_eq!(normalize_angle(100.0 * PI), 0.0, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(-100.5 * PI), -0.5 * PI, epsilon = 1e-9);
    }

    #[test]
    fn test_angle_diff_crossing_pi() {
        assert_relative_eq!(angle_diff(-PI + 0.1, PI - 0.1), 0.2, epsilon = 1e-12);
        assert_relative_eq!(angle_diff(PI - 0.1, -PI + 0.1), -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_wrap_negative() {
        assert_relative_eq!(wrap(-1.0, 3.0), 2.0);
        assert_relative_eq!(wrap(4.0, 3.0), 1.0);
    }

    #[test]
    fn test_gaussian_peak() {
        let peak = gaussian(0.0, 0.0, 1.0);
        assert_relative_eq!(peak, 1.0 / (2.0 * PI).sqrt(), epsilon = 1e-12);
        assert!(gaussian(1.0, 0.0, 1.0) < peak);
    }
}
