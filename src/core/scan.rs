//! Range sensor sweeps.
//!
//! A sweep covers `angle` radians centred on the robot's local +y axis.
//! Samples are ordered by increasing angle offset; the correspondence search
//! depends on that ordering.
//!
//! ```text
//!            +y (sweep centre)
//!             │
//!    -angle/2 ╲ │ ╱ +angle/2
//!              ╲│╱
//!               ● robot
//! ```

use serde::{Deserialize, Serialize};

use super::transform::Point2D;

/// One range measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSample {
    /// Angle offset from the sweep centre (radians, counter-clockwise)
    pub angle: f64,
    /// Measured distance
    pub distance: f64,
    /// Hit point in the sensor frame, absent for invalid returns
    pub point: Option<Point2D>,
}

impl ScanSample {
    /// Sample with a valid hit at `distance`.
    pub fn hit(angle: f64, distance: f64) -> Self {
        Self {
            angle,
            distance,
            point: Some(Point2D::new(0.0, 1.0).rotate(angle) * distance),
        }
    }

    /// Sample without a usable return.
    pub fn miss(angle: f64, distance: f64) -> Self {
        Self {
            angle,
            distance,
            point: None,
        }
    }
}

/// A full sweep of the ranging sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangingSensorScan {
    /// Total angle covered by the sweep (radians)
    pub angle: f64,
    /// Angle between consecutive samples (radians)
    pub angle_step: f64,
    /// Number of samples
    pub count: usize,
    /// Valid distance range (min, max)
    pub distance_range: (f64, f64),
    /// Samples ordered by increasing angle
    pub samples: Vec<ScanSample>,
}

impl RangingSensorScan {
    /// Build a sweep from raw distances evenly spaced from `-angle/2`.
    ///
    /// Distances outside `distance_range` keep their sample slot but get no
    /// hit point.
    pub fn from_ranges(
        angle: f64,
        angle_step: f64,
        distance_range: (f64, f64),
        ranges: &[f64],
    ) -> Self {
        let samples = ranges
            .iter()
            .enumerate()
            .map(|(i, &distance)| {
                let sample_angle = -angle / 2.0 + i as f64 * angle_step;
                if distance.is_finite()
                    && distance >= distance_range.0
                    && distance <= distance_range.1
                {
                    ScanSample::hit(sample_angle, distance)
                } else {
                    ScanSample::miss(sample_angle, distance)
                }
            })
            .collect::<Vec<_>>();
        Self {
            angle,
            angle_step,
            count: samples.len(),
            distance_range,
            samples,
        }
    }

    /// Iterate over valid hit points in sample order.
    pub fn hit_points(&self) -> impl Iterator<Item = &Point2D> {
        self.samples.iter().filter_map(|s| s.point.as_ref())
    }

    /// Number of samples with a hit point.
    pub fn valid_count(&self) -> usize {
        self.hit_points().count()
    }

    /// Whether the sweep has no usable returns.
    pub fn is_empty(&self) -> bool {
        self.valid_count() == 0
    }
}

/// A run of consecutive hit points from one sweep.
pub type Surface = Vec<Point2D>;

/// Split the hit points of a sweep into surfaces.
///
/// A new surface starts whenever consecutive hit points are `threshold` or
/// more apart.
pub fn extract_surfaces(scan: &RangingSensorScan, threshold: f64) -> Vec<Surface> {
    let mut surfaces: Vec<Surface> = Vec::new();
    for point in scan.hit_points() {
        match surfaces.last_mut() {
            Some(current)
                if current
                    .last()
                    .is_some_and(|last| last.distance(point) < threshold) =>
            {
                current.push(*point);
            }
            _ => surfaces.push(vec![*point]),
        }
    }
    surfaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_hit_point_convention() {
        // Zero offset points straight along +y
        let s = ScanSample::hit(0.0, 5.0);
        let p = s.point.unwrap();
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 5.0);

        // Positive offset turns counter-clockwise, towards -x
        let s = ScanSample::hit(PI / 2.0, 2.0);
        let p = s.point.unwrap();
        assert_relative_eq!(p.x, -2.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_from_ranges_filters_out_of_range() {
        let scan = RangingSensorScan::from_ranges(0.2, 0.1, (2.0, 100.0), &[1.0, 50.0, 500.0]);
        assert_eq!(scan.count, 3);
        assert_eq!(scan.valid_count(), 1);
        assert_relative_eq!(scan.samples[0].angle, -0.1);
        assert_relative_eq!(scan.samples[2].angle, 0.1, epsilon = 1e-12);
        assert!(scan.samples[0].point.is_none());
        assert!(scan.samples[1].point.is_some());
    }

    #[test]
    fn test_extract_surfaces_splits_on_gap() {
        // Wall at distance 10, then a jump to 100
        let ranges = [10.0, 10.0, 10.0, 100.0, 100.0];
        let scan = RangingSensorScan::from_ranges(0.4, 0.1, (1.0, 200.0), &ranges);
        let surfaces = extract_surfaces(&scan, 20.0);
        assert_eq!(surfaces.len(), 2);
        assert_eq!(surfaces[0].len(), 3);
        assert_eq!(surfaces[1].len(), 2);
    }

    #[test]
    fn test_extract_surfaces_empty_scan() {
        let scan = RangingSensorScan::from_ranges(0.4, 0.1, (1.0, 2.0), &[5.0, 5.0]);
        assert!(scan.is_empty());
        assert!(extract_surfaces(&scan, 20.0).is_empty());
    }
}
