//! Bresenham ray tracing over grid cells.
//!
//! A hit at distance D means every cell between the sensor and the hit is
//! free space. Rays are traced from the hit cell back to the sensor cell so
//! the first cell of a trace is always the occupied one.
//!
//! # Algorithm
//!
//! Integer-only Bresenham traversal; both end cells are included.

use crate::core::grid::Coord;

/// Ray tracer producing the cells between a hit and the sensor.
///
/// # Example
///
/// ```
/// use marga_slam::algorithms::mapping::RayTracer;
///
/// let tracer = RayTracer::default();
/// let cells = tracer.trace_line([3, 1], [0, 0]);
/// assert_eq!(cells.first(), Some(&[3, 1]));
/// assert_eq!(cells.last(), Some(&[0, 0]));
/// assert_eq!(cells.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct RayTracer {
    /// Maximum ray length in cells.
    max_ray_length: usize,
}

impl Default for RayTracer {
    fn default() -> Self {
        Self {
            max_ray_length: 4096,
        }
    }
}

impl RayTracer {
    /// Create a ray tracer with custom max length.
    pub fn new(max_ray_length: usize) -> Self {
        Self { max_ray_length }
    }

    /// Cells on the line from `from` to `to`, both inclusive, `from` first.
    ///
    /// Lines longer than the maximum ray length are truncated at the far end.
    pub fn trace_line(&self, from: Coord<2>, to: Coord<2>) -> Vec<Coord<2>> {
        let [x0, y0] = from;
        let [x1, y1] = to;
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };

        let mut cells = Vec::with_capacity((dx.max(-dy) as usize + 1).min(self.max_ray_length));
        let (mut x, mut y) = (x0, y0);
        let mut err = dx + dy;
        loop {
            cells.push([x, y]);
            if (x == x1 && y == y1) || cells.len() >= self.max_ray_length {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
        cells
    }
}
