//! Probabilistic occupancy mapping on the sparse grid.
//!
//! Every valid sample contributes evidence along its ray: the hit cell is
//! occupied evidence (value 1), every other cell back to the sensor is free
//! evidence (value 0). Each piece of evidence is spread over a small Gaussian
//! neighbourhood whose radius grows with distance from the sensor, then
//! folded into the touched cells as a running weighted mean:
//!
//! ```text
//! w' = w + Δw
//! p' = (p·w + value·Δw) / w'
//! ```
//!
//! Derived grids:
//!
//! ```text
//! probability ──map──► binary (Free | Occupied, absent = unknown)
//!                        │
//!                        └──convolve──► frontier (free cell next to unknown)
//! ```

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ray_tracer::RayTracer;
use crate::core::grid::{Coord, SpatialGrid};
use crate::core::math::gaussian;
use crate::core::scan::RangingSensorScan;
use crate::core::transform::{Point2D, RigidTransform2D};

/// Axis-aligned neighbour offsets in the plane.
pub const AXIS_NEIGHBORS: [Coord<2>; 4] = [[1, 0], [-1, 0], [0, 1], [0, -1]];

/// Accumulated occupancy evidence for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OccupancyCell {
    /// Probability of being occupied, in [0, 1]
    pub probability: f64,
    /// Total evidence weight
    pub weight: f64,
}

impl OccupancyCell {
    /// Fold `value` with weight `weight` into the running mean.
    pub fn add_weighted(&mut self, value: f64, weight: f64) {
        self.weight += weight;
        if self.weight > 0.0 {
            self.probability =
                (self.probability * (self.weight - weight) + value * weight) / self.weight;
        }
    }
}

/// Classified cell; unknown cells are absent from the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupancyState {
    Free,
    Occupied,
}

/// Presence marker for frontier cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontier;

/// A sweep with the pose it was taken from.
#[derive(Debug, Clone)]
pub struct PosedScan {
    pub scan: Arc<RangingSensorScan>,
    pub pose: RigidTransform2D,
}

impl PosedScan {
    pub fn new(scan: Arc<RangingSensorScan>, pose: RigidTransform2D) -> Self {
        Self { scan, pose }
    }
}

/// Configuration for occupancy mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyConfig {
    /// World units per grid cell.
    pub resolution: f64,

    /// Cells with less accumulated weight are unknown.
    pub min_weight: f64,

    /// Probability above which a known cell is occupied.
    pub occupied_threshold: f64,

    /// Minimum number of scans per parallel batch.
    pub min_batch_size: usize,

    /// Build the probability grid in parallel batches.
    pub parallel: bool,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            resolution: 10.0,
            min_weight: 1.0,
            occupied_threshold: 0.2,
            min_batch_size: 16,
            parallel: true,
        }
    }
}

/// The three grids derived from one set of posed scans.
#[derive(Debug, Clone, Default)]
pub struct OccupancyGrids {
    /// World units per cell
    pub resolution: f64,
    pub probability: SpatialGrid<OccupancyCell, 2>,
    pub binary: SpatialGrid<OccupancyState, 2>,
    pub frontier: SpatialGrid<Frontier, 2>,
}

impl OccupancyGrids {
    /// Cell containing the world point.
    pub fn world_to_cell(&self, point: &Point2D) -> Coord<2> {
        world_to_cell(point, self.resolution)
    }

    /// World position of a cell centre.
    pub fn cell_to_world(&self, cell: &Coord<2>) -> Point2D {
        Point2D::new(
            cell[0] as f64 * self.resolution,
            cell[1] as f64 * self.resolution,
        )
    }

    /// Classification at `cell`, `None` when unknown.
    pub fn state(&self, cell: &Coord<2>) -> Option<OccupancyState> {
        self.binary.get(*cell).copied()
    }

    /// Whether `cell` is a frontier cell.
    pub fn is_frontier(&self, cell: &Coord<2>) -> bool {
        self.frontier.get(*cell).is_some()
    }
}

/// Cell containing the world point at the given resolution.
#[inline]
pub fn world_to_cell(point: &Point2D, resolution: f64) -> Coord<2> {
    [
        (point.x / resolution).round() as i64,
        (point.y / resolution).round() as i64,
    ]
}

/// Builds occupancy grids from posed scans.
#[derive(Debug, Clone, Default)]
pub struct OccupancyMapper {
    config: OccupancyConfig,
    tracer: RayTracer,
}

impl OccupancyMapper {
    /// Create a new mapper with the given configuration.
    pub fn new(config: OccupancyConfig) -> Self {
        Self {
            config,
            tracer: RayTracer::default(),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OccupancyConfig {
        &self.config
    }

    /// Rasterise every ray of every scan into a probability grid.
    pub fn build_probability_grid(&self, scans: &[PosedScan]) -> SpatialGrid<OccupancyCell, 2> {
        let mut grid = SpatialGrid::new();
        let resolution = self.config.resolution;
        for posed in scans {
            let origin_world = posed.pose.translation;
            let origin = world_to_cell(&origin_world, resolution);
            for local in posed.scan.hit_points() {
                let hit = world_to_cell(&posed.pose.apply(local), resolution);
                for (i, cell) in self.tracer.trace_line(hit, origin).into_iter().enumerate() {
                    let value = if i == 0 { 1.0 } else { 0.0 };
                    let dx = (cell[0] - origin[0]) as f64;
                    let dy = (cell[1] - origin[1]) as f64;
                    let radius = 0.5 + (dx * dx + dy * dy).sqrt() * 0.05;
                    add_diluted(&mut grid, cell, value, radius);
                }
            }
        }
        grid
    }

    /// Same as [`build_probability_grid`](Self::build_probability_grid), split
    /// into batches that are built in parallel and merged in batch order.
    ///
    /// Small inputs are built sequentially.
    pub fn build_probability_grid_parallel(
        &self,
        scans: &[PosedScan],
    ) -> SpatialGrid<OccupancyCell, 2> {
        let min_batch = self.config.min_batch_size.max(1);
        let batches = rayon::current_num_threads().min(scans.len() / min_batch);
        if batches <= 1 {
            return self.build_probability_grid(scans);
        }
        let chunk = scans.len().div_ceil(batches);
        log::debug!(
            "Building probability grid from {} scans in {} batches",
            scans.len(),
            batches
        );
        let partial: Vec<SpatialGrid<OccupancyCell, 2>> = scans
            .par_chunks(chunk)
            .map(|batch| self.build_probability_grid(batch))
            .collect();
        let refs: Vec<&SpatialGrid<OccupancyCell, 2>> = partial.iter().collect();
        SpatialGrid::merge(&refs, merge_cells)
    }

    /// Classify the probability grid.
    pub fn to_binary(
        &self,
        probability: &SpatialGrid<OccupancyCell, 2>,
    ) -> SpatialGrid<OccupancyState, 2> {
        let min_weight = self.config.min_weight;
        let threshold = self.config.occupied_threshold;
        probability.map(|cell| {
            if cell.weight < min_weight {
                None
            } else if cell.probability > threshold {
                Some(OccupancyState::Occupied)
            } else {
                Some(OccupancyState::Free)
            }
        })
    }

    /// Free cells with at least one unknown axis neighbour.
    pub fn frontier_grid(binary: &SpatialGrid<OccupancyState, 2>) -> SpatialGrid<Frontier, 2> {
        binary.convolve(|state, neighbors| {
            let open = AXIS_NEIGHBORS
                .iter()
                .any(|offset| neighbors.get(*offset).is_none());
            (*state == OccupancyState::Free && open).then_some(Frontier)
        })
    }

    /// Build all three grids.
    pub fn rebuild(&self, scans: &[PosedScan]) -> OccupancyGrids {
        let probability = if self.config.parallel {
            self.build_probability_grid_parallel(scans)
        } else {
            self.build_probability_grid(scans)
        };
        let binary = self.to_binary(&probability);
        let frontier = Self::frontier_grid(&binary);
        log::debug!(
            "Rebuilt grids from {} scans: {} known cells, {} frontier cells",
            scans.len(),
            binary.cell_count(),
            frontier.cell_count()
        );
        OccupancyGrids {
            resolution: self.config.resolution,
            probability,
            binary,
            frontier,
        }
    }
}

/// Spread `value` over a Gaussian neighbourhood of `centre`.
fn add_diluted(
    grid: &mut SpatialGrid<OccupancyCell, 2>,
    centre: Coord<2>,
    value: f64,
    radius: f64,
) {
    let offset = radius.round() as i64;
    let sigma = (radius + 0.1) * 0.7;
    let side = (2 * offset + 1) as usize;
    let mut weights: Vec<(Coord<2>, f64)> = Vec::with_capacity(side * side);
    let mut total = 0.0;
    for dx in -offset..=offset {
        let gx = gaussian(dx as f64, 0.0, sigma);
        for dy in -offset..=offset {
            let weight = gx * gaussian(dy as f64, 0.0, sigma);
            if weight < 0.01 {
                continue;
            }
            weights.push(([centre[0] + dx, centre[1] + dy], weight));
            total += weight;
        }
    }
    if total <= 0.0 {
        return;
    }
    for (cell, weight) in weights {
        let mut current = grid.get(cell).copied().unwrap_or_default();
        current.add_weighted(value, weight / total);
        grid.set(cell, current);
    }
}

/// Weight-weighted average of partial cells.
fn merge_cells(cells: &[Option<&OccupancyCell>]) -> Option<OccupancyCell> {
    let mut weight = 0.0;
    let mut weighted = 0.0;
    for cell in cells.iter().flatten() {
        weight += cell.weight;
        weighted += cell.probability * cell.weight;
    }
    (weight > 0.0).then(|| OccupancyCell {
        probability: weighted / weight,
        weight,
    })
}
