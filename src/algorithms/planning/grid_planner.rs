//! Path planning over occupancy grids.
//!
//! Both planners run the generic A* search on the 8-connected cell plane of
//! the binary grid. They differ in goal and heuristic:
//!
//! | Mode         | Goal                            | Heuristic                       |
//! |--------------|---------------------------------|---------------------------------|
//! | Exploration  | any frontier cell but the start | distance to the nearest frontier |
//! | Goal seeking | within one cell of the target   | straight-line distance          |
//!
//! Edge cost is the step length in cells plus a penalty for the cell being
//! entered. Exploration stays on known cells; goal seeking may cross unknown
//! space inside the bounding box of the map, the start and the target.

use super::astar::{SearchProblem, search_bounded};
use crate::algorithms::mapping::{OccupancyGrids, OccupancyState};
use crate::core::grid::{Coord, DistanceBounds};
use crate::core::transform::Point2D;

/// 8-connected neighbour offsets.
const NEIGHBOR_OFFSETS: [Coord<2>; 8] = [
    [1, 0],
    [-1, 0],
    [0, 1],
    [0, -1],
    [1, 1],
    [1, -1],
    [-1, 1],
    [-1, -1],
];

/// Configuration for the grid planner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Penalty for entering an occupied cell (effectively forbidden).
    pub occupied_penalty: f64,

    /// Penalty for entering a free cell close to an obstacle.
    pub clearance_penalty: f64,

    /// Penalty for entering an unknown cell (goal seeking only).
    pub unknown_penalty: f64,

    /// Chebyshev distance (cells) within which an obstacle makes a free cell
    /// not drivable.
    pub clearance_cells: i64,

    /// Radius (cells) searched for the nearest frontier in the heuristic.
    pub frontier_search_radius: f64,

    /// Maximum number of node expansions per search.
    pub max_expansions: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            occupied_penalty: 1e6,
            clearance_penalty: 4.0,
            unknown_penalty: 2.0,
            clearance_cells: 1,
            frontier_search_radius: 200.0,
            max_expansions: 200_000,
        }
    }
}

/// Error types for path planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningError {
    /// The map has no frontier left to explore.
    NoFrontier,

    /// The search exhausted the reachable cells.
    NoPathFound,

    /// The robot is not on a mapped cell.
    StartUnknown,
}

impl std::fmt::Display for PlanningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanningError::NoFrontier => write!(f, "No frontier left to explore"),
            PlanningError::NoPathFound => write!(f, "No path found to target"),
            PlanningError::StartUnknown => write!(f, "Start position is not mapped"),
        }
    }
}

impl std::error::Error for PlanningError {}

/// A planned path.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Cells from start to goal, inclusive.
    pub cells: Vec<Coord<2>>,
    /// World positions of the cell centres.
    pub waypoints: Vec<Point2D>,
    /// Accumulated search cost.
    pub cost: f64,
}

impl Plan {
    /// Final cell of the plan.
    pub fn goal(&self) -> Option<&Coord<2>> {
        self.cells.last()
    }

    /// Length of the path in world units.
    pub fn length(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }
}

/// Plans paths over a set of occupancy grids.
pub struct GridPlanner<'g> {
    grids: &'g OccupancyGrids,
    config: PlannerConfig,
}

enum Goal {
    Frontier { start: Coord<2> },
    Point { target: Coord<2>, min: Coord<2>, max: Coord<2> },
}

struct GridSearch<'p, 'g> {
    planner: &'p GridPlanner<'g>,
    goal: Goal,
}

impl<'g> GridPlanner<'g> {
    /// Create a planner over `grids`.
    pub fn new(grids: &'g OccupancyGrids, config: PlannerConfig) -> Self {
        Self { grids, config }
    }

    fn state(&self, cell: &Coord<2>) -> Option<OccupancyState> {
        self.grids.state(cell)
    }

    fn is_free(&self, cell: &Coord<2>) -> bool {
        self.state(cell) == Some(OccupancyState::Free)
    }

    /// Whether an occupied cell lies within the clearance distance.
    fn near_obstacle(&self, cell: &Coord<2>) -> bool {
        let r = self.config.clearance_cells;
        (-r..=r).any(|dx| {
            (-r..=r).any(|dy| {
                self.state(&[cell[0] + dx, cell[1] + dy]) == Some(OccupancyState::Occupied)
            })
        })
    }

    /// Penalty for entering `cell`.
    fn penalty(&self, cell: &Coord<2>) -> f64 {
        match self.state(cell) {
            Some(OccupancyState::Occupied) => self.config.occupied_penalty,
            Some(OccupancyState::Free) if self.near_obstacle(cell) => self.config.clearance_penalty,
            Some(OccupancyState::Free) => 0.0,
            None => self.config.unknown_penalty,
        }
    }

    fn plan_from(&self, start: Coord<2>, goal: Goal) -> Result<Plan, PlanningError> {
        let problem = GridSearch {
            planner: self,
            goal,
        };
        let path = search_bounded(start, &problem, self.config.max_expansions)
            .ok_or(PlanningError::NoPathFound)?;
        let waypoints = path
            .node_path
            .iter()
            .map(|cell| self.grids.cell_to_world(cell))
            .collect();
        Ok(Plan {
            cells: path.node_path,
            waypoints,
            cost: path.cost,
        })
    }

    /// Path from `from` to the nearest reachable frontier cell.
    pub fn plan_to_frontier(&self, from: &Point2D) -> Result<Plan, PlanningError> {
        if self.grids.frontier.is_empty() {
            return Err(PlanningError::NoFrontier);
        }
        let start = self.grids.world_to_cell(from);
        if self.state(&start).is_none() {
            return Err(PlanningError::StartUnknown);
        }
        let plan = self.plan_from(start, Goal::Frontier { start })?;
        log::debug!(
            "Frontier plan: {} cells, cost {:.1}",
            plan.cells.len(),
            plan.cost
        );
        Ok(plan)
    }

    /// Path from `from` to within one cell of `target`.
    pub fn plan_to_point(&self, from: &Point2D, target: &Point2D) -> Result<Plan, PlanningError> {
        let start = self.grids.world_to_cell(from);
        let target = self.grids.world_to_cell(target);
        let mut min = [start[0].min(target[0]), start[1].min(target[1])];
        let mut max = [start[0].max(target[0]), start[1].max(target[1])];
        for (cell, _) in self.grids.binary.cells() {
            for k in 0..2 {
                min[k] = min[k].min(cell[k]);
                max[k] = max[k].max(cell[k]);
            }
        }
        let margin = self.config.clearance_cells + 1;
        let plan = self.plan_from(
            start,
            Goal::Point {
                target,
                min: [min[0] - margin, min[1] - margin],
                max: [max[0] + margin, max[1] + margin],
            },
        )?;
        log::debug!(
            "Point plan to {:?}: {} cells, cost {:.1}",
            target,
            plan.cells.len(),
            plan.cost
        );
        Ok(plan)
    }
}

impl SearchProblem for GridSearch<'_, '_> {
    type Node = Coord<2>;
    type Edge = Coord<2>;

    fn heuristic(&self, node: &Coord<2>) -> f64 {
        match &self.goal {
            Goal::Frontier { .. } => {
                let radius = self.planner.config.frontier_search_radius;
                let frontier = &self.planner.grids.frontier;
                frontier
                    .find_closest(*node, |_| true, DistanceBounds::within(radius))
                    .map(|cell| cell_distance(node, &cell))
                    .unwrap_or(radius)
            }
            Goal::Point { target, .. } => {
                (cell_distance(node, target) - std::f64::consts::SQRT_2).max(0.0)
            }
        }
    }

    fn cost(&self, edge: &Coord<2>, _from: &Coord<2>, to: &Coord<2>) -> f64 {
        let step = ((edge[0] * edge[0] + edge[1] * edge[1]) as f64).sqrt();
        step + self.planner.penalty(to)
    }

    fn neighbors(&self, node: &Coord<2>) -> Vec<(Coord<2>, Coord<2>)> {
        let planner = self.planner;
        let traversable = |cell: &Coord<2>| match &self.goal {
            Goal::Frontier { .. } => planner.state(cell).is_some(),
            Goal::Point { min, max, .. } => {
                (min[0]..=max[0]).contains(&cell[0]) && (min[1]..=max[1]).contains(&cell[1])
            }
        };
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(|offset| {
                let next = [node[0] + offset[0], node[1] + offset[1]];
                if !traversable(&next) {
                    return None;
                }
                let diagonal = offset[0] != 0 && offset[1] != 0;
                if diagonal
                    && !(planner.is_free(&[node[0] + offset[0], node[1]])
                        && planner.is_free(&[node[0], node[1] + offset[1]]))
                {
                    return None;
                }
                Some((next, *offset))
            })
            .collect()
    }

    fn is_goal(&self, node: &Coord<2>) -> bool {
        match &self.goal {
            Goal::Frontier { start } => node != start && self.planner.grids.is_frontier(node),
            Goal::Point { target, .. } => {
                (node[0] - target[0]).abs() <= 1 && (node[1] - target[1]).abs() <= 1
            }
        }
    }
}

fn cell_distance(a: &Coord<2>, b: &Coord<2>) -> f64 {
    let dx = (a[0] - b[0]) as f64;
    let dy = (a[1] - b[1]) as f64;
    (dx * dx + dy * dy).sqrt()
}
