//! Path planning module.
//!
//! A generic A* search plus the grid planners built on it.
//!
//! # Components
//!
//! - [`search`]: A* over any [`SearchProblem`]
//! - [`GridPlanner`]: exploration and goal-seeking paths on occupancy grids
//!
//! # Example
//!
//! ```
//! use marga_slam::algorithms::planning::{ClosureProblem, search};
//!
//! // Walk the integer line from 0 to 5
//! let problem = ClosureProblem::new(
//!     |n: &i32| (5 - n).abs() as f64,
//!     |_: &i32, _: &i32, _: &i32| 1.0,
//!     |n: &i32| vec![(n + 1, 1), (n - 1, -1)],
//!     |n: &i32| *n == 5,
//! );
//! let path = search(0, &problem).unwrap();
//! assert_eq!(path.node_path, vec![0, 1, 2, 3, 4, 5]);
//! ```

mod astar;
mod grid_planner;

pub use astar::{ClosureProblem, SearchPath, SearchProblem, search, search_bounded};
pub use grid_planner::{GridPlanner, Plan, PlannerConfig, PlanningError};
