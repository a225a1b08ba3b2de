//! Pose graph module.
//!
//! ```text
//!    [P0] ──odom──▶ [P1] ──odom──▶ [P2] ──odom──▶ [P3]
//!     │                              ▲
//!     └────────── scan match ────────┘
//! ```
//!
//! Estimates are refined by relaxation: each node takes the
//! strength-weighted mean of the poses its constraints imply, and sweeps
//! propagate corrections depth-first through the graph. This is a bounded
//! local consensus, not a least-squares solve.
//!
//! # Example
//!
//! ```
//! use marga_slam::core::transform::{Point2D, RigidTransform2D};
//! use marga_slam::engine::graph::{Constraint, PoseGraph};
//!
//! let mut graph = PoseGraph::new();
//! let step = RigidTransform2D::new(0.0, Point2D::new(0.0, 10.0));
//! graph.add_constraint(Constraint::odometry(0, 1, step, 0.1));
//! graph.optimize(5);
//! assert!(graph.estimate(1).approx_eq(&step, 1e-9));
//! ```

mod pose_graph;

pub use pose_graph::{Constraint, ConstraintKind, PoseGraph, PoseId};
