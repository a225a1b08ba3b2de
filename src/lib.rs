//! MargaSLAM - Pose-graph SLAM and frontier exploration for a
//! differential-drive robot with a ranging sensor
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  main / config                      │  ← Entry point
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  control/  io/                      │  ← Strategies, drivers
//! │     (supervisor, controller, replay, map store)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                 engine/  threads/                   │  ← Orchestration
//! │   (pose graph, scan bookkeeping, background work)   │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │           (matching, mapping, planning)             │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │     (transforms, odometry, sweeps, spatial grid)    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Pipeline
//!
//! 1. The controller drives the robot and accumulates arc odometry.
//! 2. Each sweep closes the current pose; an odometry constraint links it
//!    to the previous pose.
//! 3. Earlier poses with enough expected overlap are matched against the new
//!    sweep with trimmed ICP on background threads; results become
//!    scan-match constraints and the graph is relaxed.
//! 4. Occupancy, binary and frontier grids are rebuilt from all posed sweeps.
//! 5. A* on the binary grid plans the next leg towards a frontier or target.

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Algorithms (depends on core)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Layer 3: SLAM engine and background work (depends on core, algorithms)
// ============================================================================
pub mod engine;
pub mod threads;

// ============================================================================
// Layer 4: Control and I/O (depends on all layers)
// ============================================================================
pub mod control;
pub mod io;

// ============================================================================
// Shared infrastructure
// ============================================================================
pub mod config;
pub mod error;
pub mod utils;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::grid::{Coord, DistanceBounds, SpatialGrid};
pub use crate::core::math;
pub use crate::core::odometry::{WheelCommand, arc_odometry};
pub use crate::core::scan::{RangingSensorScan, ScanSample, Surface, extract_surfaces};
pub use crate::core::transform::{Point2D, RigidTransform2D};

// Algorithms
pub use algorithms::mapping::{
    OccupancyConfig, OccupancyGrids, OccupancyMapper, OccupancyState, PosedScan,
};
pub use algorithms::matching::{IcpConfig, ScanMatchResult, ScanMatcher, TrimmedIcp};
pub use algorithms::planning::{GridPlanner, Plan, PlannerConfig, PlanningError};

// Engine
pub use engine::graph::{Constraint, ConstraintKind, PoseGraph, PoseId};
pub use engine::slam::{MatchSummary, Slam, SlamConfig};

// Control
pub use control::{
    ControllerConfig, ManualCommand, RobotController, RobotDriver, StrategyKind,
    StrategyOutcome, StrategySupervisor,
};

// Infrastructure
pub use config::{MargaConfig, load_config};
pub use error::{MargaError, Result};
pub use utils::CancellationFlag;
