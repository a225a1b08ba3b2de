//! Read-only view of the SLAM state for observers.
//!
//! The controller thread is the only writer. Observers (logging, export,
//! visualisation) take a read lock and copy what they need.

use std::sync::{Arc, RwLock};

use crate::algorithms::mapping::OccupancyGrids;
use crate::core::transform::{Point2D, RigidTransform2D};
use crate::engine::graph::{Constraint, PoseId};
use crate::engine::slam::Slam;

use super::strategy::StrategyKind;

/// Latest published SLAM state.
#[derive(Debug, Clone, Default)]
pub struct SlamSnapshot {
    /// Current pose id.
    pub pose_id: PoseId,
    /// Current pose estimate.
    pub pose: RigidTransform2D,
    /// All node estimates in id order.
    pub estimates: Vec<(PoseId, RigidTransform2D)>,
    /// All constraints in insertion order.
    pub constraints: Vec<Constraint>,
    /// Grids from the latest rebuild.
    pub grids: Option<Arc<OccupancyGrids>>,
    /// Waypoints of the plan being followed.
    pub plan: Vec<Point2D>,
    /// Strategy that produced this snapshot.
    pub strategy: Option<StrategyKind>,
}

impl SlamSnapshot {
    /// Copy the graph part of the SLAM state.
    pub fn capture(slam: &Slam) -> Self {
        let graph = slam.graph();
        Self {
            pose_id: slam.pose_id(),
            pose: slam.current_pose(),
            estimates: graph.estimates().iter().map(|(&id, &t)| (id, t)).collect(),
            constraints: graph.constraints().to_vec(),
            ..Self::default()
        }
    }
}

/// Shared handle to the latest snapshot.
pub type SharedSnapshot = Arc<RwLock<SlamSnapshot>>;

/// Create an empty shared snapshot.
pub fn create_shared_snapshot() -> SharedSnapshot {
    Arc::new(RwLock::new(SlamSnapshot::default()))
}
