//! Online SLAM module.
//!
//! # Components
//!
//! - [`Slam`]: pose bookkeeping, scan storage, scan-match edges, grid rebuilds
//! - [`expected_overlap`]: visibility estimate used to pick match candidates
//!
//! # Example
//!
//! ```
//! use marga_slam::core::transform::{Point2D, RigidTransform2D};
//! use marga_slam::engine::slam::Slam;
//!
//! let mut slam = Slam::default();
//! let pose = slam.move_by(RigidTransform2D::new(0.0, Point2D::new(0.0, 10.0)));
//! assert_eq!(pose, 1);
//! assert_eq!(slam.graph().node_count(), 2);
//! ```

mod candidates;
mod online_slam;

pub use candidates::{Candidate, candidate_score, expected_overlap};
pub use online_slam::{MatchSummary, ScanRecord, Slam, SlamConfig};
