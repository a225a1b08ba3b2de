//! Background tasks.
//!
//! Long-running work runs off the control thread so driving and sensing are
//! never blocked:
//! - [`MatchBatch`]: one scan-matching thread per candidate pose
//! - [`MapRebuildTask`]: occupancy grid rebuild from all posed scans
//!
//! Both hand results back over a crossbeam channel and poll a shared
//! [`CancellationFlag`](crate::utils::CancellationFlag). Results are merged
//! into the pose graph by the caller, on the caller's thread.

mod map_rebuild;
mod match_batch;

pub use map_rebuild::MapRebuildTask;
pub use match_batch::{MatchBatch, MatchJob, MatchOutcome};
