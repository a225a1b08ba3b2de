//! Parallel scan matching against candidate poses.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, bounded};

use crate::algorithms::matching::{ScanMatchResult, TrimmedIcp};
use crate::core::scan::RangingSensorScan;
use crate::core::transform::RigidTransform2D;
use crate::engine::graph::PoseId;
use crate::error::{MargaError, Result};
use crate::utils::CancellationFlag;

/// One scan-matching request.
#[derive(Debug, Clone)]
pub struct MatchJob {
    /// Pose of the reference (older) scan.
    pub first: PoseId,
    /// Pose of the moving (newer) scan.
    pub second: PoseId,
    pub reference: Arc<RangingSensorScan>,
    pub moving: Arc<RangingSensorScan>,
    /// Guess for the pose of `second` in the frame of `first`.
    pub initial_guess: RigidTransform2D,
}

/// Result of one job.
#[derive(Debug, Clone, Copy)]
pub struct MatchOutcome {
    pub first: PoseId,
    pub second: PoseId,
    pub result: ScanMatchResult,
}

/// Running batch of scan-matching threads.
pub struct MatchBatch {
    handles: Vec<JoinHandle<()>>,
    receiver: Receiver<(usize, Option<ScanMatchResult>)>,
    poses: Vec<(PoseId, PoseId)>,
    cancel: CancellationFlag,
}

impl MatchBatch {
    /// Spawn one named thread per job.
    pub fn spawn(
        jobs: Vec<MatchJob>,
        matcher: &TrimmedIcp,
        cancel: &CancellationFlag,
    ) -> Result<Self> {
        let (sender, receiver) = bounded(jobs.len().max(1));
        let poses = jobs.iter().map(|job| (job.first, job.second)).collect();
        let mut handles = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.into_iter().enumerate() {
            let sender = sender.clone();
            let matcher = matcher.clone();
            let cancel = cancel.clone();
            let handle = thread::Builder::new()
                .name(format!("icp-{}-{}", job.first, job.second))
                .spawn(move || {
                    let result = matcher.match_scans_cancellable(
                        &job.reference,
                        &job.moving,
                        &job.initial_guess,
                        &cancel,
                    );
                    // The receiver may be gone if the batch was dropped
                    let _ = sender.send((index, result));
                })?;
            handles.push(handle);
        }

        Ok(Self {
            handles,
            receiver,
            poses,
            cancel: cancel.clone(),
        })
    }

    /// Number of jobs in the batch.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether the batch has no jobs.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Request cancellation of every job.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for all jobs and return their outcomes in job order.
    ///
    /// Fails with [`MargaError::Cancelled`] if cancellation was requested,
    /// in which case every result of the batch is discarded.
    pub fn wait(self) -> Result<Vec<MatchOutcome>> {
        let mut results: Vec<Option<ScanMatchResult>> = vec![None; self.poses.len()];
        let mut received = 0;
        while received < self.poses.len() {
            match self.receiver.recv() {
                Ok((index, result)) => {
                    results[index] = result;
                    received += 1;
                }
                Err(_) => break,
            }
        }

        let mut panicked = 0;
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("icp").to_string();
            if let Err(e) = handle.join() {
                log::error!("Scan matching thread {} panicked: {:?}", name, e);
                panicked += 1;
            }
        }

        if self.cancel.is_cancelled() {
            log::info!("Scan matching batch cancelled, discarding {} results", received);
            return Err(MargaError::Cancelled);
        }
        if panicked > 0 || received < self.poses.len() {
            return Err(MargaError::TaskFailed(format!(
                "{} of {} scan matching jobs did not report",
                self.poses.len() - received,
                self.poses.len()
            )));
        }

        self.poses
            .iter()
            .zip(results)
            .map(|(&(first, second), result)| {
                result
                    .map(|result| MatchOutcome {
                        first,
                        second,
                        result,
                    })
                    .ok_or(MargaError::Cancelled)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::matching::IcpConfig;
    use crate::algorithms::matching::test_utils::box_room_scan;
    use crate::core::transform::Point2D;

    fn job(first: PoseId, second: PoseId, offset: f64) -> MatchJob {
        let reference = box_room_scan(&RigidTransform2D::identity());
        let moving = box_room_scan(&RigidTransform2D::new(0.0, Point2D::new(0.0, offset)));
        MatchJob {
            first,
            second,
            reference: Arc::new(reference),
            moving: Arc::new(moving),
            initial_guess: RigidTransform2D::new(0.0, Point2D::new(0.0, offset)),
        }
    }

    #[test]
    fn test_outcomes_in_job_order() {
        let matcher = TrimmedIcp::new(IcpConfig::default());
        let jobs = vec![job(0, 3, 5.0), job(1, 3, 10.0), job(2, 3, 0.0)];
        let batch = MatchBatch::spawn(jobs, &matcher, &CancellationFlag::new()).unwrap();
        assert_eq!(batch.len(), 3);

        let outcomes = batch.wait().unwrap();
        let firsts: Vec<PoseId> = outcomes.iter().map(|o| o.first).collect();
        assert_eq!(firsts, vec![0, 1, 2]);
        assert!(outcomes.iter().all(|o| o.second == 3));
        assert!(outcomes.iter().all(|o| o.result.error.is_finite()));
    }

    #[test]
    fn test_cancelled_batch_discards_results() {
        let matcher = TrimmedIcp::new(IcpConfig::default());
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let batch = MatchBatch::spawn(vec![job(0, 1, 5.0)], &matcher, &cancel).unwrap();
        assert!(matches!(batch.wait(), Err(MargaError::Cancelled)));
    }

    #[test]
    fn test_empty_batch() {
        let matcher = TrimmedIcp::default();
        let batch = MatchBatch::spawn(Vec::new(), &matcher, &CancellationFlag::new()).unwrap();
        assert!(batch.is_empty());
        assert!(batch.wait().unwrap().is_empty());
    }
}
