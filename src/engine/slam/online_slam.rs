//! Online SLAM: pose bookkeeping, scan storage and scan-match edges.
//!
//! ```text
//! move_by(odometry) ──► odometry edge (pose, pose + 1)
//! add_scan(scan)    ──► store scan + surfaces under the current pose
//!                   ──► candidates by expected overlap
//!                   ──► MatchBatch (one ICP thread per candidate)
//!                   ──► scan-match edges merged here, then relaxation
//! ```
//!
//! The pose graph is only ever mutated on the thread that owns the `Slam`.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::candidates::{Candidate, candidate_score, expected_overlap};
use crate::algorithms::mapping::{OccupancyConfig, OccupancyGrids, OccupancyMapper, PosedScan};
use crate::algorithms::matching::{IcpConfig, ScanMatchResult, TrimmedIcp};
use crate::core::scan::{RangingSensorScan, Surface, extract_surfaces};
use crate::core::transform::RigidTransform2D;
use crate::engine::graph::{Constraint, PoseGraph, PoseId};
use crate::error::Result;
use crate::threads::{MapRebuildTask, MatchBatch, MatchJob, MatchOutcome};
use crate::utils::CancellationFlag;

/// Configuration for the SLAM front end.
#[derive(Debug, Clone, PartialEq)]
pub struct SlamConfig {
    /// Strength of odometry edges.
    pub odometry_strength: f64,

    /// Gap between consecutive hit points that starts a new surface.
    pub surface_threshold: f64,

    /// Weight of squared distance in the candidate score.
    pub distance_weight: f64,

    /// Candidates with less expected overlap are rejected.
    pub min_overlap: f64,

    /// Candidates scoring this or worse are rejected.
    pub max_score: f64,

    /// Maximum number of candidates matched per scan.
    pub max_candidates: usize,

    /// Scan-match strength is `overlap / error · match_strength_scale`.
    pub match_strength_scale: f64,

    /// Factor applied to the strength of converged matches.
    pub converged_factor: f64,

    /// Upper bound on scan-match strength (reached when `error` is zero).
    pub max_match_strength: f64,

    /// Relaxation passes after new scan-match edges are merged.
    pub relaxation_passes: usize,
}

impl Default for SlamConfig {
    fn default() -> Self {
        Self {
            odometry_strength: 0.1,
            surface_threshold: 20.0,
            distance_weight: 0.002,
            min_overlap: 0.4,
            max_score: 30.0,
            max_candidates: 5,
            match_strength_scale: 10.0,
            converged_factor: 0.5,
            max_match_strength: 1e4,
            relaxation_passes: 5,
        }
    }
}

/// A stored scan and its surfaces, in the scanning pose's frame.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub scan: Arc<RangingSensorScan>,
    pub surfaces: Vec<Surface>,
}

/// What happened when a scan was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchSummary {
    /// Pose the scan was stored under.
    pub pose: PoseId,
    /// Number of candidate poses matched.
    pub candidates: usize,
    /// Scan-match edges added to the graph.
    pub edges_added: usize,
    /// Matches that converged.
    pub converged: usize,
}

/// Online SLAM state.
pub struct Slam {
    config: SlamConfig,
    graph: PoseGraph,
    scans: BTreeMap<PoseId, ScanRecord>,
    pose_id: PoseId,
    matcher: TrimmedIcp,
    mapper: OccupancyMapper,
    grids: OccupancyGrids,
}

impl Slam {
    /// Create a new SLAM instance at pose 0.
    pub fn new(config: SlamConfig, icp: IcpConfig, occupancy: OccupancyConfig) -> Self {
        let grids = OccupancyGrids {
            resolution: occupancy.resolution,
            ..OccupancyGrids::default()
        };
        Self {
            config,
            graph: PoseGraph::new(),
            scans: BTreeMap::new(),
            pose_id: 0,
            matcher: TrimmedIcp::new(icp),
            mapper: OccupancyMapper::new(occupancy),
            grids,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SlamConfig {
        &self.config
    }

    /// The pose graph.
    pub fn graph(&self) -> &PoseGraph {
        &self.graph
    }

    /// Id of the current pose.
    pub fn pose_id(&self) -> PoseId {
        self.pose_id
    }

    /// Estimate of the current pose.
    pub fn current_pose(&self) -> RigidTransform2D {
        self.graph.estimate(self.pose_id)
    }

    /// Stored scans by pose.
    pub fn scans(&self) -> &BTreeMap<PoseId, ScanRecord> {
        &self.scans
    }

    /// Latest occupancy grids.
    pub fn grids(&self) -> &OccupancyGrids {
        &self.grids
    }

    /// Record motion since the last pose and return the new pose id.
    pub fn move_by(&mut self, odometry: RigidTransform2D) -> PoseId {
        let next = self.pose_id + 1;
        self.graph.add_constraint(Constraint::odometry(
            self.pose_id,
            next,
            odometry,
            self.config.odometry_strength,
        ));
        self.pose_id = next;
        next
    }

    /// Store a scan under the current pose.
    pub fn add_scan(&mut self, scan: RangingSensorScan) -> PoseId {
        let surfaces = extract_surfaces(&scan, self.config.surface_threshold);
        log::debug!(
            "Pose {}: scan with {} hits, {} surfaces",
            self.pose_id,
            scan.valid_count(),
            surfaces.len()
        );
        self.scans.insert(
            self.pose_id,
            ScanRecord {
                scan: Arc::new(scan),
                surfaces,
            },
        );
        self.pose_id
    }

    /// Expected overlap of the scan at `pose` with a scan taken at `relative`
    /// (expressed in `pose`'s frame). Zero when `pose` has no scan.
    pub fn expected_overlap(&self, pose: PoseId, relative: &RigidTransform2D) -> f64 {
        self.scans
            .get(&pose)
            .map_or(0.0, |record| expected_overlap(&record.scan, relative))
    }

    /// Earlier scanned poses worth matching against `pose`, best first.
    pub fn select_candidates(&self, pose: PoseId) -> Vec<Candidate> {
        let current = self.graph.estimate(pose);
        let c = &self.config;
        let mut candidates: Vec<Candidate> = self
            .scans
            .keys()
            .filter(|&&id| id != pose)
            .filter_map(|&id| {
                let estimate = self.graph.estimate(id);
                let relative = RigidTransform2D::relative(&current, &estimate);
                let overlap = self.expected_overlap(id, &relative);
                let distance_sq = estimate.translation.distance_squared(&current.translation);
                let score = candidate_score(
                    overlap,
                    distance_sq,
                    c.distance_weight,
                    c.min_overlap,
                    c.max_score,
                )?;
                Some(Candidate {
                    pose: id,
                    overlap,
                    score,
                })
            })
            .collect();
        candidates.sort_by(|a, b| a.score.total_cmp(&b.score));
        candidates.truncate(c.max_candidates);
        candidates
    }

    /// Scan-matching jobs for `pose` against each candidate.
    ///
    /// The older scan is the reference; the guess is the current estimate of
    /// `pose` relative to the candidate.
    pub fn match_jobs(&self, pose: PoseId, candidates: &[Candidate]) -> Vec<MatchJob> {
        let Some(moving) = self.scans.get(&pose) else {
            return Vec::new();
        };
        let second_pose = self.graph.estimate(pose);
        candidates
            .iter()
            .filter_map(|candidate| {
                let reference = self.scans.get(&candidate.pose)?;
                let first_pose = self.graph.estimate(candidate.pose);
                Some(MatchJob {
                    first: candidate.pose,
                    second: pose,
                    reference: Arc::clone(&reference.scan),
                    moving: Arc::clone(&moving.scan),
                    initial_guess: RigidTransform2D::relative(&second_pose, &first_pose),
                })
            })
            .collect()
    }

    /// Scan-match constraint for a result, `None` when it carries no weight.
    ///
    /// Non-converged matches keep their full strength factor while converged
    /// ones are halved; a failed match without pairs has infinite error and
    /// is dropped.
    pub fn match_edge(
        &self,
        first: PoseId,
        second: PoseId,
        result: &ScanMatchResult,
    ) -> Option<Constraint> {
        let c = &self.config;
        let base = if result.error > 0.0 {
            result.overlap / result.error * c.match_strength_scale
        } else {
            c.max_match_strength
        };
        let factor = if result.converged { c.converged_factor } else { 1.0 };
        let strength = (base * factor).min(c.max_match_strength);
        if !(strength.is_finite() && strength > 0.0) {
            log::warn!(
                "Dropping scan match {} -> {} (error {}, overlap {:.2})",
                first,
                second,
                result.error,
                result.overlap
            );
            return None;
        }
        Some(Constraint::scan_match(first, second, result.transform, strength))
    }

    /// Add scan-match edges for finished jobs, in order, then relax.
    pub fn merge_matches(&mut self, pose: PoseId, outcomes: &[MatchOutcome]) -> MatchSummary {
        let mut summary = MatchSummary {
            pose,
            candidates: outcomes.len(),
            ..MatchSummary::default()
        };
        for outcome in outcomes {
            if outcome.result.converged {
                summary.converged += 1;
            }
            let Some(constraint) = self.match_edge(outcome.first, outcome.second, &outcome.result)
            else {
                continue;
            };
            log::debug!(
                "Scan match {} -> {}: strength {:.3}, converged {}",
                outcome.first,
                outcome.second,
                constraint.strength,
                outcome.result.converged
            );
            if self.graph.add_constraint(constraint) {
                summary.edges_added += 1;
            }
        }
        if summary.edges_added > 0 {
            self.graph.optimize(self.config.relaxation_passes);
        }
        summary
    }

    /// Store a scan and match it against its candidates in the background.
    ///
    /// Blocks until every match finishes. On cancellation all results are
    /// discarded and [`MargaError::Cancelled`](crate::error::MargaError::Cancelled)
    /// is returned; the scan itself stays stored.
    pub fn add_scan_with_matching(
        &mut self,
        scan: RangingSensorScan,
        cancel: &CancellationFlag,
    ) -> Result<MatchSummary> {
        let pose = self.add_scan(scan);
        let candidates = self.select_candidates(pose);
        let jobs = self.match_jobs(pose, &candidates);
        let batch = MatchBatch::spawn(jobs, &self.matcher, cancel)?;
        let outcomes = batch.wait()?;
        let summary = self.merge_matches(pose, &outcomes);
        log::info!(
            "Pose {}: {} candidates, {} edges added ({} converged)",
            pose,
            summary.candidates,
            summary.edges_added,
            summary.converged
        );
        Ok(summary)
    }

    /// Every stored scan with its current pose estimate.
    pub fn posed_scans(&self) -> Vec<PosedScan> {
        self.scans
            .iter()
            .map(|(&id, record)| PosedScan::new(Arc::clone(&record.scan), self.graph.estimate(id)))
            .collect()
    }

    /// Rebuild the grids on the calling thread.
    pub fn rebuild_grids(&mut self) -> &OccupancyGrids {
        self.grids = self.mapper.rebuild(&self.posed_scans());
        &self.grids
    }

    /// Rebuild the grids on a background thread.
    pub fn spawn_rebuild(&self, cancel: CancellationFlag) -> Result<MapRebuildTask> {
        MapRebuildTask::spawn(self.mapper.clone(), self.posed_scans(), cancel)
    }

    /// Install grids produced by a background rebuild.
    pub fn set_grids(&mut self, grids: OccupancyGrids) {
        self.grids = grids;
    }

    /// All surfaces in the world frame.
    pub fn absolute_surfaces(&self) -> Vec<Surface> {
        self.scans
            .iter()
            .flat_map(|(&id, record)| {
                let pose = self.graph.estimate(id);
                record
                    .surfaces
                    .iter()
                    .map(move |surface| surface.iter().map(|p| pose.apply(p)).collect())
            })
            .collect()
    }
}

impl Default for Slam {
    fn default() -> Self {
        Self::new(SlamConfig::default(), IcpConfig::default(), OccupancyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::matching::test_utils::box_room_scan;
    use crate::core::transform::Point2D;
    use crate::engine::graph::ConstraintKind;
    use approx::assert_relative_eq;

    fn forward(distance: f64) -> RigidTransform2D {
        RigidTransform2D::new(0.0, Point2D::new(0.0, distance))
    }

    fn result(error: f64, overlap: f64, converged: bool) -> ScanMatchResult {
        ScanMatchResult {
            transform: forward(10.0),
            converged,
            error,
            overlap,
            iterations: 3,
        }
    }

    #[test]
    fn test_move_adds_odometry_edge() {
        let mut slam = Slam::default();
        assert_eq!(slam.move_by(forward(10.0)), 1);
        assert_eq!(slam.move_by(forward(10.0)), 2);

        let graph = slam.graph();
        assert_eq!(graph.constraint_count(), 2);
        assert_eq!(graph.count_of(ConstraintKind::Odometry), 2);
        assert_relative_eq!(graph.constraints()[0].strength, 0.1);
        assert_relative_eq!(slam.current_pose().translation.y, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_odometry_strength_keeps_poses_finite() {
        let config = SlamConfig {
            odometry_strength: 0.0,
            ..SlamConfig::default()
        };
        let mut slam = Slam::new(config, IcpConfig::default(), OccupancyConfig::default());
        slam.move_by(forward(10.0));
        slam.move_by(forward(10.0));

        let pose = slam.current_pose();
        assert!(pose.rotation.is_finite());
        assert!(pose.translation.x.is_finite() && pose.translation.y.is_finite());
        assert_eq!(slam.graph().constraint_count(), 2);
    }

    #[test]
    fn test_single_scan_has_no_candidates() {
        let mut slam = Slam::default();
        slam.move_by(forward(10.0));
        let summary = slam
            .add_scan_with_matching(box_room_scan(&forward(10.0)), &CancellationFlag::new())
            .unwrap();
        assert_eq!(summary.pose, 1);
        assert_eq!(summary.candidates, 0);
        assert_eq!(slam.graph().node_count(), 2);
        assert!(slam.current_pose().approx_eq(&forward(10.0), 1e-9));
    }

    #[test]
    fn test_candidates_exclude_current_and_unscanned() {
        let mut slam = Slam::default();
        slam.add_scan(box_room_scan(&RigidTransform2D::identity()));
        slam.move_by(forward(10.0));
        slam.move_by(forward(10.0));
        slam.add_scan(box_room_scan(&forward(20.0)));

        let candidates = slam.select_candidates(2);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].pose, 0);
        assert!(candidates[0].overlap >= 0.4);
    }

    #[test]
    fn test_match_edge_strength() {
        let slam = Slam::default();
        let edge = slam.match_edge(0, 1, &result(2.0, 0.8, false)).unwrap();
        assert_relative_eq!(edge.strength, 4.0);
        assert_eq!(edge.kind, ConstraintKind::ScanMatch);

        let edge = slam.match_edge(0, 1, &result(2.0, 0.8, true)).unwrap();
        assert_relative_eq!(edge.strength, 2.0);

        let edge = slam.match_edge(0, 1, &result(0.0, 1.0, true)).unwrap();
        assert_relative_eq!(edge.strength, 5e3);

        assert!(slam.match_edge(0, 1, &result(f64::INFINITY, 1.0, false)).is_none());
    }

    #[test]
    fn test_matching_corrects_odometry() {
        let mut slam = Slam::default();
        let cancel = CancellationFlag::new();
        slam.add_scan_with_matching(box_room_scan(&RigidTransform2D::identity()), &cancel)
            .unwrap();
        // True motion is 20 forward; odometry under-reports it
        slam.move_by(forward(16.0));
        let summary = slam
            .add_scan_with_matching(box_room_scan(&forward(20.0)), &cancel)
            .unwrap();
        assert_eq!(summary.candidates, 1);
        assert_eq!(summary.edges_added, 1);

        let graph = slam.graph();
        let relative = RigidTransform2D::relative(&graph.estimate(1), &graph.estimate(0));
        // Closer to the true motion than the odometry alone
        assert!((relative.translation.y - 20.0).abs() < 3.5, "relative {relative:?}");
    }

    #[test]
    fn test_cancelled_matching_discards_edges() {
        let mut slam = Slam::default();
        slam.add_scan(box_room_scan(&RigidTransform2D::identity()));
        slam.move_by(forward(10.0));
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let outcome = slam.add_scan_with_matching(box_room_scan(&forward(10.0)), &cancel);
        assert!(matches!(outcome, Err(crate::error::MargaError::Cancelled)));
        assert_eq!(slam.graph().count_of(ConstraintKind::ScanMatch), 0);
        assert_eq!(slam.scans().len(), 2);
    }

    #[test]
    fn test_absolute_surfaces_follow_estimates() {
        let mut slam = Slam::default();
        slam.move_by(forward(10.0));
        slam.add_scan(box_room_scan(&forward(10.0)));
        let surfaces = slam.absolute_surfaces();
        assert!(!surfaces.is_empty());
        // Far wall of the room is at y = 100 in the world frame
        let max_y = surfaces
            .iter()
            .flatten()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rebuild_grids() {
        let mut slam = Slam::default();
        slam.add_scan(box_room_scan(&RigidTransform2D::identity()));
        let grids = slam.rebuild_grids();
        assert_eq!(grids.resolution, 10.0);
        assert!(!grids.binary.is_empty());
        assert!(!grids.frontier.is_empty());
    }
}
