//! Recorded drive/scan logs.
//!
//! A log is a JSON document holding the odometry the robot reported since the
//! previous step and the sweep taken at the end of it:
//!
//! ```json
//! { "steps": [
//!     { "odometry": { "rotation": 0.0, "translation": { "x": 0.0, "y": 0.0 } },
//!       "scan": { "angle": 2.36, "angle_step": 0.035, ... } },
//!     ...
//! ] }
//! ```

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::RobotDriver;
use crate::core::scan::RangingSensorScan;
use crate::core::transform::RigidTransform2D;
use crate::error::{MargaError, Result};

/// One recorded motion followed by a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    /// Motion since the previous step, in the previous step's frame.
    #[serde(default)]
    pub odometry: RigidTransform2D,
    /// Sweep taken after the motion.
    pub scan: RangingSensorScan,
}

/// A recorded session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    pub steps: Vec<ReplayStep>,
}

impl ReplayLog {
    /// Parse a log from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a log file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let log = Self::from_json(&text)?;
        log::info!("Loaded {} replay steps from {}", log.steps.len(), path.display());
        Ok(log)
    }

    /// Write the log as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Driver that plays back a [`ReplayLog`] regardless of the wheel commands.
///
/// Each `drive` call consumes one step and reports its odometry; the next
/// `scan` returns that step's sweep. A `scan` without a preceding `drive`
/// consumes a step of its own, dropping its odometry.
#[derive(Debug)]
pub struct ReplayDriver {
    steps: VecDeque<ReplayStep>,
    pending_scan: Option<RangingSensorScan>,
    consumed: usize,
}

impl ReplayDriver {
    pub fn new(log: ReplayLog) -> Self {
        Self {
            steps: log.steps.into(),
            pending_scan: None,
            consumed: 0,
        }
    }

    /// Driver over the log stored at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(ReplayLog::from_path(path)?))
    }

    /// Steps not yet played.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    /// Steps played so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    fn next_step(&mut self) -> Result<ReplayStep> {
        let step = self
            .steps
            .pop_front()
            .ok_or_else(|| MargaError::Driver("replay log exhausted".into()))?;
        self.consumed += 1;
        Ok(step)
    }
}

impl RobotDriver for ReplayDriver {
    fn drive(&mut self, left: f64, right: f64) -> Result<RigidTransform2D> {
        let step = self.next_step()?;
        log::trace!(
            "Replay step {}: commanded ({:.1}, {:.1})",
            self.consumed,
            left,
            right
        );
        self.pending_scan = Some(step.scan);
        Ok(step.odometry)
    }

    fn scan(&mut self) -> Result<RangingSensorScan> {
        match self.pending_scan.take() {
            Some(scan) => Ok(scan),
            None => {
                let step = self.next_step()?;
                if step.odometry != RigidTransform2D::identity() {
                    log::warn!(
                        "Replay step {} odometry dropped: scan requested without motion",
                        self.consumed
                    );
                }
                Ok(step.scan)
            }
        }
    }
}
