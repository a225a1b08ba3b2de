//! Driving strategies and the supervisor that runs at most one of them.
//!
//! ```text
//!   start(kind) ──► idle? ──no──► Err(StrategyActive)
//!                     │yes
//!                     ▼
//!   controller moves onto a named strategy thread
//!                     │
//!   stop() ─► cancel flag ─► strategy notices at its next loop boundary
//!                     │
//!   join ◄────────────┘   controller moves back, outcome returned
//! ```
//!
//! Strategies:
//! - **Manual**: wheel commands from a channel, scanning after enough travel
//! - **Autonomous exploration**: scan, rebuild, plan to the nearest frontier,
//!   drive a few cells, repeat until no frontier is left
//! - **Guided exploration**: the same loop towards a fixed target point

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use serde::{Deserialize, Serialize};

use crate::algorithms::planning::{Plan, PlanningError};
use crate::core::transform::Point2D;
use crate::error::{MargaError, Result};
use crate::utils::CancellationFlag;

use super::controller::{ManualCommand, RobotController};
use super::driver::RobotDriver;

/// Which strategy drives the robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StrategyKind {
    Manual,
    AutonomousExploration,
    GuidedExploration { target: Point2D },
}

impl StrategyKind {
    fn thread_name(&self) -> &'static str {
        match self {
            StrategyKind::Manual => "strategy-manual",
            StrategyKind::AutonomousExploration => "strategy-explore",
            StrategyKind::GuidedExploration { .. } => "strategy-guided",
        }
    }
}

/// How a strategy ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// The strategy reached its goal (map explored, target reached or
    /// manual input closed).
    Completed,
    /// The strategy stopped because cancellation was requested.
    Cancelled,
    /// The cycle budget ran out before the goal was reached.
    CycleLimit,
}

type StrategyResult<D> = (RobotController<D>, Result<StrategyOutcome>);

/// Run `kind` on the calling thread until it finishes or is cancelled.
pub fn run_strategy<D: RobotDriver>(
    kind: StrategyKind,
    controller: &mut RobotController<D>,
    cancel: &CancellationFlag,
    manual: Option<Receiver<ManualCommand>>,
) -> Result<StrategyOutcome> {
    log::info!("Strategy {:?} started", kind);
    controller.set_strategy(Some(kind));
    let result = match kind {
        StrategyKind::Manual => match manual {
            Some(commands) => run_manual(controller, cancel, &commands),
            None => Err(MargaError::Config("manual strategy without command channel".into())),
        },
        StrategyKind::AutonomousExploration => run_exploration(controller, cancel, None),
        StrategyKind::GuidedExploration { target } => {
            run_exploration(controller, cancel, Some(target))
        }
    };
    // Cancellation inside matching or rebuilding is a clean stop
    let result = match result {
        Err(MargaError::Cancelled) => Ok(StrategyOutcome::Cancelled),
        other => other,
    };
    match &result {
        Ok(outcome) => log::info!("Strategy {:?} finished: {:?}", kind, outcome),
        Err(e) => log::warn!("Strategy {:?} failed: {}", kind, e),
    }
    controller.set_strategy(None);
    result
}

fn run_manual<D: RobotDriver>(
    controller: &mut RobotController<D>,
    cancel: &CancellationFlag,
    commands: &Receiver<ManualCommand>,
) -> Result<StrategyOutcome> {
    let tick = Duration::from_millis(controller.config().manual_tick_ms.max(1));
    while !cancel.is_cancelled() {
        match commands.recv_timeout(tick) {
            Ok(command) => controller.manual(&command, cancel)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(StrategyOutcome::Completed),
        }
    }
    Ok(StrategyOutcome::Cancelled)
}

fn run_exploration<D: RobotDriver>(
    controller: &mut RobotController<D>,
    cancel: &CancellationFlag,
    target: Option<Point2D>,
) -> Result<StrategyOutcome> {
    let max_cycles = controller.config().max_plan_cycles;
    for cycle in 0..max_cycles {
        if cancel.is_cancelled() {
            return Ok(StrategyOutcome::Cancelled);
        }
        controller.scan_and_match(cancel)?;
        controller.rebuild_grids(cancel)?;

        if let Some(target) = target
            && controller.pose().translation.distance(&target) <= controller.config().goal_tolerance
        {
            log::info!("Target ({:.1}, {:.1}) reached", target.x, target.y);
            return Ok(StrategyOutcome::Completed);
        }

        let plan: Plan = match target {
            Some(target) => controller.plan_to_point(&target)?,
            None => match controller.plan_to_frontier() {
                Ok(plan) => plan,
                Err(MargaError::Planning(PlanningError::NoFrontier)) => {
                    log::info!("No frontier left after {} cycles", cycle);
                    return Ok(StrategyOutcome::Completed);
                }
                Err(e) => return Err(e),
            },
        };
        controller.publish(Some(&plan));

        if cancel.is_cancelled() {
            return Ok(StrategyOutcome::Cancelled);
        }
        controller.follow_plan_step(&plan)?;
    }
    log::warn!("Strategy stopped after {} cycles", max_cycles);
    Ok(StrategyOutcome::CycleLimit)
}

struct ActiveStrategy<D> {
    kind: StrategyKind,
    cancel: CancellationFlag,
    handle: JoinHandle<StrategyResult<D>>,
}

/// Runs at most one strategy at a time.
pub struct StrategySupervisor<D> {
    idle: Option<RobotController<D>>,
    active: Option<ActiveStrategy<D>>,
    manual: Option<Sender<ManualCommand>>,
    last_outcome: Option<Result<StrategyOutcome>>,
}

impl<D: RobotDriver + 'static> StrategySupervisor<D> {
    /// Create a supervisor owning `controller`.
    pub fn new(controller: RobotController<D>) -> Self {
        Self {
            idle: Some(controller),
            active: None,
            manual: None,
            last_outcome: None,
        }
    }

    /// Whether a strategy is running.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Kind of the running (or finished but not yet joined) strategy.
    pub fn active_kind(&self) -> Option<StrategyKind> {
        self.active.as_ref().map(|active| active.kind)
    }

    /// Start `kind`. Fails with [`MargaError::StrategyActive`] while another
    /// strategy is running.
    pub fn start(&mut self, kind: StrategyKind) -> Result<()> {
        if self.is_active() {
            return Err(MargaError::StrategyActive);
        }
        if self.active.is_some() {
            // Finished on its own; reclaim the controller first
            let outcome = self.join()?;
            self.last_outcome = outcome;
        }
        let mut controller = self
            .idle
            .take()
            .ok_or_else(|| MargaError::TaskFailed("controller was lost".into()))?;

        let cancel = CancellationFlag::new();
        let commands = match kind {
            StrategyKind::Manual => {
                let (sender, receiver) = unbounded();
                self.manual = Some(sender);
                Some(receiver)
            }
            _ => None,
        };

        let worker_cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name(kind.thread_name().into())
            .spawn(move || {
                let outcome = run_strategy(kind, &mut controller, &worker_cancel, commands);
                (controller, outcome)
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.manual = None;
                return Err(e.into());
            }
        };
        self.active = Some(ActiveStrategy {
            kind,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Cancel the running strategy, wait for it and reclaim the controller.
    ///
    /// Returns the strategy's outcome, `None` when nothing was running.
    pub fn stop(&mut self) -> Result<Option<StrategyOutcome>> {
        if let Some(active) = &self.active {
            log::info!("Stopping strategy {:?}", active.kind);
            active.cancel.cancel();
        }
        self.join().and_then(|outcome| outcome.transpose())
    }

    /// Wait for the running strategy to finish on its own.
    pub fn wait(&mut self) -> Result<Option<StrategyOutcome>> {
        self.join().and_then(|outcome| outcome.transpose())
    }

    /// Stop the running strategy (if any) and start `kind`.
    pub fn replace(&mut self, kind: StrategyKind) -> Result<Option<StrategyOutcome>> {
        let previous = match self.stop() {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Previous strategy ended with error: {}", e);
                None
            }
        };
        self.start(kind)?;
        Ok(previous)
    }

    /// Send a manual command to the running manual strategy.
    pub fn send_manual(&self, command: ManualCommand) -> Result<()> {
        let sender = self
            .manual
            .as_ref()
            .filter(|_| self.is_active())
            .ok_or(MargaError::NoStrategy)?;
        sender
            .send(command)
            .map_err(|_| MargaError::TaskFailed("manual strategy stopped".into()))
    }

    /// Outcome of a strategy that finished and was reclaimed by `start`.
    pub fn take_last_outcome(&mut self) -> Option<Result<StrategyOutcome>> {
        self.last_outcome.take()
    }

    /// The controller, when no strategy holds it.
    pub fn controller(&self) -> Option<&RobotController<D>> {
        self.idle.as_ref()
    }

    /// Stop any strategy and return the controller.
    pub fn into_controller(mut self) -> Result<RobotController<D>> {
        if let Err(e) = self.stop() {
            log::warn!("Strategy ended with error: {}", e);
        }
        self.idle
            .take()
            .ok_or_else(|| MargaError::TaskFailed("controller was lost".into()))
    }

    /// Join the active strategy thread, if any.
    fn join(&mut self) -> Result<Option<Result<StrategyOutcome>>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        self.manual = None;
        match active.handle.join() {
            Ok((controller, outcome)) => {
                self.idle = Some(controller);
                Ok(Some(outcome))
            }
            Err(e) => {
                log::error!("Strategy thread {:?} panicked: {:?}", active.kind, e);
                Err(MargaError::TaskFailed(format!("strategy {:?} panicked", active.kind)))
            }
        }
    }
}
