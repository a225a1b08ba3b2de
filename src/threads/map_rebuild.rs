//! Background occupancy grid rebuild.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError, bounded};

use crate::algorithms::mapping::{OccupancyGrids, OccupancyMapper, PosedScan};
use crate::error::{MargaError, Result};
use crate::utils::CancellationFlag;

/// Handle to a grid rebuild running on its own thread.
pub struct MapRebuildTask {
    handle: JoinHandle<()>,
    receiver: Receiver<OccupancyGrids>,
    cancel: CancellationFlag,
}

impl MapRebuildTask {
    /// Start rebuilding the grids from a snapshot of posed scans.
    pub fn spawn(
        mapper: OccupancyMapper,
        scans: Vec<PosedScan>,
        cancel: CancellationFlag,
    ) -> Result<Self> {
        let (sender, receiver) = bounded(1);
        let worker_cancel = cancel.clone();
        let handle = thread::Builder::new()
            .name("map-rebuild".into())
            .spawn(move || {
                if worker_cancel.is_cancelled() {
                    return;
                }
                let grids = mapper.rebuild(&scans);
                if worker_cancel.is_cancelled() {
                    log::debug!("Map rebuild cancelled, dropping result");
                    return;
                }
                let _ = sender.send(grids);
            })?;
        Ok(Self {
            handle,
            receiver,
            cancel,
        })
    }

    /// Request cancellation; a finished result is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Take the result if it is ready, without blocking.
    pub fn try_take(&self) -> Result<Option<OccupancyGrids>> {
        match self.receiver.try_recv() {
            Ok(grids) => Ok(Some(grids)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) if self.cancel.is_cancelled() => {
                Err(MargaError::Cancelled)
            }
            Err(TryRecvError::Disconnected) => Err(MargaError::TaskFailed(
                "map rebuild thread exited".into(),
            )),
        }
    }

    /// Block until the rebuild finishes.
    pub fn wait(self) -> Result<OccupancyGrids> {
        let result = self.receiver.recv();
        if let Err(e) = self.handle.join() {
            log::error!("Map rebuild thread panicked: {:?}", e);
        }
        match result {
            Ok(grids) if !self.cancel.is_cancelled() => Ok(grids),
            _ if self.cancel.is_cancelled() => Err(MargaError::Cancelled),
            _ => Err(MargaError::TaskFailed("map rebuild thread exited".into())),
        }
    }
}
