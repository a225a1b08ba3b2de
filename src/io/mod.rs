//! File-backed input and output.
//!
//! This module provides:
//! - Replay of recorded drive/scan logs, as a driver or as raw steps
//! - Saving and loading occupancy grids as JSON files

pub mod map_store;
pub mod replay;

pub use map_store::{MapFiles, load_binary_grid, save_grids};
pub use replay::{ReplayDriver, ReplayLog, ReplayStep};
