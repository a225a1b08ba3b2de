//! Small shared utilities.
//!
//! This module provides:
//! - Cooperative cancellation flag for background work and strategies
//! - Signal handling (Ctrl-C)

mod cancel;
mod signal;

pub use cancel::CancellationFlag;
pub use signal::setup_ctrl_c_handler;
