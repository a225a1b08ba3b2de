//! Error types for MargaSLAM

use thiserror::Error;

use crate::algorithms::planning::PlanningError;

/// MargaSLAM error type
#[derive(Error, Debug)]
pub enum MargaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid grid payload: {0}")]
    GridFormat(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("A driving strategy is already active")]
    StrategyActive,

    #[error("No driving strategy is active")]
    NoStrategy,

    #[error("Planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl From<basic_toml::Error> for MargaError {
    fn from(e: basic_toml::Error) -> Self {
        MargaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MargaError>;
