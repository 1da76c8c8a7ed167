//! Crate-wide error type
//!
//! Mirrors the error taxonomy in the design: engine failures, task user
//! errors and cleanup failures are all represented here so callers can match
//! on them, but the Commander loop never lets any of them escape a tick --
//! every variant is logged and swallowed at the boundary where it
//! originates.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommanderError {
    #[error("container engine error: {0}")]
    EngineUnavailable(#[from] bollard::errors::Error),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("task '{0}' failed: {1}")]
    TaskUserError(String, String),

    #[error("invalid task name '{0}': must match [A-Za-z_][A-Za-z0-9_-]*")]
    InvalidTaskName(String),

    #[error("image recipe error: {0}")]
    Recipe(String),

    #[error("cleanup failure: {0}")]
    Cleanup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CommanderError>;
