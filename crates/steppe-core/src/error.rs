//! Unified error types for steppe

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all steppe operations
#[derive(Error, Debug)]
pub enum SteppeError {
    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // Workflow errors
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Work item is locked for parallel work: {0}")]
    LockedForParallelWork(String),

    #[error("Work item is locked for expansion: {0}")]
    LockedForExpansion(String),

    #[error("Consistency fault: {0}")]
    ConsistencyFault(String),

    // Backing store errors
    #[error("Replication error: {0}")]
    Replication(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SteppeError {
    /// True for the two lock errors, which clear once the lock holder moves on
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            Self::LockedForParallelWork(_) | Self::LockedForExpansion(_)
        )
    }
}

/// Result type alias using SteppeError
pub type Result<T> = std::result::Result<T, SteppeError>;
