//! Error types for the batch orchestrator.
//!
//! Store-level failures (`StoreIo`, `CorruptHistory`) are surfaced to callers
//! because they mean the audit trail can no longer be trusted. Per-item
//! failures inside a batch never reach this type; they are recorded on the
//! task record and reported through [`crate::models::FailureKind`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::models::{RunId, TaskId};
use crate::state_machine::TaskStatus;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    /// Durable read or write of the history file failed
    #[error("Store I/O error during {operation} on {path}: {reason}")]
    StoreIo {
        operation: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Task {task_id} not found")]
    TaskNotFound { task_id: TaskId },

    #[error("Batch run {run_id} not found")]
    RunNotFound { run_id: RunId },

    /// Requested transition is not allowed from the record's current status
    #[error("Task {task_id} is in invalid state {current}: {reason}")]
    InvalidState {
        task_id: TaskId,
        current: TaskStatus,
        reason: String,
    },

    /// The persisted history exists but cannot be trusted
    #[error("Corrupt history file {path}: {reason}")]
    CorruptHistory { path: PathBuf, reason: String },

    #[error("Timeout during {operation} after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Archive error for {source_ref}: {reason}")]
    Archive { source_ref: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BatchError {
    pub fn store_io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::StoreIo {
            operation: operation.into(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupt_history(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::CorruptHistory {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn archive(source_ref: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Archive {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that mean the persisted history itself is unreliable
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreIo { .. } | Self::CorruptHistory { .. })
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
