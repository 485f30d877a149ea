use serde::{Deserialize, Serialize};

use super::artifact::Artifact;
use super::task_record::TaskId;
use crate::state_machine::TaskStatus;

/// Why an item ended in a failure status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The processor reported a domain failure
    Processing,
    /// The processor did not finish within the per-item timeout
    Timeout,
    /// The processor panicked
    Panicked,
    /// The record could not be created in the history store
    StoreIo,
    /// The batch was cancelled before this item was started
    Cancelled,
}

/// Per-item outcome returned by the batch runner and retry controller.
///
/// Results are returned in submission order so callers can zip them with
/// their input list positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    /// `None` only when the record could not be created
    pub task_id: Option<TaskId>,
    pub source_ref: String,
    pub status: TaskStatus,
    pub outputs: Vec<Artifact>,
    pub error_detail: Option<String>,
    pub failure_kind: Option<FailureKind>,
}

impl TaskResult {
    pub fn completed(task_id: TaskId, source_ref: impl Into<String>, outputs: Vec<Artifact>) -> Self {
        Self {
            task_id: Some(task_id),
            source_ref: source_ref.into(),
            status: TaskStatus::Completed,
            outputs,
            error_detail: None,
            failure_kind: None,
        }
    }

    pub fn failed(
        task_id: Option<TaskId>,
        source_ref: impl Into<String>,
        kind: FailureKind,
        error_detail: impl Into<String>,
    ) -> Self {
        let status = match kind {
            FailureKind::Cancelled => TaskStatus::Cancelled,
            _ => TaskStatus::Failed,
        };

        Self {
            task_id,
            source_ref: source_ref.into(),
            status,
            outputs: Vec::new(),
            error_detail: Some(error_detail.into()),
            failure_kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
