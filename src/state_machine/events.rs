use serde::{Deserialize, Serialize};

use super::states::TaskStatus;

/// Events that can trigger task status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// Runner picked the record up
    Start,
    /// Processor returned outputs
    Complete,
    /// Processing failed with the given detail
    Fail(String),
    /// Batch cancelled before the record was processed
    Cancel,
    /// Operator re-opened a failed record
    Retry,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }

    /// Derive the event that moves `current` to `target`.
    ///
    /// `Processing` is reached by `Start` from `Waiting` and by `Retry` from
    /// `Failed`; there is no event whose target is `Waiting`.
    pub fn for_target(
        current: TaskStatus,
        target: TaskStatus,
        error_detail: Option<String>,
    ) -> Option<Self> {
        match target {
            TaskStatus::Waiting => None,
            TaskStatus::Processing if current == TaskStatus::Failed => Some(Self::Retry),
            TaskStatus::Processing => Some(Self::Start),
            TaskStatus::Completed => Some(Self::Complete),
            TaskStatus::Failed => Some(Self::Fail(error_detail.unwrap_or_default())),
            TaskStatus::Cancelled => Some(Self::Cancel),
        }
    }
}
