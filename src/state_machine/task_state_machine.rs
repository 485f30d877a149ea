use chrono::Utc;

use super::{events::TaskEvent, states::TaskStatus};
use crate::error::{BatchError, Result};
use crate::models::TaskRecord;

/// Applies lifecycle events to a single task record.
///
/// Owns the transition table and the error-detail invariant: a `Completed`
/// or `Processing` record has no detail, a `Failed` or `Cancelled` record
/// always has a non-empty one.
#[derive(Debug)]
pub struct TaskStateMachine<'a> {
    record: &'a mut TaskRecord,
}

impl<'a> TaskStateMachine<'a> {
    pub fn new(record: &'a mut TaskRecord) -> Self {
        Self { record }
    }

    pub fn current_state(&self) -> TaskStatus {
        self.record.status
    }

    /// Apply `event`, refreshing `updated_at`. The record is untouched when
    /// the transition is rejected.
    pub fn transition(&mut self, event: TaskEvent) -> Result<TaskStatus> {
        let current = self.record.status;
        let target = Self::determine_target_state(current, &event).ok_or_else(|| {
            BatchError::InvalidState {
                task_id: self.record.task_id,
                current,
                reason: format!("event '{}' is not allowed", event.event_type()),
            }
        })?;

        let error_detail = match event {
            TaskEvent::Fail(detail) => {
                if detail.trim().is_empty() {
                    return Err(BatchError::InvalidState {
                        task_id: self.record.task_id,
                        current,
                        reason: "a failed record requires a non-empty error detail".to_string(),
                    });
                }
                Some(detail)
            }
            TaskEvent::Cancel => Some(CANCELLED_DETAIL.to_string()),
            _ => None,
        };

        self.record.status = target;
        self.record.error_detail = error_detail;
        self.record.updated_at = Utc::now();

        Ok(target)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(current: TaskStatus, event: &TaskEvent) -> Option<TaskStatus> {
        let target = match (current, event) {
            (TaskStatus::Waiting, TaskEvent::Start) => TaskStatus::Processing,
            (TaskStatus::Failed, TaskEvent::Retry) => TaskStatus::Processing,

            (TaskStatus::Processing, TaskEvent::Complete) => TaskStatus::Completed,

            // Waiting -> Failed covers store failures before start and
            // records interrupted by a restart
            (TaskStatus::Waiting, TaskEvent::Fail(_)) => TaskStatus::Failed,
            (TaskStatus::Processing, TaskEvent::Fail(_)) => TaskStatus::Failed,

            (TaskStatus::Waiting, TaskEvent::Cancel) => TaskStatus::Cancelled,

            _ => return None,
        };

        Some(target)
    }

    pub fn can_transition(current: TaskStatus, target: TaskStatus) -> bool {
        TaskEvent::for_target(current, target, Some(String::from("-")))
            .and_then(|event| Self::determine_target_state(current, &event))
            .is_some_and(|resolved| resolved == target)
    }
}

/// Error detail attached to records cancelled before processing
pub const CANCELLED_DETAIL: &str = "batch cancelled before the item was processed";
