use tracing::info;

use super::item_executor::ItemExecutor;
use crate::error::{BatchError, Result};
use crate::models::{TaskId, TaskResult};
use crate::state_machine::TaskEvent;

/// Re-runs a single `Failed` record using the source reference and
/// parameter snapshot stored on the record itself.
///
/// Retry is never automatic; it is an operator action. Records in any other
/// status are rejected with `InvalidState` and left untouched.
#[derive(Debug, Clone)]
pub struct RetryController {
    executor: ItemExecutor,
}

impl RetryController {
    pub fn new(executor: ItemExecutor) -> Self {
        Self { executor }
    }

    pub async fn retry(&self, task_id: TaskId) -> Result<TaskResult> {
        let record = self
            .executor
            .gateway()
            .call("get_task", move |store| store.get_task(task_id))
            .await?;

        if !record.is_retryable() {
            return Err(BatchError::InvalidState {
                task_id,
                current: record.status,
                reason: "only failed tasks can be retried".to_string(),
            });
        }

        info!(
            task_id = %task_id,
            source_ref = %record.source_ref,
            previous_error = record.error_detail.as_deref().unwrap_or_default(),
            "Retrying failed task"
        );

        // The Retry transition re-checks the status under the store lock
        self.executor.execute(task_id, TaskEvent::Retry, None).await
    }
}
