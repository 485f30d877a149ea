//! # Item Executor
//!
//! The per-item step shared by the batch runner and the retry controller:
//! move a record into `Processing`, invoke the processor on its own task
//! under a timeout, then record `Completed` or `Failed`.
//!
//! Processor failures never escape as `Err`; they become a `Failed` record
//! and a [`TaskResult`] carrying a [`FailureKind`]. Only store failures and
//! rejected entry transitions are returned as errors.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::processor::{failure_detail, PhotoProcessor};
use super::store_gateway::StoreGateway;
use crate::aggregation::ArtifactCache;
use crate::error::{BatchError, Result};
use crate::events::{EventPublisher, TaskLifecycleEvent};
use crate::history::AppliedTransition;
use crate::logging::log_task_operation;
use crate::models::{Artifact, FailureKind, RunId, TaskId, TaskRecord, TaskResult};
use crate::state_machine::{TaskEvent, CANCELLED_DETAIL};

#[derive(Clone)]
pub struct ItemExecutor {
    gateway: StoreGateway,
    processor: Arc<dyn PhotoProcessor>,
    cache: ArtifactCache,
    publisher: EventPublisher,
    item_timeout: Duration,
}

impl std::fmt::Debug for ItemExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemExecutor")
            .field("gateway", &self.gateway)
            .field("cached_outputs", &self.cache.len())
            .field("item_timeout", &self.item_timeout)
            .finish()
    }
}

impl ItemExecutor {
    pub fn new(
        gateway: StoreGateway,
        processor: Arc<dyn PhotoProcessor>,
        cache: ArtifactCache,
        publisher: EventPublisher,
        item_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            processor,
            cache,
            publisher,
            item_timeout,
        }
    }

    pub fn gateway(&self) -> &StoreGateway {
        &self.gateway
    }

    /// Run one record through the processor.
    ///
    /// `entry` is `Start` for a `Waiting` record or `Retry` for a `Failed`
    /// one; if the record is in any other state the transition is rejected
    /// with `InvalidState` and nothing is changed.
    pub async fn execute(
        &self,
        task_id: TaskId,
        entry: TaskEvent,
        run_id: Option<RunId>,
    ) -> Result<TaskResult> {
        let operation = entry.event_type();
        let started = self.transition(task_id, entry, run_id).await?;
        let record = started.record;

        match self.invoke(&record).await {
            Ok(outputs) => {
                self.transition(task_id, TaskEvent::Complete, run_id).await?;
                self.cache.insert(task_id, outputs.clone());
                log_task_operation(
                    operation,
                    Some(task_id),
                    Some(record.source_ref.as_str()),
                    "completed",
                    None,
                );
                Ok(TaskResult::completed(task_id, record.source_ref, outputs))
            }
            Err((kind, detail)) => {
                self.transition(task_id, TaskEvent::fail_with_error(detail.clone()), run_id)
                    .await?;
                log_task_operation(
                    operation,
                    Some(task_id),
                    Some(record.source_ref.as_str()),
                    "failed",
                    Some(detail.as_str()),
                );
                Ok(TaskResult::failed(
                    Some(task_id),
                    record.source_ref,
                    kind,
                    detail,
                ))
            }
        }
    }

    /// Mark a `Waiting` record as `Cancelled` without processing it
    pub async fn cancel(&self, task_id: TaskId, run_id: Option<RunId>) -> Result<TaskResult> {
        let applied = self.transition(task_id, TaskEvent::Cancel, run_id).await?;
        let record = applied.record;
        let detail = record
            .error_detail
            .unwrap_or_else(|| CANCELLED_DETAIL.to_string());

        log_task_operation(
            "cancel",
            Some(task_id),
            Some(record.source_ref.as_str()),
            "cancelled",
            Some(detail.as_str()),
        );
        Ok(TaskResult::failed(
            Some(task_id),
            record.source_ref,
            FailureKind::Cancelled,
            detail,
        ))
    }

    async fn transition(
        &self,
        task_id: TaskId,
        event: TaskEvent,
        run_id: Option<RunId>,
    ) -> Result<AppliedTransition> {
        let event_type = event.event_type();
        let applied = self
            .gateway
            .call("apply_event", move |store| store.apply_event(task_id, event))
            .await?;

        debug!(
            task_id = %task_id,
            event = event_type,
            from = %applied.from,
            to = %applied.record.status,
            "Task transitioned"
        );

        self.publisher.publish(TaskLifecycleEvent {
            task_id,
            run_id,
            source_ref: applied.record.source_ref.clone(),
            from: applied.from,
            to: applied.record.status,
            error_detail: applied.record.error_detail.clone(),
            occurred_at: applied.record.updated_at,
        });

        Ok(applied)
    }

    /// Call the processor on its own task under the item timeout.
    ///
    /// The processor may block its thread, so the deadline is awaited on the
    /// join handle and the task is aborted once it expires. A panic surfaces
    /// as a `JoinError` and is reported as `Panicked`.
    async fn invoke(
        &self,
        record: &TaskRecord,
    ) -> std::result::Result<Vec<Artifact>, (FailureKind, String)> {
        let task_id = record.task_id;
        let source_ref = record.source_ref.as_str();
        let start_time = Instant::now();

        let processor = Arc::clone(&self.processor);
        let owned_source = record.source_ref.clone();
        let parameters = record.parameters_snapshot.clone();
        let mut handle = tokio::spawn(async move {
            processor.process(&owned_source, &parameters).await
        });

        let execution_result = tokio::time::timeout(self.item_timeout, &mut handle).await;
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        match execution_result {
            Ok(Ok(Ok(outputs))) => {
                debug!(
                    task_id = %task_id,
                    source_ref = %source_ref,
                    outputs = outputs.len(),
                    execution_time_ms,
                    "Processor completed"
                );
                Ok(outputs)
            }
            Ok(Ok(Err(processor_error))) => {
                let detail = failure_detail(&processor_error);
                warn!(
                    task_id = %task_id,
                    source_ref = %source_ref,
                    error = %detail,
                    execution_time_ms,
                    "Processor returned error"
                );
                Err((FailureKind::Processing, detail))
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                let panic_error = join_error.into_panic();
                let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_error.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                error!(
                    task_id = %task_id,
                    source_ref = %source_ref,
                    panic_msg = %panic_msg,
                    execution_time_ms,
                    "Processor panicked"
                );
                Err((
                    FailureKind::Panicked,
                    BatchError::Processing(format!("processor panicked: {panic_msg}")).to_string(),
                ))
            }
            Ok(Err(join_error)) => {
                error!(
                    task_id = %task_id,
                    source_ref = %source_ref,
                    error = %join_error,
                    execution_time_ms,
                    "Processor task was cancelled"
                );
                Err((
                    FailureKind::Processing,
                    BatchError::Processing(format!("processor task cancelled: {join_error}"))
                        .to_string(),
                ))
            }
            Err(_) => {
                handle.abort();
                error!(
                    task_id = %task_id,
                    source_ref = %source_ref,
                    timeout_ms = self.item_timeout.as_millis() as u64,
                    "Processor timed out"
                );
                Err((
                    FailureKind::Timeout,
                    BatchError::Timeout {
                        operation: format!("processing of {source_ref}"),
                        timeout: self.item_timeout,
                    }
                    .to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::models::ParameterBundle;
    use crate::orchestration::processor::FnProcessor;
    use crate::state_machine::TaskStatus;
    use tempfile::TempDir;

    fn executor_with(
        temp: &TempDir,
        processor: Arc<dyn PhotoProcessor>,
        item_timeout: Duration,
    ) -> (ItemExecutor, Arc<HistoryStore>) {
        let store = Arc::new(HistoryStore::open(temp.path().join("history.json")).unwrap());
        let gateway = StoreGateway::new(Arc::clone(&store), Duration::from_secs(5));
        let executor = ItemExecutor::new(
            gateway,
            processor,
            ArtifactCache::new(),
            EventPublisher::default(),
            item_timeout,
        );
        (executor, store)
    }

    #[tokio::test]
    async fn test_success_completes_and_caches_outputs() {
        let temp = TempDir::new().unwrap();
        let processor = Arc::new(FnProcessor::new(|_: String, _: ParameterBundle| async {
            anyhow::Ok(vec![Artifact::new("standard.png", vec![1u8])])
        }));
        let (executor, store) = executor_with(&temp, processor, Duration::from_secs(5));
        let task_id = store.add_task("a.jpg", ParameterBundle::default()).unwrap();

        let result = executor.execute(task_id, TaskEvent::Start, None).await.unwrap();

        assert!(result.is_success());
        assert_eq!(store.get_task(task_id).unwrap().status, TaskStatus::Completed);
        assert!(executor.cache.contains(&task_id));
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_record() {
        let temp = TempDir::new().unwrap();
        let processor = Arc::new(FnProcessor::new(|source_ref: String, _: ParameterBundle| async move {
            if !source_ref.is_empty() {
                panic!("decoder exploded");
            }
            anyhow::Ok(Vec::new())
        }));
        let (executor, store) = executor_with(&temp, processor, Duration::from_secs(5));
        let task_id = store.add_task("a.jpg", ParameterBundle::default()).unwrap();

        let result = executor.execute(task_id, TaskEvent::Start, None).await.unwrap();

        assert_eq!(result.failure_kind, Some(FailureKind::Panicked));
        let record = store.get_task(task_id).unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.error_detail.unwrap().contains("decoder exploded"));
    }

    #[tokio::test]
    async fn test_start_on_completed_record_is_rejected() {
        let temp = TempDir::new().unwrap();
        let processor = Arc::new(FnProcessor::new(|_: String, _: ParameterBundle| async {
            anyhow::Ok(Vec::new())
        }));
        let (executor, store) = executor_with(&temp, processor, Duration::from_secs(5));
        let task_id = store.add_task("a.jpg", ParameterBundle::default()).unwrap();
        executor.execute(task_id, TaskEvent::Start, None).await.unwrap();

        let err = executor
            .execute(task_id, TaskEvent::Start, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::InvalidState { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_thread_blocking_processor_times_out() {
        let temp = TempDir::new().unwrap();
        let processor = Arc::new(FnProcessor::new(|_: String, _: ParameterBundle| async {
            std::thread::sleep(Duration::from_millis(1_500));
            anyhow::Ok(vec![Artifact::new("standard.png", vec![1u8])])
        }));
        let (executor, store) = executor_with(&temp, processor, Duration::from_millis(50));
        let task_id = store.add_task("slow.jpg", ParameterBundle::default()).unwrap();

        let started = Instant::now();
        let result = executor.execute(task_id, TaskEvent::Start, None).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(1_000));
        assert_eq!(result.failure_kind, Some(FailureKind::Timeout));
        assert_eq!(store.get_task(task_id).unwrap().status, TaskStatus::Failed);
        assert!(!executor.cache.contains(&task_id));
    }
}
