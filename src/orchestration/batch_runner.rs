//! # Batch Runner
//!
//! Drives a list of `(source_ref, parameters)` inputs through the processor.
//!
//! ## Phases
//!
//! 1. **Registration**: one `Waiting` record per input. A failed `AddTask`
//!    becomes a `Failed` result for that item only.
//! 2. **Processing**: items run in submission order, up to
//!    `max_concurrent_items` at a time. Results are buffered back into
//!    submission order whatever order items finish in.
//! 3. **Summary**: a [`BatchRun`] listing the created records is persisted.
//!    If no record could be created there is nothing to summarize and the
//!    per-item results are returned without a run.
//!
//! One item failing (error, timeout or panic) never affects the others.
//! A store failure while moving an existing record aborts the batch: the
//! history can no longer account for every item.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{error, info, warn};

use super::cancellation::BatchCancellation;
use super::item_executor::ItemExecutor;
use super::progress::{ProgressReporter, ProgressTracker};
use crate::error::Result;
use crate::logging::log_task_operation;
use crate::models::{BatchRun, FailureKind, ParameterBundle, RunId, TaskId, TaskResult};
use crate::state_machine::TaskEvent;

/// Results of one batch in submission order
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// `None` when no task record was created (empty input, or every
    /// registration failed) and so no run was recorded
    pub run_id: Option<RunId>,
    pub results: Vec<TaskResult>,
}

impl BatchReport {
    fn empty() -> Self {
        Self {
            run_id: None,
            results: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

/// An input after the registration phase
enum RegisteredItem {
    Created(TaskId),
    Rejected(TaskResult),
}

#[derive(Debug, Clone)]
pub struct BatchRunner {
    executor: ItemExecutor,
    max_concurrent_items: usize,
}

impl BatchRunner {
    pub fn new(executor: ItemExecutor, max_concurrent_items: usize) -> Self {
        Self {
            executor,
            max_concurrent_items: max_concurrent_items.max(1),
        }
    }

    pub fn max_concurrent_items(&self) -> usize {
        self.max_concurrent_items
    }

    pub async fn run_batch(
        &self,
        inputs: Vec<(String, ParameterBundle)>,
        progress: Option<&dyn ProgressReporter>,
        cancellation: &BatchCancellation,
    ) -> Result<BatchReport> {
        if inputs.is_empty() {
            info!("Empty batch submitted, nothing to run");
            return Ok(BatchReport::empty());
        }

        let run_id = RunId::new();
        let started_at = Utc::now();
        let total = inputs.len();
        info!(
            run_id = %run_id,
            total,
            max_concurrent_items = self.max_concurrent_items,
            "Starting batch run"
        );

        let registered = self.register(inputs).await;
        let records: Vec<TaskId> = registered
            .iter()
            .filter_map(|item| match item {
                RegisteredItem::Created(task_id) => Some(*task_id),
                RegisteredItem::Rejected(_) => None,
            })
            .collect();

        let tracker = ProgressTracker::new(progress, total);
        let run_result: Result<Vec<TaskResult>> = stream::iter(registered)
            .map(|item| self.process_item(item, run_id, &tracker, cancellation))
            .buffered(self.max_concurrent_items)
            .try_collect()
            .await;

        let results = match run_result {
            Ok(results) => results,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Batch run aborted by history store failure");
                return Err(e);
            }
        };

        if records.is_empty() {
            warn!(run_id = %run_id, total, "No task record could be created, run not recorded");
            return Ok(BatchReport {
                run_id: None,
                results,
            });
        }

        let run = BatchRun {
            run_id,
            records,
            started_at,
            finished_at: Utc::now(),
            cancelled: cancellation.is_cancelled(),
        };
        self.executor
            .gateway()
            .call("add_run", move |store| store.add_run(run))
            .await?;

        let report = BatchReport {
            run_id: Some(run_id),
            results,
        };
        info!(
            run_id = %run_id,
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = cancellation.is_cancelled(),
            "Batch run finished"
        );
        Ok(report)
    }

    async fn register(&self, inputs: Vec<(String, ParameterBundle)>) -> Vec<RegisteredItem> {
        let mut registered = Vec::with_capacity(inputs.len());

        for (source_ref, parameters) in inputs {
            let name = source_ref.clone();
            let added = self
                .executor
                .gateway()
                .call("add_task", move |store| store.add_task(name, parameters))
                .await;

            match added {
                Ok(task_id) => registered.push(RegisteredItem::Created(task_id)),
                Err(e) => {
                    warn!(source_ref = %source_ref, error = %e, "Could not create task record");
                    log_task_operation(
                        "add_task",
                        None,
                        Some(source_ref.as_str()),
                        "failed",
                        Some(e.to_string().as_str()),
                    );
                    registered.push(RegisteredItem::Rejected(TaskResult::failed(
                        None,
                        source_ref,
                        FailureKind::StoreIo,
                        e.to_string(),
                    )));
                }
            }
        }

        registered
    }

    async fn process_item(
        &self,
        item: RegisteredItem,
        run_id: RunId,
        tracker: &ProgressTracker<'_>,
        cancellation: &BatchCancellation,
    ) -> Result<TaskResult> {
        let result = match item {
            RegisteredItem::Rejected(result) => result,
            RegisteredItem::Created(task_id) if cancellation.is_cancelled() => {
                self.executor.cancel(task_id, Some(run_id)).await?
            }
            RegisteredItem::Created(task_id) => {
                self.executor
                    .execute(task_id, TaskEvent::Start, Some(run_id))
                    .await?
            }
        };

        tracker.advance(&result.source_ref);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::ArtifactCache;
    use crate::events::EventPublisher;
    use crate::history::HistoryStore;
    use crate::models::Artifact;
    use crate::orchestration::processor::FnProcessor;
    use crate::orchestration::store_gateway::StoreGateway;
    use crate::state_machine::TaskStatus;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn runner_with(temp: &TempDir) -> (BatchRunner, Arc<HistoryStore>) {
        let store = Arc::new(HistoryStore::open(temp.path().join("history.json")).unwrap());
        let processor = Arc::new(FnProcessor::new(|source_ref: String, _: ParameterBundle| async move {
            anyhow::Ok(vec![Artifact::new("standard.png", source_ref.into_bytes())])
        }));
        let executor = ItemExecutor::new(
            StoreGateway::new(Arc::clone(&store), Duration::from_secs(5)),
            processor,
            ArtifactCache::new(),
            EventPublisher::default(),
            Duration::from_secs(5),
        );
        (BatchRunner::new(executor, 1), store)
    }

    fn batch(names: &[&str]) -> Vec<(String, ParameterBundle)> {
        names
            .iter()
            .map(|name| (name.to_string(), ParameterBundle::default()))
            .collect()
    }

    #[tokio::test]
    async fn test_failed_registration_fails_only_that_item() {
        let temp = TempDir::new().unwrap();
        let (runner, store) = runner_with(&temp);
        store.script_flushes([true, false, true]);

        let report = runner
            .run_batch(batch(&["a.jpg", "b.jpg", "c.jpg"]), None, &BatchCancellation::new())
            .await
            .unwrap();

        let statuses: Vec<TaskStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Completed]
        );
        let rejected = &report.results[1];
        assert_eq!(rejected.source_ref, "b.jpg");
        assert_eq!(rejected.task_id, None);
        assert_eq!(rejected.failure_kind, Some(FailureKind::StoreIo));
        assert!(rejected.error_detail.as_deref().is_some_and(|d| !d.is_empty()));

        let run = store.get_run(report.run_id.unwrap()).unwrap();
        let created: Vec<TaskId> = [&report.results[0], &report.results[2]]
            .iter()
            .filter_map(|r| r.task_id)
            .collect();
        assert_eq!(run.records, created);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_no_run_recorded_when_every_registration_fails() {
        let temp = TempDir::new().unwrap();
        let (runner, store) = runner_with(&temp);
        store.script_flushes([false, false]);

        let report = runner
            .run_batch(batch(&["a.jpg", "b.jpg"]), None, &BatchCancellation::new())
            .await
            .unwrap();

        assert_eq!(report.run_id, None);
        assert_eq!(report.len(), 2);
        assert!(report
            .results
            .iter()
            .all(|r| r.failure_kind == Some(FailureKind::StoreIo)));
        assert!(store.list_runs().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_transition_aborts_batch() {
        let temp = TempDir::new().unwrap();
        let (runner, store) = runner_with(&temp);
        // Registration succeeds, moving the record to Processing does not
        store.script_flushes([true, false]);

        let err = runner
            .run_batch(batch(&["a.jpg"]), None, &BatchCancellation::new())
            .await
            .unwrap_err();

        assert!(err.is_store_failure());
        assert_eq!(store.list_tasks()[0].status, TaskStatus::Waiting);
    }
}
