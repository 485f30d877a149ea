//! # Batch Orchestrator
//!
//! Facade that owns one [`HistoryStore`] and wires the batch runner, retry
//! controller and result aggregator around it. Each orchestrator is fully
//! independent: nothing is shared across instances, so several can run side
//! by side (one per history file) without interference.
//!
//! ```rust,no_run
//! use idphoto_batch::{BatchOrchestrator, FnProcessor, OrchestratorConfig, ParameterBundle};
//! use idphoto_batch::models::Artifact;
//! use std::sync::Arc;
//!
//! # async fn example() -> idphoto_batch::Result<()> {
//! let processor = Arc::new(FnProcessor::new(|source_ref: String, _params: ParameterBundle| async move {
//!     anyhow::Ok(vec![Artifact::new("standard.png", source_ref.into_bytes())])
//! }));
//! let orchestrator = BatchOrchestrator::open(OrchestratorConfig::default(), processor)?;
//!
//! let report = orchestrator
//!     .run_batch(vec![("a.jpg".to_string(), ParameterBundle::default())], None)
//!     .await?;
//! for result in report.results.iter().filter(|r| !r.is_success()) {
//!     if let Some(task_id) = result.task_id {
//!         orchestrator.retry(task_id).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::batch_runner::{BatchReport, BatchRunner};
use super::cancellation::BatchCancellation;
use super::item_executor::ItemExecutor;
use super::processor::PhotoProcessor;
use super::progress::ProgressReporter;
use super::retry_controller::RetryController;
use super::store_gateway::StoreGateway;
use crate::aggregation::{ArtifactCache, CollectedOutput, ResultAggregator, RunSummary};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::events::{EventPublisher, TaskLifecycleEvent};
use crate::history::HistoryStore;
use crate::models::{Artifact, BatchRun, ParameterBundle, RunId, TaskId, TaskRecord, TaskResult};

#[derive(Debug)]
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    store: Arc<HistoryStore>,
    publisher: EventPublisher,
    runner: BatchRunner,
    retry_controller: RetryController,
    aggregator: ResultAggregator,
    cache: ArtifactCache,
    cancellation: parking_lot::Mutex<BatchCancellation>,
}

impl BatchOrchestrator {
    /// Open the history file named by the configuration and wire the
    /// components around it.
    ///
    /// Fails with `CorruptHistory` if the file cannot be trusted.
    pub fn open(config: OrchestratorConfig, processor: Arc<dyn PhotoProcessor>) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(HistoryStore::open(&config.history_path)?);

        if config.recover_interrupted_on_open {
            let recovered = store.recover_interrupted()?;
            if !recovered.is_empty() {
                warn!(
                    count = recovered.len(),
                    "Recovered interrupted tasks from a previous session"
                );
            }
        }

        Ok(Self::with_store(config, store, processor))
    }

    /// Wire the components around an already opened store
    pub fn with_store(
        config: OrchestratorConfig,
        store: Arc<HistoryStore>,
        processor: Arc<dyn PhotoProcessor>,
    ) -> Self {
        let cache = ArtifactCache::new();
        let publisher = EventPublisher::new(config.event_channel_capacity);
        let gateway = StoreGateway::new(Arc::clone(&store), config.store_timeout());
        let executor = ItemExecutor::new(
            gateway,
            processor,
            cache.clone(),
            publisher.clone(),
            config.item_timeout(),
        );

        info!(
            history_path = %store.path().display(),
            tasks = store.len(),
            max_concurrent_items = config.max_concurrent_items,
            "Batch orchestrator ready"
        );

        Self {
            runner: BatchRunner::new(executor.clone(), config.max_concurrent_items),
            retry_controller: RetryController::new(executor),
            aggregator: ResultAggregator::new(
                Arc::clone(&store),
                cache.clone(),
                config.archive_scratch_dir.clone(),
            ),
            cache,
            publisher,
            store,
            config,
            cancellation: parking_lot::Mutex::new(BatchCancellation::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.publisher.subscribe()
    }

    /// Run a batch. Cancelling through [`Self::cancel_current_batch`] affects
    /// the batch started most recently.
    pub async fn run_batch(
        &self,
        inputs: Vec<(String, ParameterBundle)>,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<BatchReport> {
        let cancellation = BatchCancellation::new();
        *self.cancellation.lock() = cancellation.clone();
        self.runner.run_batch(inputs, progress, &cancellation).await
    }

    /// Run a batch with a caller-held cancellation handle
    pub async fn run_batch_with_cancellation(
        &self,
        inputs: Vec<(String, ParameterBundle)>,
        progress: Option<&dyn ProgressReporter>,
        cancellation: &BatchCancellation,
    ) -> Result<BatchReport> {
        self.runner.run_batch(inputs, progress, cancellation).await
    }

    pub fn cancel_current_batch(&self) {
        self.cancellation.lock().cancel();
    }

    pub async fn retry(&self, task_id: TaskId) -> Result<TaskResult> {
        self.retry_controller.retry(task_id).await
    }

    pub fn get_task(&self, task_id: TaskId) -> Result<TaskRecord> {
        self.store.get_task(task_id)
    }

    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.store.list_tasks()
    }

    /// Delete a record and drop its cached outputs
    pub fn delete_task(&self, task_id: TaskId) -> Result<bool> {
        let deleted = self.store.delete_task(task_id)?;
        if deleted && self.cache.remove(&task_id).is_some() {
            debug!(task_id = %task_id, "Dropped cached outputs of deleted task");
        }
        Ok(deleted)
    }

    /// Cached outputs of a completed task, if still held in memory
    pub fn outputs(&self, task_id: TaskId) -> Option<Vec<Artifact>> {
        self.cache.get(&task_id)
    }

    pub fn get_run(&self, run_id: RunId) -> Result<BatchRun> {
        self.store.get_run(run_id)
    }

    pub fn list_runs(&self) -> Vec<BatchRun> {
        self.store.list_runs()
    }

    pub fn collect_successful(&self, run_id: RunId) -> Result<Vec<CollectedOutput>> {
        self.aggregator.collect_successful(run_id)
    }

    pub fn summarize(&self, run_id: RunId) -> Result<RunSummary> {
        self.aggregator.summarize(run_id)
    }

    pub fn package(&self, outputs: &[CollectedOutput]) -> Result<Vec<u8>> {
        self.aggregator.package(outputs)
    }

    pub fn export_archive(&self, outputs: &[CollectedOutput], dest: &Path) -> Result<usize> {
        self.aggregator.export_archive(outputs, dest)
    }
}
