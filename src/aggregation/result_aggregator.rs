use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::archive;
use super::artifact_cache::ArtifactCache;
use crate::error::{BatchError, Result};
use crate::history::HistoryStore;
use crate::models::{Artifact, RunId, TaskId};
use crate::state_machine::TaskStatus;

/// Outputs of one completed task, ready for display or packaging
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedOutput {
    pub task_id: TaskId,
    pub source_ref: String,
    pub outputs: Vec<Artifact>,
}

/// Status counts for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Option<RunId>,
    pub total: usize,
    pub waiting: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Records of the run that were deleted since
    pub missing: usize,
}

/// Groups successful outputs of a run for export and display
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    store: Arc<HistoryStore>,
    cache: ArtifactCache,
    scratch_dir: Option<PathBuf>,
}

impl ResultAggregator {
    pub fn new(store: Arc<HistoryStore>, cache: ArtifactCache, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            store,
            cache,
            scratch_dir,
        }
    }

    /// Completed records of a run with their outputs, in submission order.
    ///
    /// Completed records whose outputs are no longer cached (for instance
    /// after a restart) are skipped.
    pub fn collect_successful(&self, run_id: RunId) -> Result<Vec<CollectedOutput>> {
        let run = self.store.get_run(run_id)?;
        let mut collected = Vec::new();

        for task_id in run.records {
            let record = match self.store.get_task(task_id) {
                Ok(record) => record,
                Err(BatchError::TaskNotFound { .. }) => {
                    debug!(run_id = %run_id, task_id = %task_id, "Skipping deleted task");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if record.status != TaskStatus::Completed {
                continue;
            }

            match self.cache.get(&task_id) {
                Some(outputs) => collected.push(CollectedOutput {
                    task_id,
                    source_ref: record.source_ref,
                    outputs,
                }),
                None => warn!(
                    run_id = %run_id,
                    task_id = %task_id,
                    source_ref = %record.source_ref,
                    "Completed task has no cached outputs, omitting from collection"
                ),
            }
        }

        Ok(collected)
    }

    pub fn summarize(&self, run_id: RunId) -> Result<RunSummary> {
        let run = self.store.get_run(run_id)?;
        let mut summary = RunSummary {
            run_id: Some(run_id),
            total: run.len(),
            ..RunSummary::default()
        };

        for task_id in &run.records {
            match self.store.get_task(*task_id) {
                Ok(record) => match record.status {
                    TaskStatus::Waiting => summary.waiting += 1,
                    TaskStatus::Processing => summary.processing += 1,
                    TaskStatus::Completed => summary.completed += 1,
                    TaskStatus::Failed => summary.failed += 1,
                    TaskStatus::Cancelled => summary.cancelled += 1,
                },
                Err(BatchError::TaskNotFound { .. }) => summary.missing += 1,
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }

    pub fn package(&self, outputs: &[CollectedOutput]) -> Result<Vec<u8>> {
        archive::package(outputs, self.scratch_dir.as_deref())
    }

    pub fn export_archive(&self, outputs: &[CollectedOutput], dest: &Path) -> Result<usize> {
        archive::export_archive(outputs, dest, self.scratch_dir.as_deref())
    }
}
