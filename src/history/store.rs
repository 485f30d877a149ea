//! History Store - durable log of every task record and batch run.
//!
//! All records across all runs live in one JSON file (see
//! [`persistence`](super::persistence)). Each mutation is applied in memory,
//! flushed, and rolled back if the flush fails, so a caller never observes a
//! change that is not on disk.
//!
//! # Concurrency
//!
//! A single mutex guards the in-memory state and is held across the flush,
//! which makes the store its own single writer: two writers can never touch
//! the same record at once, and file replacements are never interleaved.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::persistence::{load_history, write_history, HistoryFile, HISTORY_FORMAT_VERSION};
use crate::error::{BatchError, Result};
use crate::models::{BatchRun, ParameterBundle, RunId, TaskId, TaskRecord};
use crate::state_machine::{TaskEvent, TaskStateMachine, TaskStatus};

/// Error detail given to records found unfinished when a store is opened
pub const INTERRUPTED_DETAIL: &str = "interrupted before completion";

/// Outcome of a successful status change
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTransition {
    pub from: TaskStatus,
    pub record: TaskRecord,
}

#[derive(Debug, Default)]
struct HistoryState {
    tasks: Vec<TaskRecord>,
    index: HashMap<TaskId, usize>,
    runs: Vec<BatchRun>,
    retired: HashSet<TaskId>,
}

impl HistoryState {
    fn from_file(file: HistoryFile) -> Self {
        let index = file
            .tasks
            .iter()
            .enumerate()
            .map(|(position, record)| (record.task_id, position))
            .collect();

        Self {
            tasks: file.tasks,
            index,
            runs: file.runs,
            retired: file.retired_task_ids.into_iter().collect(),
        }
    }

    fn to_file(&self) -> HistoryFile {
        let mut retired_task_ids: Vec<TaskId> = self.retired.iter().copied().collect();
        retired_task_ids.sort();

        HistoryFile {
            version: HISTORY_FORMAT_VERSION,
            tasks: self.tasks.clone(),
            runs: self.runs.clone(),
            retired_task_ids,
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .tasks
            .iter()
            .enumerate()
            .map(|(position, record)| (record.task_id, position))
            .collect();
    }

    fn is_known(&self, task_id: &TaskId) -> bool {
        self.index.contains_key(task_id) || self.retired.contains(task_id)
    }
}

/// Durable, queryable collection of all task records
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    state: Mutex<HistoryState>,
    /// Scripted flush outcomes, consumed one per flush; `false` fails it
    #[cfg(test)]
    flush_script: Mutex<std::collections::VecDeque<bool>>,
}

impl HistoryStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// Fails with `CorruptHistory` if the file exists but cannot be read or
    /// validated; the caller decides whether to start over or abort.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match load_history(&path)? {
            Some(file) => {
                info!(
                    path = %path.display(),
                    tasks = file.tasks.len(),
                    runs = file.runs.len(),
                    "Loaded task history"
                );
                HistoryState::from_file(file)
            }
            None => {
                debug!(path = %path.display(), "No task history yet, starting empty");
                HistoryState::default()
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
            #[cfg(test)]
            flush_script: Mutex::new(std::collections::VecDeque::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn script_flushes(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.flush_script.lock().extend(outcomes);
    }

    fn flush(&self, state: &HistoryState) -> Result<()> {
        #[cfg(test)]
        if self.flush_script.lock().pop_front() == Some(false) {
            return Err(BatchError::store_io(
                "write history",
                &self.path,
                "scripted write failure",
            ));
        }

        write_history(&self.path, &state.to_file())?;
        debug!(
            path = %self.path.display(),
            tasks = state.tasks.len(),
            "Flushed task history"
        );
        Ok(())
    }

    /// Create a `Waiting` record and persist it
    pub fn add_task(
        &self,
        source_ref: impl Into<String>,
        parameters_snapshot: ParameterBundle,
    ) -> Result<TaskId> {
        let record = TaskRecord::new(source_ref, parameters_snapshot);
        let task_id = record.task_id;
        self.insert_task(record)?;
        Ok(task_id)
    }

    /// Insert a fully formed record. Identifiers already present or retired
    /// by a delete are rejected.
    pub fn insert_task(&self, record: TaskRecord) -> Result<()> {
        let mut state = self.state.lock();

        if state.is_known(&record.task_id) {
            return Err(BatchError::InvalidState {
                task_id: record.task_id,
                current: record.status,
                reason: "task id has already been issued".to_string(),
            });
        }

        let task_id = record.task_id;
        let position = state.tasks.len();
        state.tasks.push(record);
        state.index.insert(task_id, position);

        if let Err(e) = self.flush(&state) {
            state.tasks.pop();
            state.index.remove(&task_id);
            warn!(task_id = %task_id, error = %e, "Rolled back task creation after failed flush");
            return Err(e);
        }

        Ok(())
    }

    /// Set the status of a record, enforcing the lifecycle transition table
    pub fn update_task(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        error_detail: Option<String>,
    ) -> Result<TaskRecord> {
        let mut state = self.state.lock();
        let current = Self::lookup(&state, task_id)?.status;

        let event = TaskEvent::for_target(current, status, error_detail).ok_or_else(|| {
            BatchError::InvalidState {
                task_id,
                current,
                reason: format!("cannot move to {status}"),
            }
        })?;

        self.apply_locked(&mut state, task_id, event)
            .map(|applied| applied.record)
    }

    /// Apply a lifecycle event to a record and persist the result
    pub fn apply_event(&self, task_id: TaskId, event: TaskEvent) -> Result<AppliedTransition> {
        let mut state = self.state.lock();
        self.apply_locked(&mut state, task_id, event)
    }

    fn apply_locked(
        &self,
        state: &mut HistoryState,
        task_id: TaskId,
        event: TaskEvent,
    ) -> Result<AppliedTransition> {
        let position = *state
            .index
            .get(&task_id)
            .ok_or(BatchError::TaskNotFound { task_id })?;

        let previous = state.tasks[position].clone();
        let from = previous.status;
        TaskStateMachine::new(&mut state.tasks[position]).transition(event)?;

        if let Err(e) = self.flush(state) {
            state.tasks[position] = previous;
            warn!(task_id = %task_id, error = %e, "Rolled back transition after failed flush");
            return Err(e);
        }

        Ok(AppliedTransition {
            from,
            record: state.tasks[position].clone(),
        })
    }

    fn lookup(state: &HistoryState, task_id: TaskId) -> Result<&TaskRecord> {
        state
            .index
            .get(&task_id)
            .map(|&position| &state.tasks[position])
            .ok_or(BatchError::TaskNotFound { task_id })
    }

    pub fn get_task(&self, task_id: TaskId) -> Result<TaskRecord> {
        let state = self.state.lock();
        Self::lookup(&state, task_id).cloned()
    }

    /// Snapshot of every record in insertion order
    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.state.lock().tasks.clone()
    }

    /// Remove a record. Returns `false` if it was not present. The id is
    /// retired and will never be accepted again.
    pub fn delete_task(&self, task_id: TaskId) -> Result<bool> {
        let mut state = self.state.lock();
        let Some(&position) = state.index.get(&task_id) else {
            return Ok(false);
        };

        let removed = state.tasks.remove(position);
        state.retired.insert(task_id);
        state.rebuild_index();

        if let Err(e) = self.flush(&state) {
            state.tasks.insert(position, removed);
            state.retired.remove(&task_id);
            state.rebuild_index();
            warn!(task_id = %task_id, error = %e, "Rolled back task deletion after failed flush");
            return Err(e);
        }

        info!(task_id = %task_id, "Deleted task record");
        Ok(true)
    }

    /// Persist a batch run summary. Recording the same run twice replaces
    /// the earlier summary.
    pub fn add_run(&self, run: BatchRun) -> Result<()> {
        let mut state = self.state.lock();
        let run_id = run.run_id;
        let existing = state.runs.iter().position(|r| r.run_id == run_id);

        let previous = match existing {
            Some(position) => Some(std::mem::replace(&mut state.runs[position], run)),
            None => {
                state.runs.push(run);
                None
            }
        };

        if let Err(e) = self.flush(&state) {
            match (existing, previous) {
                (Some(position), Some(previous)) => state.runs[position] = previous,
                _ => {
                    state.runs.pop();
                }
            }
            warn!(run_id = %run_id, error = %e, "Rolled back batch run after failed flush");
            return Err(e);
        }

        Ok(())
    }

    pub fn get_run(&self, run_id: RunId) -> Result<BatchRun> {
        self.state
            .lock()
            .runs
            .iter()
            .find(|run| run.run_id == run_id)
            .cloned()
            .ok_or(BatchError::RunNotFound { run_id })
    }

    pub fn list_runs(&self) -> Vec<BatchRun> {
        self.state.lock().runs.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tasks.is_empty()
    }

    /// Fail every record left `Waiting` or `Processing` by a previous
    /// process so it becomes retryable. Returns the affected ids.
    pub fn recover_interrupted(&self) -> Result<Vec<TaskId>> {
        let mut state = self.state.lock();
        let interrupted: Vec<usize> = state
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, record)| record.status.is_interrupted())
            .map(|(position, _)| position)
            .collect();

        if interrupted.is_empty() {
            return Ok(Vec::new());
        }

        let previous: Vec<TaskRecord> = interrupted
            .iter()
            .map(|&position| state.tasks[position].clone())
            .collect();

        let outcome = interrupted
            .iter()
            .try_for_each(|&position| {
                TaskStateMachine::new(&mut state.tasks[position])
                    .transition(TaskEvent::fail_with_error(INTERRUPTED_DETAIL))
                    .map(|_| ())
            })
            .and_then(|()| self.flush(&state));

        if let Err(e) = outcome {
            for (&position, record) in interrupted.iter().zip(previous) {
                state.tasks[position] = record;
            }
            warn!(error = %e, "Rolled back interrupted task recovery");
            return Err(e);
        }

        let ids: Vec<TaskId> = interrupted
            .iter()
            .map(|&position| state.tasks[position].task_id)
            .collect();
        warn!(count = ids.len(), "Marked interrupted task records as failed");
        Ok(ids)
    }
}
