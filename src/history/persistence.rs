//! On-disk layout of the history file.
//!
//! ```text
//! task_history.json
//! {
//!   "version": 1,
//!   "tasks": [ { task record }, ... ],        // insertion order
//!   "runs": [ { batch run summary }, ... ],
//!   "retired_task_ids": [ "...", ... ]        // deleted ids, never reissued
//! }
//! ```
//!
//! Every write goes to a temporary file in the same directory which is
//! synced and then renamed over the target, so readers never observe a
//! half-written file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{BatchError, Result};
use crate::models::{BatchRun, TaskId, TaskRecord};

pub const HISTORY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFile {
    pub version: u32,
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub runs: Vec<BatchRun>,
    #[serde(default)]
    pub retired_task_ids: Vec<TaskId>,
}

impl HistoryFile {
    pub fn empty() -> Self {
        Self {
            version: HISTORY_FORMAT_VERSION,
            ..Self::default()
        }
    }

    /// Reject content that parses but cannot be trusted
    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != HISTORY_FORMAT_VERSION {
            return Err(BatchError::corrupt_history(
                path,
                format!(
                    "unsupported format version {} (expected {HISTORY_FORMAT_VERSION})",
                    self.version
                ),
            ));
        }

        let mut seen = HashSet::with_capacity(self.tasks.len() + self.retired_task_ids.len());
        for id in &self.retired_task_ids {
            seen.insert(*id);
        }
        for record in &self.tasks {
            if !seen.insert(record.task_id) {
                return Err(BatchError::corrupt_history(
                    path,
                    format!("task id {} appears more than once", record.task_id),
                ));
            }
            if let Some(violation) = record.invariant_violation() {
                return Err(BatchError::corrupt_history(path, violation));
            }
        }

        let mut run_ids = HashSet::with_capacity(self.runs.len());
        for run in &self.runs {
            if !run_ids.insert(run.run_id) {
                return Err(BatchError::corrupt_history(
                    path,
                    format!("batch run {} appears more than once", run.run_id),
                ));
            }
        }

        Ok(())
    }
}

/// Load the history file. A missing file is `Ok(None)`; anything present
/// but unreadable is `CorruptHistory`.
pub fn load_history(path: &Path) -> Result<Option<HistoryFile>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BatchError::corrupt_history(path, format!("unreadable: {e}"))),
    };

    let history: HistoryFile = serde_json::from_slice(&content)
        .map_err(|e| BatchError::corrupt_history(path, format!("invalid JSON: {e}")))?;
    history.validate(path)?;

    Ok(Some(history))
}

/// Serialize and durably replace the history file
pub fn write_history(path: &Path, history: &HistoryFile) -> Result<()> {
    let json = serde_json::to_vec_pretty(history)
        .map_err(|e| BatchError::store_io("serialize", path, e))?;
    atomic_write(path, &json)
}

/// Atomic write via temp file + fsync + rename
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| BatchError::store_io("create temp file", path, e))?;
    temp.write_all(content)
        .map_err(|e| BatchError::store_io("write temp file", path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| BatchError::store_io("sync temp file", path, e))?;
    temp.persist(path)
        .map_err(|e| BatchError::store_io("rename temp file", path, e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParameterBundle;
    use crate::state_machine::TaskStatus;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let loaded = load_history(&temp.path().join("history.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");

        let mut history = HistoryFile::empty();
        history
            .tasks
            .push(TaskRecord::new("a.jpg", ParameterBundle::new().with("dpi", 300)));
        write_history(&path, &history).unwrap();

        let loaded = load_history(&path).unwrap().unwrap();
        assert_eq!(loaded, history);
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");
        fs::write(&path, b"{\"version\": 1, \"tasks\": [").unwrap();

        let err = load_history(&path).unwrap_err();
        assert!(matches!(err, BatchError::CorruptHistory { .. }));
    }

    #[test]
    fn test_duplicate_ids_are_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");

        let record = TaskRecord::new("a.jpg", ParameterBundle::default());
        let mut history = HistoryFile::empty();
        history.tasks.push(record.clone());
        history.tasks.push(record);
        write_history(&path, &history).unwrap();

        let err = load_history(&path).unwrap_err();
        assert!(matches!(err, BatchError::CorruptHistory { .. }));
    }

    #[test]
    fn test_failed_record_without_detail_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");

        let mut record = TaskRecord::new("a.jpg", ParameterBundle::default());
        record.status = TaskStatus::Failed;
        let mut history = HistoryFile::empty();
        history.tasks.push(record);
        write_history(&path, &history).unwrap();

        assert!(matches!(
            load_history(&path),
            Err(BatchError::CorruptHistory { .. })
        ));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");
        atomic_write(&path, b"{}").unwrap();
        atomic_write(&path, b"{\"a\":1}").unwrap();

        let entries: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_write_into_missing_directory_is_store_io() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone").join("history.json");
        let err = atomic_write(&path, b"{}").unwrap_err();
        assert!(matches!(err, BatchError::StoreIo { .. }));
    }
}
