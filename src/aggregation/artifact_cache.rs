use dashmap::DashMap;
use std::sync::Arc;

use crate::models::{Artifact, TaskId};

/// In-memory outputs of completed tasks, keyed by task id.
///
/// Artifacts are not written to the history file, so after a restart a
/// `Completed` record may have no cached outputs.
#[derive(Debug, Clone, Default)]
pub struct ArtifactCache {
    entries: Arc<DashMap<TaskId, Vec<Artifact>>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task_id: TaskId, outputs: Vec<Artifact>) {
        self.entries.insert(task_id, outputs);
    }

    pub fn get(&self, task_id: &TaskId) -> Option<Vec<Artifact>> {
        self.entries.get(task_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, task_id: &TaskId) -> Option<Vec<Artifact>> {
        self.entries.remove(task_id).map(|(_, outputs)| outputs)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.entries.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
