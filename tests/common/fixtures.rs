use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use idphoto_batch::{
    BatchOrchestrator, HistoryStore, OrchestratorConfig, ParameterBundle, PhotoProcessor,
};

/// A history file in its own temporary directory
pub struct TestHistory {
    pub temp: TempDir,
}

impl TestHistory {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.temp.path().join("task_history.json")
    }

    pub fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            item_timeout_ms: 5_000,
            store_timeout_ms: 5_000,
            ..OrchestratorConfig::default()
        }
        .with_history_path(self.path())
    }

    pub fn orchestrator(&self, processor: Arc<dyn PhotoProcessor>) -> BatchOrchestrator {
        BatchOrchestrator::open(self.config(), processor).expect("open orchestrator")
    }

    pub fn orchestrator_with(
        &self,
        processor: Arc<dyn PhotoProcessor>,
        configure: impl FnOnce(&mut OrchestratorConfig),
    ) -> BatchOrchestrator {
        let mut config = self.config();
        configure(&mut config);
        BatchOrchestrator::open(config, processor).expect("open orchestrator")
    }

    /// Open the same file again, as a restarted process would
    pub fn reopen_store(&self) -> HistoryStore {
        HistoryStore::open(self.path()).expect("reopen history")
    }
}

/// Parameter snapshot identifying the input it was built for
pub fn params_for(source_ref: &str) -> ParameterBundle {
    ParameterBundle::new()
        .with("background_color", "#628bce")
        .with("dpi", 300)
        .with("submitted_as", source_ref)
}

pub fn inputs(names: &[&str]) -> Vec<(String, ParameterBundle)> {
    names
        .iter()
        .map(|name| (name.to_string(), params_for(name)))
        .collect()
}
