use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BatchError, Result};

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "IDPHOTO_BATCH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub history_path: PathBuf,
    /// 1 processes items strictly one after another
    pub max_concurrent_items: usize,
    pub item_timeout_ms: u64,
    /// Deadline for a store call to start; a started call runs to completion
    pub store_timeout_ms: u64,
    /// Where archives are assembled; the system temp dir when unset
    pub archive_scratch_dir: Option<PathBuf>,
    pub event_channel_capacity: usize,
    pub recover_interrupted_on_open: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("task_history.json"),
            max_concurrent_items: 1,
            item_timeout_ms: 300_000,
            store_timeout_ms: 10_000,
            archive_scratch_dir: None,
            event_channel_capacity: 1000,
            recover_interrupted_on_open: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(history_path) = std::env::var("IDPHOTO_BATCH_HISTORY_PATH") {
            config.history_path = PathBuf::from(history_path);
        }

        if let Ok(max_concurrent) = std::env::var("IDPHOTO_BATCH_MAX_CONCURRENT_ITEMS") {
            config.max_concurrent_items = max_concurrent.parse().map_err(|e| {
                BatchError::Configuration(format!("Invalid max_concurrent_items: {e}"))
            })?;
        }

        if let Ok(item_timeout) = std::env::var("IDPHOTO_BATCH_ITEM_TIMEOUT_MS") {
            config.item_timeout_ms = item_timeout.parse().map_err(|e| {
                BatchError::Configuration(format!("Invalid item_timeout_ms: {e}"))
            })?;
        }

        if let Ok(store_timeout) = std::env::var("IDPHOTO_BATCH_STORE_TIMEOUT_MS") {
            config.store_timeout_ms = store_timeout.parse().map_err(|e| {
                BatchError::Configuration(format!("Invalid store_timeout_ms: {e}"))
            })?;
        }

        if let Ok(scratch_dir) = std::env::var("IDPHOTO_BATCH_ARCHIVE_SCRATCH_DIR") {
            config.archive_scratch_dir = Some(PathBuf::from(scratch_dir));
        }

        if let Ok(capacity) = std::env::var("IDPHOTO_BATCH_EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity = capacity.parse().map_err(|e| {
                BatchError::Configuration(format!("Invalid event_channel_capacity: {e}"))
            })?;
        }

        if let Ok(recover) = std::env::var("IDPHOTO_BATCH_RECOVER_INTERRUPTED_ON_OPEN") {
            config.recover_interrupted_on_open = recover.parse().map_err(|e| {
                BatchError::Configuration(format!("Invalid recover_interrupted_on_open: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML, YAML or JSON file (format taken from the extension),
    /// with `IDPHOTO_BATCH_*` environment variables taking precedence.
    /// Keys absent from both fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| {
                BatchError::Configuration(format!("Failed to load {}: {e}", path.display()))
            })?;

        let config: Self = settings.try_deserialize().map_err(|e| {
            BatchError::Configuration(format!("Invalid configuration in {}: {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_path.as_os_str().is_empty() {
            return Err(BatchError::Configuration(
                "history_path must not be empty".to_string(),
            ));
        }
        if self.max_concurrent_items == 0 {
            return Err(BatchError::Configuration(
                "max_concurrent_items must be at least 1".to_string(),
            ));
        }
        if self.item_timeout_ms == 0 {
            return Err(BatchError::Configuration(
                "item_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(BatchError::Configuration(
                "store_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(BatchError::Configuration(
                "event_channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn with_history_path(mut self, history_path: impl Into<PathBuf>) -> Self {
        self.history_path = history_path.into();
        self
    }
}
