use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a task record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    /// Record created at submission, not yet picked up
    #[default]
    Waiting,
    /// The processor is running for this record
    Processing,
    /// Processing finished and produced outputs
    Completed,
    /// Processing failed; may be re-opened by a retry
    Failed,
    /// Batch was cancelled before this record was processed
    Cancelled,
}

impl TaskStatus {
    /// Check if the record has finished its current attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Only failed records may be retried. Cancelled records are a
    /// non-retryable failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if this status must carry a non-empty error detail
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Left behind by a process that stopped mid-batch
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Waiting | Self::Processing)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Processing => write!(f, "Processing"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Ok(Self::Waiting),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}
