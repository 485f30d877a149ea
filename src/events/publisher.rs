use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::{RunId, TaskId};
use crate::state_machine::TaskStatus;

/// A status change observed on one task record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskLifecycleEvent {
    pub task_id: TaskId,
    /// Set when the transition happened inside a batch run
    pub run_id: Option<RunId>,
    pub source_ref: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub error_detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Broadcast publisher for task lifecycle events.
///
/// The presentation layer subscribes and renders status changes as they
/// happen; the orchestrator never reaches into UI objects.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<TaskLifecycleEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: TaskLifecycleEvent) {
        if self.sender.send(event).is_err() {
            trace!("No lifecycle event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
