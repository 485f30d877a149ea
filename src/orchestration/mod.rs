//! # Orchestration
//!
//! Everything that moves task records through their lifecycle:
//!
//! - [`processor`]: boundary to the external photo pipeline
//! - [`item_executor`]: the per-item step (start, process with timeout, resolve)
//! - [`batch_runner`]: registration, ordered bounded-concurrency processing, run summary
//! - [`retry_controller`]: operator-initiated re-run of a failed record
//! - [`orchestrator`]: facade owning one history store
//!
//! Persisted state is only ever changed through the
//! [`HistoryStore`](crate::history::HistoryStore) API, reached via
//! [`StoreGateway`] so that a stalled flush cannot block the runtime.

pub mod batch_runner;
pub mod cancellation;
pub mod item_executor;
pub mod orchestrator;
pub mod processor;
pub mod progress;
pub mod retry_controller;
pub mod store_gateway;

pub use batch_runner::{BatchReport, BatchRunner};
pub use cancellation::BatchCancellation;
pub use item_executor::ItemExecutor;
pub use orchestrator::BatchOrchestrator;
pub use processor::{FnProcessor, PhotoProcessor};
pub use progress::ProgressReporter;
pub use retry_controller::RetryController;
pub use store_gateway::StoreGateway;
