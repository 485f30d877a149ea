#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # ID-Photo Batch Core
//!
//! Batch orchestration for converting uploaded photos into ID-photo outputs.
//!
//! ## Overview
//!
//! A caller submits a list of photos with a parameter bundle. Each photo becomes
//! a durable task record that moves through `Waiting -> Processing ->
//! {Completed, Failed}`. One photo failing never affects the rest of the
//! batch, failed records can be retried from their own parameter snapshot,
//! and the outputs of a run can be exported as a single archive.
//!
//! The photo pipeline itself (matting, face detection, layout, watermarking)
//! is not part of this crate; it is plugged in through [`PhotoProcessor`].
//!
//! ## Module Organization
//!
//! - [`models`] - Task records, batch runs, results and parameter bundles
//! - [`state_machine`] - Task lifecycle states, events and transition rules
//! - [`history`] - Durable JSON history with atomic writes
//! - [`orchestration`] - Batch runner, retry controller and the orchestrator facade
//! - [`aggregation`] - Output collection, run summaries and archive packaging
//! - [`events`] - Broadcast stream of task lifecycle events
//! - [`config`] - Configuration from defaults, files and environment
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod aggregation;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use aggregation::{ArtifactCache, CollectedOutput, ResultAggregator, RunSummary};
pub use config::OrchestratorConfig;
pub use error::{BatchError, Result};
pub use events::{EventPublisher, TaskLifecycleEvent};
pub use history::HistoryStore;
pub use logging::init_structured_logging;
pub use models::{
    Artifact, BatchRun, FailureKind, ParameterBundle, PhotoParameters, RunId, TaskId, TaskRecord,
    TaskResult,
};
pub use orchestration::{
    BatchCancellation, BatchOrchestrator, BatchReport, BatchRunner, FnProcessor, PhotoProcessor,
    ProgressReporter, RetryController,
};
pub use state_machine::{TaskEvent, TaskStatus};
