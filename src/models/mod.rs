//! # Data Models
//!
//! Records persisted in the history file ([`TaskRecord`], [`BatchRun`]) and
//! the in-memory values exchanged with callers ([`TaskResult`],
//! [`Artifact`], [`ParameterBundle`]).

pub mod artifact;
pub mod batch_run;
pub mod parameters;
pub mod photo_parameters;
pub mod task_record;
pub mod task_result;

pub use artifact::Artifact;
pub use batch_run::{BatchRun, RunId};
pub use parameters::ParameterBundle;
pub use photo_parameters::{PhotoMode, PhotoParameters, PhotoSize, RenderMode, Watermark};
pub use task_record::{TaskId, TaskRecord};
pub use task_result::{FailureKind, TaskResult};
