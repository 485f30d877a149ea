//! # Task Record Model
//!
//! Durable state of one unit of work (one uploaded photo) within a batch.
//!
//! ## Overview
//!
//! A `TaskRecord` is created in `Waiting` status when a batch is submitted and
//! is the only thing the history file stores per item. It carries the full
//! parameter snapshot used for processing so that a later retry reproduces
//! the original request without the caller re-supplying it.
//!
//! ## Key Features
//!
//! - **Immutable identity**: `task_id` and `source_ref` never change after creation
//! - **Parameter snapshot**: `parameters_snapshot` is captured at creation
//! - **State Machine Integration**: status changes go through
//!   [`TaskStateMachine`](crate::state_machine::TaskStateMachine)
//!
//! ## File Layout
//!
//! Serialized as one JSON object per record inside the history file:
//! `task_id`, `source_ref`, `status`, `error_detail`, `created_at`,
//! `updated_at`, `parameters_snapshot`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::parameters::ParameterBundle;
use crate::state_machine::TaskStatus;

/// Opaque, unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new random task ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Durable state of one submitted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    /// Identifier of the input, usually the uploaded file name or path
    pub source_ref: String,
    pub status: TaskStatus,
    /// Present iff the status is a failure (`Failed` or `Cancelled`)
    #[serde(default)]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub parameters_snapshot: ParameterBundle,
}

impl TaskRecord {
    /// Create a new `Waiting` record with a fresh identifier
    pub fn new(source_ref: impl Into<String>, parameters_snapshot: ParameterBundle) -> Self {
        let now = Utc::now();
        Self {
            task_id: TaskId::new(),
            source_ref: source_ref.into(),
            status: TaskStatus::Waiting,
            error_detail: None,
            created_at: now,
            updated_at: now,
            parameters_snapshot,
        }
    }

    /// Whether the presentation layer should offer the Retry action
    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    /// File name portion of `source_ref`, for display
    pub fn display_name(&self) -> &str {
        self.source_ref
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.source_ref)
    }

    /// Check the status/error-detail invariant. Returns a description of the
    /// violation, if any.
    pub fn invariant_violation(&self) -> Option<String> {
        let has_detail = self
            .error_detail
            .as_deref()
            .is_some_and(|detail| !detail.trim().is_empty());

        match (self.status.is_failure(), has_detail) {
            (true, false) => Some(format!(
                "task {} is {} without an error detail",
                self.task_id, self.status
            )),
            (false, _) if self.error_detail.is_some() => Some(format!(
                "task {} is {} but carries an error detail",
                self.task_id, self.status
            )),
            _ => None,
        }
    }
}
