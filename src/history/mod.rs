//! Durable task history.
//!
//! [`HistoryStore`] is the only shared mutable resource in the crate. The
//! batch runner and retry controller change persisted state exclusively
//! through its methods.

pub mod persistence;
pub mod store;

pub use persistence::{HistoryFile, HISTORY_FORMAT_VERSION};
pub use store::{AppliedTransition, HistoryStore, INTERRUPTED_DETAIL};
