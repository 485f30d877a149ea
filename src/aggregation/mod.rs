//! # Result Aggregation
//!
//! Collects the outputs of completed tasks per batch run and packages them
//! into a single downloadable archive.

pub mod archive;
pub mod artifact_cache;
pub mod result_aggregator;

pub use archive::{export_archive, package, ARCHIVE_SCOPE};
pub use artifact_cache::ArtifactCache;
pub use result_aggregator::{CollectedOutput, ResultAggregator, RunSummary};
