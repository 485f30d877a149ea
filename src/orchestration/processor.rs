//! # Processor Boundary
//!
//! The photo pipeline (matting, face detection, compositing, watermarking)
//! lives outside this crate. The orchestrator only sees it through
//! [`PhotoProcessor`]: give it a source reference and the parameter snapshot,
//! get back named artifacts or an error whose message becomes the record's
//! error detail.

use async_trait::async_trait;
use std::future::Future;

use crate::models::{Artifact, ParameterBundle};

/// Detail recorded when a processor fails with an empty message
pub const UNDESCRIBED_FAILURE: &str = "processor reported a failure without a message";

/// External processing function invoked once per item (and again on retry).
///
/// Implementations must not depend on being called only once: retry
/// re-invokes them with the same `source_ref` and `parameters`.
#[async_trait]
pub trait PhotoProcessor: Send + Sync {
    async fn process(
        &self,
        source_ref: &str,
        parameters: &ParameterBundle,
    ) -> anyhow::Result<Vec<Artifact>>;
}

/// Adapter turning an async closure into a [`PhotoProcessor`]
pub struct FnProcessor<F> {
    func: F,
}

impl<F> FnProcessor<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> std::fmt::Debug for FnProcessor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProcessor").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> PhotoProcessor for FnProcessor<F>
where
    F: Fn(String, ParameterBundle) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<Artifact>>> + Send + 'static,
{
    async fn process(
        &self,
        source_ref: &str,
        parameters: &ParameterBundle,
    ) -> anyhow::Result<Vec<Artifact>> {
        (self.func)(source_ref.to_string(), parameters.clone()).await
    }
}

/// Render a processor error as a non-empty error detail, keeping the
/// context chain
pub fn failure_detail(error: &anyhow::Error) -> String {
    let detail = format!("{error:#}");
    if detail.trim().is_empty() {
        UNDESCRIBED_FAILURE.to_string()
    } else {
        detail
    }
}
