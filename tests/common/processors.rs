//! Scripted processors standing in for the photo pipeline

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use idphoto_batch::models::Artifact;
use idphoto_batch::{ParameterBundle, PhotoProcessor};

/// What the processor does for one source reference
#[derive(Debug, Clone, PartialEq)]
pub enum Behaviour {
    Succeed,
    Fail(String),
    Panic(String),
    /// Never returns within any reasonable timeout
    Hang,
    /// Succeeds after the given delay
    Delay(Duration),
}

/// Processor whose outcome is scripted per `source_ref`. Unscripted inputs
/// succeed with two artifacts.
#[derive(Debug, Default)]
pub struct ScriptedProcessor {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    calls: Mutex<Vec<(String, ParameterBundle)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, source_ref: &str, behaviour: Behaviour) {
        self.behaviours.lock().insert(source_ref.to_string(), behaviour);
    }

    pub fn calls(&self) -> Vec<(String, ParameterBundle)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Artifacts produced for a successful input
pub fn outputs_for(source_ref: &str) -> Vec<Artifact> {
    vec![
        Artifact::new("standard.png", format!("standard:{source_ref}").into_bytes()),
        Artifact::new("hd.png", format!("hd:{source_ref}").into_bytes()),
    ]
}

#[async_trait]
impl PhotoProcessor for ScriptedProcessor {
    async fn process(
        &self,
        source_ref: &str,
        parameters: &ParameterBundle,
    ) -> anyhow::Result<Vec<Artifact>> {
        self.calls
            .lock()
            .push((source_ref.to_string(), parameters.clone()));
        let behaviour = self
            .behaviours
            .lock()
            .get(source_ref)
            .cloned()
            .unwrap_or(Behaviour::Succeed);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let outcome = match behaviour {
            Behaviour::Succeed => Ok(outputs_for(source_ref)),
            Behaviour::Fail(message) => Err(anyhow!(message)),
            Behaviour::Panic(message) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("{message}");
            }
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            Behaviour::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(outputs_for(source_ref))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
