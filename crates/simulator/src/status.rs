//! Loop status shared between the decision loop and the HTTP API

use async_trait::async_trait;
use serde::Serialize;
use simulator_lib::{Decision, DecisionError, Observation, Reporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// What `/status` reports about the decision loop
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopStatus {
    pub current_replicas: u32,
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    pub scale_transitions: u64,
    pub last_decision: Option<Decision>,
    /// Error of the most recent cycle, cleared by the next success
    pub last_error: Option<String>,
}

pub type SharedStatus = Arc<RwLock<LoopStatus>>;

pub fn shared_status(initial_replicas: u32) -> SharedStatus {
    Arc::new(RwLock::new(LoopStatus {
        current_replicas: initial_replicas,
        ..Default::default()
    }))
}

/// Records cycle outcomes into [`LoopStatus`] before forwarding them
pub struct StatusReporter<R> {
    inner: R,
    status: SharedStatus,
}

impl<R: Reporter> StatusReporter<R> {
    pub fn new(inner: R, status: SharedStatus) -> Self {
        Self { inner, status }
    }
}

#[async_trait]
impl<R: Reporter> Reporter for StatusReporter<R> {
    async fn cycle_completed(&self, decision: &Decision, elapsed: Duration) {
        {
            let mut status = self.status.write().await;
            status.completed_cycles += 1;
            status.last_decision = Some(decision.clone());
            status.last_error = None;
        }
        self.inner.cycle_completed(decision, elapsed).await;
    }

    async fn scale_transition(&self, from: u32, to: u32) {
        {
            let mut status = self.status.write().await;
            status.current_replicas = to;
            status.scale_transitions += 1;
        }
        self.inner.scale_transition(from, to).await;
    }

    async fn cycle_failed(&self, error: &DecisionError, current_replicas: Option<u32>) {
        {
            let mut status = self.status.write().await;
            status.failed_cycles += 1;
            status.last_error = Some(error.to_string());
        }
        self.inner.cycle_failed(error, current_replicas).await;
    }

    async fn observed(&self, observation: &Observation, elapsed: Duration) {
        self.inner.observed(observation, elapsed).await;
    }
}
