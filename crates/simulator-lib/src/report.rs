//! Reporting sink for control loop events

use crate::decision::{Decision, Observation};
use crate::error::DecisionError;
use async_trait::async_trait;
use std::time::Duration;

/// Receives the outcome of every cycle; presentation is up to the implementor
#[async_trait]
pub trait Reporter: Send + Sync {
    /// A decision cycle succeeded
    async fn cycle_completed(&self, decision: &Decision, elapsed: Duration);

    /// The recommended count differs from the one in effect
    async fn scale_transition(&self, from: u32, to: u32);

    /// A cycle failed; `current_replicas` is left unchanged, and is `None`
    /// for observation-only cycles which track no count
    async fn cycle_failed(&self, error: &DecisionError, current_replicas: Option<u32>);

    /// An observation-only cycle succeeded
    async fn observed(&self, _observation: &Observation, _elapsed: Duration) {}
}
