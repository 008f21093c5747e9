//! Replica decision engine
//!
//! Runs one poll cycle end to end: snapshot, classification, request
//! aggregation, utilization and finally the replica recommendation with its
//! tolerance deadband and missing/ignored imputation.

use super::classifier::{Classification, ReplicaClassifier};
use super::requests::aggregate_requests;
use super::snapshot::build_snapshot;
use super::utilization::{utilization_ratio, UtilizationSample};
use crate::config::SimulationConfig;
use crate::error::{DecisionError, DecisionResult};
use crate::models::{MetricSnapshot, ReplicaMetric, ReplicaUsage, ReplicaView, RequestTable};
use crate::source::{ClusterStateProvider, Clock, MetricsProvider};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Utilization and classification of one cycle, before any decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub utilization: UtilizationSample,
    pub ready: usize,
    pub ignored: usize,
    pub missing: usize,
    /// Latest metric timestamp in the snapshot
    pub timestamp: Option<DateTime<Utc>>,
}

/// Which branch of the decision produced the recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Ratio inside the deadband, count unchanged
    WithinTolerance,
    /// Scaled from the ready pods alone
    Scaled,
    /// Ratio after imputation inside the deadband, count unchanged
    ImputedWithinTolerance,
    /// Imputation reversed the scale direction, count unchanged
    DirectionFlipped,
    /// Scaled from the snapshot including imputed pods
    ImputedScaled,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithinTolerance => "within_tolerance",
            Self::Scaled => "scaled",
            Self::ImputedWithinTolerance => "imputed_within_tolerance",
            Self::DirectionFlipped => "direction_flipped",
            Self::ImputedScaled => "imputed_scaled",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one successful decision cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub current_replicas: u32,
    pub recommended_replicas: u32,
    pub reason: DecisionReason,
    pub observation: Observation,
    /// Utilization recomputed after imputation, when imputation ran
    pub rebalanced: Option<UtilizationSample>,
}

impl Decision {
    pub fn is_transition(&self) -> bool {
        self.recommended_replicas != self.current_replicas
    }
}

/// Working state after the measurement stages
struct Measured {
    metrics: MetricSnapshot,
    requests: RequestTable,
    classification: Classification,
    observation: Observation,
}

fn measure(
    config: &SimulationConfig,
    usage: &[ReplicaUsage],
    pods: &[ReplicaView],
    now: DateTime<Utc>,
) -> DecisionResult<Measured> {
    let snapshot = build_snapshot(usage, &config.resource, &config.namespace)?;

    if pods.is_empty() {
        return Err(DecisionError::NoReplicasMatched {
            namespace: config.namespace.clone(),
            selector: config.selector.to_string(),
        });
    }

    let classification = ReplicaClassifier::from_config(config, now).classify(pods, &snapshot.metrics);

    let mut metrics = snapshot.metrics;
    for name in &classification.ignored {
        metrics.remove(name);
    }

    let requests = aggregate_requests(pods, &config.resource)?;

    if metrics.is_empty() {
        return Err(DecisionError::EmptyPostFilterSnapshot);
    }

    let utilization = utilization_ratio(&metrics, &requests, config.target_utilization_percent)?;

    let observation = Observation {
        utilization,
        ready: classification.ready_count,
        ignored: classification.ignored.len(),
        missing: classification.missing.len(),
        timestamp: snapshot.timestamp,
    };

    Ok(Measured {
        metrics,
        requests,
        classification,
        observation,
    })
}

/// Compute utilization without recommending a replica count
pub fn observe_cycle(
    config: &SimulationConfig,
    usage: &[ReplicaUsage],
    pods: &[ReplicaView],
    now: DateTime<Utc>,
) -> DecisionResult<Observation> {
    measure(config, usage, pods, now).map(|measured| measured.observation)
}

/// Recommend a replica count from already fetched usage samples and pods.
///
/// The branches and their order mirror the upstream autoscaler: the deadband
/// is checked before any imputation, and a post-imputation direction flip
/// always keeps the current count.
pub fn decide_cycle(
    config: &SimulationConfig,
    current_replicas: u32,
    usage: &[ReplicaUsage],
    pods: &[ReplicaView],
    now: DateTime<Utc>,
) -> DecisionResult<Decision> {
    let Measured {
        mut metrics,
        requests,
        classification,
        observation,
    } = measure(config, usage, pods, now)?;

    let ratio = observation.utilization.ratio;
    let tolerance = config.tolerance;
    let rebalance_ignored = !classification.ignored.is_empty() && ratio > 1.0;

    let decision = |recommended_replicas, reason, rebalanced| Decision {
        current_replicas,
        recommended_replicas,
        reason,
        observation: observation.clone(),
        rebalanced,
    };

    if !rebalance_ignored && classification.missing.is_empty() {
        if (ratio - 1.0).abs() <= tolerance {
            return Ok(decision(current_replicas, DecisionReason::WithinTolerance, None));
        }
        let replicas = ceil_replicas(ratio, classification.ready_count);
        return Ok(decision(replicas, DecisionReason::Scaled, None));
    }

    if ratio < 1.0 {
        // scale-down: assume missing pods use their full request
        for name in &classification.missing {
            let request = requests.get(name).copied().unwrap_or_default();
            metrics.insert(name.clone(), ReplicaMetric::imputed(request));
        }
    } else if ratio > 1.0 {
        // scale-up: assume missing pods are idle
        for name in &classification.missing {
            metrics.insert(name.clone(), ReplicaMetric::imputed(0));
        }
    }

    if rebalance_ignored {
        for name in &classification.ignored {
            metrics.insert(name.clone(), ReplicaMetric::imputed(0));
        }
    }

    let rebalanced = utilization_ratio(&metrics, &requests, config.target_utilization_percent)?;
    let new_ratio = rebalanced.ratio;
    debug!(
        ratio,
        new_ratio,
        rebalance_ignored,
        missing = classification.missing.len(),
        "Recomputed utilization with imputed pods"
    );

    if (1.0 - new_ratio).abs() <= tolerance {
        return Ok(decision(
            current_replicas,
            DecisionReason::ImputedWithinTolerance,
            Some(rebalanced),
        ));
    }
    if (ratio < 1.0 && new_ratio > 1.0) || (ratio > 1.0 && new_ratio < 1.0) {
        return Ok(decision(
            current_replicas,
            DecisionReason::DirectionFlipped,
            Some(rebalanced),
        ));
    }

    let replicas = ceil_replicas(new_ratio, metrics.len());
    Ok(decision(replicas, DecisionReason::ImputedScaled, Some(rebalanced)))
}

fn ceil_replicas(ratio: f64, pods: usize) -> u32 {
    // float to int casts saturate, NaN becomes 0
    (ratio * pods as f64).ceil() as u32
}

/// Pulls fresh data from the sources and runs a cycle on it
#[derive(Clone)]
pub struct DecisionEngine {
    config: Arc<SimulationConfig>,
    cluster: Arc<dyn ClusterStateProvider>,
    metrics: Arc<dyn MetricsProvider>,
    clock: Arc<dyn Clock>,
}

impl DecisionEngine {
    pub fn new(
        config: Arc<SimulationConfig>,
        cluster: Arc<dyn ClusterStateProvider>,
        metrics: Arc<dyn MetricsProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            cluster,
            metrics,
            clock,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// One-time wait for the pod cache, done before the first cycle
    pub async fn wait_for_sources(&self) -> DecisionResult<()> {
        self.cluster.wait_for_initial_sync().await?;
        Ok(())
    }

    async fn fetch(&self) -> DecisionResult<(Vec<ReplicaUsage>, Vec<ReplicaView>, DateTime<Utc>)> {
        let namespace = &self.config.namespace;
        let selector = &self.config.selector;

        let usage = self.metrics.list_usage(namespace, selector).await?;
        if usage.is_empty() {
            return Err(DecisionError::NoMetricsAvailable);
        }
        let pods = self.cluster.list_replicas(namespace, selector).await?;

        Ok((usage, pods, self.clock.now()))
    }

    /// Recommend a replica count given the count currently in effect
    pub async fn decide(&self, current_replicas: u32) -> DecisionResult<Decision> {
        let (usage, pods, now) = self.fetch().await?;
        let decision = decide_cycle(&self.config, current_replicas, &usage, &pods, now)?;
        debug!(
            current = decision.current_replicas,
            recommended = decision.recommended_replicas,
            reason = %decision.reason,
            "Decision computed"
        );
        Ok(decision)
    }

    /// Measure utilization only
    pub async fn observe(&self) -> DecisionResult<Observation> {
        let (usage, pods, now) = self.fetch().await?;
        observe_cycle(&self.config, &usage, &pods, now)
    }
}
