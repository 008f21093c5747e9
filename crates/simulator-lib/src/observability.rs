//! Prometheus metrics and structured logging for decision cycles

use crate::decision::{Decision, Observation};
use crate::error::{DecisionError, SourceError};
use crate::health::{components, HealthRegistry};
use crate::report::Reporter;
use async_trait::async_trait;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Gauge, Histogram, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Buckets for cycle duration, dominated by API round trips (seconds)
const CYCLE_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static GLOBAL_METRICS: OnceLock<SimulatorMetricsInner> = OnceLock::new();

struct SimulatorMetricsInner {
    current_replicas: IntGauge,
    recommended_replicas: IntGauge,
    utilization_ratio: Gauge,
    current_utilization_percent: IntGauge,
    pods: IntGaugeVec,
    cycles: IntCounter,
    cycle_errors: IntCounterVec,
    scale_transitions: IntCounter,
    cycle_duration_seconds: Histogram,
}

impl SimulatorMetricsInner {
    fn new() -> Self {
        Self {
            current_replicas: register_int_gauge!(
                "hpa_simulator_current_replicas",
                "Replica count currently assumed by the simulator"
            )
            .expect("Failed to register current_replicas"),

            recommended_replicas: register_int_gauge!(
                "hpa_simulator_recommended_replicas",
                "Replica count recommended by the last successful cycle"
            )
            .expect("Failed to register recommended_replicas"),

            utilization_ratio: register_gauge!(
                "hpa_simulator_utilization_ratio",
                "Observed utilization relative to the target"
            )
            .expect("Failed to register utilization_ratio"),

            current_utilization_percent: register_int_gauge!(
                "hpa_simulator_current_utilization_percent",
                "Observed usage as a percentage of requests"
            )
            .expect("Failed to register current_utilization_percent"),

            pods: register_int_gauge_vec!(
                "hpa_simulator_pods",
                "Pods by classification in the last cycle",
                &["class"]
            )
            .expect("Failed to register pods"),

            cycles: register_int_counter!(
                "hpa_simulator_cycles_total",
                "Total number of completed cycles"
            )
            .expect("Failed to register cycles_total"),

            cycle_errors: register_int_counter_vec!(
                "hpa_simulator_cycle_errors_total",
                "Total number of failed cycles by error kind",
                &["kind"]
            )
            .expect("Failed to register cycle_errors_total"),

            scale_transitions: register_int_counter!(
                "hpa_simulator_scale_transitions_total",
                "Total number of replica count changes"
            )
            .expect("Failed to register scale_transitions_total"),

            cycle_duration_seconds: register_histogram!(
                "hpa_simulator_cycle_duration_seconds",
                "Time spent in one decision cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),
        }
    }
}

/// Handle to the process-wide simulator metrics
#[derive(Clone)]
pub struct SimulatorMetrics {
    inner: &'static SimulatorMetricsInner,
}

impl Default for SimulatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorMetrics {
    /// Registers the metrics with the default registry on first use
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(SimulatorMetricsInner::new),
        }
    }

    pub fn set_current_replicas(&self, replicas: u32) {
        self.inner.current_replicas.set(i64::from(replicas));
    }

    pub fn record_observation(&self, observation: &Observation, elapsed: Duration) {
        let inner = self.inner;
        inner.utilization_ratio.set(observation.utilization.ratio);
        inner
            .current_utilization_percent
            .set(observation.utilization.current_utilization);
        for (class, count) in [
            ("ready", observation.ready),
            ("ignored", observation.ignored),
            ("missing", observation.missing),
        ] {
            inner
                .pods
                .with_label_values(&[class])
                .set(i64::try_from(count).unwrap_or(i64::MAX));
        }
        inner.cycles.inc();
        inner.cycle_duration_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn record_decision(&self, decision: &Decision, elapsed: Duration) {
        self.record_observation(&decision.observation, elapsed);
        self.set_current_replicas(decision.current_replicas);
        self.inner
            .recommended_replicas
            .set(i64::from(decision.recommended_replicas));
    }

    pub fn inc_scale_transitions(&self) {
        self.inner.scale_transitions.inc();
    }

    pub fn inc_cycle_errors(&self, kind: &str) {
        self.inner.cycle_errors.with_label_values(&[kind]).inc();
    }
}

/// Health component blamed for a failed cycle
pub fn failing_component(error: &DecisionError) -> &'static str {
    match error {
        DecisionError::NoReplicasMatched { .. }
        | DecisionError::Source(SourceError::NotSynced(_)) => components::CLUSTER_CACHE,
        DecisionError::NoMetricsAvailable | DecisionError::Source(_) => components::METRICS_API,
        _ => components::DECISION_ENGINE,
    }
}

/// Reports cycles as `tracing` events and Prometheus metrics
#[derive(Clone)]
pub struct StructuredReporter {
    namespace: String,
    selector: String,
    metrics: SimulatorMetrics,
    health: Option<HealthRegistry>,
}

impl StructuredReporter {
    pub fn new(namespace: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            selector: selector.into(),
            metrics: SimulatorMetrics::new(),
            health: None,
        }
    }

    /// Also drive component health from cycle outcomes
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    async fn mark_all_healthy(&self) {
        if let Some(health) = &self.health {
            for name in components::ALL {
                health.set_healthy(name).await;
            }
        }
    }
}

#[async_trait]
impl Reporter for StructuredReporter {
    async fn cycle_completed(&self, decision: &Decision, elapsed: Duration) {
        let observation = &decision.observation;
        info!(
            event = "cycle_completed",
            namespace = %self.namespace,
            selector = %self.selector,
            ratio = observation.utilization.ratio,
            utilization_percent = observation.utilization.current_utilization,
            raw_average = observation.utilization.raw_average,
            ready = observation.ready,
            ignored = observation.ignored,
            missing = observation.missing,
            current_replicas = decision.current_replicas,
            recommended_replicas = decision.recommended_replicas,
            reason = %decision.reason,
            rebalanced_ratio = ?decision.rebalanced.map(|r| r.ratio),
            elapsed_ms = elapsed.as_millis() as u64,
            "Decision cycle completed"
        );
        self.metrics.record_decision(decision, elapsed);
        self.mark_all_healthy().await;
    }

    async fn scale_transition(&self, from: u32, to: u32) {
        info!(
            event = "scale_transition",
            namespace = %self.namespace,
            selector = %self.selector,
            from = from,
            to = to,
            "Replica count changed"
        );
        self.metrics.inc_scale_transitions();
        self.metrics.set_current_replicas(to);
    }

    async fn cycle_failed(&self, error: &DecisionError, current_replicas: Option<u32>) {
        warn!(
            event = "cycle_failed",
            namespace = %self.namespace,
            selector = %self.selector,
            kind = error.kind(),
            error = %error,
            current_replicas = current_replicas,
            "Decision cycle failed"
        );
        self.metrics.inc_cycle_errors(error.kind());
        if let Some(health) = &self.health {
            health
                .set_degraded(failing_component(error), error.to_string())
                .await;
        }
    }

    async fn observed(&self, observation: &Observation, elapsed: Duration) {
        info!(
            event = "utilization_observed",
            namespace = %self.namespace,
            selector = %self.selector,
            ratio = observation.utilization.ratio,
            utilization_percent = observation.utilization.current_utilization,
            raw_average = observation.utilization.raw_average,
            ready = observation.ready,
            ignored = observation.ignored,
            missing = observation.missing,
            "Utilization observed"
        );
        self.metrics.record_observation(observation, elapsed);
        self.mark_all_healthy().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionReason, UtilizationSample};
    use crate::health::ComponentStatus;
    use crate::models::ResourceName;

    fn decision() -> Decision {
        Decision {
            current_replicas: 3,
            recommended_replicas: 6,
            reason: DecisionReason::Scaled,
            observation: Observation {
                utilization: UtilizationSample {
                    ratio: 2.0,
                    current_utilization: 100,
                    raw_average: 200,
                },
                ready: 3,
                ignored: 0,
                missing: 0,
                timestamp: None,
            },
            rebalanced: None,
        }
    }

    #[test]
    fn test_metrics_are_exposed() {
        let metrics = SimulatorMetrics::new();
        metrics.record_decision(&decision(), Duration::from_millis(20));
        metrics.inc_scale_transitions();
        metrics.inc_cycle_errors("no_metrics_available");

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        for expected in [
            "hpa_simulator_current_replicas",
            "hpa_simulator_recommended_replicas",
            "hpa_simulator_utilization_ratio",
            "hpa_simulator_pods",
            "hpa_simulator_cycles_total",
            "hpa_simulator_cycle_errors_total",
            "hpa_simulator_scale_transitions_total",
            "hpa_simulator_cycle_duration_seconds",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_failing_component() {
        assert_eq!(
            failing_component(&DecisionError::NoMetricsAvailable),
            components::METRICS_API
        );
        assert_eq!(
            failing_component(&DecisionError::Source(SourceError::NotSynced("closed".into()))),
            components::CLUSTER_CACHE
        );
        assert_eq!(
            failing_component(&DecisionError::NoReplicasMatched {
                namespace: "default".into(),
                selector: "app=web".into(),
            }),
            components::CLUSTER_CACHE
        );
        assert_eq!(
            failing_component(&DecisionError::MissingRequest {
                resource: ResourceName::cpu()
            }),
            components::DECISION_ENGINE
        );
    }

    #[tokio::test]
    async fn test_reporter_drives_health() {
        let health = HealthRegistry::new();
        health.register_all().await;
        let reporter = StructuredReporter::new("default", "app=web").with_health(health.clone());

        reporter
            .cycle_failed(&DecisionError::EmptyPostFilterSnapshot, Some(3))
            .await;
        let status = health.health().await;
        assert_eq!(status.status, ComponentStatus::Degraded);
        assert_eq!(
            status.components[components::DECISION_ENGINE].status,
            ComponentStatus::Degraded
        );

        reporter
            .cycle_completed(&decision(), Duration::from_millis(5))
            .await;
        assert_eq!(health.health().await.status, ComponentStatus::Healthy);
    }
}
