//! Pod classification
//!
//! Splits the live pods into ready, ignored and missing groups. The order of
//! the checks matters: it decides which pods later get imputed usage.

use crate::config::SimulationConfig;
use crate::models::{ConditionStatus, MetricSnapshot, ReplicaPhase, ReplicaView, ResourceName};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Outcome of grouping the pods of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub ready_count: usize,
    /// Pending, unready or not yet trusted pods
    pub ignored: HashSet<String>,
    /// Pods without a metric in the snapshot
    pub missing: HashSet<String>,
}

/// Groups pods using lifecycle state and readiness timing
#[derive(Debug, Clone)]
pub struct ReplicaClassifier {
    resource: ResourceName,
    cpu_initialization_period: Duration,
    delay_of_initial_readiness_status: Duration,
    now: DateTime<Utc>,
}

impl ReplicaClassifier {
    pub fn new(
        resource: ResourceName,
        cpu_initialization_period: Duration,
        delay_of_initial_readiness_status: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            resource,
            cpu_initialization_period,
            delay_of_initial_readiness_status,
            now,
        }
    }

    pub fn from_config(config: &SimulationConfig, now: DateTime<Utc>) -> Self {
        Self::new(
            config.resource.clone(),
            config.cpu_initialization_period,
            config.delay_of_initial_readiness_status,
            now,
        )
    }

    pub fn classify(&self, pods: &[ReplicaView], metrics: &MetricSnapshot) -> Classification {
        let mut classification = Classification::default();

        for pod in pods {
            if pod.is_excluded() {
                continue;
            }

            if pod.phase == ReplicaPhase::Pending {
                classification.ignored.insert(pod.name.clone());
                continue;
            }

            let Some(metric) = metrics.get(&pod.name) else {
                classification.missing.insert(pod.name.clone());
                continue;
            };

            if self.resource.is_cpu() && self.ignore_cpu_sample(pod, metric.timestamp, metric.window)
            {
                classification.ignored.insert(pod.name.clone());
                continue;
            }

            classification.ready_count += 1;
        }

        debug!(
            ready = classification.ready_count,
            ignored = classification.ignored.len(),
            missing = classification.missing.len(),
            "Classified pods"
        );

        classification
    }

    fn ignore_cpu_sample(
        &self,
        pod: &ReplicaView,
        metric_timestamp: DateTime<Utc>,
        metric_window: Duration,
    ) -> bool {
        let (Some(condition), Some(start_time)) = (pod.ready_condition, pod.start_time) else {
            return true;
        };
        let unready = condition.status == ConditionStatus::False;

        if shift(start_time, self.cpu_initialization_period) > self.now {
            // Still initializing: distrust unready pods and samples that may
            // predate the last readiness transition.
            unready || metric_timestamp < shift(condition.last_transition_time, metric_window)
        } else {
            // Unready and never been ready since start.
            unready
                && shift(start_time, self.delay_of_initial_readiness_status)
                    > condition.last_transition_time
        }
    }
}

fn shift(instant: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|by| instant.checked_add_signed(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
