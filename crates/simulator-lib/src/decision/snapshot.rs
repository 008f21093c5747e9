//! Metric snapshot construction
//!
//! Folds the per-container usage samples reported by the metrics API into a
//! single value per pod.

use crate::error::{DecisionError, DecisionResult};
use crate::models::{add_milli, MetricSnapshot, ReplicaMetric, ReplicaUsage, ResourceName};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Aggregated usage of every pod with a complete sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSnapshot {
    pub metrics: MetricSnapshot,
    /// Latest sample timestamp among the included pods
    pub timestamp: Option<DateTime<Utc>>,
}

/// Build a snapshot for `resource` from raw metrics API samples.
///
/// A pod is dropped (not zero-filled) when any of its containers has no
/// reading for the resource, or when it reports no containers at all; it will
/// surface as missing during classification. Negative readings and sums that
/// overflow fail the cycle.
pub fn build_snapshot(
    samples: &[ReplicaUsage],
    resource: &ResourceName,
    namespace: &str,
) -> DecisionResult<ResourceSnapshot> {
    if samples.is_empty() {
        return Err(DecisionError::NoMetricsAvailable);
    }

    let mut snapshot = ResourceSnapshot {
        metrics: MetricSnapshot::with_capacity(samples.len()),
        timestamp: None,
    };

    for sample in samples {
        if sample.containers.is_empty() {
            warn!(
                pod = %sample.name,
                namespace = %namespace,
                resource = %resource,
                "Pod reported no container metrics, dropping"
            );
            continue;
        }

        let mut pod_sum = 0i64;
        let mut complete = true;
        for container in &sample.containers {
            match container.usage.get(resource) {
                Some(value) => {
                    debug!(
                        pod = %sample.name,
                        container = %container.name,
                        usage_milli = *value,
                        "Container metrics"
                    );
                    pod_sum = add_milli(&sample.name, resource, pod_sum, *value)?;
                }
                None => {
                    warn!(
                        pod = %sample.name,
                        namespace = %namespace,
                        container = %container.name,
                        resource = %resource,
                        "Missing resource metric for container, dropping pod"
                    );
                    complete = false;
                    break;
                }
            }
        }

        if !complete {
            continue;
        }

        snapshot.metrics.insert(
            sample.name.clone(),
            ReplicaMetric {
                timestamp: sample.timestamp,
                window: sample.window,
                value: pod_sum,
            },
        );
        snapshot.timestamp = snapshot.timestamp.max(Some(sample.timestamp));
    }

    Ok(snapshot)
}
