//! Utilization ratio calculation

use crate::error::{DecisionError, DecisionResult};
use crate::models::{MetricSnapshot, RequestTable};
use serde::Serialize;
use tracing::debug;

/// Aggregate utilization of the pods present in both metrics and requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UtilizationSample {
    /// Current utilization relative to target; 1.0 is exactly on target
    pub ratio: f64,
    /// Total usage as a whole percent of total requests (truncated)
    pub current_utilization: i64,
    /// Mean raw usage per participating pod, in milli-units
    pub raw_average: i64,
}

/// Compute the usage ratio against `target_utilization_percent`.
///
/// Metrics without a matching request are skipped. Fails when no requests
/// were accumulated, which happens when the two key sets are disjoint.
pub fn utilization_ratio(
    metrics: &MetricSnapshot,
    requests: &RequestTable,
    target_utilization_percent: u32,
) -> DecisionResult<UtilizationSample> {
    // i64 pod values summed in i128 cannot overflow
    let mut metrics_total = 0i128;
    let mut requests_total = 0i128;
    let mut entries = 0i128;

    for (pod, metric) in metrics {
        let Some(request) = requests.get(pod) else {
            continue;
        };

        metrics_total += i128::from(metric.value);
        requests_total += i128::from(*request);
        entries += 1;

        debug!(
            pod = %pod,
            usage_milli = metric.value,
            request_milli = *request,
            utilization_percent = percent_of(i128::from(metric.value), i128::from(*request)),
            "Pod resource utilization"
        );
    }

    if requests_total == 0 {
        return Err(DecisionError::DisjointMetricsAndRequests);
    }

    let current_utilization = percent_of(metrics_total, requests_total);
    debug!(
        utilization_percent = current_utilization,
        pods = entries as u64,
        "Workload resource utilization"
    );

    Ok(UtilizationSample {
        ratio: current_utilization as f64 / f64::from(target_utilization_percent),
        current_utilization,
        raw_average: saturate(metrics_total / entries),
    })
}

fn percent_of(usage: i128, request: i128) -> i64 {
    if request == 0 {
        return 0;
    }
    saturate(usage.saturating_mul(100) / request)
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReplicaMetric;

    fn metrics(entries: &[(&str, i64)]) -> MetricSnapshot {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), ReplicaMetric::imputed(*value)))
            .collect()
    }

    fn requests(entries: &[(&str, i64)]) -> RequestTable {
        entries.iter().map(|(name, value)| (name.to_string(), *value)).collect()
    }

    #[test]
    fn test_three_pods_at_double_target() {
        let sample = utilization_ratio(
            &metrics(&[("a", 100), ("b", 200), ("c", 300)]),
            &requests(&[("a", 200), ("b", 200), ("c", 200)]),
            50,
        )
        .unwrap();

        assert_eq!(sample.current_utilization, 100);
        assert_eq!(sample.ratio, 2.0);
        assert_eq!(sample.raw_average, 200);
    }

    #[test]
    fn test_utilization_truncates_on_aggregate() {
        // 100 / 300 = 33.33% -> 33
        let sample = utilization_ratio(&metrics(&[("a", 100)]), &requests(&[("a", 300)]), 50).unwrap();

        assert_eq!(sample.current_utilization, 33);
        assert_eq!(sample.ratio, 33.0 / 50.0);
    }

    #[test]
    fn test_extraneous_metrics_are_skipped() {
        let sample = utilization_ratio(
            &metrics(&[("a", 100), ("stray", 5000)]),
            &requests(&[("a", 100)]),
            100,
        )
        .unwrap();

        assert_eq!(sample.current_utilization, 100);
        assert_eq!(sample.ratio, 1.0);
        assert_eq!(sample.raw_average, 100);
    }

    #[test]
    fn test_large_totals_do_not_overflow() {
        let half = i64::MAX / 2 + 1;
        let sample = utilization_ratio(
            &metrics(&[("a", half), ("b", half)]),
            &requests(&[("a", half), ("b", half)]),
            100,
        )
        .unwrap();

        assert_eq!(sample.current_utilization, 100);
        assert_eq!(sample.ratio, 1.0);
        assert_eq!(sample.raw_average, half);
    }

    #[test]
    fn test_disjoint_inputs_fail() {
        let result = utilization_ratio(&metrics(&[("a", 100)]), &requests(&[("b", 100)]), 50);
        assert!(matches!(result, Err(DecisionError::DisjointMetricsAndRequests)));
    }

    #[test]
    fn test_zero_requests_fail() {
        let result = utilization_ratio(&metrics(&[("a", 100)]), &requests(&[("a", 0)]), 50);
        assert!(matches!(result, Err(DecisionError::DisjointMetricsAndRequests)));
    }
}
