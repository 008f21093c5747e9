//! Resource request aggregation

use crate::error::{DecisionError, DecisionResult};
use crate::models::{add_milli, ReplicaView, RequestTable, ResourceName};

/// Sum the declared request for `resource` across each pod's containers.
///
/// Deleting and failed pods are skipped. Any container without a request for
/// the resource fails the whole aggregation; there is no partial table. So
/// does a negative request or a pod total that overflows.
pub fn aggregate_requests(pods: &[ReplicaView], resource: &ResourceName) -> DecisionResult<RequestTable> {
    let mut requests = RequestTable::with_capacity(pods.len());

    for pod in pods.iter().filter(|pod| !pod.is_excluded()) {
        let mut pod_sum = 0i64;
        for container in &pod.containers {
            let request = container
                .requests
                .get(resource)
                .ok_or_else(|| DecisionError::MissingRequest {
                    resource: resource.clone(),
                })?;
            pod_sum = add_milli(&pod.name, resource, pod_sum, *request)?;
        }
        requests.insert(pod.name.clone(), pod_sum);
    }

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::models::{ContainerRequests, ReplicaPhase};
    use std::collections::BTreeMap;

    fn container(name: &str, cpu: Option<i64>) -> ContainerRequests {
        let mut requests = BTreeMap::new();
        if let Some(cpu) = cpu {
            requests.insert(ResourceName::cpu(), cpu);
        }
        ContainerRequests {
            name: name.to_string(),
            requests,
        }
    }

    fn pod(name: &str, phase: ReplicaPhase, containers: Vec<ContainerRequests>) -> ReplicaView {
        ReplicaView {
            name: name.to_string(),
            labels: BTreeMap::new(),
            deleting: false,
            phase,
            ready_condition: None,
            start_time: None,
            containers,
        }
    }

    #[test]
    fn test_sums_container_requests() {
        let pods = vec![
            pod("a", ReplicaPhase::Running, vec![container("app", Some(200)), container("proxy", Some(50))]),
            pod("b", ReplicaPhase::Pending, vec![container("app", Some(200))]),
        ];

        let requests = aggregate_requests(&pods, &ResourceName::cpu()).unwrap();

        assert_eq!(requests["a"], 250);
        assert_eq!(requests["b"], 200);
    }

    #[test]
    fn test_missing_request_fails() {
        let pods = vec![
            pod("a", ReplicaPhase::Running, vec![container("app", Some(200))]),
            pod("b", ReplicaPhase::Running, vec![container("app", Some(200)), container("proxy", None)]),
        ];

        let result = aggregate_requests(&pods, &ResourceName::cpu());

        match result {
            Err(DecisionError::MissingRequest { resource }) => assert_eq!(resource, ResourceName::cpu()),
            other => panic!("expected MissingRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_requests_fail() {
        let negative = vec![pod("a", ReplicaPhase::Running, vec![container("app", Some(-1))])];
        assert!(matches!(
            aggregate_requests(&negative, &ResourceName::cpu()),
            Err(DecisionError::Source(SourceError::OutOfRange { .. }))
        ));

        let huge = vec![pod(
            "a",
            ReplicaPhase::Running,
            vec![container("app", Some(i64::MAX)), container("proxy", Some(i64::MAX))],
        )];
        assert!(matches!(
            aggregate_requests(&huge, &ResourceName::cpu()),
            Err(DecisionError::Source(SourceError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_excluded_pods_are_skipped() {
        let mut deleting = pod("a", ReplicaPhase::Running, vec![container("app", None)]);
        deleting.deleting = true;
        let failed = pod("b", ReplicaPhase::Failed, vec![container("app", None)]);

        let requests = aggregate_requests(&[deleting, failed], &ResourceName::cpu()).unwrap();

        assert!(requests.is_empty());
    }

    #[test]
    fn test_request_for_other_resource_does_not_count() {
        let mut memory_only = BTreeMap::new();
        memory_only.insert(ResourceName::memory(), 1024);
        let pods = vec![pod(
            "a",
            ReplicaPhase::Running,
            vec![ContainerRequests {
                name: "app".to_string(),
                requests: memory_only,
            }],
        )];

        assert!(aggregate_requests(&pods, &ResourceName::cpu()).is_err());
        assert_eq!(aggregate_requests(&pods, &ResourceName::memory()).unwrap()["a"], 1024);
    }
}
