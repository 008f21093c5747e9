//! Live cluster sources backed by the Kubernetes API
//!
//! Pods are served from a reflector cache kept up to date by a background
//! watch; usage is listed on demand from the resource metrics API.

use super::{async_trait, ClusterStateProvider, MetricsProvider};
use crate::error::SourceError;
use crate::models::{
    ConditionStatus, ContainerRequests, ContainerUsage, ReadinessCondition, ReplicaPhase,
    ReplicaUsage, ReplicaView, ResourceName,
};
use crate::quantity::parse_milli;
use crate::selector::LabelSelector;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::{Container, Pod};
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, ResourceExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pod cache fed by a watch on the workload's namespace and selector
pub struct KubePodCache {
    store: Store<Pod>,
    task: JoinHandle<()>,
}

impl KubePodCache {
    /// Start watching pods; the cache fills asynchronously
    pub fn start(client: Client, namespace: &str, selector: &LabelSelector) -> Self {
        let api: Api<Pod> = Api::namespaced(client, namespace);
        let mut watch_config = watcher::Config::default();
        if !selector.is_empty() {
            watch_config = watch_config.labels(&selector.to_string());
        }

        let (store, writer) = reflector::store();
        let stream = reflector::reflector(writer, watcher(api, watch_config)).default_backoff();

        info!(namespace = %namespace, selector = %selector, "Starting pod watch");
        let task = tokio::spawn(async move {
            stream
                .for_each(|event| {
                    if let Err(e) = event {
                        warn!(error = %e, "Pod watch error, retrying with backoff");
                    }
                    futures_util::future::ready(())
                })
                .await;
            debug!("Pod watch stream ended");
        });

        Self { store, task }
    }
}

impl Drop for KubePodCache {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl ClusterStateProvider for KubePodCache {
    async fn wait_for_initial_sync(&self) -> Result<(), SourceError> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|e| SourceError::NotSynced(e.to_string()))?;
        info!(pods = self.store.state().len(), "Pod cache synchronized");
        Ok(())
    }

    async fn list_replicas(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<ReplicaView>, SourceError> {
        self.store
            .state()
            .iter()
            .filter(|pod| pod.namespace().as_deref() == Some(namespace))
            .filter(|pod| selector.matches(pod.labels()))
            .map(|pod| replica_view_from_pod(pod))
            .collect()
    }
}

/// Project a pod into the fields the classifier and request aggregation read
pub fn replica_view_from_pod(pod: &Pod) -> Result<ReplicaView, SourceError> {
    let status = pod.status.as_ref();

    let ready_condition = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
        .map(|c| ReadinessCondition {
            status: ConditionStatus::from_status(&c.status),
            // an unset transition time behaves like the zero time
            last_transition_time: c
                .last_transition_time
                .as_ref()
                .map(|t| t.0)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        });

    let containers = match pod.spec.as_ref() {
        Some(spec) => spec
            .containers
            .iter()
            .map(container_requests)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ReplicaView {
        name: pod.name_any(),
        labels: pod.labels().clone(),
        deleting: pod.metadata.deletion_timestamp.is_some(),
        phase: ReplicaPhase::from_phase(status.and_then(|s| s.phase.as_deref())),
        ready_condition,
        start_time: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
        containers,
    })
}

fn container_requests(container: &Container) -> Result<ContainerRequests, SourceError> {
    let mut requests = BTreeMap::new();
    if let Some(declared) = container.resources.as_ref().and_then(|r| r.requests.as_ref()) {
        for (resource, quantity) in declared {
            requests.insert(ResourceName::new(resource.as_str()), parse_milli(&quantity.0)?);
        }
    }
    Ok(ContainerRequests {
        name: container.name.clone(),
        requests,
    })
}

/// Lists `PodMetrics` from `metrics.k8s.io/v1beta1`
#[derive(Clone)]
pub struct KubeMetricsClient {
    client: Client,
    resource: ApiResource,
}

impl KubeMetricsClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: ApiResource {
                group: "metrics.k8s.io".into(),
                version: "v1beta1".into(),
                api_version: "metrics.k8s.io/v1beta1".into(),
                kind: "PodMetrics".into(),
                plural: "pods".into(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct PodMetricsBody {
    timestamp: DateTime<Utc>,
    window: String,
    #[serde(default)]
    containers: Vec<ContainerMetricsBody>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetricsBody {
    name: String,
    #[serde(default)]
    usage: BTreeMap<String, String>,
}

#[async_trait]
impl MetricsProvider for KubeMetricsClient {
    async fn list_usage(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<ReplicaUsage>, SourceError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &self.resource);
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(&selector.to_string());
        }

        let list = api.list(&params).await?;
        debug!(items = list.items.len(), namespace = %namespace, "Listed pod metrics");

        list.items.into_iter().map(usage_from_object).collect()
    }
}

fn usage_from_object(object: DynamicObject) -> Result<ReplicaUsage, SourceError> {
    let name = object.name_any();
    let malformed = |reason: String| SourceError::MalformedMetrics {
        name: name.clone(),
        reason,
    };

    let body: PodMetricsBody =
        serde_json::from_value(object.data.clone()).map_err(|e| malformed(e.to_string()))?;
    let window = parse_window(&body.window)
        .ok_or_else(|| malformed(format!("invalid window {:?}", body.window)))?;

    let containers = body
        .containers
        .into_iter()
        .map(|c| -> Result<ContainerUsage, SourceError> {
            let usage = c
                .usage
                .iter()
                .map(|(resource, quantity)| -> Result<(ResourceName, i64), SourceError> {
                    Ok((ResourceName::new(resource.as_str()), parse_milli(quantity)?))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            Ok(ContainerUsage { name: c.name, usage })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ReplicaUsage {
        labels: object.labels().clone(),
        name,
        timestamp: body.timestamp,
        window,
        containers,
    })
}

/// Parse a metrics window such as `30s`, `1m0s` or `15.5s`
pub fn parse_window(value: &str) -> Option<Duration> {
    let mut rest = value.trim();
    if rest.is_empty() {
        return None;
    }
    if rest == "0" {
        return Some(Duration::ZERO);
    }

    let mut total = 0f64;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
        let (number, tail) = rest.split_at(number_end);
        let number: f64 = number.parse().ok()?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let seconds_per_unit = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };

        total += number * seconds_per_unit;
        rest = tail;
    }

    Duration::try_from_secs_f64(total).ok()
}
