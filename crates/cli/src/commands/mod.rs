//! CLI subcommands

pub mod decide;
pub mod replay;
pub mod simulate;

use crate::output::print_info;
use anyhow::{Context, Result};
use simulator_lib::source::{KubeMetricsClient, KubePodCache, SystemClock};
use simulator_lib::{DecisionEngine, SimulationConfig};
use std::sync::Arc;

/// How to reach the cluster
pub struct ClusterArgs<'a> {
    pub kubeconfig: Option<&'a str>,
    pub context: Option<&'a str>,
}

/// Connect to the cluster and wait for the pod cache before returning
pub async fn live_engine(cluster: &ClusterArgs<'_>, config: SimulationConfig) -> Result<DecisionEngine> {
    let client = crate::config::kube_client(cluster.kubeconfig, cluster.context).await?;
    let config = Arc::new(config);

    let pods = Arc::new(KubePodCache::start(
        client.clone(),
        &config.namespace,
        &config.selector,
    ));
    let engine = DecisionEngine::new(
        config,
        pods,
        Arc::new(KubeMetricsClient::new(client)),
        Arc::new(SystemClock),
    );

    engine
        .wait_for_sources()
        .await
        .context("Pod cache failed to synchronize")?;

    Ok(engine)
}

/// Announce the workload being simulated (table output only)
pub fn print_target(config: &SimulationConfig) {
    let selector = config.selector.to_string();
    print_info(&format!(
        "{}/{} {} target {}% tolerance {}",
        config.namespace,
        if selector.is_empty() { "*" } else { selector.as_str() },
        config.resource,
        config.target_utilization_percent,
        config.tolerance
    ));
}
