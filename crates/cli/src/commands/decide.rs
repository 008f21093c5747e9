//! One-shot decision

use super::{live_engine, ClusterArgs};
use crate::output::{print_decision, print_observation, OutputFormat};
use anyhow::{Context, Result};
use simulator_lib::SimulationConfig;

pub async fn run(
    cluster: &ClusterArgs<'_>,
    config: SimulationConfig,
    current_replicas: u32,
    observe_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let resource = config.resource.clone();
    let engine = live_engine(cluster, config).await?;

    if observe_only {
        let observation = engine.observe().await.context("Observation failed")?;
        print_observation(&observation, &resource, format);
    } else {
        let decision = engine
            .decide(current_replicas)
            .await
            .context("Decision failed")?;
        print_decision(&decision, &resource, format);
    }

    Ok(())
}
