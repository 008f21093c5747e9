//! Live decision and watch loops

use super::{live_engine, print_target, ClusterArgs};
use crate::output::{print_success, ConsoleReporter, OutputFormat};
use anyhow::{Context, Result};
use simulator_lib::{ControlLoop, LoopConfig, SimulationConfig};
use std::sync::Arc;
use tokio::sync::broadcast;

fn shutdown_on_ctrl_c() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });
    rx
}

/// Run the decision loop until interrupted
pub async fn run(
    cluster: &ClusterArgs<'_>,
    config: SimulationConfig,
    loop_config: LoopConfig,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Table {
        print_target(&config);
    }
    let reporter = Arc::new(ConsoleReporter::new(format, config.resource.clone()));
    let engine = live_engine(cluster, config).await?;

    let control = ControlLoop::new(engine, reporter, loop_config);
    let state = control
        .run(shutdown_on_ctrl_c())
        .await
        .context("Decision loop stopped")?;

    if format == OutputFormat::Table {
        print_success(&format!(
            "Stopped with {} replicas",
            state.current_replicas
        ));
    }
    Ok(())
}

/// Report utilization until interrupted
pub async fn watch(
    cluster: &ClusterArgs<'_>,
    config: SimulationConfig,
    loop_config: LoopConfig,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Table {
        print_target(&config);
    }
    let reporter = Arc::new(ConsoleReporter::new(format, config.resource.clone()));
    let engine = live_engine(cluster, config).await?;

    ControlLoop::new(engine, reporter, loop_config)
        .watch(shutdown_on_ctrl_c())
        .await
        .context("Watch stopped")
}
