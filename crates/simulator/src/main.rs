//! HPA simulator daemon
//!
//! Watches a workload's pods and metrics and logs the replica count a
//! horizontal pod autoscaler would pick, without scaling anything.

use anyhow::{Context, Result};
use hpa_simulator::{
    api,
    config::SimulatorSettings,
    status::{shared_status, StatusReporter},
};
use simulator_lib::{
    health::components,
    source::{KubeMetricsClient, KubePodCache, SystemClock},
    ControlLoop, DecisionEngine, HealthRegistry, SimulatorMetrics, StructuredReporter,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SIMULATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = SIMULATOR_VERSION, "Starting hpa-simulator");

    let settings = SimulatorSettings::load()?;
    let simulation = Arc::new(
        settings
            .simulation_config()
            .context("Invalid simulation parameters")?,
    );
    let namespace = simulation.namespace.clone();
    let selector = simulation.selector.to_string();
    info!(
        namespace = %namespace,
        selector = %selector,
        resource = %simulation.resource,
        target_utilization = simulation.target_utilization_percent,
        tolerance = simulation.tolerance,
        "Simulator configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;
    let metrics = SimulatorMetrics::new();

    let loop_config = settings.loop_config();
    let status = shared_status(loop_config.initial_replicas);

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        status.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(settings.api_port, app_state));

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let pods = Arc::new(KubePodCache::start(
        client.clone(),
        &namespace,
        &simulation.selector,
    ));
    let engine = DecisionEngine::new(
        simulation.clone(),
        pods,
        Arc::new(KubeMetricsClient::new(client)),
        Arc::new(SystemClock),
    );

    engine
        .wait_for_sources()
        .await
        .context("Pod cache failed to synchronize")?;
    health_registry.set_ready(true).await;

    let reporter = Arc::new(StatusReporter::new(
        StructuredReporter::new(namespace, selector).with_health(health_registry.clone()),
        status,
    ));
    let control = ControlLoop::new(engine, reporter, loop_config);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut loop_handle = tokio::spawn(async move { control.run(shutdown_rx).await });

    let outcome = tokio::select! {
        result = &mut loop_handle => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received, shutting down");
            let _ = shutdown_tx.send(());
            loop_handle.await?
        }
    };

    api_handle.abort();

    match outcome {
        Ok(state) => {
            info!(current_replicas = state.current_replicas, "Simulator stopped");
            Ok(())
        }
        Err(e) => {
            health_registry
                .set_unhealthy(components::DECISION_ENGINE, e.to_string())
                .await;
            error!(error = %e, "Decision loop stopped on error");
            Err(e).context("Decision loop failed")
        }
    }
}
