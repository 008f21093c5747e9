//! Fixture replay

use crate::output::{print_json_line, print_success, print_warning, ConsoleReporter, OutputFormat};
use anyhow::{Context, Result};
use serde_json::json;
use simulator_lib::source::ReplayFixture;
use simulator_lib::{ControlLoop, DecisionEngine, LoopConfig, SimulationConfig};
use std::path::Path;
use std::sync::Arc;

/// Run one decision cycle per fixture frame, back to back
pub async fn run(
    path: &Path,
    config: SimulationConfig,
    loop_config: LoopConfig,
    format: OutputFormat,
) -> Result<()> {
    let fixture = Arc::new(
        ReplayFixture::load(path)
            .await
            .with_context(|| format!("Failed to load fixture {}", path.display()))?,
    );
    let frames = fixture.len();
    if frames == 0 && format == OutputFormat::Table {
        print_warning("Fixture has no frames");
    }

    let reporter = Arc::new(ConsoleReporter::new(format, config.resource.clone()));
    let engine = DecisionEngine::new(
        Arc::new(config),
        fixture.clone(),
        fixture.clone(),
        fixture,
    );
    let control = ControlLoop::new(engine, reporter, loop_config);

    let state = control
        .run_cycles(control.initial_state(), frames)
        .await
        .context("Replay stopped")?;

    match format {
        OutputFormat::Json => print_json_line(&json!({
            "event": "replay_finished",
            "frames": frames,
            "current_replicas": state.current_replicas,
        })),
        OutputFormat::Table => print_success(&format!(
            "Replayed {} frames, final replica count {}",
            frames, state.current_replicas
        )),
    }

    Ok(())
}
