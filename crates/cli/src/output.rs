//! Output formatting utilities

use async_trait::async_trait;
use chrono::Utc;
use clap::ValueEnum;
use colored::Colorize;
use serde_json::json;
use simulator_lib::{
    Decision, DecisionError, DecisionReason, Observation, Reporter, ResourceName,
};
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format, one document per event
    Json,
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print one JSON document on its own line
pub fn print_json_line(value: &serde_json::Value) {
    println!("{}", value);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format a milli-unit quantity of `resource` for display
pub fn format_quantity(resource: &ResourceName, milli: i64) -> String {
    if resource.is_cpu() {
        if milli >= 1000 {
            format!("{:.2}", milli as f64 / 1000.0)
        } else {
            format!("{}m", milli)
        }
    } else if resource.as_str() == ResourceName::MEMORY {
        format_bytes(u64::try_from(milli / 1000).unwrap_or(0))
    } else {
        format!("{}m", milli)
    }
}

/// Color a utilization ratio by scale direction
pub fn color_ratio(ratio: f64) -> String {
    let formatted = format!("{:.2}", ratio);
    if ratio > 1.0 {
        formatted.red().to_string()
    } else if ratio < 1.0 {
        formatted.blue().to_string()
    } else {
        formatted.green().to_string()
    }
}

pub fn color_reason(reason: DecisionReason) -> String {
    let text = reason.as_str();
    match reason {
        DecisionReason::Scaled | DecisionReason::ImputedScaled => text.yellow().to_string(),
        DecisionReason::DirectionFlipped => text.magenta().to_string(),
        DecisionReason::WithinTolerance | DecisionReason::ImputedWithinTolerance => {
            text.green().to_string()
        }
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn row(field: &'static str, value: impl ToString) -> FieldRow {
    FieldRow {
        field,
        value: value.to_string(),
    }
}

fn observation_rows(observation: &Observation, resource: &ResourceName) -> Vec<FieldRow> {
    let utilization = &observation.utilization;
    vec![
        row("Utilization", format!("{}%", utilization.current_utilization)),
        row("Ratio", color_ratio(utilization.ratio)),
        row("Average usage", format_quantity(resource, utilization.raw_average)),
        row("Ready pods", observation.ready),
        row("Ignored pods", observation.ignored),
        row("Missing pods", observation.missing),
        row(
            "Metrics at",
            observation
                .timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
    ]
}

/// Print a single decision
pub fn print_decision(decision: &Decision, resource: &ResourceName, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(text) = serde_json::to_string_pretty(decision) {
                println!("{}", text);
            }
        }
        OutputFormat::Table => {
            let mut rows = observation_rows(&decision.observation, resource);
            if let Some(rebalanced) = &decision.rebalanced {
                rows.push(row("Rebalanced ratio", color_ratio(rebalanced.ratio)));
            }
            rows.push(row("Reason", color_reason(decision.reason)));
            rows.push(row("Current replicas", decision.current_replicas));
            rows.push(row(
                "Recommended replicas",
                decision.recommended_replicas.to_string().bold(),
            ));

            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
        }
    }
}

/// Print a single observation
pub fn print_observation(observation: &Observation, resource: &ResourceName, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            if let Ok(text) = serde_json::to_string_pretty(observation) {
                println!("{}", text);
            }
        }
        OutputFormat::Table => {
            let rows = observation_rows(observation, resource);
            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
        }
    }
}

/// Prints control loop events to the terminal
pub struct ConsoleReporter {
    format: OutputFormat,
    resource: ResourceName,
}

impl ConsoleReporter {
    pub fn new(format: OutputFormat, resource: ResourceName) -> Self {
        Self { format, resource }
    }

    fn clock() -> String {
        Utc::now().format("%H:%M:%S").to_string().dimmed().to_string()
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn cycle_completed(&self, decision: &Decision, elapsed: Duration) {
        match self.format {
            OutputFormat::Json => print_json_line(&json!({
                "event": "cycle_completed",
                "elapsed_ms": elapsed.as_millis() as u64,
                "decision": decision,
            })),
            OutputFormat::Table => {
                let observation = &decision.observation;
                println!(
                    "{} ratio {} utilization {}% ready {} ignored {} missing {} -> {} replicas ({})",
                    Self::clock(),
                    color_ratio(observation.utilization.ratio),
                    observation.utilization.current_utilization,
                    observation.ready,
                    observation.ignored,
                    observation.missing,
                    decision.recommended_replicas.to_string().bold(),
                    color_reason(decision.reason),
                );
            }
        }
    }

    async fn scale_transition(&self, from: u32, to: u32) {
        match self.format {
            OutputFormat::Json => print_json_line(&json!({
                "event": "scale_transition",
                "from": from,
                "to": to,
            })),
            OutputFormat::Table => {
                let arrow = if to > from { "↑".red() } else { "↓".blue() };
                print_success(&format!("Scale {} {} -> {}", arrow, from, to.to_string().bold()));
            }
        }
    }

    async fn cycle_failed(&self, error: &DecisionError, current_replicas: Option<u32>) {
        match self.format {
            OutputFormat::Json => print_json_line(&json!({
                "event": "cycle_failed",
                "kind": error.kind(),
                "error": error.to_string(),
                "current_replicas": current_replicas,
            })),
            OutputFormat::Table => match current_replicas {
                Some(replicas) => print_error(&format!(
                    "{} cycle failed: {} (keeping {} replicas)",
                    Self::clock(),
                    error,
                    replicas
                )),
                None => print_error(&format!("{} cycle failed: {}", Self::clock(), error)),
            },
        }
    }

    async fn observed(&self, observation: &Observation, _elapsed: Duration) {
        match self.format {
            OutputFormat::Json => print_json_line(&json!({
                "event": "utilization_observed",
                "observation": observation,
            })),
            OutputFormat::Table => println!(
                "{} ratio {} utilization {}% average {} ready {} ignored {} missing {}",
                Self::clock(),
                color_ratio(observation.utilization.ratio),
                observation.utilization.current_utilization,
                format_quantity(&self.resource, observation.utilization.raw_average),
                observation.ready,
                observation.ignored,
                observation.missing,
            ),
        }
    }
}
