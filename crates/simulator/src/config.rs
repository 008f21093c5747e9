//! Daemon configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use simulator_lib::config::{
    DEFAULT_CPU_INITIALIZATION_PERIOD, DEFAULT_INITIAL_READINESS_DELAY, DEFAULT_SYNC_INTERVAL,
    DEFAULT_TARGET_UTILIZATION_PERCENT, DEFAULT_TOLERANCE,
};
use simulator_lib::{ConfigError, ErrorPolicy, LoopConfig, ResourceName, SimulationConfig};
use std::time::Duration;

/// Settings read from `HPA_SIM_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSettings {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Label selector of the workload; empty selects every pod
    #[serde(default)]
    pub selector: String,

    #[serde(default = "default_resource")]
    pub resource: String,

    /// Target utilization, percent of request
    #[serde(default = "default_target_utilization")]
    pub target_utilization: u32,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default = "default_cpu_initialization_period")]
    pub cpu_initialization_period_secs: u64,

    #[serde(default = "default_initial_readiness_delay")]
    pub initial_readiness_delay_secs: u64,

    /// Seconds between decision cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// End the loop on the first failed cycle instead of retrying
    #[serde(default)]
    pub stop_on_error: bool,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_initial_replicas")]
    pub initial_replicas: u32,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_resource() -> String {
    ResourceName::CPU.to_string()
}

fn default_target_utilization() -> u32 {
    DEFAULT_TARGET_UTILIZATION_PERCENT
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_cpu_initialization_period() -> u64 {
    DEFAULT_CPU_INITIALIZATION_PERIOD.as_secs()
}

fn default_initial_readiness_delay() -> u64 {
    DEFAULT_INITIAL_READINESS_DELAY.as_secs()
}

fn default_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL.as_secs()
}

fn default_api_port() -> u16 {
    8080
}

fn default_initial_replicas() -> u32 {
    1
}

impl SimulatorSettings {
    /// Load settings from the environment
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("HPA_SIM").try_parsing(true))
            .build()
            .context("Failed to read HPA_SIM_* environment")?;
        Self::from_config(source)
    }

    pub fn from_config(source: config::Config) -> Result<Self> {
        source
            .try_deserialize()
            .context("Invalid simulator configuration")
    }

    pub fn simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        SimulationConfig::new(self.namespace.clone(), &self.selector)?
            .with_resource(ResourceName::new(self.resource.as_str()))
            .with_target_utilization(self.target_utilization)
            .with_tolerance(self.tolerance)
            .with_cpu_initialization_period(Duration::from_secs(self.cpu_initialization_period_secs))
            .with_initial_readiness_delay(Duration::from_secs(self.initial_readiness_delay_secs))
            .validate()
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            interval: Duration::from_secs(self.interval_secs),
            on_error: if self.stop_on_error {
                ErrorPolicy::Stop
            } else {
                ErrorPolicy::Continue
            },
            initial_replicas: self.initial_replicas,
        }
    }
}
