//! Simulation parameters

use crate::error::ConfigError;
use crate::models::ResourceName;
use crate::selector::LabelSelector;
use std::time::Duration;

/// Grace period after start during which unready CPU samples are distrusted
pub const DEFAULT_CPU_INITIALIZATION_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Delay after start before an unready pod is considered to have been ready once
pub const DEFAULT_INITIAL_READINESS_DELAY: Duration = Duration::from_secs(30);

pub const DEFAULT_TARGET_UTILIZATION_PERCENT: u32 = 50;

pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Default time between decision cycles (the autoscaler's sync period)
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15);

/// Immutable per-run parameters shared by every pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Namespace of the observed workload
    pub namespace: String,
    /// Selects the workload's pods
    pub selector: LabelSelector,
    /// Resource the target utilization applies to
    pub resource: ResourceName,
    pub cpu_initialization_period: Duration,
    pub delay_of_initial_readiness_status: Duration,
    /// Target average utilization, percent of request
    pub target_utilization_percent: u32,
    /// Deadband around a usage ratio of 1.0
    pub tolerance: f64,
}

impl SimulationConfig {
    /// Create a configuration with the autoscaler's default tuning
    pub fn new(namespace: impl Into<String>, selector: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            namespace: namespace.into(),
            selector: LabelSelector::parse(selector)?,
            resource: ResourceName::cpu(),
            cpu_initialization_period: DEFAULT_CPU_INITIALIZATION_PERIOD,
            delay_of_initial_readiness_status: DEFAULT_INITIAL_READINESS_DELAY,
            target_utilization_percent: DEFAULT_TARGET_UTILIZATION_PERCENT,
            tolerance: DEFAULT_TOLERANCE,
        })
    }

    pub fn with_resource(mut self, resource: ResourceName) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_target_utilization(mut self, percent: u32) -> Self {
        self.target_utilization_percent = percent;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_cpu_initialization_period(mut self, period: Duration) -> Self {
        self.cpu_initialization_period = period;
        self
    }

    pub fn with_initial_readiness_delay(mut self, delay: Duration) -> Self {
        self.delay_of_initial_readiness_status = delay;
        self
    }

    /// Check the parameters; returns the config so it can end a builder chain
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.target_utilization_percent == 0 {
            return Err(ConfigError::ZeroTargetUtilization);
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        Ok(self)
    }
}

/// What the control loop does when a cycle fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Report the failure and retry on the next tick
    #[default]
    Continue,
    /// Report the failure and return it from the loop
    Stop,
}

/// Configuration for the decision control loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between cycles
    pub interval: Duration,
    /// Behaviour on cycle failure
    pub on_error: ErrorPolicy,
    /// Replica count assumed before the first decision
    pub initial_replicas: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            on_error: ErrorPolicy::Continue,
            initial_replicas: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_config_defaults() {
        let config = SimulationConfig::new("default", "app=web").unwrap();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.resource, ResourceName::cpu());
        assert_eq!(config.cpu_initialization_period, Duration::from_secs(300));
        assert_eq!(config.delay_of_initial_readiness_status, Duration::from_secs(30));
        assert_eq!(config.target_utilization_percent, 50);
        assert_eq!(config.tolerance, 0.1);
        assert_eq!(config.selector.to_string(), "app=web");
    }

    #[test]
    fn test_simulation_config_rejects_bad_selector() {
        assert!(SimulationConfig::new("default", "app=,,").is_err());
    }

    #[test]
    fn test_validate() {
        let config = SimulationConfig::new("default", "").unwrap();
        assert!(config.clone().validate().is_ok());
        assert_eq!(
            config.clone().with_target_utilization(0).validate(),
            Err(ConfigError::ZeroTargetUtilization)
        );
        assert!(config.clone().with_tolerance(-0.5).validate().is_err());
        assert!(config.with_tolerance(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_loop_config_default() {
        let config = LoopConfig::default();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.on_error, ErrorPolicy::Continue);
        assert_eq!(config.initial_replicas, 1);
    }
}
