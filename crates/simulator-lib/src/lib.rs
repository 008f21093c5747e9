//! Horizontal pod autoscaler decision simulator
//!
//! This crate provides:
//! - The replica decision pipeline (snapshot, classification, requests,
//!   utilization, recommendation)
//! - A control loop that re-runs the pipeline and reports transitions
//! - Live Kubernetes and recorded replay data sources
//! - Health checks and observability

pub mod config;
pub mod control;
pub mod decision;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod report;
pub mod selector;
pub mod source;

pub use config::{ErrorPolicy, LoopConfig, SimulationConfig};
pub use control::{ControlLoop, DecisionState};
pub use decision::{Decision, DecisionEngine, DecisionReason, Observation, UtilizationSample};
pub use error::{ConfigError, DecisionError, DecisionResult, SourceError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{SimulatorMetrics, StructuredReporter};
pub use report::Reporter;
pub use selector::LabelSelector;
