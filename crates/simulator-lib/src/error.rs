//! Error types for the decision pipeline and its data sources

use crate::models::ResourceName;
use thiserror::Error;

/// Errors that abort a single decision cycle.
///
/// None of these are fatal to the process; the control loop decides whether
/// to keep polling.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("no pods matched selector {selector:?} in namespace {namespace}")]
    NoReplicasMatched { namespace: String, selector: String },

    #[error("no metrics returned from resource metrics API")]
    NoMetricsAvailable,

    #[error("missing request for {resource}")]
    MissingRequest { resource: ResourceName },

    #[error("no metrics returned matched known pods")]
    DisjointMetricsAndRequests,

    #[error("no metrics left after removing ignored pods")]
    EmptyPostFilterSnapshot,

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl DecisionError {
    /// Short stable label, used for metric labels and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            DecisionError::NoReplicasMatched { .. } => "no_replicas_matched",
            DecisionError::NoMetricsAvailable => "no_metrics_available",
            DecisionError::MissingRequest { .. } => "missing_request",
            DecisionError::DisjointMetricsAndRequests => "disjoint_metrics_and_requests",
            DecisionError::EmptyPostFilterSnapshot => "empty_post_filter_snapshot",
            DecisionError::Source(_) => "source",
        }
    }
}

/// Failures of the external pod and metrics providers
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("pod cache not synchronized: {0}")]
    NotSynced(String),

    #[error("invalid quantity {value:?}: {reason}")]
    InvalidQuantity { value: String, reason: String },

    #[error("malformed metrics object {name}: {reason}")]
    MalformedMetrics { name: String, reason: String },

    #[error("pod {pod} reported {resource} outside the valid range: {reason}")]
    OutOfRange {
        pod: String,
        resource: String,
        reason: &'static str,
    },

    #[error("fixture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fixture JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("replay fixture exhausted after {frames} frames")]
    FixtureExhausted { frames: usize },
}

/// Invalid simulation parameters
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid label selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("target utilization must be greater than zero")]
    ZeroTargetUtilization,

    #[error("tolerance must be a finite non-negative number, got {0}")]
    InvalidTolerance(f64),
}

pub type DecisionResult<T> = Result<T, DecisionError>;
