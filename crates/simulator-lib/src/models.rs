//! Core data models for the decision pipeline

use crate::error::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Name of a compute resource as used in pod specs and metrics (`cpu`, `memory`, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    pub const CPU: &'static str = "cpu";
    pub const MEMORY: &'static str = "memory";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn cpu() -> Self {
        Self::new(Self::CPU)
    }

    pub fn memory() -> Self {
        Self::new(Self::MEMORY)
    }

    /// CPU is the only resource whose samples are filtered by pod readiness
    pub fn is_cpu(&self) -> bool {
        self.0 == Self::CPU
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.trim()))
    }
}

/// One replica's aggregated resource usage, in milli-units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaMetric {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub window: Duration,
    pub value: i64,
}

impl ReplicaMetric {
    /// A synthetic metric carrying only a value, used when imputing usage
    pub fn imputed(value: i64) -> Self {
        Self {
            timestamp: DateTime::<Utc>::MIN_UTC,
            window: Duration::ZERO,
            value,
        }
    }
}

/// Replica name -> aggregated usage for one poll cycle
pub type MetricSnapshot = HashMap<String, ReplicaMetric>;

/// Replica name -> aggregated declared request (milli-units)
pub type RequestTable = HashMap<String, i64>;

/// Lifecycle phase of a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ReplicaPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl ReplicaPhase {
    /// Map a pod status phase string; anything unrecognised is `Unknown`
    pub fn from_phase(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// Status of a pod condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn from_status(status: &str) -> Self {
        match status {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }
}

/// The pod `Ready` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessCondition {
    pub status: ConditionStatus,
    pub last_transition_time: DateTime<Utc>,
}

/// Declared requests of a single container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRequests {
    pub name: String,
    #[serde(default)]
    pub requests: BTreeMap<ResourceName, i64>,
}

/// Read-only projection of a replica's lifecycle state for one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaView {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub deleting: bool,
    pub phase: ReplicaPhase,
    #[serde(default)]
    pub ready_condition: Option<ReadinessCondition>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub containers: Vec<ContainerRequests>,
}

impl ReplicaView {
    /// Deleting and failed replicas take no part in any calculation
    pub fn is_excluded(&self) -> bool {
        self.deleting || self.phase == ReplicaPhase::Failed
    }

    /// Reject negative requests
    pub fn validate(&self) -> Result<(), SourceError> {
        for container in &self.containers {
            check_non_negative(&self.name, &container.requests)?;
        }
        Ok(())
    }
}

fn check_non_negative(
    pod: &str,
    values: &BTreeMap<ResourceName, i64>,
) -> Result<(), SourceError> {
    match values.iter().find(|(_, value)| **value < 0) {
        Some((resource, _)) => Err(SourceError::OutOfRange {
            pod: pod.to_string(),
            resource: resource.to_string(),
            reason: "negative value",
        }),
        None => Ok(()),
    }
}

/// Raw usage reading of a single container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<ResourceName, i64>,
}

/// Raw per-container usage sample of one replica, as reported by the metrics API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaUsage {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub window: Duration,
    #[serde(default)]
    pub containers: Vec<ContainerUsage>,
}

/// Add one container's milli-value to a pod total
pub(crate) fn add_milli(
    pod: &str,
    resource: &ResourceName,
    total: i64,
    value: i64,
) -> Result<i64, SourceError> {
    let out_of_range = |reason| SourceError::OutOfRange {
        pod: pod.to_string(),
        resource: resource.to_string(),
        reason,
    };
    if value < 0 {
        return Err(out_of_range("negative value"));
    }
    total
        .checked_add(value)
        .ok_or_else(|| out_of_range("sum overflows"))
}

impl ReplicaUsage {
    /// Reject negative usage readings
    pub fn validate(&self) -> Result<(), SourceError> {
        for container in &self.containers {
            check_non_negative(&self.name, &container.usage)?;
        }
        Ok(())
    }
}

/// Serialize a `Duration` as (fractional) seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
