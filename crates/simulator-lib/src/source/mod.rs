//! Pod and metrics data sources
//!
//! The decision pipeline only pulls from these traits, so it behaves the same
//! against a live cluster, a replay fixture or a test double.

mod kubernetes;
mod replay;

pub use kubernetes::{parse_window, replica_view_from_pod, KubeMetricsClient, KubePodCache};
pub use replay::{Fixture, FixtureFrame, ReplayFixture};

use crate::error::SourceError;
use crate::models::{ReplicaUsage, ReplicaView};
use crate::selector::LabelSelector;
use chrono::{DateTime, Utc};

pub use async_trait::async_trait;

/// Supplies the current pod set, typically from a locally cached view
#[async_trait]
pub trait ClusterStateProvider: Send + Sync {
    /// Block until the cache has completed its first full listing
    async fn wait_for_initial_sync(&self) -> Result<(), SourceError>;

    /// List the pods matching `selector` in `namespace`
    async fn list_replicas(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<ReplicaView>, SourceError>;
}

/// Supplies raw per-container usage samples
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// List usage samples for the pods matching `selector`; may be empty
    async fn list_usage(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<ReplicaUsage>, SourceError>;
}

/// Source of the current instant used for readiness timing
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
