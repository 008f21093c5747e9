//! Recorded cluster frames replayed as pods, metrics and time
//!
//! A fixture is a JSON document holding an ordered list of frames. Every
//! metrics listing moves to the next frame; pod listings and the clock read
//! whichever frame is current, so one decision cycle sees one frame.

use super::{async_trait, ClusterStateProvider, Clock, MetricsProvider};
use crate::error::SourceError;
use crate::models::{ReplicaUsage, ReplicaView};
use crate::selector::LabelSelector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Cluster state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureFrame {
    pub now: DateTime<Utc>,
    #[serde(default)]
    pub replicas: Vec<ReplicaView>,
    #[serde(default)]
    pub usage: Vec<ReplicaUsage>,
}

/// On-disk fixture document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub frames: Vec<FixtureFrame>,
}

/// Serves a [`Fixture`] through the source traits
#[derive(Debug)]
pub struct ReplayFixture {
    frames: Vec<FixtureFrame>,
    cursor: Mutex<Option<usize>>,
}

impl ReplayFixture {
    pub fn from_frames(frames: Vec<FixtureFrame>) -> Self {
        Self {
            frames,
            cursor: Mutex::new(None),
        }
    }

    /// Read a fixture document from disk, rejecting negative readings
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let raw = tokio::fs::read(path.as_ref()).await?;
        let fixture: Fixture = serde_json::from_slice(&raw)?;
        for frame in &fixture.frames {
            frame.replicas.iter().try_for_each(ReplicaView::validate)?;
            frame.usage.iter().try_for_each(ReplicaUsage::validate)?;
        }
        debug!(
            path = %path.as_ref().display(),
            frames = fixture.frames.len(),
            "Loaded replay fixture"
        );
        Ok(Self::from_frames(fixture.frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the frame currently being served, if any was consumed yet
    pub fn position(&self) -> Option<usize> {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current(&self) -> Option<&FixtureFrame> {
        self.frames.get(self.position().unwrap_or(0))
    }

    fn advance(&self) -> Result<&FixtureFrame, SourceError> {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let next = cursor.map_or(0, |i| i + 1);
        let frame = self.frames.get(next).ok_or(SourceError::FixtureExhausted {
            frames: self.frames.len(),
        })?;
        *cursor = Some(next);
        Ok(frame)
    }
}

#[async_trait]
impl ClusterStateProvider for ReplayFixture {
    async fn wait_for_initial_sync(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn list_replicas(
        &self,
        _namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<ReplicaView>, SourceError> {
        Ok(self
            .current()
            .map(|frame| {
                frame
                    .replicas
                    .iter()
                    .filter(|r| selector.matches(&r.labels))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl MetricsProvider for ReplayFixture {
    async fn list_usage(
        &self,
        _namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<ReplicaUsage>, SourceError> {
        let frame = self.advance()?;
        Ok(frame
            .usage
            .iter()
            .filter(|u| selector.matches(&u.labels))
            .cloned()
            .collect())
    }
}

impl Clock for ReplayFixture {
    fn now(&self) -> DateTime<Utc> {
        self.current()
            .map(|frame| frame.now)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
