//! Control loop driving the decision engine
//!
//! The loop owns the only cross-cycle state, the replica count in effect.
//! Cycles run strictly one after another; each one re-reads fresh state
//! from the sources.

use crate::config::{ErrorPolicy, LoopConfig};
use crate::decision::{Decision, DecisionEngine};
use crate::error::{DecisionError, DecisionResult};
use crate::report::Reporter;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// State threaded from one cycle into the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionState {
    pub current_replicas: u32,
}

impl DecisionState {
    pub fn new(current_replicas: u32) -> Self {
        Self { current_replicas }
    }
}

pub struct ControlLoop {
    engine: DecisionEngine,
    reporter: Arc<dyn Reporter>,
    config: LoopConfig,
}

impl ControlLoop {
    pub fn new(engine: DecisionEngine, reporter: Arc<dyn Reporter>, config: LoopConfig) -> Self {
        Self {
            engine,
            reporter,
            config,
        }
    }

    pub fn initial_state(&self) -> DecisionState {
        DecisionState::new(self.config.initial_replicas)
    }

    /// Run a single decision cycle.
    ///
    /// The returned state carries the recommended count on success and the
    /// unchanged input state on failure.
    pub async fn step(&self, state: DecisionState) -> (DecisionState, DecisionResult<Decision>) {
        let start = Instant::now();

        match self.engine.decide(state.current_replicas).await {
            Ok(decision) => {
                self.reporter.cycle_completed(&decision, start.elapsed()).await;

                let next = if decision.is_transition() {
                    self.reporter
                        .scale_transition(state.current_replicas, decision.recommended_replicas)
                        .await;
                    DecisionState::new(decision.recommended_replicas)
                } else {
                    state
                };
                (next, Ok(decision))
            }
            Err(e) => {
                self.reporter
                    .cycle_failed(&e, Some(state.current_replicas))
                    .await;
                (state, Err(e))
            }
        }
    }

    fn should_stop(&self, result: &DecisionResult<Decision>) -> bool {
        result.is_err() && self.config.on_error == ErrorPolicy::Stop
    }

    /// Run `cycles` back to back without waiting between them
    pub async fn run_cycles(
        &self,
        mut state: DecisionState,
        cycles: usize,
    ) -> Result<DecisionState, DecisionError> {
        for cycle in 0..cycles {
            let (next, result) = self.step(state).await;
            state = next;
            debug!(cycle, current_replicas = state.current_replicas, "Cycle finished");
            if self.should_stop(&result) {
                return result.map(|_| state);
            }
        }
        Ok(state)
    }

    /// Run cycles on the configured interval until shutdown.
    ///
    /// With [`ErrorPolicy::Stop`] the first failed cycle ends the loop and its
    /// error is returned.
    pub async fn run(
        &self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<DecisionState, DecisionError> {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            initial_replicas = self.config.initial_replicas,
            on_error = ?self.config.on_error,
            "Starting decision loop"
        );

        let mut state = self.initial_state();
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (next, result) = self.step(state).await;
                    state = next;
                    if self.should_stop(&result) {
                        return result.map(|_| state);
                    }
                }
                _ = shutdown.recv() => {
                    info!(current_replicas = state.current_replicas, "Shutting down decision loop");
                    break;
                }
            }
        }

        Ok(state)
    }

    /// Report utilization on the configured interval without deciding.
    ///
    /// Follows the same error policy as [`ControlLoop::run`].
    pub async fn watch(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), DecisionError> {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            "Starting utilization watch"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    match self.engine.observe().await {
                        Ok(observation) => {
                            self.reporter.observed(&observation, start.elapsed()).await;
                        }
                        Err(e) => {
                            self.reporter.cycle_failed(&e, None).await;
                            if self.config.on_error == ErrorPolicy::Stop {
                                return Err(e);
                            }
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down utilization watch");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::decision::Observation;
    use crate::error::SourceError;
    use crate::models::{
        ConditionStatus, ContainerRequests, ContainerUsage, ReadinessCondition, ReplicaPhase,
        ReplicaUsage, ReplicaView, ResourceName,
    };
    use crate::source::{FixtureFrame, ReplayFixture};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn cycle_completed(&self, decision: &Decision, _elapsed: Duration) {
            self.push(format!("completed {}", decision.recommended_replicas));
        }

        async fn scale_transition(&self, from: u32, to: u32) {
            self.push(format!("transition {}->{}", from, to));
        }

        async fn cycle_failed(&self, error: &DecisionError, current_replicas: Option<u32>) {
            match current_replicas {
                Some(replicas) => self.push(format!("failed {} at {}", error.kind(), replicas)),
                None => self.push(format!("failed {}", error.kind())),
            }
        }

        async fn observed(&self, observation: &Observation, _elapsed: Duration) {
            self.push(format!("observed {}", observation.utilization.current_utilization));
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// A frame of three ready pods requesting 200m each
    fn frame(secs: i64, usage: &[i64]) -> FixtureFrame {
        let names = ["a", "b", "c"];
        FixtureFrame {
            now: at(secs),
            replicas: names
                .iter()
                .map(|name| ReplicaView {
                    name: name.to_string(),
                    labels: BTreeMap::new(),
                    deleting: false,
                    phase: ReplicaPhase::Running,
                    ready_condition: Some(ReadinessCondition {
                        status: ConditionStatus::True,
                        last_transition_time: at(0),
                    }),
                    start_time: Some(at(0)),
                    containers: vec![ContainerRequests {
                        name: "app".to_string(),
                        requests: BTreeMap::from([(ResourceName::cpu(), 200)]),
                    }],
                })
                .collect(),
            usage: names
                .iter()
                .zip(usage)
                .map(|(name, value)| ReplicaUsage {
                    name: name.to_string(),
                    labels: BTreeMap::new(),
                    timestamp: at(secs - 5),
                    window: Duration::from_secs(30),
                    containers: vec![ContainerUsage {
                        name: "app".to_string(),
                        usage: BTreeMap::from([(ResourceName::cpu(), *value)]),
                    }],
                })
                .collect(),
        }
    }

    fn control_loop(
        frames: Vec<FixtureFrame>,
        on_error: ErrorPolicy,
        interval: Duration,
    ) -> (ControlLoop, Arc<RecordingReporter>) {
        let fixture = Arc::new(ReplayFixture::from_frames(frames));
        let config = Arc::new(SimulationConfig::new("default", "").unwrap());
        let engine = DecisionEngine::new(config, fixture.clone(), fixture.clone(), fixture);
        let reporter = Arc::new(RecordingReporter::default());
        let control = ControlLoop::new(
            engine,
            reporter.clone(),
            LoopConfig {
                interval,
                on_error,
                initial_replicas: 1,
            },
        );
        (control, reporter)
    }

    #[tokio::test]
    async fn test_step_threads_state() {
        let (control, reporter) = control_loop(
            vec![frame(3600, &[100, 200, 300]), frame(3615, &[100, 100, 100])],
            ErrorPolicy::Continue,
            Duration::from_secs(15),
        );

        let state = control.initial_state();
        assert_eq!(state.current_replicas, 1);

        let (state, result) = control.step(state).await;
        assert_eq!(result.unwrap().recommended_replicas, 6);
        assert_eq!(state.current_replicas, 6);

        // 50% against a 50% target: unchanged
        let (state, result) = control.step(state).await;
        assert!(!result.unwrap().is_transition());
        assert_eq!(state.current_replicas, 6);

        assert_eq!(
            reporter.events(),
            vec!["completed 6", "transition 1->6", "completed 6"]
        );
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_state() {
        let (control, reporter) = control_loop(
            vec![frame(3600, &[100, 200, 300]), frame(3615, &[])],
            ErrorPolicy::Continue,
            Duration::from_secs(15),
        );

        let state = control.run_cycles(control.initial_state(), 2).await.unwrap();

        assert_eq!(state.current_replicas, 6);
        assert_eq!(
            reporter.events().last().map(String::as_str),
            Some("failed no_metrics_available at 6")
        );
    }

    #[tokio::test]
    async fn test_stop_policy_returns_error() {
        let (control, _reporter) = control_loop(
            vec![frame(3600, &[]), frame(3615, &[100, 200, 300])],
            ErrorPolicy::Stop,
            Duration::from_secs(15),
        );

        let result = control.run_cycles(control.initial_state(), 2).await;

        assert!(matches!(result, Err(DecisionError::NoMetricsAvailable)));
    }

    #[tokio::test]
    async fn test_run_stops_when_fixture_is_exhausted() {
        let (control, reporter) = control_loop(
            vec![frame(3600, &[100, 200, 300])],
            ErrorPolicy::Stop,
            Duration::from_millis(10),
        );
        let (_tx, rx) = broadcast::channel(1);

        let result = control.run(rx).await;

        assert!(matches!(
            result,
            Err(DecisionError::Source(SourceError::FixtureExhausted { frames: 1 }))
        ));
        assert_eq!(reporter.events()[1], "transition 1->6");
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let (control, reporter) = control_loop(
            vec![frame(3600, &[100, 200, 300])],
            ErrorPolicy::Continue,
            Duration::from_secs(3600),
        );
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { control.run(rx).await });

        // the first tick fires at once; the next one is an hour away
        while reporter.events().len() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        tx.send(()).unwrap();

        let state = handle.await.unwrap().unwrap();

        assert_eq!(state.current_replicas, 6);
        assert_eq!(reporter.events(), vec!["completed 6", "transition 1->6"]);
    }

    #[tokio::test]
    async fn test_watch_reports_observations() {
        let (control, reporter) = control_loop(
            vec![frame(3600, &[100, 200, 300])],
            ErrorPolicy::Stop,
            Duration::from_millis(10),
        );
        let (_tx, rx) = broadcast::channel(1);

        let result = control.watch(rx).await;

        assert!(result.is_err());
        assert_eq!(
            reporter.events(),
            vec!["observed 100", "failed source"]
        );
    }
}
