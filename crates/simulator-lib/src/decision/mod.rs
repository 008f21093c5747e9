//! Replica decision pipeline
//!
//! Stages, leaves first: snapshot building, pod classification, request
//! aggregation and utilization, combined by the engine into a recommendation.

mod classifier;
mod engine;
mod requests;
mod snapshot;
mod utilization;

pub use classifier::{Classification, ReplicaClassifier};
pub use engine::{
    decide_cycle, observe_cycle, Decision, DecisionEngine, DecisionReason, Observation,
};
pub use requests::aggregate_requests;
pub use snapshot::{build_snapshot, ResourceSnapshot};
pub use utilization::{utilization_ratio, UtilizationSample};
