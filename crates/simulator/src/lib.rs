//! HPA simulator daemon
//!
//! Runs the decision loop against a live cluster and serves health, loop
//! status and Prometheus endpoints next to it.

pub mod api;
pub mod config;
pub mod status;
