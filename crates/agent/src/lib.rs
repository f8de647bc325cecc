//! Kubelet metrics agent
//!
//! Wiring for the `kubelet-metrics` binary: configuration loading, the
//! health/metrics HTTP API and the stdout event sink.

pub mod api;
pub mod config;
pub mod sink;
