//! Observability infrastructure for the kubelet metrics agent
//!
//! Provides:
//! - Prometheus metrics (scrape latency, scrape outcomes, emitted and dropped events)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Default histogram buckets for scrape latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AgentMetricsInner {
    scrape_latency_seconds: Histogram,
    scrapes_total: IntCounter,
    scrape_errors: IntCounterVec,
    events_emitted: IntCounter,
    events_dropped: IntCounter,
    scrape_targets: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            scrape_latency_seconds: register_histogram!(
                "kubelet_metrics_scrape_latency_seconds",
                "Time spent fetching and flattening one node summary",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_latency_seconds"),

            scrapes_total: register_int_counter!(
                "kubelet_metrics_scrapes_total",
                "Total number of node summary scrapes attempted"
            )
            .expect("Failed to register scrapes_total"),

            scrape_errors: register_int_counter_vec!(
                "kubelet_metrics_scrape_errors_total",
                "Total number of failed node summary scrapes by error kind",
                &["kind"]
            )
            .expect("Failed to register scrape_errors"),

            events_emitted: register_int_counter!(
                "kubelet_metrics_events_emitted_total",
                "Total number of metric events handed to the event router"
            )
            .expect("Failed to register events_emitted"),

            events_dropped: register_int_counter!(
                "kubelet_metrics_events_dropped_total",
                "Total number of metric events dropped because the router was full or closed"
            )
            .expect("Failed to register events_dropped"),

            scrape_targets: register_int_gauge!(
                "kubelet_metrics_scrape_targets",
                "Number of nodes scraped each cycle"
            )
            .expect("Failed to register scrape_targets"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_scrape_latency(&self, duration_secs: f64) {
        self.inner().scrape_latency_seconds.observe(duration_secs);
    }

    pub fn inc_scrapes(&self) {
        self.inner().scrapes_total.inc();
    }

    /// Count a failed scrape under its error kind
    pub fn inc_scrape_errors(&self, kind: &str) {
        self.inner().scrape_errors.with_label_values(&[kind]).inc();
    }

    pub fn inc_events_emitted(&self) {
        self.inner().events_emitted.inc();
    }

    pub fn inc_events_dropped(&self) {
        self.inner().events_dropped.inc();
    }

    pub fn set_scrape_targets(&self, count: i64) {
        self.inner().scrape_targets.set(count);
    }
}

/// Structured logger for agent events
///
/// Provides consistent JSON-formatted logging for scrape outcomes and
/// agent lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, mode: &str, targets: usize) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            mode = %mode,
            targets = targets,
            "Kubelet metrics agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Kubelet metrics agent shutting down"
        );
    }

    /// Log a successful node scrape
    pub fn log_scrape_completed(&self, target: &str, events: usize, elapsed_ms: u128) {
        debug!(
            event = "scrape_completed",
            instance = %self.instance,
            target = %target,
            events = events,
            elapsed_ms = elapsed_ms,
            "Scraped node summary"
        );
    }

    /// Log a failed node scrape
    pub fn log_scrape_failed(&self, target: &str, kind: &str, error: &dyn std::error::Error) {
        warn!(
            event = "scrape_failed",
            instance = %self.instance,
            target = %target,
            kind = %kind,
            error = %error,
            "Failed to scrape metrics"
        );
    }
}
