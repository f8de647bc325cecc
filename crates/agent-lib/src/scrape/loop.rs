//! Scrape loop
//!
//! Runs one scrape cycle per tick. Nodes are scraped one after another and
//! a tick that comes due while a cycle is still running is skipped, so at
//! most one cycle is in flight.

use super::{FetchStrategy, ResponseHandler};
use crate::error::ScrapeError;
use crate::health::{components, HealthRegistry};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::router::EventRouter;
use crate::summary::TagTemplate;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Configuration for the scrape loop
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Time between scrape cycles (default: 15 seconds)
    pub interval: Duration,
    /// Tag template applied to every event
    pub tag: TagTemplate,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            tag: TagTemplate::default(),
        }
    }
}

/// Outcome of one scrape cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleResults {
    pub success_count: usize,
    pub error_count: usize,
    pub events: usize,
}

/// Periodically scrapes every configured node
pub struct ScrapeLoop {
    fetchers: Vec<Arc<dyn FetchStrategy>>,
    handler: ResponseHandler,
    config: ScrapeConfig,
    metrics: AgentMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl ScrapeLoop {
    pub fn new(
        fetchers: Vec<Arc<dyn FetchStrategy>>,
        router: Arc<dyn EventRouter>,
        config: ScrapeConfig,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let handler = ResponseHandler::new(config.tag.clone(), router);
        let metrics = AgentMetrics::new();
        metrics.set_scrape_targets(fetchers.len() as i64);

        Self {
            fetchers,
            handler,
            config,
            metrics,
            health,
            logger,
        }
    }

    /// Run until `shutdown` fires. An in-flight cycle is abandoned on shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            targets = self.fetchers.len(),
            "Starting scrape loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        results = self.scrape_all() => {
                            debug!(
                                nodes = results.success_count,
                                errors = results.error_count,
                                events = results.events,
                                "Scrape cycle complete"
                            );
                        }
                        _ = shutdown.recv() => {
                            info!("Abandoning in-flight scrape cycle");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down scrape loop");
                    break;
                }
            }
        }
    }

    /// Scrape every node once, in configuration order
    pub async fn scrape_all(&self) -> CycleResults {
        let mut results = CycleResults::default();

        for fetcher in &self.fetchers {
            match self.scrape_target(fetcher.as_ref()).await {
                Ok(events) => {
                    results.success_count += 1;
                    results.events += events;
                }
                Err(_) => results.error_count += 1,
            }
        }

        self.update_health(&results).await;
        results
    }

    /// Fetch, validate and emit one node's summary. Failures are logged here.
    async fn scrape_target(&self, fetcher: &dyn FetchStrategy) -> Result<usize, ScrapeError> {
        let target = fetcher.target();
        let start = Instant::now();
        self.metrics.inc_scrapes();

        let result = match fetcher.fetch().await {
            Ok(response) => self.handler.handle(target, &response),
            Err(e) => Err(e),
        };

        let elapsed = start.elapsed();
        self.metrics.observe_scrape_latency(elapsed.as_secs_f64());

        match &result {
            Ok(events) => {
                self.logger
                    .log_scrape_completed(target, *events, elapsed.as_millis());
                self.health.record_success(target).await;
            }
            Err(e) => {
                self.metrics.inc_scrape_errors(e.kind());
                self.logger.log_scrape_failed(target, e.kind(), e);
                self.health.record_failure(target, e.to_string()).await;
            }
        }

        result
    }

    async fn update_health(&self, results: &CycleResults) {
        let total = results.success_count + results.error_count;

        if results.error_count == 0 {
            self.health.set_healthy(components::SCRAPER).await;
        } else if results.success_count == 0 {
            self.health
                .set_unhealthy(components::SCRAPER, format!("All {} nodes failed", total))
                .await;
        } else {
            self.health
                .set_degraded(
                    components::SCRAPER,
                    format!("{} of {} nodes failed", results.error_count, total),
                )
                .await;
        }
    }
}

/// Builder for creating and starting the scrape loop
pub struct ScrapeLoopBuilder {
    fetchers: Vec<Arc<dyn FetchStrategy>>,
    router: Option<Arc<dyn EventRouter>>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    config: ScrapeConfig,
}

impl ScrapeLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            fetchers: Vec::new(),
            router: None,
            health: None,
            logger: None,
            config: ScrapeConfig::default(),
        }
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn FetchStrategy>) -> Self {
        self.fetchers.push(fetcher);
        self
    }

    pub fn fetchers(mut self, fetchers: impl IntoIterator<Item = Arc<dyn FetchStrategy>>) -> Self {
        self.fetchers.extend(fetchers);
        self
    }

    pub fn router(mut self, router: Arc<dyn EventRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn tag(mut self, tag: TagTemplate) -> Self {
        self.config.tag = tag;
        self
    }

    /// Build the scrape loop
    pub fn build(self) -> Result<ScrapeLoop> {
        if self.fetchers.is_empty() {
            anyhow::bail!("At least one fetcher is required");
        }
        if self.config.interval.is_zero() {
            anyhow::bail!("Scrape interval must be greater than zero");
        }
        let router = self
            .router
            .ok_or_else(|| anyhow::anyhow!("Router is required"))?;
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("kubelet-metrics"));

        Ok(ScrapeLoop::new(
            self.fetchers,
            router,
            self.config,
            self.health.unwrap_or_default(),
            logger,
        ))
    }
}

impl Default for ScrapeLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
