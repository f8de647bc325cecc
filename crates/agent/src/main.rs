//! Kubelet Metrics - node summary scraper
//!
//! Periodically scrapes the kubelet Summary API, either from one kubelet
//! directly or from many nodes through the API server proxy, and writes
//! every statistic as one JSON event per line to stdout.

use anyhow::{anyhow, Result};
use clap::Parser;
use kubelet_metrics::{api, config::AgentConfig, sink};
use kubelet_metrics_lib::{
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    scrape::{build_fetchers, ScrapeLoopBuilder},
    ChannelRouter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "kubelet-metrics")]
#[command(about = "Flatten kubelet summary statistics into metric events", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (JSON, YAML or TOML)
    #[arg(short, long, env = "KUBELET_METRICS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Events own stdout, logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let config = AgentConfig::load(cli.config.as_deref())?;
    let settings = config.scrape_settings()?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCRAPER).await;
    health_registry.register(components::ROUTER).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(config.instance_name());

    let fetchers = build_fetchers(&settings).await?;
    logger.log_startup(AGENT_VERSION, settings.mode.name(), fetchers.len());

    let (router, events) = ChannelRouter::new(config.event_buffer_size, metrics);

    let sink_health = health_registry.clone();
    let sink_handle = tokio::spawn(async move {
        match sink::write_json_lines(events, tokio::io::stdout()).await {
            Ok(written) => info!(events = written, "Event sink closed"),
            Err(e) => {
                error!(error = %e, "Event sink failed");
                sink_health
                    .set_unhealthy(components::ROUTER, e.to_string())
                    .await;
            }
        }
    });

    let scrape_loop = ScrapeLoopBuilder::new()
        .fetchers(fetchers)
        .router(Arc::new(router))
        .health(health_registry.clone())
        .logger(logger.clone())
        .interval(config.interval())
        .tag(config.tag_template())
        .build()?;

    let listener = api::bind(config.api_port).await?;
    let app_state = Arc::new(api::AppState::new(health_registry.clone()));
    let mut api_handle = tokio::spawn(api::serve(listener, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(scrape_loop.run(shutdown_rx));

    health_registry.set_ready(true).await;

    let api_result = tokio::select! {
        reason = wait_for_signal() => {
            logger.log_shutdown(reason?);
            None
        }
        joined = &mut api_handle => {
            let result = joined
                .map_err(anyhow::Error::from)
                .and_then(|served| served)
                .and_then(|()| Err(anyhow!("API server exited")));
            if let Err(e) = &result {
                error!(error = %e, "API server stopped, shutting down");
            }
            Some(result)
        }
    };

    let _ = shutdown_tx.send(());
    // The loop owns the router; once it is gone the sink drains and exits
    loop_handle.await?;
    sink_handle.await?;

    match api_result {
        Some(result) => result,
        None => {
            api_handle.abort();
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok("SIGINT received")
        }
        _ = terminate.recv() => Ok("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("SIGINT received")
}
