//! Fetching and handling kubelet summary responses
//!
//! A [`FetchStrategy`] returns the raw HTTP response for one node, the
//! [`ResponseHandler`] validates and flattens it, and the [`ScrapeLoop`]
//! drives both on a fixed interval.

mod direct;
mod discovery;
mod handler;
mod r#loop;

pub use direct::DirectFetcher;
pub use discovery::DiscoveryFetcher;
pub use handler::ResponseHandler;
pub use r#loop::{CycleResults, ScrapeConfig, ScrapeLoop, ScrapeLoopBuilder};

use crate::error::ScrapeError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Path of the summary endpoint on the kubelet
pub const SUMMARY_PATH: &str = "/stats/summary";

/// Default kubelet read-only port
pub const DEFAULT_KUBELET_PORT: u16 = 10_255;

/// Status and body of one summary request
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of summary responses for one node.
///
/// Implementations must bound the wait of every fetch.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Node this strategy scrapes
    fn target(&self) -> &str;

    async fn fetch(&self) -> Result<RawResponse, ScrapeError>;
}

/// Where a pod finds its service account credentials
pub const DEFAULT_SECRET_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// API server connection settings for proxy mode.
///
/// With a `kubeconfig`, every other field is ignored. Otherwise the API
/// server is `kubernetes_url`, or the in-cluster service address, and a
/// missing `ca_file` or `bearer_token_file` is taken from `secret_dir`
/// when the file exists there.
#[derive(Debug, Clone)]
pub struct ClusterCredentials {
    pub kubeconfig: Option<PathBuf>,
    pub kubernetes_url: Option<String>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub bearer_token_file: Option<PathBuf>,
    pub secret_dir: PathBuf,
    /// Skip API server certificate verification
    pub insecure_ssl: bool,
}

impl Default for ClusterCredentials {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            kubernetes_url: None,
            client_cert: None,
            client_key: None,
            ca_file: None,
            bearer_token_file: None,
            secret_dir: PathBuf::from(DEFAULT_SECRET_DIR),
            insecure_ssl: false,
        }
    }
}

/// How summaries are reached
#[derive(Debug, Clone)]
pub enum FetchMode {
    /// Plain GET against a single kubelet
    Direct { node_name: String },
    /// One authenticated GET per node through the API server node proxy
    Discovery {
        node_names: Vec<String>,
        credentials: ClusterCredentials,
    },
}

impl FetchMode {
    pub fn name(&self) -> &'static str {
        match self {
            FetchMode::Direct { .. } => "direct",
            FetchMode::Discovery { .. } => "discovery",
        }
    }
}

/// Everything needed to build the fetchers of one agent
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub mode: FetchMode,
    pub kubelet_port: u16,
    pub request_timeout: Duration,
}

impl ScrapeSettings {
    /// Reject settings the agent cannot start with
    pub fn validate(&self) -> Result<(), ScrapeError> {
        match &self.mode {
            FetchMode::Direct { node_name } if node_name.trim().is_empty() => {
                return Err(ScrapeError::Configuration("node_name is required".to_string()));
            }
            FetchMode::Discovery { node_names, .. }
                if node_names.iter().all(|name| name.trim().is_empty()) =>
            {
                return Err(ScrapeError::Configuration(
                    "node_names array is required".to_string(),
                ));
            }
            _ => {}
        }

        if self.request_timeout.is_zero() {
            return Err(ScrapeError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Build one fetcher per node named in `settings`
pub async fn build_fetchers(
    settings: &ScrapeSettings,
) -> Result<Vec<Arc<dyn FetchStrategy>>, ScrapeError> {
    settings.validate()?;

    match &settings.mode {
        FetchMode::Direct { node_name } => {
            let fetcher =
                DirectFetcher::new(node_name, settings.kubelet_port, settings.request_timeout)?;
            info!(url = %fetcher.url(), "Using direct kubelet summary client");
            Ok(vec![Arc::new(fetcher)])
        }
        FetchMode::Discovery {
            node_names,
            credentials,
        } => {
            let client = discovery::connect(credentials, settings.request_timeout).await?;

            Ok(node_names
                .iter()
                .filter(|name| !name.trim().is_empty())
                .map(|name| {
                    let fetcher = DiscoveryFetcher::new(
                        client.clone(),
                        name,
                        settings.kubelet_port,
                        settings.request_timeout,
                    );
                    info!(path = %fetcher.path(), "Using API server proxy for node summary");
                    Arc::new(fetcher) as Arc<dyn FetchStrategy>
                })
                .collect())
        }
    }
}
