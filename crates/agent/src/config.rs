//! Agent configuration

use anyhow::{Context, Result};
use kubelet_metrics_lib::scrape::{
    ClusterCredentials, FetchMode, ScrapeSettings, DEFAULT_KUBELET_PORT, DEFAULT_SECRET_DIR,
};
use kubelet_metrics_lib::{ScrapeError, TagTemplate};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read by the agent
pub const ENV_PREFIX: &str = "KUBELET_METRICS";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Event tag; a `*` is replaced by the metric path
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Seconds between scrape cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Scrape a single kubelet directly instead of going through the API server
    #[serde(default = "default_use_rest_client")]
    pub use_rest_client: bool,

    /// Node scraped in direct mode, from the Kubernetes downward API by default
    #[serde(default = "default_node_name")]
    pub node_name: Option<String>,

    /// Nodes scraped through the API server proxy
    #[serde(default)]
    pub node_names: Vec<String>,

    /// Port the kubelet serves the summary API on
    #[serde(default = "default_kubelet_port")]
    pub kubelet_port: u16,

    /// Kubeconfig used in proxy mode; the connection keys below are then ignored
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// API server URL, the in-cluster service address by default
    #[serde(default)]
    pub kubernetes_url: Option<String>,

    /// Client certificate presented to the API server
    #[serde(default)]
    pub client_cert: Option<PathBuf>,

    /// Private key of `client_cert`
    #[serde(default)]
    pub client_key: Option<PathBuf>,

    /// CA bundle for the API server, `<secret_dir>/ca.crt` when present
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// API token file, `<secret_dir>/token` when present
    #[serde(default)]
    pub bearer_token_file: Option<PathBuf>,

    /// Service account credentials directory
    #[serde(default = "default_secret_dir")]
    pub secret_dir: PathBuf,

    /// Skip API server certificate verification
    #[serde(default)]
    pub insecure_ssl: bool,

    /// Upper bound on every summary request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Events buffered between the scraper and the sink
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

fn default_tag() -> String {
    "kubernetes.metrics.*".to_string()
}

fn default_interval() -> u64 {
    15
}

fn default_use_rest_client() -> bool {
    true
}

fn default_node_name() -> Option<String> {
    std::env::var("NODE_NAME").ok()
}

fn default_kubelet_port() -> u16 {
    DEFAULT_KUBELET_PORT
}

fn default_secret_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SECRET_DIR)
}

fn default_request_timeout() -> u64 {
    10
}

fn default_api_port() -> u16 {
    8080
}

fn default_event_buffer_size() -> usize {
    10_000
}

impl AgentConfig {
    /// Load configuration from an optional file, overridden by environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: ::config::Environment) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }

        let config = builder
            .add_source(env)
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Compiled event tag template
    pub fn tag_template(&self) -> TagTemplate {
        TagTemplate::parse(&self.tag)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Name this agent logs under
    pub fn instance_name(&self) -> &str {
        self.node_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("kubelet-metrics")
    }

    /// Validated fetch settings
    pub fn scrape_settings(&self) -> Result<ScrapeSettings, ScrapeError> {
        if self.interval_secs == 0 {
            return Err(ScrapeError::Configuration(
                "interval must be greater than zero".to_string(),
            ));
        }

        let mode = if self.use_rest_client {
            FetchMode::Direct {
                node_name: self.node_name.clone().unwrap_or_default(),
            }
        } else {
            FetchMode::Discovery {
                node_names: self.node_names.clone(),
                credentials: ClusterCredentials {
                    kubeconfig: self.kubeconfig.clone(),
                    kubernetes_url: self.kubernetes_url.clone(),
                    client_cert: self.client_cert.clone(),
                    client_key: self.client_key.clone(),
                    ca_file: self.ca_file.clone(),
                    bearer_token_file: self.bearer_token_file.clone(),
                    secret_dir: self.secret_dir.clone(),
                    insecure_ssl: self.insecure_ssl,
                },
            }
        };

        let settings = ScrapeSettings {
            mode,
            kubelet_port: self.kubelet_port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        };
        settings.validate()?;

        Ok(settings)
    }
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("node_names")
}
