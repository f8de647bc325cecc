//! Node summaries through the Kubernetes API server proxy

use super::{ClusterCredentials, FetchStrategy, RawResponse, SUMMARY_PATH};
use crate::error::ScrapeError;
use async_trait::async_trait;
use http::{Request, Uri};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// API server path proxying to the summary endpoint of `node_name`
pub fn proxy_path(node_name: &str, port: u16) -> String {
    format!("/api/v1/nodes/{}:{}/proxy{}", node_name, port, SUMMARY_PATH)
}

/// Name used for the cluster, user and context of a generated kubeconfig
const GENERATED_NAME: &str = "kubelet-metrics";

/// Create an API server client and check that the API is reachable.
pub(super) async fn connect(
    credentials: &ClusterCredentials,
    timeout: Duration,
) -> Result<Client, ScrapeError> {
    let kubeconfig = match &credentials.kubeconfig {
        Some(path) => Kubeconfig::read_from(path).map_err(|e| {
            ScrapeError::Configuration(format!("failed to read kubeconfig {}: {e}", path.display()))
        })?,
        None => explicit_kubeconfig(credentials, in_cluster_url())?,
    };

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| ScrapeError::Configuration(format!("invalid kubeconfig: {e}")))?;

    let cluster_url = config.cluster_url.to_string();
    let client = Client::try_from(config).map_err(|e| {
        ScrapeError::Configuration(format!("failed to create Kubernetes client: {e}"))
    })?;

    let version = match tokio::time::timeout(timeout, client.apiserver_version()).await {
        Ok(Ok(version)) => version,
        Ok(Err(e)) => {
            return Err(ScrapeError::Configuration(format!(
                "invalid Kubernetes API endpoint {cluster_url}: {e}"
            )))
        }
        Err(_) => {
            return Err(ScrapeError::Configuration(format!(
                "Kubernetes API endpoint {cluster_url} did not answer within {timeout:?}"
            )))
        }
    };
    info!(
        cluster_url = %cluster_url,
        git_version = %version.git_version,
        "Connected to Kubernetes API server"
    );

    Ok(client)
}

/// API server address advertised to pods
fn in_cluster_url() -> Option<String> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").ok()?;
    if host.contains(':') {
        Some(format!("https://[{host}]:{port}"))
    } else {
        Some(format!("https://{host}:{port}"))
    }
}

/// Express the explicit connection settings as a single-context kubeconfig
fn explicit_kubeconfig(
    credentials: &ClusterCredentials,
    in_cluster_url: Option<String>,
) -> Result<Kubeconfig, ScrapeError> {
    let server = credentials
        .kubernetes_url
        .clone()
        .or(in_cluster_url)
        .ok_or_else(|| ScrapeError::Configuration("kubernetes url is not set".to_string()))?;
    server
        .parse::<Uri>()
        .map_err(|e| ScrapeError::Configuration(format!("invalid kubernetes_url {server}: {e}")))?;

    let ca_file = credentials
        .ca_file
        .clone()
        .or_else(|| existing_file(credentials.secret_dir.join("ca.crt")));
    let token_file = credentials
        .bearer_token_file
        .clone()
        .or_else(|| existing_file(credentials.secret_dir.join("token")));

    let mut cluster = json!({ "server": server });
    if let Some(ca_file) = ca_file {
        cluster["certificate-authority"] = json!(ca_file.display().to_string());
    }
    if credentials.insecure_ssl {
        cluster["insecure-skip-tls-verify"] = json!(true);
    }

    let mut user = json!({});
    if let Some(cert) = &credentials.client_cert {
        user["client-certificate"] = json!(cert.display().to_string());
    }
    if let Some(key) = &credentials.client_key {
        user["client-key"] = json!(key.display().to_string());
    }
    if let Some(token_file) = token_file {
        user["tokenFile"] = json!(token_file.display().to_string());
    }

    let document = json!({
        "clusters": [{ "name": GENERATED_NAME, "cluster": cluster }],
        "users": [{ "name": GENERATED_NAME, "user": user }],
        "contexts": [{
            "name": GENERATED_NAME,
            "context": { "cluster": GENERATED_NAME, "user": GENERATED_NAME }
        }],
        "current-context": GENERATED_NAME,
    });

    serde_json::from_value(document)
        .map_err(|e| ScrapeError::Configuration(format!("invalid connection settings: {e}")))
}

fn existing_file(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

/// Fetches one node's summary through the API server node proxy
pub struct DiscoveryFetcher {
    client: Client,
    node_name: String,
    path: String,
    timeout: Duration,
}

impl DiscoveryFetcher {
    pub fn new(client: Client, node_name: &str, port: u16, timeout: Duration) -> Self {
        Self {
            client,
            node_name: node_name.to_string(),
            path: proxy_path(node_name, port),
            timeout,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl FetchStrategy for DiscoveryFetcher {
    fn target(&self) -> &str {
        &self.node_name
    }

    async fn fetch(&self) -> Result<RawResponse, ScrapeError> {
        let request = Request::get(self.path.as_str())
            .body(Vec::new())
            .map_err(|e| ScrapeError::Transport {
                target: self.node_name.clone(),
                message: e.to_string(),
            })?;

        match tokio::time::timeout(self.timeout, self.client.request_text(request)).await {
            // The kube client hands back the body of every response below 400
            // without its status, so a proxied 1xx or 3xx is recorded as 200
            // and then fails to parse.
            Ok(Ok(text)) => Ok(RawResponse {
                status: 200,
                body: text.into_bytes(),
            }),
            Ok(Err(kube::Error::Api(response))) => Ok(RawResponse {
                status: response.code,
                body: response.message.into_bytes(),
            }),
            Ok(Err(e)) => Err(ScrapeError::Transport {
                target: self.node_name.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(ScrapeError::Timeout {
                target: self.node_name.clone(),
                timeout: self.timeout,
            }),
        }
    }
}
