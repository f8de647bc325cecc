//! Direct kubelet summary client

use super::{FetchStrategy, RawResponse, SUMMARY_PATH};
use crate::error::ScrapeError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fetches `http://<node>:<port>/stats/summary` with a plain GET
pub struct DirectFetcher {
    client: Client,
    node_name: String,
    url: Url,
    timeout: Duration,
}

impl DirectFetcher {
    pub fn new(node_name: &str, port: u16, timeout: Duration) -> Result<Self, ScrapeError> {
        Self::with_base_url(node_name, &format!("http://{}:{}", node_name, port), timeout)
    }

    /// Scrape `base_url` while reporting results under `node_name`
    pub fn with_base_url(
        node_name: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ScrapeError> {
        let url = Url::parse(base_url)
            .and_then(|base| base.join(SUMMARY_PATH))
            .map_err(|e| ScrapeError::Configuration(format!("invalid kubelet URL {base_url}: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScrapeError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            node_name: node_name.to_string(),
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn transport_error(&self, err: reqwest::Error) -> ScrapeError {
        if err.is_timeout() {
            ScrapeError::Timeout {
                target: self.node_name.clone(),
                timeout: self.timeout,
            }
        } else {
            ScrapeError::Transport {
                target: self.node_name.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl FetchStrategy for DirectFetcher {
    fn target(&self) -> &str {
        &self.node_name
    }

    async fn fetch(&self) -> Result<RawResponse, ScrapeError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}
