//! Error taxonomy for scrape cycles

use std::time::Duration;
use thiserror::Error;

/// Maximum number of body bytes kept in a protocol error
pub const BODY_EXCERPT_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Startup configuration is unusable; the agent must not start
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to fetch summary from {target}: {message}")]
    Transport { target: String, message: String },

    #[error("summary request to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("expected 2xx from summary API, got {status}: {excerpt}")]
    Protocol { status: u16, excerpt: String },

    #[error("failed to parse summary document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Stable name used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Configuration(_) => "configuration",
            ScrapeError::Transport { .. } => "transport",
            ScrapeError::Timeout { .. } => "timeout",
            ScrapeError::Protocol { .. } => "protocol",
            ScrapeError::Parse(_) => "parse",
        }
    }

    /// Build a protocol error, keeping at most [`BODY_EXCERPT_LIMIT`] bytes of the body
    pub fn protocol(status: u16, body: &[u8]) -> Self {
        let end = body.len().min(BODY_EXCERPT_LIMIT);
        let mut excerpt = String::from_utf8_lossy(&body[..end]).into_owned();
        if body.len() > BODY_EXCERPT_LIMIT {
            excerpt.push_str("...");
        }
        ScrapeError::Protocol { status, excerpt }
    }
}
