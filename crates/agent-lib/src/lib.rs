//! Kubelet summary metrics library
//!
//! This crate provides the core functionality for:
//! - Typed access to the kubelet Summary API payload
//! - Flattening summaries into tagged, labeled metric events
//! - Fetching summaries directly or through the API server proxy
//! - The periodic scrape loop and event routing
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod router;
pub mod scrape;
pub mod summary;

pub use error::ScrapeError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
    TargetHealth,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use router::{ChannelRouter, EventRouter, MemoryRouter};
pub use summary::{flatten, normalize_field_name, ScrapeContext, TagTemplate};
