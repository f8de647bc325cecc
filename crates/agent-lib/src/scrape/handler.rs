//! Validation and dispatch of summary responses

use super::RawResponse;
use crate::error::ScrapeError;
use crate::models::SummaryDocument;
use crate::router::EventRouter;
use crate::summary::{flatten, ScrapeContext, TagTemplate};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Turns one summary response into routed metric events.
///
/// Nothing is emitted unless the whole body was accepted: a non-2xx status
/// or a body that does not parse yields an error and zero events.
#[derive(Clone)]
pub struct ResponseHandler {
    tag: Arc<TagTemplate>,
    router: Arc<dyn EventRouter>,
}

impl ResponseHandler {
    pub fn new(tag: TagTemplate, router: Arc<dyn EventRouter>) -> Self {
        Self {
            tag: Arc::new(tag),
            router,
        }
    }

    /// Handle the response scraped from `target`, returning the number of events emitted
    pub fn handle(&self, target: &str, response: &RawResponse) -> Result<usize, ScrapeError> {
        if !response.is_success() {
            return Err(ScrapeError::protocol(response.status, &response.body));
        }

        let document: SummaryDocument = serde_json::from_slice(&response.body)?;

        let ctx = ScrapeContext::new(Utc::now(), &self.tag, target);
        let events = flatten(&document, &ctx);
        let count = events.len();

        debug!(target = %target, events = count, "Flattened node summary");
        for event in events {
            self.router.emit(event);
        }

        Ok(count)
    }
}
