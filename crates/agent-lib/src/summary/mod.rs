//! Flattening of kubelet summary documents
//!
//! Walks the nested summary payload and produces one [`MetricEvent`] per
//! scalar reading, each carrying a tag, a timestamp and the identity labels
//! of every entity above it (node, pod, container, volume, interface).

mod dispatch;
mod fields;
mod tag;
pub mod walker;

#[cfg(test)]
mod tests;

pub use dispatch::flatten;
pub use fields::normalize_field_name;
pub use tag::TagTemplate;

use crate::models::{LabelValue, Labels, MetricEvent};
use chrono::{DateTime, Utc};

/// Per-cycle values shared by every walker of one summary document
#[derive(Debug, Clone, Copy)]
pub struct ScrapeContext<'a> {
    /// Wall-clock time the response was accepted; used for uptime and
    /// for sub-documents that carry no `time` of their own
    pub scraped_at: DateTime<Utc>,
    pub tag: &'a TagTemplate,
    /// Node name to label pods with when the document has no `node.nodeName`
    pub fallback_node: &'a str,
}

impl<'a> ScrapeContext<'a> {
    pub fn new(scraped_at: DateTime<Utc>, tag: &'a TagTemplate, fallback_node: &'a str) -> Self {
        Self {
            scraped_at,
            tag,
            fallback_node,
        }
    }

    /// Build the event for `segment` with `value` merged into `labels`
    pub(crate) fn event(
        &self,
        segment: &str,
        timestamp: DateTime<Utc>,
        labels: &Labels,
        value: impl Into<LabelValue>,
    ) -> MetricEvent {
        MetricEvent {
            tag: self.tag.render(segment),
            timestamp,
            labels: labels.with("value", value),
        }
    }
}
