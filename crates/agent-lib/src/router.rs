//! Delivery of flattened events to the downstream pipeline

use crate::models::MetricEvent;
use crate::observability::AgentMetrics;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Receives metric events. Delivery is fire-and-forget.
pub trait EventRouter: Send + Sync {
    fn emit(&self, event: MetricEvent);
}

/// Router that forwards events into a bounded channel.
///
/// Events are dropped, not awaited, when the consumer falls behind.
pub struct ChannelRouter {
    tx: mpsc::Sender<MetricEvent>,
    metrics: AgentMetrics,
}

impl ChannelRouter {
    pub fn new(buffer_size: usize, metrics: AgentMetrics) -> (Self, mpsc::Receiver<MetricEvent>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (Self { tx, metrics }, rx)
    }
}

impl EventRouter for ChannelRouter {
    fn emit(&self, event: MetricEvent) {
        match self.tx.try_send(event) {
            Ok(()) => self.metrics.inc_events_emitted(),
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.metrics.inc_events_dropped();
                warn!(tag = %event.tag, "Event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.metrics.inc_events_dropped();
                warn!(tag = %event.tag, "Event channel closed, dropping event");
            }
        }
    }
}

/// Router that keeps every event in memory, for embedding and tests
#[derive(Default)]
pub struct MemoryRouter {
    events: Mutex<Vec<MetricEvent>>,
}

impl MemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all events received so far
    pub fn drain(&self) -> Vec<MetricEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventRouter for MemoryRouter {
    fn emit(&self, event: MetricEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
