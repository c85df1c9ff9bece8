//! Broadcast Channel Adapters
//!
//! Implements the event output channel using a tokio broadcast channel.
//!
//! # Architecture
//!
//! The `EventHub` is the single output channel for trades, diffs, and
//! snapshots. Publishing never blocks: when a consumer falls more than
//! `capacity` events behind, its oldest unread events are overwritten and
//! the consumer observes the gap as lag on its next receive.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::application::ports::{EventSink, PublishError};
use crate::domain::market::OrderBookEvent;
use crate::infrastructure::metrics::{self, DropReason};

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 10_000;

// =============================================================================
// Event Hub
// =============================================================================

/// Configuration for the output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Events buffered per consumer before the oldest are dropped.
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Bounded, drop-oldest output channel.
///
/// # Example
///
/// ```rust
/// use orderbook_sync::infrastructure::broadcast::{BroadcastConfig, EventHub};
///
/// let hub = EventHub::new(BroadcastConfig::default());
/// let mut events = hub.subscribe();
/// assert_eq!(hub.receiver_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<OrderBookEvent>,
    capacity: usize,
}

impl EventHub {
    /// Create a hub. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            tx: broadcast::channel(capacity).0,
            capacity,
        }
    }

    /// Create a hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    /// Attach a new consumer. It sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of attached consumers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl EventSink for EventHub {
    fn publish(&self, event: OrderBookEvent) -> Result<(), PublishError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| PublishError::NoReceivers)
    }
}

/// Shared hub reference.
pub type SharedEventHub = Arc<EventHub>;

// =============================================================================
// Consumer
// =============================================================================

/// Consumer side of the hub.
#[derive(Debug)]
pub struct EventReceiver {
    rx: broadcast::Receiver<OrderBookEvent>,
}

impl EventReceiver {
    /// Next event, skipping over any lag. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<OrderBookEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event consumer lagging, oldest events dropped");
                    metrics::record_events_lagged(skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

// =============================================================================
// Metered Sink
// =============================================================================

/// Sink decorator counting delivered and undelivered events.
pub struct MeteredSink {
    inner: Arc<dyn EventSink>,
}

impl MeteredSink {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        Self { inner }
    }
}

impl EventSink for MeteredSink {
    fn publish(&self, event: OrderBookEvent) -> Result<(), PublishError> {
        let kind = event.kind();
        let result = self.inner.publish(event);
        match result {
            Ok(()) => metrics::record_event_published(kind),
            Err(PublishError::NoReceivers) => metrics::record_event_dropped(DropReason::NoReceivers),
        }
        result
    }
}

// =============================================================================
// Tests
// =============================================================================
