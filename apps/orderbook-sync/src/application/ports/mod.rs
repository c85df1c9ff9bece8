//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamConnector` / `StreamConnection`: WebSocket transport to the venue
//! - `SnapshotSource`: REST order book snapshots
//! - `EventSink`: Non-blocking output channel for normalized events
//! - `PairTranslator`: Local ↔ venue pair notation
//! - `Clock`: Wall-clock time for refresh scheduling
//!
//! ## Driver Ports (Inbound)
//!
//! - `OrderBookDataSource`: The capability exposed to the host application

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::error::{Cancelled, FetchError, TransportError};
use crate::domain::market::{OrderBookEvent, SnapshotEvent, TradingPair};

// =============================================================================
// Pair Translation
// =============================================================================

/// Converts between local `BASE-QUOTE` names and the venue's notation.
#[cfg_attr(test, mockall::automock)]
pub trait PairTranslator: Send + Sync {
    /// Venue name for a local pair, `None` if the pair has no venue form.
    fn to_venue(&self, pair: &TradingPair) -> Option<String>;

    /// Local pair for a venue name, `None` if unrecognised.
    fn from_venue(&self, venue_pair: &str) -> Option<TradingPair>;
}

// =============================================================================
// Event Output
// =============================================================================

/// Reasons a publish did not reach any consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Nobody is listening; the event was dropped.
    #[error("no active receivers")]
    NoReceivers,
}

/// Output channel for normalized events.
///
/// `publish` must never block the producer: a full channel discards old
/// events rather than applying backpressure to the stream reader.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Hand an event to the channel.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::NoReceivers` if the event was dropped because
    /// no consumer is attached.
    fn publish(&self, event: OrderBookEvent) -> Result<(), PublishError>;
}

// =============================================================================
// Time
// =============================================================================

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Stream Transport
// =============================================================================

/// Frame surfaced by a stream connection. Pings are answered by the
/// transport and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text data frame.
    Text(String),
    /// Binary data frame, passed on undecoded.
    Binary(Vec<u8>),
    /// Answer to a liveness probe.
    Pong,
    /// Close frame from the peer.
    Close,
}

/// An established duplex connection.
#[async_trait]
pub trait StreamConnection: Send {
    /// Next frame; `None` once the connection is gone.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Send a liveness probe.
    async fn send_ping(&mut self) -> Result<(), TransportError>;

    /// Close the connection. Errors are swallowed.
    async fn close(&mut self);
}

/// Opens stream connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Connect to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError>;
}

// =============================================================================
// Snapshots
// =============================================================================

/// One-shot order book snapshot fetch.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch up to `depth_limit` levels per side for `pair`.
    async fn fetch_snapshot(
        &self,
        pair: &TradingPair,
        depth_limit: u32,
    ) -> Result<SnapshotEvent, FetchError>;
}

// =============================================================================
// Data Source Capability
// =============================================================================

/// Everything the host needs to keep local order books in sync with a venue.
///
/// The three `run_*` producers never return on their own; they end only when
/// cancelled.
#[async_trait]
pub trait OrderBookDataSource: Send + Sync {
    /// Fetch the initial book for `pair`.
    async fn bootstrap_order_book(&self, pair: &TradingPair) -> Result<SnapshotEvent, FetchError>;

    /// Stream trades for the configured pairs into `sink`.
    async fn run_trades(&self, sink: Arc<dyn EventSink>) -> Result<Infallible, Cancelled>;

    /// Stream order book diffs for the configured pairs into `sink`.
    async fn run_diffs(&self, sink: Arc<dyn EventSink>) -> Result<Infallible, Cancelled>;

    /// Periodically publish fresh snapshots for the configured pairs.
    async fn run_snapshot_refresh(&self, sink: Arc<dyn EventSink>) -> Result<Infallible, Cancelled>;

    /// Last traded price per pair, fetched concurrently.
    async fn fetch_last_traded_prices(
        &self,
        pairs: &[TradingPair],
    ) -> Result<HashMap<TradingPair, Decimal>, FetchError>;
}
