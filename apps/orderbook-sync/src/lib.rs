#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Order Book Sync - Venue Order Book Synchronization
//!
//! Keeps a local view of a venue's order books in sync: an initial REST
//! snapshot per pair, incremental diffs and trades from the venue's
//! multiplexed WebSocket stream, and an hourly snapshot refresh, all
//! delivered as normalized events on one non-blocking output channel.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core order book types and rules
//!   - `market`: Pairs, price levels, normalized events, mid-price memo
//!   - `streaming`: Subscriptions, raw messages, session lifecycle
//!   - `error`: Transport, decode, and cancellation errors
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for transports, snapshot sources, event sinks
//!   - `services`: Snapshot refresh scheduling
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bitzlato`: REST client, stream session, supervisor, data source
//!   - `broadcast`: Drop-oldest output channel
//!   - `config`: Configuration loading
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! REST depth ──────────► bootstrap / hourly refresh ──┐
//!                                                     │    ┌──────────┐
//! Ranger .trade  ──► session ──► supervisor ──────────┼───►│ EventHub │──► consumers
//!                                                     │    └──────────┘
//! Ranger .ob-inc ──► session ──► supervisor ──────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core order book types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::error::{Cancelled, DecodeError, FetchError, TransportError};
pub use domain::market::{
    DiffEvent, EventKind, MidPriceMemo, OrderBookEvent, PriceLevel, SnapshotEvent, TakerSide,
    TradeEvent, TradeFill, TradingPair,
};
pub use domain::streaming::{
    RawStreamMessage, SessionState, StreamEnded, StreamKind, StreamSubscription,
};

// Ports
pub use application::ports::{
    Clock, EventSink, OrderBookDataSource, PairTranslator, PublishError, SnapshotSource,
    StreamConnection, StreamConnector, SystemClock,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FeedConfig};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Output channel
pub use infrastructure::broadcast::{BroadcastConfig, EventHub, EventReceiver, SharedEventHub};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
