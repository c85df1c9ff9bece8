//! Order Book Events

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TradingPair;

// =============================================================================
// Price Levels and Fills
// =============================================================================

/// One side-agnostic book level. An amount of zero removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price.
    pub price: Decimal,
    /// Quantity resting at the price.
    pub amount: Decimal,
}

impl PriceLevel {
    /// Create a level.
    #[must_use]
    pub const fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }
}

/// Side of the aggressor in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerSide {
    /// Taker bought (lifted the ask).
    Buy,
    /// Taker sold (hit the bid).
    Sell,
}

/// A single execution reported by the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFill {
    /// Venue trade id, when present.
    pub trade_id: Option<u64>,
    /// Execution price.
    pub price: Decimal,
    /// Executed quantity.
    pub amount: Decimal,
    /// Aggressor side.
    pub taker_side: TakerSide,
    /// Venue execution time in epoch seconds, forwarded as-is.
    pub venue_time: Option<i64>,
}

// =============================================================================
// Events
// =============================================================================

/// Full top-of-book snapshot for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEvent {
    /// Local pair name.
    pub pair: TradingPair,
    /// Bid levels in venue order.
    pub bids: Vec<PriceLevel>,
    /// Ask levels in venue order.
    pub asks: Vec<PriceLevel>,
    /// Venue-provided update id, opaque.
    pub update_id: Option<u64>,
    /// When the snapshot was received.
    pub received_at: DateTime<Utc>,
}

/// Incremental book update for one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEvent {
    /// Local pair name.
    pub pair: TradingPair,
    /// Changed bid levels.
    pub bids: Vec<PriceLevel>,
    /// Changed ask levels.
    pub asks: Vec<PriceLevel>,
    /// Venue sequence number, opaque.
    pub update_id: Option<u64>,
    /// When the diff was received.
    pub received_at: DateTime<Utc>,
}

/// One or more executions for a pair, delivered in a single frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Local pair name.
    pub pair: TradingPair,
    /// Executions in venue order.
    pub fills: Vec<TradeFill>,
    /// When the frame was received.
    pub received_at: DateTime<Utc>,
}

/// Normalized event emitted to the output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderBookEvent {
    /// Trade executions.
    Trade(TradeEvent),
    /// Incremental book update.
    Diff(DiffEvent),
    /// Full book snapshot.
    Snapshot(SnapshotEvent),
}

impl OrderBookEvent {
    /// Pair the event belongs to.
    #[must_use]
    pub const fn pair(&self) -> &TradingPair {
        match self {
            Self::Trade(e) => &e.pair,
            Self::Diff(e) => &e.pair,
            Self::Snapshot(e) => &e.pair,
        }
    }

    /// Receipt timestamp.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        match self {
            Self::Trade(e) => e.received_at,
            Self::Diff(e) => e.received_at,
            Self::Snapshot(e) => e.received_at,
        }
    }

    /// Venue update id, if the event carries one.
    #[must_use]
    pub const fn update_id(&self) -> Option<u64> {
        match self {
            Self::Trade(_) => None,
            Self::Diff(e) => e.update_id,
            Self::Snapshot(e) => e.update_id,
        }
    }

    /// Discriminant used for metrics and logging.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Trade(_) => EventKind::Trade,
            Self::Diff(_) => EventKind::Diff,
            Self::Snapshot(_) => EventKind::Snapshot,
        }
    }
}

/// Event discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Trade executions.
    Trade,
    /// Incremental book update.
    Diff,
    /// Full book snapshot.
    Snapshot,
}

impl EventKind {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::Diff => "diff",
            Self::Snapshot => "snapshot",
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn accessors_follow_variant() {
        let now = Utc::now();
        let event = OrderBookEvent::Diff(DiffEvent {
            pair: TradingPair::from("BTC-USDT"),
            bids: vec![PriceLevel::new(dec!(100.5), dec!(2))],
            asks: Vec::new(),
            update_id: Some(42),
            received_at: now,
        });

        assert_eq!(event.pair().as_str(), "BTC-USDT");
        assert_eq!(event.kind(), EventKind::Diff);
        assert_eq!(event.update_id(), Some(42));
        assert_eq!(event.received_at(), now);
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = OrderBookEvent::Trade(TradeEvent {
            pair: TradingPair::from("ETH-BTC"),
            fills: vec![TradeFill {
                trade_id: Some(7),
                price: dec!(0.05),
                amount: dec!(1.25),
                taker_side: TakerSide::Sell,
                venue_time: Some(1_700_000_000),
            }],
            received_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "trade");
        assert_eq!(json["pair"], "ETH-BTC");
        assert_eq!(json["fills"][0]["price"], "0.05");
        assert_eq!(json["fills"][0]["taker_side"], "sell");
    }
}
