//! Market Data Types
//!
//! Normalized order book events shared by every producer: the trade stream,
//! the diff stream, and the periodic snapshot refresh. These types are
//! transport-agnostic and carry a receipt timestamp rather than venue time.

mod event;
mod memo;
mod pair;

pub use event::{
    DiffEvent, EventKind, OrderBookEvent, PriceLevel, SnapshotEvent, TakerSide, TradeEvent,
    TradeFill,
};
pub use memo::{ExpiringMemo, MID_PRICE_TTL, MidPriceMemo};
pub use pair::TradingPair;
