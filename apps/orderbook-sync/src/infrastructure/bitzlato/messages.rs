//! Bitzlato Wire Types
//!
//! Serde models for the Peatio-style REST and ranger payloads. Numeric
//! fields arrive either as strings or as JSON numbers; both are accepted.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::market::PriceLevel;

// =============================================================================
// Numbers and Levels
// =============================================================================

/// A number sent as a string or as a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    /// `"0.015"`
    Text(String),
    /// `0.015`
    Number(serde_json::Number),
}

impl WireNumber {
    /// Parse as a decimal. An empty string means zero (a removed level).
    ///
    /// # Errors
    ///
    /// Returns the offending text if it is not a number.
    pub fn to_decimal(&self) -> Result<Decimal, String> {
        let text = match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        };
        if text.is_empty() {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|_| text)
    }
}

/// `[price, amount]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireLevel(pub WireNumber, pub WireNumber);

impl WireLevel {
    /// Convert to a domain level.
    ///
    /// # Errors
    ///
    /// Returns the offending text if either field is not a number.
    pub fn to_level(&self) -> Result<PriceLevel, String> {
        Ok(PriceLevel::new(self.0.to_decimal()?, self.1.to_decimal()?))
    }
}

/// Diff sides carry either one level or a list of levels.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LevelSet {
    /// `[["p","a"], ...]`
    Many(Vec<WireLevel>),
    /// `["p","a"]`
    One(WireLevel),
}

impl LevelSet {
    /// Flatten into domain levels.
    ///
    /// # Errors
    ///
    /// Returns the offending text if any field is not a number.
    pub fn to_levels(&self) -> Result<Vec<PriceLevel>, String> {
        match self {
            Self::Many(levels) => levels.iter().map(WireLevel::to_level).collect(),
            Self::One(level) => Ok(vec![level.to_level()?]),
        }
    }
}

// =============================================================================
// REST
// =============================================================================

/// `GET /markets/{market}/depth`
#[derive(Debug, Clone, Deserialize)]
pub struct DepthResponse {
    /// Venue timestamp, used as the snapshot update id.
    #[serde(default)]
    pub timestamp: Option<u64>,
    /// Ask levels.
    #[serde(default)]
    pub asks: Vec<WireLevel>,
    /// Bid levels.
    #[serde(default)]
    pub bids: Vec<WireLevel>,
}

/// `GET /markets/{market}/tickers`
#[derive(Debug, Clone, Deserialize)]
pub struct TickerResponse {
    /// Ticker body.
    pub ticker: TickerBody,
}

/// Ticker fields used for prices.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerBody {
    /// Best bid.
    #[serde(default)]
    pub buy: Option<WireNumber>,
    /// Best ask.
    #[serde(default)]
    pub sell: Option<WireNumber>,
    /// Average trade price, reported as the last traded price.
    #[serde(default)]
    pub avg_price: Option<WireNumber>,
    /// Last trade price.
    #[serde(default)]
    pub last: Option<WireNumber>,
}

/// Market listing.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    /// Listed markets.
    #[serde(default)]
    pub symbols: Vec<MarketSymbol>,
}

/// One listed market.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSymbol {
    /// Venue market id, e.g. `btcusdt`.
    pub id: String,
}

// =============================================================================
// Ranger Stream
// =============================================================================

/// Body of a `{market}.trade` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct TradesPayload {
    /// Executions in venue order.
    pub trades: Vec<WireTrade>,
}

/// One execution.
#[derive(Debug, Clone, Deserialize)]
pub struct WireTrade {
    /// Trade id.
    #[serde(default)]
    pub tid: Option<u64>,
    /// `buy` or `sell`.
    pub taker_type: String,
    /// Epoch seconds.
    #[serde(default)]
    pub date: Option<i64>,
    /// Execution price.
    pub price: WireNumber,
    /// Executed quantity.
    pub amount: WireNumber,
}

/// Body of a `{market}.ob-inc` or `{market}.ob-snap` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct BookPayload {
    /// Changed ask levels.
    #[serde(default)]
    pub asks: Option<LevelSet>,
    /// Changed bid levels.
    #[serde(default)]
    pub bids: Option<LevelSet>,
    /// Venue sequence number.
    #[serde(default)]
    pub sequence: Option<u64>,
}
