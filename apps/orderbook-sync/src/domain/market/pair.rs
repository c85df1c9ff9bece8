//! Trading Pairs
//!
//! Local `BASE-QUOTE` pair names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Local trading pair identifier, `BASE-QUOTE` (e.g. `BTC-USDT`).
///
/// The venue uses its own notation; conversion lives behind the
/// `PairTranslator` port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingPair(String);

impl TradingPair {
    /// Create a pair from its local name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Local name of the pair.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(base, quote)` if the name is in `BASE-QUOTE` form.
    #[must_use]
    pub fn split(&self) -> Option<(&str, &str)> {
        let (base, quote) = self.0.split_once('-')?;
        if base.is_empty() || quote.is_empty() || quote.contains('-') {
            return None;
        }
        Some((base, quote))
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TradingPair {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TradingPair {
    fn from(name: String) -> Self {
        Self(name)
    }
}
