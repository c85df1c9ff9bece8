//! Bitzlato pair notation: local `BTC-USDT` is venue `btcusdt`.

use crate::application::ports::PairTranslator;
use crate::domain::market::TradingPair;

/// Quote assets recognised when splitting a venue name, longest first.
pub const QUOTE_ASSETS: [&str; 3] = ["USDT", "BTC", "ETH"];

/// Translator for Bitzlato market ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitzlatoPairTranslator;

impl BitzlatoPairTranslator {
    /// Create a translator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PairTranslator for BitzlatoPairTranslator {
    fn to_venue(&self, pair: &TradingPair) -> Option<String> {
        let (base, quote) = pair.split()?;
        Some(format!("{base}{quote}").to_lowercase())
    }

    fn from_venue(&self, venue_pair: &str) -> Option<TradingPair> {
        let upper = venue_pair.to_uppercase();
        QUOTE_ASSETS.iter().find_map(|quote| {
            let base = upper.strip_suffix(quote)?;
            (!base.is_empty()).then(|| TradingPair::new(format!("{base}-{quote}")))
        })
    }
}
