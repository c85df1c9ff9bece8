//! Stream Subscriptions
//!
//! The pairs carried by one multiplexed stream and the URL that subscribes
//! to them.

use crate::domain::market::TradingPair;

/// Query prefix of the first stream name.
const STREAM_PREFIX: &str = "?stream=";

/// Separator between stream names in the query string.
const STREAM_DELIMITER: &str = "&stream=";

/// Which venue stream a subscription targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Public trades.
    Trades,
    /// Incremental order book updates.
    Diffs,
}

impl StreamKind {
    /// Suffix appended to the venue pair name to form a stream name.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Trades => ".trade",
            Self::Diffs => ".ob-inc",
        }
    }

    /// Label value for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::Diffs => "diffs",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SubscribedPair {
    pair: TradingPair,
    venue_pair: String,
}

/// The set of pairs carried by one stream connection.
///
/// Built once per session and never mutated; a new pair set means a new
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSubscription {
    kind: StreamKind,
    pairs: Vec<SubscribedPair>,
}

impl StreamSubscription {
    /// Build from `(local, venue)` pair names. Venue names are lowercased and
    /// duplicates are dropped, keeping the first occurrence.
    #[must_use]
    pub fn new(kind: StreamKind, pairs: impl IntoIterator<Item = (TradingPair, String)>) -> Self {
        let mut subscribed: Vec<SubscribedPair> = Vec::new();
        for (pair, venue_pair) in pairs {
            let venue_pair = venue_pair.to_lowercase();
            if subscribed.iter().any(|p| p.venue_pair == venue_pair) {
                continue;
            }
            subscribed.push(SubscribedPair { pair, venue_pair });
        }
        Self {
            kind,
            pairs: subscribed,
        }
    }

    /// Stream kind.
    #[must_use]
    pub const fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Local pairs in subscription order.
    pub fn pairs(&self) -> impl Iterator<Item = &TradingPair> {
        self.pairs.iter().map(|p| &p.pair)
    }

    /// Number of subscribed pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Stream names, e.g. `btcusdt.trade`.
    pub fn stream_names(&self) -> impl Iterator<Item = String> + '_ {
        self.pairs
            .iter()
            .map(|p| format!("{}{}", p.venue_pair, self.kind.suffix()))
    }

    /// Query string selecting every subscribed stream.
    #[must_use]
    pub fn path(&self) -> String {
        let names: Vec<String> = self.stream_names().collect();
        format!("{STREAM_PREFIX}{}", names.join(STREAM_DELIMITER))
    }

    /// Full connection URL under `base`.
    #[must_use]
    pub fn url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.path())
    }

    /// Local pair for a venue pair name (case-insensitive).
    #[must_use]
    pub fn resolve(&self, venue_pair: &str) -> Option<&TradingPair> {
        self.pairs
            .iter()
            .find(|p| p.venue_pair.eq_ignore_ascii_case(venue_pair))
            .map(|p| &p.pair)
    }
}
