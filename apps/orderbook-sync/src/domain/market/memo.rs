//! Expiring Memo
//!
//! Time-bounded key/value memo backing the mid-price lookup.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use super::TradingPair;

/// Mid prices memoized per pair. `None` (no two-sided quote) is memoized too.
pub type MidPriceMemo = ExpiringMemo<TradingPair, Option<Decimal>>;

/// Default lifetime of a memoized mid price.
pub const MID_PRICE_TTL: Duration = Duration::from_secs(10);

/// Key/value memo whose entries expire after a fixed TTL.
///
/// Time is passed in by the caller so expiry can be checked against any
/// clock, including a paused test clock.
#[derive(Debug, Clone)]
pub struct ExpiringMemo<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<K: Eq + Hash, V: Clone> ExpiringMemo<K, V> {
    /// Create an empty memo.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Value for `key` if it was stored less than one TTL before `now`.
    #[must_use]
    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Store `value`, replacing any previous entry.
    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        let expires_at = now + self.ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }

    /// Drop every expired entry.
    pub fn purge_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| now < entry.expires_at);
    }

    /// Number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the memo holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for ExpiringMemo<K, V> {
    fn default() -> Self {
        Self::new(MID_PRICE_TTL)
    }
}
