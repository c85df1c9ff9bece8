//! Bitzlato Order Book Data Source
//!
//! Wires the REST client, the stream supervisors, and the snapshot
//! refresh scheduler into the `OrderBookDataSource` capability.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::reconnect::{ReconnectConfig, ReconnectSupervisor};
use super::rest::{BitzlatoRestClient, RestConfig};
use super::status::FeedStatus;
use crate::application::ports::{
    Clock, EventSink, OrderBookDataSource, PairTranslator, SnapshotSource, StreamConnector,
};
use crate::application::services::{RefreshConfig, SnapshotRefreshScheduler};
use crate::domain::error::{Cancelled, FetchError, TransportError};
use crate::domain::market::{MID_PRICE_TTL, MidPriceMemo, SnapshotEvent, TradingPair};
use crate::domain::streaming::{StreamKind, StreamSubscription};
use crate::infrastructure::broadcast::MeteredSink;

/// Data source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Pairs kept in sync.
    pub pairs: Vec<TradingPair>,
    /// REST endpoint settings.
    pub rest: RestConfig,
    /// Stream endpoint and reconnect settings.
    pub stream: ReconnectConfig,
    /// Snapshot refresh settings.
    pub refresh: RefreshConfig,
    /// Lifetime of a memoized mid price.
    pub mid_price_ttl: Duration,
}

impl DataSourceConfig {
    /// Defaults for `pairs`.
    #[must_use]
    pub fn new(pairs: Vec<TradingPair>) -> Self {
        Self {
            pairs,
            rest: RestConfig::default(),
            stream: ReconnectConfig::default(),
            refresh: RefreshConfig::default(),
            mid_price_ttl: MID_PRICE_TTL,
        }
    }
}

/// Order book data source for the Bitzlato exchange.
pub struct BitzlatoOrderBookDataSource {
    rest: Arc<BitzlatoRestClient>,
    connector: Arc<dyn StreamConnector>,
    translator: Arc<dyn PairTranslator>,
    clock: Arc<dyn Clock>,
    config: DataSourceConfig,
    trade_status: Arc<FeedStatus>,
    diff_status: Arc<FeedStatus>,
    mid_prices: Mutex<MidPriceMemo>,
    cancel: CancellationToken,
}

impl BitzlatoOrderBookDataSource {
    /// Create a data source. Nothing connects until a producer runs.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(
        config: DataSourceConfig,
        connector: Arc<dyn StreamConnector>,
        translator: Arc<dyn PairTranslator>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<Self, TransportError> {
        let rest = BitzlatoRestClient::new(&config.rest, Arc::clone(&translator))?;
        let mid_prices = MidPriceMemo::new(config.mid_price_ttl);

        Ok(Self {
            rest: Arc::new(rest),
            connector,
            translator,
            clock,
            config,
            trade_status: Arc::new(FeedStatus::new(StreamKind::Trades)),
            diff_status: Arc::new(FeedStatus::new(StreamKind::Diffs)),
            mid_prices: Mutex::new(mid_prices),
            cancel,
        })
    }

    /// Pairs kept in sync.
    #[must_use]
    pub fn pairs(&self) -> &[TradingPair] {
        &self.config.pairs
    }

    /// Status of the trade and diff streams, in that order.
    #[must_use]
    pub fn statuses(&self) -> Vec<Arc<FeedStatus>> {
        vec![Arc::clone(&self.trade_status), Arc::clone(&self.diff_status)]
    }

    /// Subscription for `kind` over the configured pairs. Pairs without a
    /// venue name are skipped.
    #[must_use]
    pub fn subscription(&self, kind: StreamKind) -> StreamSubscription {
        let venue_pairs = self.config.pairs.iter().filter_map(|pair| {
            let venue_pair = self.translator.to_venue(pair);
            if venue_pair.is_none() {
                warn!(pair = %pair, "Skipping pair with no venue name");
            }
            venue_pair.map(|venue_pair| (pair.clone(), venue_pair))
        });
        StreamSubscription::new(kind, venue_pairs)
    }

    /// Mid price for `pair`, memoized for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the ticker cannot be fetched.
    pub async fn get_mid_price(&self, pair: &TradingPair) -> Result<Option<Decimal>, FetchError> {
        let cached = self.mid_prices.lock().get(pair, Instant::now().into_std());
        if let Some(mid) = cached {
            return Ok(mid);
        }

        let mid = self.rest.fetch_mid_price(pair).await?;
        let now = Instant::now().into_std();
        let mut memo = self.mid_prices.lock();
        memo.purge_expired(now);
        memo.insert(pair.clone(), mid, now);
        Ok(mid)
    }

    /// Every venue market with a supported quote asset; empty on failure.
    pub async fn fetch_trading_pairs(&self) -> Vec<TradingPair> {
        self.rest.fetch_trading_pairs().await
    }

    async fn run_stream(
        &self,
        kind: StreamKind,
        status: &Arc<FeedStatus>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Infallible, Cancelled> {
        let supervisor = ReconnectSupervisor::new(
            Arc::clone(&self.connector),
            self.subscription(kind),
            self.config.stream.clone(),
            Arc::new(MeteredSink::new(sink)),
            Arc::clone(status),
            self.cancel.child_token(),
        );
        supervisor.run().await
    }
}

#[async_trait]
impl OrderBookDataSource for BitzlatoOrderBookDataSource {
    async fn bootstrap_order_book(&self, pair: &TradingPair) -> Result<SnapshotEvent, FetchError> {
        self.rest
            .fetch_snapshot(pair, self.config.refresh.depth_limit)
            .await
    }

    async fn run_trades(&self, sink: Arc<dyn EventSink>) -> Result<Infallible, Cancelled> {
        self.run_stream(StreamKind::Trades, &self.trade_status, sink)
            .await
    }

    async fn run_diffs(&self, sink: Arc<dyn EventSink>) -> Result<Infallible, Cancelled> {
        self.run_stream(StreamKind::Diffs, &self.diff_status, sink)
            .await
    }

    async fn run_snapshot_refresh(&self, sink: Arc<dyn EventSink>) -> Result<Infallible, Cancelled> {
        let source: Arc<dyn SnapshotSource> = self.rest.clone();
        let scheduler = SnapshotRefreshScheduler::new(
            source,
            Arc::new(MeteredSink::new(sink)),
            Arc::clone(&self.clock),
            self.config.pairs.clone(),
            self.config.refresh,
            self.cancel.child_token(),
        );
        scheduler.run().await
    }

    async fn fetch_last_traded_prices(
        &self,
        pairs: &[TradingPair],
    ) -> Result<HashMap<TradingPair, Decimal>, FetchError> {
        let fetches = pairs.iter().map(|pair| async move {
            let price = self.rest.fetch_last_traded_price(pair).await?;
            Ok::<_, FetchError>((pair.clone(), price))
        });
        let prices = futures::future::try_join_all(fetches).await?;
        Ok(prices.into_iter().collect())
    }
}
