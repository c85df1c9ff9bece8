//! Bitzlato REST Client
//!
//! One-shot public market data requests: depth snapshots, tickers, and the
//! market listing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::codec::StreamCodec;
use super::messages::{MarketsResponse, TickerResponse, WireNumber};
use crate::application::ports::{PairTranslator, SnapshotSource};
use crate::domain::error::{DecodeError, FetchError, TransportError};
use crate::domain::market::{SnapshotEvent, TradingPair};
use crate::infrastructure::metrics;

/// Public markets endpoint.
pub const DEFAULT_REST_URL: &str = "https://www.bitzlato.dev/api/v2/peatio/public/markets";

/// Venue markets whose quote asset is supported.
const TRADING_PAIR_FILTER: [&str; 3] = ["BTC", "ETH", "USDT"];

/// REST client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    /// Markets base URL.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REST_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Bitzlato public REST adapter.
pub struct BitzlatoRestClient {
    client: reqwest::Client,
    base_url: String,
    translator: Arc<dyn PairTranslator>,
    codec: StreamCodec,
}

impl BitzlatoRestClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(
        config: &RestConfig,
        translator: Arc<dyn PairTranslator>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            translator,
            codec: StreamCodec::new(),
        })
    }

    /// Fetch the depth snapshot for `pair`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` on a non-200 status, a network failure, an
    /// unmappable pair, or a malformed body.
    pub async fn fetch_snapshot(
        &self,
        pair: &TradingPair,
        depth_limit: u32,
    ) -> Result<SnapshotEvent, FetchError> {
        let result = self.fetch_snapshot_inner(pair, depth_limit).await;
        metrics::record_snapshot_fetch(result.is_ok());
        result
    }

    async fn fetch_snapshot_inner(
        &self,
        pair: &TradingPair,
        depth_limit: u32,
    ) -> Result<SnapshotEvent, FetchError> {
        let venue_pair = self.venue_pair(pair)?;
        let url = format!("{}/{venue_pair}/depth", self.base_url);
        let context = format!("Error fetching Bitzlato market snapshot for {pair}");

        let body = self
            .get_text(&url, &[("limit", depth_limit.to_string())], context)
            .await?;
        let snapshot = self.codec.decode_snapshot(pair, &body, Utc::now())?;

        debug!(
            pair = %pair,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            "Fetched order book snapshot"
        );
        Ok(snapshot)
    }

    /// Last traded price for `pair`, taken from the ticker's average price.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the ticker cannot be fetched or has no price.
    pub async fn fetch_last_traded_price(&self, pair: &TradingPair) -> Result<Decimal, FetchError> {
        let (ticker, body) = self.fetch_ticker(pair).await?;
        let price = ticker
            .ticker
            .avg_price
            .as_ref()
            .ok_or_else(|| DecodeError::new("ticker has no avg_price", body.as_str()))?;
        price
            .to_decimal()
            .map_err(|text| DecodeError::new(format!("avg_price {text:?} is not a number"), body).into())
    }

    /// Midpoint of best bid and ask. A missing side counts as zero; a zero
    /// midpoint means there is no price.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the ticker cannot be fetched or a quote is
    /// not numeric.
    pub async fn fetch_mid_price(&self, pair: &TradingPair) -> Result<Option<Decimal>, FetchError> {
        let (ticker, body) = self.fetch_ticker(pair).await?;
        let parse = |side: Option<&WireNumber>| {
            side.map_or(Ok(Decimal::ZERO), WireNumber::to_decimal)
                .map_err(|text| DecodeError::new(format!("{text:?} is not a number"), body.as_str()))
        };
        let buy = parse(ticker.ticker.buy.as_ref())?;
        let sell = parse(ticker.ticker.sell.as_ref())?;

        let mid = (buy + sell) / Decimal::TWO;
        Ok((!mid.is_zero()).then_some(mid))
    }

    /// Every listed market whose quote asset is supported. Failures yield an
    /// empty list.
    pub async fn fetch_trading_pairs(&self) -> Vec<TradingPair> {
        match self.fetch_markets().await {
            Ok(markets) => markets
                .symbols
                .iter()
                .filter_map(|symbol| self.translator.from_venue(&symbol.id))
                .filter(|pair| {
                    pair.split()
                        .is_some_and(|(_, quote)| TRADING_PAIR_FILTER.contains(&quote))
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to fetch Bitzlato trading pairs");
                Vec::new()
            }
        }
    }

    async fn fetch_markets(&self) -> Result<MarketsResponse, FetchError> {
        let body = self
            .get_text(&self.base_url, &[], "Error fetching Bitzlato markets".to_string())
            .await?;
        serde_json::from_str(&body).map_err(|e| DecodeError::new(e.to_string(), body).into())
    }

    async fn fetch_ticker(&self, pair: &TradingPair) -> Result<(TickerResponse, String), FetchError> {
        let venue_pair = self.venue_pair(pair)?;
        let url = format!("{}/{venue_pair}/tickers", self.base_url);
        let context = format!("Error fetching Bitzlato ticker for {pair}");

        let body = self.get_text(&url, &[], context).await?;
        let ticker = serde_json::from_str(&body)
            .map_err(|e| DecodeError::new(e.to_string(), body.as_str()))?;
        Ok((ticker, body))
    }

    fn venue_pair(&self, pair: &TradingPair) -> Result<String, FetchError> {
        self.translator
            .to_venue(pair)
            .ok_or_else(|| FetchError::UnsupportedPair(pair.clone()))
    }

    /// GET `url` and return the body of a 200 response.
    async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: String,
    ) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TransportError::Status {
                context,
                status: status.as_u16(),
            }
            .into());
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()).into())
    }
}

#[async_trait]
impl SnapshotSource for BitzlatoRestClient {
    async fn fetch_snapshot(
        &self,
        pair: &TradingPair,
        depth_limit: u32,
    ) -> Result<SnapshotEvent, FetchError> {
        Self::fetch_snapshot(self, pair, depth_limit).await
    }
}
