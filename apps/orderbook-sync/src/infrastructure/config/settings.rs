//! Service Configuration Settings
//!
//! Configuration types for the sync service, loaded from environment
//! variables. Only the pair list is required; malformed numeric values fall
//! back to their defaults.

use std::time::Duration;

use crate::application::services::RefreshConfig;
use crate::domain::market::TradingPair;
use crate::infrastructure::bitzlato::{
    DEFAULT_REST_URL, DEFAULT_STREAM_URL, DataSourceConfig, HeartbeatConfig, ReconnectConfig,
    RestConfig,
};
use crate::infrastructure::broadcast::BroadcastConfig;

/// Venue endpoints and REST behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueSettings {
    /// Public markets REST base URL.
    pub rest_url: String,
    /// Ranger WebSocket base URL.
    pub stream_url: String,
    /// Levels requested per side for snapshots.
    pub depth_limit: u32,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for VenueSettings {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            depth_limit: 1000,
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Stream liveness and retry timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Silence tolerated before a liveness probe.
    pub message_timeout: Duration,
    /// Wait for the probe's answer.
    pub ping_timeout: Duration,
    /// Pause after a failed session.
    pub reconnect_delay: Duration,
    /// Pause between snapshot requests.
    pub snapshot_pacing: Duration,
    /// Pause after a failed refresh cycle.
    pub cycle_retry_delay: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            message_timeout: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(30),
            snapshot_pacing: Duration::from_secs(5),
            cycle_retry_delay: Duration::from_secs(5),
        }
    }
}

/// Output channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSettings {
    /// Events buffered per consumer.
    pub channel_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 10_000,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check and metrics HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Pairs kept in sync.
    pub pairs: Vec<TradingPair>,
    /// Venue endpoints.
    pub venue: VenueSettings,
    /// Stream timing.
    pub stream: StreamSettings,
    /// Output channel.
    pub broadcast: BroadcastSettings,
    /// Server ports.
    pub server: ServerSettings,
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `ORDERBOOK_SYNC_PAIRS` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `ORDERBOOK_SYNC_PAIRS` is missing or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_pairs = lookup("ORDERBOOK_SYNC_PAIRS")
            .ok_or_else(|| ConfigError::MissingEnvVar("ORDERBOOK_SYNC_PAIRS".to_string()))?;

        let pairs: Vec<TradingPair> = raw_pairs
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| TradingPair::new(p.to_uppercase()))
            .collect();

        if pairs.is_empty() {
            return Err(ConfigError::EmptyValue("ORDERBOOK_SYNC_PAIRS".to_string()));
        }

        let venue_defaults = VenueSettings::default();
        let venue = VenueSettings {
            rest_url: lookup("ORDERBOOK_SYNC_REST_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or(venue_defaults.rest_url),
            stream_url: lookup("ORDERBOOK_SYNC_STREAM_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or(venue_defaults.stream_url),
            depth_limit: parse_or(&lookup, "ORDERBOOK_SYNC_DEPTH_LIMIT", venue_defaults.depth_limit),
            http_timeout: parse_secs_or(
                &lookup,
                "ORDERBOOK_SYNC_HTTP_TIMEOUT_SECS",
                venue_defaults.http_timeout,
            ),
        };

        let stream_defaults = StreamSettings::default();
        let stream = StreamSettings {
            message_timeout: parse_secs_or(
                &lookup,
                "ORDERBOOK_SYNC_MESSAGE_TIMEOUT_SECS",
                stream_defaults.message_timeout,
            ),
            ping_timeout: parse_secs_or(
                &lookup,
                "ORDERBOOK_SYNC_PING_TIMEOUT_SECS",
                stream_defaults.ping_timeout,
            ),
            reconnect_delay: parse_secs_or(
                &lookup,
                "ORDERBOOK_SYNC_RECONNECT_DELAY_SECS",
                stream_defaults.reconnect_delay,
            ),
            snapshot_pacing: parse_secs_or(
                &lookup,
                "ORDERBOOK_SYNC_SNAPSHOT_PACING_SECS",
                stream_defaults.snapshot_pacing,
            ),
            cycle_retry_delay: parse_secs_or(
                &lookup,
                "ORDERBOOK_SYNC_CYCLE_RETRY_SECS",
                stream_defaults.cycle_retry_delay,
            ),
        };

        let broadcast = BroadcastSettings {
            channel_capacity: parse_or(
                &lookup,
                "ORDERBOOK_SYNC_CHANNEL_CAPACITY",
                BroadcastSettings::default().channel_capacity,
            ),
        };

        let server = ServerSettings {
            health_port: parse_or(
                &lookup,
                "ORDERBOOK_SYNC_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        Ok(Self {
            pairs,
            venue,
            stream,
            broadcast,
            server,
        })
    }

    /// Data source configuration derived from these settings.
    #[must_use]
    pub fn data_source(&self) -> DataSourceConfig {
        DataSourceConfig {
            pairs: self.pairs.clone(),
            rest: RestConfig {
                base_url: self.venue.rest_url.clone(),
                timeout: self.venue.http_timeout,
            },
            stream: ReconnectConfig {
                stream_url: self.venue.stream_url.clone(),
                heartbeat: HeartbeatConfig::new(
                    self.stream.message_timeout,
                    self.stream.ping_timeout,
                ),
                retry_delay: self.stream.reconnect_delay,
            },
            refresh: RefreshConfig {
                depth_limit: self.venue.depth_limit,
                pacing: self.stream.snapshot_pacing,
                cycle_retry_delay: self.stream.cycle_retry_delay,
            },
            mid_price_ttl: Duration::from_secs(10),
        }
    }

    /// Output channel configuration.
    #[must_use]
    pub const fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            capacity: self.broadcast.channel_capacity,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
