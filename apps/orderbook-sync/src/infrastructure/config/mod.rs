//! Configuration Module
//!
//! Configuration loading for the order book sync service.

mod settings;

pub use settings::{
    BroadcastSettings, ConfigError, FeedConfig, ServerSettings, StreamSettings, VenueSettings,
};
