//! Bitzlato Exchange Adapters
//!
//! Implements the order book data source for Bitzlato's Peatio-based API:
//!
//! - **REST**: Depth snapshots, tickers, market listing
//! - **Ranger**: Trade and incremental order book streams (JSON)

pub mod codec;
pub mod data_source;
pub mod heartbeat;
pub mod messages;
pub mod pairs;
pub mod reconnect;
pub mod rest;
pub mod session;
pub mod status;
pub mod websocket;

pub use codec::StreamCodec;
pub use data_source::{BitzlatoOrderBookDataSource, DataSourceConfig};
pub use heartbeat::{HeartbeatConfig, HeartbeatState};
pub use pairs::BitzlatoPairTranslator;
pub use reconnect::{ReconnectConfig, ReconnectSupervisor};
pub use rest::{BitzlatoRestClient, DEFAULT_REST_URL, RestConfig};
pub use session::{SessionConfig, StreamSession};
pub use status::FeedStatus;
pub use websocket::{DEFAULT_STREAM_URL, WsConnection, WsConnector};
