//! Order Book Sync Binary
//!
//! Keeps local order books for the configured pairs in sync with Bitzlato.
//!
//! # Usage
//!
//! ```bash
//! ORDERBOOK_SYNC_PAIRS=BTC-USDT,ETH-BTC cargo run --bin orderbook-sync
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ORDERBOOK_SYNC_PAIRS`: Comma separated local pairs
//!
//! ## Optional
//! - `ORDERBOOK_SYNC_REST_URL`: Markets REST base URL
//! - `ORDERBOOK_SYNC_STREAM_URL`: Ranger WebSocket base URL
//! - `ORDERBOOK_SYNC_HEALTH_PORT`: Health check HTTP port (default: 8083, 0 disables)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: orderbook-sync)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use orderbook_sync::application::ports::{EventSink, OrderBookDataSource, SystemClock};
use orderbook_sync::domain::market::OrderBookEvent;
use orderbook_sync::infrastructure::bitzlato::{
    BitzlatoOrderBookDataSource, BitzlatoPairTranslator, WsConnector,
};
use orderbook_sync::infrastructure::broadcast::{EventHub, EventReceiver};
use orderbook_sync::infrastructure::health::{HealthServer, HealthServerState};
use orderbook_sync::infrastructure::telemetry;
use orderbook_sync::{FeedConfig, init_metrics};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Order Book Sync");

    let _metrics_handle = init_metrics().context("failed to install Prometheus recorder")?;

    let config = FeedConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let event_hub = Arc::new(EventHub::new(config.broadcast_config()));
    tracing::debug!(capacity = event_hub.capacity(), "Event hub ready");
    let data_source = Arc::new(
        BitzlatoOrderBookDataSource::new(
            config.data_source(),
            Arc::new(WsConnector::new()),
            Arc::new(BitzlatoPairTranslator::new()),
            Arc::new(SystemClock),
            shutdown_token.clone(),
        )
        .context("failed to build data source")?,
    );

    let mut tasks = JoinSet::new();

    // Attach the consumer before anything publishes.
    let events = event_hub.subscribe();
    tasks.spawn(log_events(events, shutdown_token.clone()));

    bootstrap(data_source.as_ref(), event_hub.as_ref()).await;

    let sink = Arc::clone(&event_hub) as Arc<dyn EventSink>;

    let trades = Arc::clone(&data_source);
    let trades_sink = Arc::clone(&sink);
    tasks.spawn(async move {
        let _ = trades.run_trades(trades_sink).await;
    });

    let diffs = Arc::clone(&data_source);
    let diffs_sink = Arc::clone(&sink);
    tasks.spawn(async move {
        let _ = diffs.run_diffs(diffs_sink).await;
    });

    let refresh = Arc::clone(&data_source);
    let refresh_sink = Arc::clone(&sink);
    tasks.spawn(async move {
        let _ = refresh.run_snapshot_refresh(refresh_sink).await;
    });

    if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
    } else {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            data_source.statuses(),
            Arc::clone(&event_hub),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tasks.spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    tracing::info!("Order book sync ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        while tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        tracing::warn!("Tasks still running after shutdown timeout, aborting");
        tasks.abort_all();
    }

    tracing::info!("Order book sync stopped");
    Ok(())
}

/// Publish an initial snapshot for every configured pair.
async fn bootstrap(data_source: &BitzlatoOrderBookDataSource, sink: &dyn EventSink) {
    for pair in data_source.pairs() {
        match data_source.bootstrap_order_book(pair).await {
            Ok(snapshot) => {
                tracing::info!(
                    pair = %pair,
                    bids = snapshot.bids.len(),
                    asks = snapshot.asks.len(),
                    "Order book bootstrapped"
                );
                if let Err(e) = sink.publish(OrderBookEvent::Snapshot(snapshot)) {
                    tracing::warn!(pair = %pair, error = %e, "Bootstrap snapshot dropped");
                }
            }
            Err(e) => {
                tracing::error!(pair = %pair, error = %e, "Failed to bootstrap order book");
            }
        }
    }
}

/// Log every event until shutdown.
async fn log_events(mut events: EventReceiver, shutdown_token: CancellationToken) {
    loop {
        let event = tokio::select! {
            () = shutdown_token.cancelled() => return,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            return;
        };
        tracing::debug!(
            event = event.kind().as_str(),
            pair = %event.pair(),
            update_id = ?event.update_id(),
            "Order book event"
        );
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    let pairs: Vec<&str> = config.pairs.iter().map(|p| p.as_str()).collect();
    tracing::info!(
        pairs = ?pairs,
        health_port = config.server.health_port,
        channel_capacity = config.broadcast.channel_capacity,
        "Configuration loaded"
    );
    tracing::debug!(
        rest_url = %config.venue.rest_url,
        stream_url = %config.venue.stream_url,
        "Venue endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
