//! Snapshot Refresh Integration Tests
//!
//! Runs the refresh scheduler against a clock driven by the paused tokio
//! timer, checking per-pair pacing and alignment to the top of the hour.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use orderbook_sync::application::ports::{Clock, EventSink, PublishError, SnapshotSource};
use orderbook_sync::application::services::{RefreshConfig, SnapshotRefreshScheduler};
use orderbook_sync::{
    Cancelled, FetchError, OrderBookEvent, SnapshotEvent, TradingPair, TransportError,
};

/// Wall clock that moves with tokio's (paused) timer.
struct TimerClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl TimerClock {
    fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Clock for TimerClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + TimeDelta::from_std(self.started.elapsed()).unwrap()
    }
}

/// Records when each pair was fetched; pairs listed in `failing` error out.
struct RecordingSource {
    started: Instant,
    failing: Vec<TradingPair>,
    fetches: Mutex<Vec<(TradingPair, u64, u32)>>,
}

impl RecordingSource {
    fn new(failing: &[&str]) -> Self {
        Self {
            started: Instant::now(),
            failing: failing.iter().copied().map(TradingPair::from).collect(),
            fetches: Mutex::new(Vec::new()),
        }
    }

    fn fetch_times(&self) -> Vec<(String, u64)> {
        self.fetches
            .lock()
            .iter()
            .map(|(pair, at, _)| (pair.to_string(), *at))
            .collect()
    }
}

#[async_trait]
impl SnapshotSource for RecordingSource {
    async fn fetch_snapshot(
        &self,
        pair: &TradingPair,
        depth_limit: u32,
    ) -> Result<SnapshotEvent, FetchError> {
        self.fetches
            .lock()
            .push((pair.clone(), self.started.elapsed().as_secs(), depth_limit));

        if self.failing.contains(pair) {
            return Err(TransportError::Status {
                context: format!("Error fetching Bitzlato market snapshot for {pair}"),
                status: 503,
            }
            .into());
        }

        Ok(SnapshotEvent {
            pair: pair.clone(),
            bids: Vec::new(),
            asks: Vec::new(),
            update_id: Some(1),
            received_at: Utc::now(),
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    published: Mutex<Vec<String>>,
}

impl EventSink for RecordingSink {
    fn publish(&self, event: OrderBookEvent) -> Result<(), PublishError> {
        self.published.lock().push(event.pair().to_string());
        Ok(())
    }
}

struct Harness {
    source: Arc<RecordingSource>,
    sink: Arc<RecordingSink>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<Result<std::convert::Infallible, Cancelled>>,
}

fn start(origin: DateTime<Utc>, failing: &[&str]) -> Harness {
    let source = Arc::new(RecordingSource::new(failing));
    let sink = Arc::new(RecordingSink::default());
    let cancel = CancellationToken::new();

    let scheduler = SnapshotRefreshScheduler::new(
        Arc::clone(&source) as Arc<dyn SnapshotSource>,
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::new(TimerClock::starting_at(origin)),
        ["BTC-USDT", "ETH-BTC", "MCR-ETH"]
            .into_iter()
            .map(TradingPair::from)
            .collect(),
        RefreshConfig::default(),
        cancel.clone(),
    );
    let task = tokio::spawn(async move { scheduler.run().await });

    Harness {
        source,
        sink,
        cancel,
        task,
    }
}

#[tokio::test(start_paused = true)]
async fn cycles_are_paced_and_aligned_to_the_hour() {
    let origin = Utc.with_ymd_and_hms(2024, 3, 1, 10, 59, 0).unwrap();
    let harness = start(origin, &[]);

    tokio::time::sleep(Duration::from_secs(3_662)).await;

    assert_eq!(
        harness.source.fetch_times(),
        vec![
            ("BTC-USDT".to_string(), 0),
            ("ETH-BTC".to_string(), 5),
            ("MCR-ETH".to_string(), 10),
            // 10:59:15 + 45s = 11:00:00
            ("BTC-USDT".to_string(), 60),
            ("ETH-BTC".to_string(), 65),
            ("MCR-ETH".to_string(), 70),
            // 11:00:15 + 3585s = 12:00:00
            ("BTC-USDT".to_string(), 3_660),
        ]
    );
    assert_eq!(harness.sink.published.lock().len(), 7);
    assert!(
        harness
            .source
            .fetches
            .lock()
            .iter()
            .all(|(_, _, depth)| *depth == 1000)
    );
}

#[tokio::test(start_paused = true)]
async fn failing_pair_is_skipped_without_breaking_pacing() {
    let origin = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
    let harness = start(origin, &["ETH-BTC"]);

    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(
        harness.source.fetch_times(),
        vec![
            ("BTC-USDT".to_string(), 0),
            ("ETH-BTC".to_string(), 5),
            ("MCR-ETH".to_string(), 10),
        ]
    );
    assert_eq!(
        harness.sink.published.lock().clone(),
        vec!["BTC-USDT".to_string(), "MCR-ETH".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_during_hourly_sleep_stops_loop() {
    let origin = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let harness = start(origin, &[]);

    tokio::time::sleep(Duration::from_secs(600)).await;
    harness.cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), harness.task)
        .await
        .expect("scheduler should stop promptly")
        .unwrap();
    assert!(matches!(result, Err(Cancelled)));
    assert_eq!(harness.source.fetch_times().len(), 3);
}
