//! Stream Supervision Integration Tests
//!
//! Drives the reconnect supervisor against a scripted connector with the
//! tokio clock paused, covering heartbeat probes, retries, malformed frames,
//! and cancellation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use orderbook_sync::application::ports::{
    EventSink, Frame, OrderBookDataSource, StreamConnection, StreamConnector, SystemClock,
};
use orderbook_sync::infrastructure::bitzlato::{
    BitzlatoOrderBookDataSource, BitzlatoPairTranslator, DataSourceConfig, FeedStatus,
    ReconnectConfig, ReconnectSupervisor,
};
use orderbook_sync::{
    Cancelled, EventHub, EventReceiver, FetchError, OrderBookEvent, SessionState, StreamKind,
    StreamSubscription, TakerSide, TradingPair, TransportError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type FrameSender = mpsc::UnboundedSender<Result<Frame, TransportError>>;

// =============================================================================
// Scripted Transport
// =============================================================================

/// What the test can observe about one connection.
#[derive(Default)]
struct ConnectionProbe {
    pings: AtomicUsize,
    closed: AtomicBool,
}

impl ConnectionProbe {
    fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedConnection {
    frames: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    pong: Option<FrameSender>,
    stall_pings: bool,
    probe: Arc<ConnectionProbe>,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        self.frames.recv().await
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.probe.pings.fetch_add(1, Ordering::SeqCst);
        if self.stall_pings {
            return std::future::pending().await;
        }
        if let Some(pong) = &self.pong {
            let _ = pong.send(Ok(Frame::Pong));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

enum Script {
    Fail(TransportError),
    Connect(ScriptedConnection),
}

/// Hands out scripted connections in order; once the script runs out,
/// connects hang.
#[derive(Default)]
struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    fn push_failure(&self, error: TransportError) {
        self.scripts.lock().push_back(Script::Fail(error));
    }

    /// Queue a connection. The sender feeds it frames; dropping the sender
    /// ends the connection.
    fn push_connection(&self, answer_pings: bool) -> (FrameSender, Arc<ConnectionProbe>) {
        self.push(answer_pings, false)
    }

    /// Queue a connection whose ping writes never complete.
    fn push_stalled_connection(&self) -> (FrameSender, Arc<ConnectionProbe>) {
        self.push(false, true)
    }

    fn push(&self, answer_pings: bool, stall_pings: bool) -> (FrameSender, Arc<ConnectionProbe>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Arc::new(ConnectionProbe::default());
        let connection = ScriptedConnection {
            frames: rx,
            pong: answer_pings.then(|| tx.clone()),
            stall_pings,
            probe: Arc::clone(&probe),
        };
        self.scripts.lock().push_back(Script::Connect(connection));
        (tx, probe)
    }

    fn attempts(&self) -> usize {
        self.urls.lock().len()
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        self.urls.lock().push(url.to_string());
        let next = self.scripts.lock().pop_front();
        match next {
            Some(Script::Connect(connection)) => Ok(Box::new(connection)),
            Some(Script::Fail(error)) => Err(error),
            None => std::future::pending().await,
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    connector: Arc<ScriptedConnector>,
    supervisor: Arc<ReconnectSupervisor>,
    status: Arc<FeedStatus>,
    events: EventReceiver,
    cancel: CancellationToken,
}

impl Harness {
    fn new(kind: StreamKind) -> Self {
        let connector = Arc::new(ScriptedConnector::default());
        let hub = Arc::new(EventHub::with_defaults());
        let events = hub.subscribe();
        let sink: Arc<dyn EventSink> = hub;
        let status = Arc::new(FeedStatus::new(kind));
        let cancel = CancellationToken::new();

        let subscription = StreamSubscription::new(
            kind,
            [
                (TradingPair::from("BTC-USDT"), "btcusdt".to_string()),
                (TradingPair::from("ETH-BTC"), "ethbtc".to_string()),
            ],
        );
        let config = ReconnectConfig {
            stream_url: "ws://venue.test/".to_string(),
            ..ReconnectConfig::default()
        };

        let supervisor = Arc::new(ReconnectSupervisor::new(
            Arc::clone(&connector) as Arc<dyn StreamConnector>,
            subscription,
            config,
            sink,
            Arc::clone(&status),
            cancel.clone(),
        ));

        Self {
            connector,
            supervisor,
            status,
            events,
            cancel,
        }
    }

    fn spawn(&self) -> JoinHandle<Result<Infallible, Cancelled>> {
        let supervisor = Arc::clone(&self.supervisor);
        tokio::spawn(async move { supervisor.run().await })
    }
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test(start_paused = true)]
async fn connects_with_multiplexed_stream_url() {
    let harness = Harness::new(StreamKind::Diffs);
    let (_frames, _probe) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    advance(1).await;

    assert_eq!(
        harness.connector.urls.lock().clone(),
        vec!["ws://venue.test/?stream=btcusdt.ob-inc&stream=ethbtc.ob-inc".to_string()]
    );
    assert_eq!(harness.status.state(), SessionState::Active);
}

#[tokio::test(start_paused = true)]
async fn connect_failure_waits_retry_delay() {
    let harness = Harness::new(StreamKind::Trades);
    harness
        .connector
        .push_failure(TransportError::Connect("connection refused".to_string()));
    let (_frames, _probe) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    advance(29).await;
    assert_eq!(harness.connector.attempts(), 1);
    assert!(
        harness
            .status
            .last_error()
            .is_some_and(|e| e.contains("connection refused"))
    );

    advance(2).await;
    assert_eq!(harness.connector.attempts(), 2);
    assert_eq!(harness.status.state(), SessionState::Active);
    assert_eq!(harness.status.last_error(), None);
    assert_eq!(harness.status.reconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn peer_close_reconnects_immediately() {
    let harness = Harness::new(StreamKind::Trades);
    let (frames, first) = harness.connector.push_connection(false);
    let (_second_frames, _second) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    frames.send(Ok(Frame::Close)).unwrap();
    advance(1).await;

    assert!(first.is_closed());
    assert_eq!(harness.connector.attempts(), 2);
    assert_eq!(harness.status.reconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_error_mid_session_waits_retry_delay() {
    let harness = Harness::new(StreamKind::Trades);
    let (frames, first) = harness.connector.push_connection(false);
    let (_second_frames, _second) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    frames
        .send(Err(TransportError::WebSocket("reset by peer".to_string())))
        .unwrap();
    advance(1).await;

    assert!(first.is_closed());
    assert_eq!(harness.connector.attempts(), 1);

    advance(30).await;
    assert_eq!(harness.connector.attempts(), 2);
}

// =============================================================================
// Heartbeat
// =============================================================================

#[tokio::test(start_paused = true)]
async fn silent_connection_gets_one_ping_then_reconnects() {
    let harness = Harness::new(StreamKind::Trades);
    let (_frames, first) = harness.connector.push_connection(false);
    let (_second_frames, second) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    advance(29).await;
    assert_eq!(first.pings(), 0);

    advance(2).await;
    assert_eq!(first.pings(), 1);
    assert!(!first.is_closed());

    advance(8).await;
    assert_eq!(harness.connector.attempts(), 1);

    advance(2).await;
    assert_eq!(first.pings(), 1);
    assert!(first.is_closed());
    assert_eq!(harness.connector.attempts(), 2);
    assert_eq!(second.pings(), 0);

    let heartbeat = harness.supervisor.heartbeat();
    assert_eq!(heartbeat.probes_sent(), 1);
    assert_eq!(heartbeat.timeouts(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_ping_write_times_out_and_reconnects() {
    let harness = Harness::new(StreamKind::Diffs);
    let (_frames, first) = harness.connector.push_stalled_connection();
    let (_second_frames, _second) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    advance(31).await;
    assert_eq!(first.pings(), 1);
    assert!(!first.is_closed());

    advance(10).await;
    assert!(first.is_closed());
    assert_eq!(harness.connector.attempts(), 2);
    assert_eq!(harness.supervisor.heartbeat().timeouts(), 1);
    assert_eq!(harness.status.state(), SessionState::Active);
}

#[tokio::test(start_paused = true)]
async fn answered_ping_keeps_session_open() {
    let harness = Harness::new(StreamKind::Trades);
    let (_frames, probe) = harness.connector.push_connection(true);
    let _task = harness.spawn();

    advance(75).await;

    assert_eq!(probe.pings(), 2);
    assert!(!probe.is_closed());
    assert_eq!(harness.connector.attempts(), 1);
    assert_eq!(harness.supervisor.heartbeat().timeouts(), 0);
}

#[tokio::test(start_paused = true)]
async fn data_frames_postpone_the_probe() {
    let harness = Harness::new(StreamKind::Trades);
    let (frames, probe) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    for _ in 0..3 {
        advance(20).await;
        frames
            .send(Ok(Frame::Text(r#"{"success":{"message":"subscribed"}}"#.to_string())))
            .unwrap();
    }
    advance(20).await;

    assert_eq!(probe.pings(), 0);
    assert_eq!(harness.status.messages_received(), 3);
    assert_eq!(harness.connector.attempts(), 1);
}

// =============================================================================
// Decoding
// =============================================================================

#[tokio::test(start_paused = true)]
async fn malformed_frame_is_skipped() {
    let mut harness = Harness::new(StreamKind::Trades);
    let (frames, probe) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    frames.send(Ok(Frame::Text("not json".to_string()))).unwrap();
    frames
        .send(Ok(Frame::Text(
            r#"{"btcusdt.trade":{"trades":[{"tid":7,"taker_type":"sell","date":1700000000,"price":"100.5","amount":"0.25"}]}}"#
                .to_string(),
        )))
        .unwrap();

    let event = harness.events.recv().await.unwrap();
    let OrderBookEvent::Trade(trade) = event else {
        panic!("expected trade event, got {event:?}");
    };
    assert_eq!(trade.pair.as_str(), "BTC-USDT");
    assert_eq!(trade.fills.len(), 1);
    assert_eq!(trade.fills[0].trade_id, Some(7));
    assert_eq!(trade.fills[0].taker_side, TakerSide::Sell);
    assert_eq!(trade.fills[0].price, dec!(100.5));

    assert_eq!(harness.status.messages_received(), 2);
    assert!(!probe.is_closed());
    assert_eq!(harness.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn binary_frame_with_invalid_utf8_is_skipped() {
    let mut harness = Harness::new(StreamKind::Trades);
    let (frames, probe) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    let mut corrupted = br#"{"btcusdt.trade":{"trades":[]}}"#.to_vec();
    corrupted[2] = 0xfe;
    frames.send(Ok(Frame::Binary(corrupted))).unwrap();
    frames
        .send(Ok(Frame::Binary(
            br#"{"ethbtc.trade":{"trades":[{"tid":3,"taker_type":"buy","price":"0.05","amount":"2"}]}}"#
                .to_vec(),
        )))
        .unwrap();

    let event = harness.events.recv().await.unwrap();
    assert_eq!(event.pair().as_str(), "ETH-BTC");
    assert_eq!(harness.status.messages_received(), 2);
    assert!(!probe.is_closed());
    assert_eq!(harness.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn diff_stream_publishes_diffs() {
    let mut harness = Harness::new(StreamKind::Diffs);
    let (frames, _probe) = harness.connector.push_connection(false);
    let _task = harness.spawn();

    frames
        .send(Ok(Frame::Text(
            r#"{"ethbtc.ob-inc":{"bids":["0.05","0"],"sequence":42}}"#.to_string(),
        )))
        .unwrap();

    let event = harness.events.recv().await.unwrap();
    let OrderBookEvent::Diff(diff) = event else {
        panic!("expected diff event, got {event:?}");
    };
    assert_eq!(diff.pair.as_str(), "ETH-BTC");
    assert_eq!(diff.update_id, Some(42));
    assert_eq!(diff.bids.len(), 1);
    assert!(diff.bids[0].amount.is_zero());
    assert!(diff.asks.is_empty());
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn cancel_closes_connection_and_stops() {
    let harness = Harness::new(StreamKind::Trades);
    let (_frames, probe) = harness.connector.push_connection(false);
    let task = harness.spawn();

    advance(1).await;
    harness.cancel.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(Cancelled)));
    assert!(probe.is_closed());
    assert_eq!(harness.status.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_retry_delay() {
    let harness = Harness::new(StreamKind::Trades);
    harness
        .connector
        .push_failure(TransportError::Connect("connection refused".to_string()));
    let task = harness.spawn();

    advance(5).await;
    harness.cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("supervisor should stop without waiting out the delay")
        .unwrap();
    assert!(matches!(result, Err(Cancelled)));
    assert_eq!(harness.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_hanging_connect() {
    let harness = Harness::new(StreamKind::Diffs);
    let task = harness.spawn();

    advance(5).await;
    harness.cancel.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(Cancelled)));
}

// =============================================================================
// Data Source
// =============================================================================

#[tokio::test]
async fn diff_stream_keeps_running_while_snapshot_fetch_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/btcusdt/depth"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let connector = Arc::new(ScriptedConnector::default());
    let (frames, probe) = connector.push_connection(false);

    let mut config = DataSourceConfig::new(vec![TradingPair::from("BTC-USDT")]);
    config.rest.base_url = server.uri();
    config.stream.stream_url = "ws://venue.test".to_string();
    let cancel = CancellationToken::new();
    let source = Arc::new(
        BitzlatoOrderBookDataSource::new(
            config,
            Arc::clone(&connector) as Arc<dyn StreamConnector>,
            Arc::new(BitzlatoPairTranslator::new()),
            Arc::new(SystemClock),
            cancel.clone(),
        )
        .unwrap(),
    );

    let hub = Arc::new(EventHub::with_defaults());
    let mut events = hub.subscribe();
    let diffs = Arc::clone(&source);
    let diffs_task = tokio::spawn(async move { diffs.run_diffs(hub as Arc<dyn EventSink>).await });

    let err = source
        .bootstrap_order_book(&TradingPair::from("BTC-USDT"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::Transport(TransportError::Status { status: 503, .. })
    ));

    frames
        .send(Ok(Frame::Text(
            r#"{"btcusdt.ob-inc":{"asks":["101","1.5"],"sequence":9}}"#.to_string(),
        )))
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, OrderBookEvent::Diff(_)));
    assert_eq!(event.update_id(), Some(9));
    assert!(!probe.is_closed());
    assert_eq!(connector.attempts(), 1);
    assert!(source.statuses()[1].is_active());

    cancel.cancel();
    assert!(matches!(diffs_task.await.unwrap(), Err(Cancelled)));
}
