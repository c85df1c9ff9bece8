//! Stream Supervisor
//!
//! Keeps one stream subscribed for as long as the owner wants it. Each
//! session is read to its end and its frames are decoded and published;
//! then a fresh session is opened. Clean endings (peer close, heartbeat
//! timeout) reconnect immediately. Failures wait out a fixed retry delay so
//! a broken venue is not hammered.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::codec::StreamCodec;
use super::heartbeat::{HeartbeatConfig, HeartbeatState};
use super::session::{SessionConfig, StreamSession};
use super::status::FeedStatus;
use super::websocket::DEFAULT_STREAM_URL;
use crate::application::ports::{EventSink, StreamConnector};
use crate::domain::error::Cancelled;
use crate::domain::streaming::{RawStreamMessage, SessionState, StreamEnded, StreamSubscription};
use crate::infrastructure::metrics::{self, DropReason};

/// Default pause after a failed session.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Supervisor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Ranger base URL; the stream query is appended per subscription.
    pub stream_url: String,
    /// Liveness timing for every session.
    pub heartbeat: HeartbeatConfig,
    /// Pause after a failed session.
    pub retry_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            heartbeat: HeartbeatConfig::default(),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Runs sessions for one subscription until cancelled.
pub struct ReconnectSupervisor {
    connector: Arc<dyn StreamConnector>,
    subscription: StreamSubscription,
    config: ReconnectConfig,
    codec: StreamCodec,
    sink: Arc<dyn EventSink>,
    status: Arc<FeedStatus>,
    heartbeat: Arc<HeartbeatState>,
    cancel: CancellationToken,
}

impl ReconnectSupervisor {
    /// Create a supervisor.
    #[must_use]
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        subscription: StreamSubscription,
        config: ReconnectConfig,
        sink: Arc<dyn EventSink>,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            subscription,
            config,
            codec: StreamCodec::new(),
            sink,
            status,
            heartbeat: Arc::new(HeartbeatState::new()),
            cancel,
        }
    }

    /// Heartbeat counters shared across sessions.
    #[must_use]
    pub fn heartbeat(&self) -> Arc<HeartbeatState> {
        Arc::clone(&self.heartbeat)
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` once the cancellation token fires.
    pub async fn run(&self) -> Result<Infallible, Cancelled> {
        let kind = self.subscription.kind();
        info!(stream = %kind, pairs = self.subscription.len(), "Starting stream supervisor");

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.stop());
            }

            let ended = self.run_session().await;
            if ended == StreamEnded::Cancelled {
                return Err(self.stop());
            }

            if ended.is_clean() {
                info!(stream = %kind, reason = %ended, "Stream session ended, reconnecting");
            } else {
                error!(
                    stream = %kind,
                    error = %ended,
                    "Unexpected error with WebSocket connection. Retrying after {} seconds...",
                    self.config.retry_delay.as_secs()
                );
                self.status.set_error(ended.to_string());

                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Err(self.stop()),
                    () = tokio::time::sleep(self.config.retry_delay) => {}
                }
            }

            self.status.increment_reconnects();
        }
    }

    /// Open one session and pump it to its end.
    async fn run_session(&self) -> StreamEnded {
        self.status.set_state(SessionState::Connecting);

        let config = SessionConfig {
            kind: self.subscription.kind(),
            url: self.subscription.url(&self.config.stream_url),
            heartbeat: self.config.heartbeat,
        };
        let session = match StreamSession::connect(
            self.connector.as_ref(),
            config,
            Arc::clone(&self.heartbeat),
            self.cancel.clone(),
        )
        .await
        {
            Ok(session) => session,
            Err(ended) => {
                self.status.set_state(SessionState::Closed);
                return ended;
            }
        };
        self.status.set_state(SessionState::Active);

        let messages = session.into_stream();
        futures_util::pin_mut!(messages);

        while let Some(item) = messages.next().await {
            match item {
                Ok(raw) => self.dispatch(&raw),
                Err(ended) => {
                    self.status.set_state(SessionState::Closed);
                    return ended;
                }
            }
        }

        self.status.set_state(SessionState::Closed);
        StreamEnded::Exhausted
    }

    /// Decode one frame and publish the result. Malformed frames are logged
    /// and dropped.
    fn dispatch(&self, raw: &RawStreamMessage) {
        let kind = self.subscription.kind();
        let received_at = Utc::now();
        self.status.record_message(received_at);
        metrics::record_message_received(kind);

        match self.codec.decode(raw, &self.subscription, received_at) {
            Ok(Some(event)) => {
                if let Err(e) = self.sink.publish(event) {
                    debug!(stream = %kind, error = %e, "Event not delivered");
                }
            }
            Ok(None) => trace!(stream = %kind, "Ignoring control frame"),
            Err(e) => {
                warn!(
                    stream = %kind,
                    error = %e,
                    payload = %e.raw(),
                    "Dropping malformed stream message"
                );
                metrics::record_event_dropped(DropReason::Malformed);
            }
        }
    }

    fn stop(&self) -> Cancelled {
        self.status.set_state(SessionState::Closed);
        info!(stream = %self.subscription.kind(), "Stream supervisor cancelled");
        Cancelled
    }
}

