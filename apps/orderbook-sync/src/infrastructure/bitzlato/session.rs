//! Stream Session
//!
//! One connection's worth of stream reading: connect, hand out text frames,
//! keep the connection alive with heartbeat probes, and release it exactly
//! once. A session never reconnects; that is the supervisor's job.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::heartbeat::{HeartbeatConfig, HeartbeatState};
use crate::application::ports::{Frame, StreamConnection, StreamConnector};
use crate::domain::error::TransportError;
use crate::domain::streaming::{RawStreamMessage, SessionState, StreamEnded, StreamKind};
use crate::infrastructure::metrics;

/// Upper bound on a graceful close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Stream being read, for logs and metrics.
    pub kind: StreamKind,
    /// Full connection URL including the stream query.
    pub url: String,
    /// Liveness timing.
    pub heartbeat: HeartbeatConfig,
}

/// A single live stream connection.
pub struct StreamSession {
    config: SessionConfig,
    connection: Option<Box<dyn StreamConnection>>,
    state: SessionState,
    heartbeat: Arc<HeartbeatState>,
    cancel: CancellationToken,
}

impl StreamSession {
    /// Connect and return an active session.
    ///
    /// # Errors
    ///
    /// Returns `StreamEnded::Cancelled` if `cancel` fires during the
    /// handshake, or `StreamEnded::Failed` if the connect fails.
    pub async fn connect(
        connector: &dyn StreamConnector,
        config: SessionConfig,
        heartbeat: Arc<HeartbeatState>,
        cancel: CancellationToken,
    ) -> Result<Self, StreamEnded> {
        debug!(stream = %config.kind, url = %config.url, "Connecting to stream");

        let connection = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StreamEnded::Cancelled),
            connected = connector.connect(&config.url) => connected?,
        };

        heartbeat.reset();
        info!(stream = %config.kind, "Stream connected");

        Ok(Self {
            config,
            connection: Some(connection),
            state: SessionState::Active,
            heartbeat,
            cancel,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Next text message.
    ///
    /// # Errors
    ///
    /// Returns why the session ended. The connection has been released by
    /// the time this returns an error, and every later call returns
    /// `StreamEnded::Exhausted`.
    pub async fn next_message(&mut self) -> Result<RawStreamMessage, StreamEnded> {
        if self.state != SessionState::Active {
            return Err(StreamEnded::Exhausted);
        }

        let cancel = self.cancel.clone();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(StreamEnded::Cancelled),
            outcome = self.read_next() => outcome,
        };

        if let Err(ended) = &outcome {
            self.shutdown(ended).await;
        }
        outcome
    }

    /// Turn the session into a stream of messages. The last item is the
    /// `Err` explaining why the session ended.
    pub fn into_stream(self) -> impl Stream<Item = Result<RawStreamMessage, StreamEnded>> + Send {
        futures::stream::unfold(Some(self), |session| async move {
            let mut session = session?;
            match session.next_message().await {
                Ok(message) => Some((Ok(message), Some(session))),
                Err(ended) => Some((Err(ended), None)),
            }
        })
    }

    async fn read_next(&mut self) -> Result<RawStreamMessage, StreamEnded> {
        let heartbeat = Arc::clone(&self.heartbeat);
        let timing = self.config.heartbeat;
        let kind = self.config.kind;
        let connection = self.connection.as_mut().ok_or(StreamEnded::Exhausted)?;

        loop {
            let Ok(frame) = tokio::time::timeout(timing.message_timeout, connection.next_frame()).await
            else {
                if let Some(message) = probe(connection.as_mut(), kind, timing, &heartbeat).await? {
                    return Ok(message);
                }
                continue;
            };

            if let Some(message) = classify(frame, &heartbeat)? {
                return Ok(message);
            }
        }
    }

    /// Release the connection. Runs once per session.
    async fn shutdown(&mut self, ended: &StreamEnded) {
        self.transition(SessionState::Draining);

        if let Some(mut connection) = self.connection.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, connection.close()).await.is_err() {
                warn!(stream = %self.config.kind, "Timed out closing stream connection");
            }
        }

        self.transition(SessionState::Closed);
        debug!(stream = %self.config.kind, reason = %ended, "Stream session closed");
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        }
    }
}

/// Map a transport frame to a message, `None` for frames that carry no data.
fn classify(
    frame: Option<Result<Frame, TransportError>>,
    heartbeat: &HeartbeatState,
) -> Result<Option<RawStreamMessage>, StreamEnded> {
    match frame {
        Some(Ok(Frame::Text(text))) => {
            heartbeat.record_activity();
            Ok(Some(RawStreamMessage::new(text)))
        }
        Some(Ok(Frame::Binary(data))) => {
            heartbeat.record_activity();
            Ok(Some(RawStreamMessage::new(data)))
        }
        Some(Ok(Frame::Pong)) => {
            heartbeat.record_pong();
            Ok(None)
        }
        Some(Ok(Frame::Close)) | None => Err(StreamEnded::ClosedByPeer),
        Some(Err(e)) => Err(StreamEnded::Failed(e)),
    }
}

/// Send one ping and wait for any frame. A data frame that arrives first
/// is returned and counts as the answer. Sending and waiting share one
/// `ping_timeout`, so a stalled write also ends the session.
async fn probe(
    connection: &mut dyn StreamConnection,
    kind: StreamKind,
    timing: HeartbeatConfig,
    heartbeat: &HeartbeatState,
) -> Result<Option<RawStreamMessage>, StreamEnded> {
    heartbeat.mark_probe_sent();
    metrics::record_heartbeat_probe(kind);

    let answered =
        tokio::time::timeout(timing.ping_timeout, ping_and_wait(connection, heartbeat)).await;

    answered.unwrap_or_else(|_| {
        warn!(
            stream = %kind,
            silent_secs = heartbeat.time_since_activity().as_secs(),
            "WebSocket ping timed out. Going to reconnect..."
        );
        heartbeat.record_timeout();
        metrics::record_heartbeat_timeout(kind);
        Err(StreamEnded::HeartbeatTimeout)
    })
}

/// Send the ping, then read until a data frame or the pong arrives.
async fn ping_and_wait(
    connection: &mut dyn StreamConnection,
    heartbeat: &HeartbeatState,
) -> Result<Option<RawStreamMessage>, StreamEnded> {
    connection.send_ping().await?;
    loop {
        if let Some(message) = classify(connection.next_frame().await, heartbeat)? {
            return Ok(Some(message));
        }
        if !heartbeat.is_waiting_for_pong() {
            return Ok(None);
        }
    }
}
