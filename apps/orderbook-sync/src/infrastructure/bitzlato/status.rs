//! Per-stream status shared with the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::streaming::{SessionState, StreamKind};
use crate::infrastructure::metrics;

/// Live status of one supervised stream.
#[derive(Debug)]
pub struct FeedStatus {
    kind: StreamKind,
    state: RwLock<SessionState>,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    messages_received: AtomicU64,
    reconnects: AtomicU64,
}

impl FeedStatus {
    /// Create a status starting in `Closed`.
    #[must_use]
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            state: RwLock::new(SessionState::Closed),
            last_message_at: RwLock::new(None),
            last_error: RwLock::new(None),
            messages_received: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    /// Stream this status tracks.
    #[must_use]
    pub const fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Record a lifecycle change. Reaching `Active` clears the last error.
    pub fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
        if state == SessionState::Active {
            *self.last_error.write() = None;
        }
        metrics::set_session_state(self.kind, state);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Whether the stream is currently receiving.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Record a received frame.
    pub fn record_message(&self, at: DateTime<Utc>) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        *self.last_message_at.write() = Some(at);
    }

    /// Record a reconnect.
    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        metrics::record_reconnect(self.kind);
    }

    /// Record a session failure.
    pub fn set_error(&self, error: impl Into<String>) {
        *self.last_error.write() = Some(error.into());
    }

    /// Frames received across all sessions.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Reconnects so far.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Time of the last received frame.
    #[must_use]
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        *self.last_message_at.read()
    }

    /// Last session failure, cleared on the next successful connect.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}
