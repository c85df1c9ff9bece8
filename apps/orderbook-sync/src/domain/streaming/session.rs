//! Session Lifecycle
//!
//! Session states and the reasons a session stops producing messages.

use crate::domain::error::TransportError;

/// Lifecycle of one streaming session.
///
/// ```text
/// Connecting ──► Active ──► Draining ──► Closed
///      │                                   ▲
///      └───────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Handshake in progress.
    Connecting,
    /// Receiving frames.
    Active,
    /// Shutting down the connection.
    Draining,
    /// Connection released; the session yields nothing more.
    Closed,
}

impl SessionState {
    /// Whether moving to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Active | Self::Closed)
                | (Self::Active, Self::Draining)
                | (Self::Draining, Self::Closed)
        )
    }

    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }

    /// Numeric encoding for the session-state gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Connecting => 1.0,
            Self::Active => 2.0,
            Self::Draining => 3.0,
            Self::Closed => 0.0,
        }
    }
}

/// Why a session stopped producing messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamEnded {
    /// No traffic and no answer to the liveness probe.
    #[error("heartbeat timed out")]
    HeartbeatTimeout,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ClosedByPeer,

    /// The session was cancelled by its owner.
    #[error("session cancelled")]
    Cancelled,

    /// Transport failure.
    #[error("stream failed: {0}")]
    Failed(#[from] TransportError),

    /// The session had already ended.
    #[error("session already closed")]
    Exhausted,
}

impl StreamEnded {
    /// Clean endings reconnect immediately; failures wait out the retry
    /// delay. `Cancelled` is neither and stops the supervisor.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(
            self,
            Self::HeartbeatTimeout | Self::ClosedByPeer | Self::Exhausted
        )
    }
}
