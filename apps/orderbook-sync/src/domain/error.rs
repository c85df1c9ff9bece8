//! Domain Errors
//!
//! Every failure a producer can observe falls into one of three buckets:
//! the transport failed, the payload could not be decoded, or the caller
//! cancelled. Malformed payloads are never turned into default values.

use thiserror::Error;

use super::market::TradingPair;

// =============================================================================
// Transport
// =============================================================================

/// Network-level failure while talking to the venue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The venue answered with a non-success HTTP status.
    #[error("{context}. HTTP status is {status}.")]
    Status {
        /// What was being fetched.
        context: String,
        /// HTTP status code returned by the venue.
        status: u16,
    },

    /// HTTP request failed before a status was available.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// WebSocket handshake or TCP connect failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Error on an established WebSocket connection.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

impl TransportError {
    /// HTTP status code, if the venue returned one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// A payload that could not be mapped to a normalized event.
///
/// Carries the raw payload so the caller can log exactly what was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode payload: {reason}")]
pub struct DecodeError {
    reason: String,
    raw: String,
}

impl DecodeError {
    /// Create a decode error for the given raw payload.
    #[must_use]
    pub fn new(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Why decoding failed.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The offending payload.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

// =============================================================================
// Fetching
// =============================================================================

/// Failure of a one-shot REST fetch (snapshot, ticker, markets).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network or HTTP status failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body was not in the expected shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The pair has no venue-native name.
    #[error("trading pair {0} is not supported by the venue")]
    UnsupportedPair(TradingPair),
}

// =============================================================================
// Cancellation
// =============================================================================

/// The surrounding task was cancelled.
///
/// Long-running producers return `Result<Infallible, Cancelled>`: they never
/// finish on their own, so the only way out is cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task cancelled")]
pub struct Cancelled;
