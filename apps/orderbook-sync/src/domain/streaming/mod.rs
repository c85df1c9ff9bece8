//! Stream Types
//!
//! Subscription descriptors for the venue's multiplexed stream endpoint,
//! the raw message wrapper, and the lifecycle of a single streaming session.

use std::borrow::Cow;

mod session;
mod subscription;

pub use session::{SessionState, StreamEnded};
pub use subscription::{StreamKind, StreamSubscription};

/// Unparsed frame payload received from the stream. Binary frames are kept
/// as received; UTF-8 is checked when the payload is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStreamMessage(Vec<u8>);

impl RawStreamMessage {
    /// Wrap a received payload.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self(payload.into())
    }

    /// Payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload as text for logs, with invalid UTF-8 replaced.
    #[must_use]
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}
