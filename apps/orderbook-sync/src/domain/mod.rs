//! Domain Layer - Core order book types and business rules.
//!
//! This layer contains the normalized market data model, the stream
//! subscription and session lifecycle types, and the error taxonomy shared
//! by every adapter. Nothing here performs I/O.

/// Error taxonomy for transport, decoding, and cancellation.
pub mod error;

/// Trading pairs, price levels, and normalized order book events.
pub mod market;

/// Stream subscriptions, raw messages, and session lifecycle.
pub mod streaming;
