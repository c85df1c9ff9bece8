//! Heartbeat
//!
//! Liveness tracking for a stream session. The venue goes quiet on illiquid
//! pairs, so silence alone is not fatal: after `message_timeout` without a
//! frame the session sends one ping, and only an unanswered ping within
//! `ping_timeout` ends the session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

/// Default silence tolerated before probing.
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for the probe's answer.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Silence before a liveness probe is sent.
    pub message_timeout: Duration,
    /// Time allowed for any frame to arrive after the probe.
    pub ping_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(message_timeout: Duration, ping_timeout: Duration) -> Self {
        Self {
            message_timeout,
            ping_timeout,
        }
    }
}

/// Liveness state shared between a session and its observers.
///
/// Survives reconnects so the health endpoint sees cumulative counts.
#[derive(Debug)]
pub struct HeartbeatState {
    last_activity: RwLock<Instant>,
    waiting_for_pong: AtomicBool,
    probes_sent: AtomicU64,
    timeouts: AtomicU64,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create new heartbeat state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_activity: RwLock::new(Instant::now()),
            waiting_for_pong: AtomicBool::new(false),
            probes_sent: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    /// A data frame arrived. Any frame answers an outstanding probe.
    pub fn record_activity(&self) {
        *self.last_activity.write() = Instant::now();
        self.waiting_for_pong.store(false, Ordering::SeqCst);
    }

    /// A pong arrived.
    pub fn record_pong(&self) {
        self.record_activity();
    }

    /// A probe was sent.
    pub fn mark_probe_sent(&self) {
        self.waiting_for_pong.store(true, Ordering::SeqCst);
        self.probes_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// The probe went unanswered.
    pub fn record_timeout(&self) {
        self.waiting_for_pong.store(false, Ordering::SeqCst);
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether a probe is outstanding.
    #[must_use]
    pub fn is_waiting_for_pong(&self) -> bool {
        self.waiting_for_pong.load(Ordering::SeqCst)
    }

    /// Time since the last frame or pong.
    #[must_use]
    pub fn time_since_activity(&self) -> Duration {
        self.last_activity.read().elapsed()
    }

    /// Probes sent so far.
    #[must_use]
    pub fn probes_sent(&self) -> u64 {
        self.probes_sent.load(Ordering::Relaxed)
    }

    /// Unanswered probes so far.
    #[must_use]
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Reset liveness for a new connection. Counters are kept.
    pub fn reset(&self) {
        *self.last_activity.write() = Instant::now();
        self.waiting_for_pong.store(false, Ordering::SeqCst);
    }
}
