//! Snapshot Refresh
//!
//! Re-fetches a full snapshot for every pair in round-robin order, pacing
//! requests to stay under venue rate limits, then sleeps until the next
//! top of the UTC hour and starts over.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ports::{Clock, EventSink, SnapshotSource};
use crate::domain::error::Cancelled;
use crate::domain::market::{OrderBookEvent, TradingPair};

/// Default pause between two snapshot requests.
pub const DEFAULT_PACING: Duration = Duration::from_secs(5);

/// Default pause after a failed cycle.
pub const DEFAULT_CYCLE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default number of levels requested per side.
pub const DEFAULT_DEPTH_LIMIT: u32 = 1000;

/// Refresh loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Levels requested per side.
    pub depth_limit: u32,
    /// Pause after each pair, success or failure.
    pub pacing: Duration,
    /// Pause after a cycle-level failure.
    pub cycle_retry_delay: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            depth_limit: DEFAULT_DEPTH_LIMIT,
            pacing: DEFAULT_PACING,
            cycle_retry_delay: DEFAULT_CYCLE_RETRY_DELAY,
        }
    }
}

/// Cycle-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// The loop was cancelled mid-cycle.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// The next hour boundary could not be computed from the clock reading.
    #[error("cannot compute next hour boundary from {0}")]
    Schedule(DateTime<Utc>),
}

/// Time from `now` to the next top of the UTC hour.
///
/// Exactly on the hour yields a full hour.
///
/// # Errors
///
/// Returns `RefreshError::Schedule` if `now` is outside the representable
/// range.
pub fn delay_until_next_hour(now: DateTime<Utc>) -> Result<Duration, RefreshError> {
    let hour = TimeDelta::try_hours(1).ok_or(RefreshError::Schedule(now))?;
    let this_hour = now
        .duration_trunc(hour)
        .map_err(|_| RefreshError::Schedule(now))?;
    let next_hour = this_hour
        .checked_add_signed(hour)
        .ok_or(RefreshError::Schedule(now))?;
    (next_hour - now)
        .to_std()
        .map_err(|_| RefreshError::Schedule(now))
}

/// Periodic snapshot publisher.
pub struct SnapshotRefreshScheduler {
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    pairs: Vec<TradingPair>,
    config: RefreshConfig,
    cancel: CancellationToken,
}

impl SnapshotRefreshScheduler {
    /// Create a scheduler for `pairs`.
    #[must_use]
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        pairs: Vec<TradingPair>,
        config: RefreshConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
            pairs,
            config,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` once the cancellation token fires.
    pub async fn run(&self) -> Result<Infallible, Cancelled> {
        info!(pairs = self.pairs.len(), "Starting snapshot refresh loop");

        loop {
            match self.run_cycle().await {
                Ok(()) => {}
                Err(RefreshError::Cancelled(cancelled)) => {
                    info!("Snapshot refresh loop cancelled");
                    return Err(cancelled);
                }
                Err(e) => {
                    error!(error = %e, "Unexpected error in snapshot refresh cycle");
                    self.sleep(self.config.cycle_retry_delay).await?;
                }
            }
        }
    }

    /// One pass over every pair followed by the sleep to the next hour.
    async fn run_cycle(&self) -> Result<(), RefreshError> {
        for pair in &self.pairs {
            self.refresh_pair(pair).await?;
            self.sleep(self.config.pacing).await?;
        }

        let delay = delay_until_next_hour(self.clock.now())?;
        debug!(
            delay_secs = delay.as_secs(),
            "Snapshot cycle complete, sleeping until next hour"
        );
        self.sleep(delay).await?;
        Ok(())
    }

    /// Fetch and publish one snapshot. Fetch and publish failures are logged,
    /// never propagated.
    async fn refresh_pair(&self, pair: &TradingPair) -> Result<(), Cancelled> {
        let fetched = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Cancelled),
            fetched = self.source.fetch_snapshot(pair, self.config.depth_limit) => fetched,
        };

        match fetched {
            Ok(snapshot) => match self.sink.publish(OrderBookEvent::Snapshot(snapshot)) {
                Ok(()) => debug!(pair = %pair, "Saved order book snapshot"),
                Err(e) => warn!(pair = %pair, error = %e, "Order book snapshot dropped"),
            },
            Err(e) => {
                error!(pair = %pair, error = %e, "Unexpected error fetching order book snapshot");
            }
        }
        Ok(())
    }

    async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
