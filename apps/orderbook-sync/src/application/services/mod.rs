//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SnapshotRefreshScheduler`: Periodic per-pair snapshot publishing

mod refresh;

pub use refresh::{
    RefreshConfig, RefreshError, SnapshotRefreshScheduler, delay_until_next_hour,
};
