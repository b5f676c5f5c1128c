//! Wall-clock timestamps for status reporting.
//!
//! State machines decide on `tokio::time::Instant`; these helpers only produce
//! the epoch-millisecond values surfaced in snapshots.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    to_epoch_millis(SystemTime::now())
}

/// Epoch milliseconds `delay` from now.
pub fn epoch_millis_after(delay: Duration) -> u64 {
    epoch_millis().saturating_add(delay.as_millis() as u64)
}

pub fn to_epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
