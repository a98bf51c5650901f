//! Remaining-time resolution from server anchors
//!
//! Remaining time is always recomputed from `started_at`/`paused_at` instead
//! of being decremented per tick, so delayed ticks never accumulate drift.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::{Lifecycle, Timer};
use crate::error::TimerError;

/// Milliseconds left on `timer` at `now`, or an error when a required
/// anchor is missing.
///
/// A stopped timer has nothing left; a restart always begins a fresh full
/// duration.
pub fn try_resolve(timer: &Timer, now: DateTime<Utc>) -> Result<u64, TimerError> {
    let started_at = || {
        timer
            .started_at
            .ok_or_else(|| TimerError::missing_anchor("started_at"))
    };

    let elapsed = match timer.lifecycle {
        Lifecycle::Stopped => return Ok(0),
        Lifecycle::Running => now - started_at()?,
        Lifecycle::Paused => {
            let paused_at = timer
                .paused_at
                .ok_or_else(|| TimerError::missing_anchor("paused_at"))?;
            paused_at - started_at()?
        }
    };

    Ok(remaining_after(timer.duration_ms(), elapsed.num_milliseconds()))
}

/// Like [`try_resolve`], but degrades to 0 and logs instead of failing.
pub fn resolve(timer: &Timer, now: DateTime<Utc>) -> u64 {
    try_resolve(timer, now).unwrap_or_else(|e| {
        warn!("Treating timer {} as complete: {}", timer.id, e);
        0
    })
}

/// Milliseconds between `now` and `ends_at`, floored at 0
pub fn remaining_until(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (ends_at - now).num_milliseconds().max(0) as u64
}

fn remaining_after(total_ms: u64, elapsed_ms: i64) -> u64 {
    // An anchor ahead of our clock means nothing has elapsed yet
    if elapsed_ms <= 0 {
        return total_ms;
    }
    total_ms.saturating_sub(elapsed_ms as u64)
}
