//! 1 Hz countdown task

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::{
    state::{remaining_until, TimerId},
    utils::Clock,
};

/// Tick once per second until `ends_at`, reporting remaining milliseconds.
///
/// Remaining time is read from the clock on every tick, so a late or
/// skipped tick still reports the true value. At zero the task asks `finish`
/// whether it still owns the timer's countdown slot and only then runs
/// `on_complete`, which makes completion fire at most once per run.
pub async fn countdown_task<T, F, C>(
    id: TimerId,
    ends_at: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    on_tick: T,
    finish: F,
    on_complete: C,
) where
    T: Fn(u64) + Send + 'static,
    F: FnOnce() -> bool + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    debug!("Countdown for timer {} running until {}", id, ends_at);

    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let remaining = remaining_until(ends_at, clock.now());
        on_tick(remaining);

        if remaining == 0 {
            if finish() {
                debug!("Countdown for timer {} reached zero", id);
                on_complete();
            } else {
                debug!("Countdown for timer {} was superseded at zero", id);
            }
            break;
        }
    }
}
