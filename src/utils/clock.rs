//! Time sources for anchors and countdowns

use chrono::{DateTime, Utc};

/// Source of "now" for anchor arithmetic
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock. Keeps counting across process suspension, which is what the
/// server-side anchors assume.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock reading that advances with tokio's time driver.
///
/// Under `tokio::time::pause` this clock only moves when tokio time does,
/// which keeps 1 Hz ticking and anchor arithmetic in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    origin_instant: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            origin_instant: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.origin_instant.elapsed();
        self.origin + chrono::Duration::milliseconds(elapsed.as_millis() as i64)
    }
}
