//! Drift-Corrected Ticker
//!
//! Each wait sleeps for the interval plus the accumulated drift minus the
//! time already spent since the previous wake. Oversleeping on one tick
//! shortens the next, so the long-run rate stays exact.

use std::time::Duration;

use tokio::time::Instant;

/// Fixed-rate wake-up source for the tick driver.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    last_wake: Instant,
    /// Target minus actual, summed over every tick. Negative when behind.
    drift_nanos: i128,
}

impl Ticker {
    /// Ticker firing every `interval`, measured from now.
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_wake: Instant::now(), drift_nanos: 0 }
    }

    /// Ticker for `rate` ticks per second.
    pub fn with_rate(rate: u32) -> Self {
        Self::new(Duration::from_secs(1) / rate.max(1))
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Accumulated drift in nanoseconds.
    #[inline]
    pub fn drift_nanos(&self) -> i128 {
        self.drift_nanos
    }

    /// Wait until the next tick is due.
    pub async fn tick(&mut self) {
        let interval = self.interval.as_nanos() as i128;
        let elapsed = self.last_wake.elapsed().as_nanos() as i128;

        let wait = interval + self.drift_nanos - elapsed;
        if wait > 0 {
            tokio::time::sleep(Duration::from_nanos(wait as u64)).await;
        }

        let now = Instant::now();
        let actual = now.duration_since(self.last_wake).as_nanos() as i128;
        self.drift_nanos += interval - actual;
        self.last_wake = now;
    }
}
