use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of wall-clock time and timers for the tracker. Tests swap it for a clock driven by
/// tokio's paused time.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Wall-clock moment used for date keys and tick deltas.
    fn time(&self) -> DateTime<Utc>;

    /// Monotonic instant used for scheduling ticks.
    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

/// Milliseconds elapsed from `from` to `to`, fractions included. Negative spans (clock went
/// backwards) count as zero.
pub fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let elapsed = to - from;
    let ms = elapsed
        .num_nanoseconds()
        .map_or_else(|| elapsed.num_milliseconds() as f64, |v| v as f64 / 1e6);
    ms.max(0.)
}
