//! Tick clock — converts the host's fixed-length tick into tokio time.

use std::time::Duration;

use tokio::time::Instant;

/// Monotonic tick counter anchored at the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct TickClock {
    epoch: Instant,
    tick: Duration,
}

impl TickClock {
    /// A zero tick length is clamped to 1ms.
    pub fn new(tick: Duration) -> Self {
        let tick = if tick.is_zero() {
            Duration::from_millis(1)
        } else {
            tick
        };
        Self {
            epoch: Instant::now(),
            tick,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Current tick (whole ticks elapsed since the epoch).
    pub fn now(&self) -> u64 {
        self.tick_at(Instant::now())
    }

    /// Tick containing `instant`.
    pub fn tick_at(&self, instant: Instant) -> u64 {
        self.ticks_between(self.epoch, instant)
    }

    /// Whole ticks elapsed between two instants.
    pub fn ticks_between(&self, from: Instant, to: Instant) -> u64 {
        let elapsed = to.saturating_duration_since(from).as_nanos();
        u64::try_from(elapsed / self.tick.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Duration of `n` ticks.
    pub fn ticks(&self, n: u64) -> Duration {
        let nanos = self.tick.as_nanos().saturating_mul(u128::from(n));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Instant `n` ticks after `from`, saturating far in the future.
    pub fn after(&self, from: Instant, n: u64) -> Instant {
        from.checked_add(self.ticks(n))
            .unwrap_or_else(|| from + Duration::from_secs(60 * 60 * 24 * 365))
    }
}
