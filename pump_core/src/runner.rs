//! Control-loop pacing.
//!
//! `LoopTimer` hands out one elapsed-time delta per loop iteration once at least
//! `tick_ms` has passed; the caller feeds that same delta to every controller.

use pump_traits::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct LoopTimer {
    clock: Arc<dyn Clock + Send + Sync>,
    last: Instant,
    period: Duration,
}

impl std::fmt::Debug for LoopTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopTimer")
            .field("last", &self.last)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl LoopTimer {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, tick_ms: u64) -> Self {
        let last = clock.now();
        Self {
            clock,
            last,
            period: Duration::from_millis(tick_ms.max(1)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Elapsed milliseconds since the previous delta, if a full period has passed.
    pub fn poll(&mut self) -> Option<u32> {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last);
        if elapsed < self.period {
            return None;
        }
        let delta = u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX);
        // Carry the sub-millisecond remainder into the next delta.
        self.last += Duration::from_millis(u64::from(delta));
        Some(delta)
    }

    /// Sleep until the next period boundary and return the delta.
    pub fn wait(&mut self) -> u32 {
        loop {
            if let Some(delta) = self.poll() {
                return delta;
            }
            let elapsed = self.clock.now().saturating_duration_since(self.last);
            self.clock.sleep(self.period.saturating_sub(elapsed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pump_traits::ManualClock;

    #[test]
    fn no_delta_before_period() {
        let clock = ManualClock::new();
        let mut timer = LoopTimer::new(Arc::new(clock.clone()), 10);
        clock.advance_ms(9);
        assert_eq!(timer.poll(), None);
        clock.advance_ms(1);
        assert_eq!(timer.poll(), Some(10));
        assert_eq!(timer.poll(), None);
    }

    #[test]
    fn late_iterations_report_full_elapsed() {
        let clock = ManualClock::new();
        let mut timer = LoopTimer::new(Arc::new(clock.clone()), 10);
        clock.advance_ms(37);
        assert_eq!(timer.poll(), Some(37));
    }

    #[test]
    fn fractional_milliseconds_are_carried() {
        let clock = ManualClock::new();
        let mut timer = LoopTimer::new(Arc::new(clock.clone()), 10);
        let mut reported = 0u64;
        for _ in 0..1000 {
            clock.advance(Duration::from_micros(10_900));
            reported += u64::from(timer.poll().unwrap_or(0));
        }
        assert_eq!(reported, 10_900);
    }

    #[test]
    fn wait_advances_manual_clock() {
        let clock = ManualClock::new();
        let mut timer = LoopTimer::new(Arc::new(clock.clone()), 10);
        clock.advance_ms(4);
        assert_eq!(timer.wait(), 10);
    }
}
