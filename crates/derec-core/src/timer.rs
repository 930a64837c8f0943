//! Periodic timer driven by explicit time.
//!
//! There is no background thread or callback. The owner calls
//! [`PeriodicTimer::poll`] with the current time and fires its own tick
//! handler once per `true` it gets back.

use std::time::{Duration, Instant};

/// Shortest period a timer accepts. A zero period would fire forever.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Fixed-rate timer with a changeable period.
///
/// # Invariants
///
/// - Once stopped, `poll` returns `false` forever.
/// - Each `true` from `poll` advances the deadline by one period, so a
///   caller that fell behind catches up one tick per call.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: Duration,
    next_due: Option<Instant>,
}

impl PeriodicTimer {
    /// Start a timer whose first tick is due one period after `now`
    pub fn start(now: Instant, period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        Self { period, next_due: Some(now + period) }
    }

    /// Current period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the next tick is due, or `None` once stopped
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// True until [`PeriodicTimer::stop`] is called
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Change the period used to schedule ticks after the pending one
    pub fn set_period(&mut self, period: Duration) {
        self.period = period.max(MIN_PERIOD);
    }

    /// Stop the timer. Idempotent.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Returns true if a tick is due at `now`, and schedules the next one.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = Some(due + self.period);
                true
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_period() {
        let t0 = Instant::now();
        let mut timer = PeriodicTimer::start(t0, Duration::from_secs(10));

        assert!(!timer.poll(t0));
        assert!(!timer.poll(t0 + Duration::from_secs(9)));
        assert!(timer.poll(t0 + Duration::from_secs(10)));
        assert!(!timer.poll(t0 + Duration::from_secs(10)));
        assert_eq!(timer.next_due(), Some(t0 + Duration::from_secs(20)));
    }

    #[test]
    fn catches_up_one_tick_per_poll() {
        let t0 = Instant::now();
        let mut timer = PeriodicTimer::start(t0, Duration::from_secs(10));
        let late = t0 + Duration::from_secs(35);

        let fired = std::iter::from_fn(|| timer.poll(late).then_some(())).count();
        assert_eq!(fired, 3);
    }

    #[test]
    fn period_change_applies_after_pending_tick() {
        let t0 = Instant::now();
        let mut timer = PeriodicTimer::start(t0, Duration::from_secs(10));
        timer.set_period(Duration::from_secs(5));

        assert!(timer.poll(t0 + Duration::from_secs(10)));
        assert_eq!(timer.next_due(), Some(t0 + Duration::from_secs(15)));
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let t0 = Instant::now();
        let mut timer = PeriodicTimer::start(t0, Duration::from_secs(1));

        timer.stop();
        timer.stop();
        assert!(!timer.is_running());
        assert!(!timer.poll(t0 + Duration::from_secs(3600)));
    }

    #[test]
    fn zero_period_is_clamped() {
        let timer = PeriodicTimer::start(Instant::now(), Duration::ZERO);
        assert_eq!(timer.period(), MIN_PERIOD);
    }
}
