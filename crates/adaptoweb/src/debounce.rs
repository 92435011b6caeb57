//! Trailing-edge debounce timer driven by the caller's clock.

use std::time::{Duration, Instant};

/// A single pending deadline. Every [`Debouncer::schedule`] pushes the
/// deadline out to `now + delay`; [`Debouncer::fire`] reports it once.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the timer. Returns `true` when a pending deadline was replaced.
    pub fn schedule(&mut self, now: Instant) -> bool {
        self.deadline.replace(now + self.delay).is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the deadline if it has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_coalesces_into_one_fire() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        for i in 0..10 {
            debouncer.schedule(start + Duration::from_millis(i * 40));
        }
        assert!(!debouncer.fire(start + Duration::from_millis(600)));
        assert!(debouncer.fire(start + Duration::from_millis(860)));
        assert!(!debouncer.fire(start + Duration::from_millis(2000)));
    }

    #[test]
    fn test_cancel_clears_deadline() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        assert!(!debouncer.schedule(now));
        assert!(debouncer.schedule(now));
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert!(!debouncer.fire(now + Duration::from_secs(1)));
    }
}
