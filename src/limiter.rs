//! Cooldown gate for side effects.
//!
//! One limiter gates the whole event stream of a channel: a detection of any
//! class consumes the cooldown for every class. The pipeline owns two
//! independent instances, one for log writes and one for notifications.

use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_fired: Option<Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: None,
        }
    }

    /// Allow the event iff nothing fired yet or at least `cooldown` elapsed
    /// since the last allowed event. Allowed events restart the cooldown.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let allowed = match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        };
        if allowed {
            self.last_fired = Some(now);
        }
        allowed
    }

    /// Time left before the next event would be allowed.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_fired {
            None => Duration::ZERO,
            Some(last) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: Duration = Duration::from_secs(5);

    #[test]
    fn first_event_is_allowed() {
        let mut limiter = RateLimiter::new(C);
        assert!(limiter.try_acquire(Instant::now()));
    }

    #[test]
    fn events_inside_cooldown_are_denied() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(C);
        assert!(limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0 + Duration::from_millis(4_999)));
        assert_eq!(limiter.remaining(t0 + Duration::from_secs(2)), Duration::from_secs(3));
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(C);
        assert!(limiter.try_acquire(t0));
        assert!(limiter.try_acquire(t0 + C));
    }

    #[test]
    fn denied_events_do_not_extend_cooldown() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(C);
        assert!(limiter.try_acquire(t0));
        assert!(!limiter.try_acquire(t0 + Duration::from_secs(4)));
        assert!(limiter.try_acquire(t0 + Duration::from_secs(5)));
        assert_eq!(limiter.last_fired(), Some(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn allowed_events_are_never_closer_than_cooldown() {
        let t0 = Instant::now();
        let mut limiter = RateLimiter::new(C);
        let mut allowed = Vec::new();
        for step in 0..200u64 {
            let now = t0 + Duration::from_millis(step * 130);
            if limiter.try_acquire(now) {
                allowed.push(now);
            }
        }
        assert!(allowed.len() > 1);
        for pair in allowed.windows(2) {
            assert!(pair[1] - pair[0] >= C);
        }
    }
}
