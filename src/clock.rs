//! Time sources for the pipeline.
//!
//! Rate limiting runs on monotonic `Instant`s; log records carry a local wall
//! clock timestamp. `ManualClock` moves both together for tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

/// Format of detection timestamps in log records and notifications.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait Clock: Send {
    fn now(&self) -> Instant;

    fn wall(&self) -> NaiveDateTime;

    fn timestamp(&self) -> String {
        self.wall().format(TIMESTAMP_FORMAT).to_string()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    inner: Arc<Mutex<(Instant, NaiveDateTime)>>,
}

impl ManualClock {
    pub fn starting_at(wall: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new((Instant::now(), wall))),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        if let Ok(mut guard) = self.inner.lock() {
            guard.0 += by;
            guard.1 += delta;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(chrono::Local::now().naive_local())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.inner
            .lock()
            .map(|guard| guard.0)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0)
    }

    fn wall(&self) -> NaiveDateTime {
        self.inner
            .lock()
            .map(|guard| guard.1)
            .unwrap_or_else(|poisoned| poisoned.into_inner().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn manual_clock_moves_both_timelines() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let clock = ManualClock::starting_at(start);
        let shared = clock.clone();
        let t0 = clock.now();

        shared.advance(Duration::from_secs(65));

        assert_eq!(clock.now() - t0, Duration::from_secs(65));
        assert_eq!(clock.timestamp(), "2024-05-01 08:31:05");
    }
}
