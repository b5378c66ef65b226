//! Minimum-interval gate between announcements

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Rate limiter holding the time of the last allowed announcement
///
/// Check-and-update happens under one lock, so concurrent callers can never
/// both pass inside the same interval.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_announcement_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_announcement_at: Mutex::new(None),
        }
    }

    /// Allow an announcement at `now` if the interval has elapsed
    ///
    /// Records `now` as the last announcement time only when it returns true.
    pub fn allow(&self, now: Instant) -> bool {
        let mut last = self
            .last_announcement_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let allowed = match *last {
            Some(at) => now.saturating_duration_since(at) >= self.min_interval,
            None => true,
        };

        if allowed {
            *last = Some(now);
        }
        allowed
    }

    pub fn last_announcement_at(&self) -> Option<Instant> {
        *self
            .last_announcement_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
