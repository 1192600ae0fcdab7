use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

/// Remaining-allowance value reported when limiting is disabled.
const UNLIMITED_REMAINING: u32 = 999;

/// Per-caller sliding-window rate limiter.
///
/// Each caller may record up to `max_per_minute` acquisitions in any 60
/// second span. Timestamps age out lazily on the next call touching that
/// caller. A limit of zero disables limiting entirely.
pub struct RateLimiter {
    max_per_minute: u32,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an acquisition for the caller if allowed.
    ///
    /// A rejected call records nothing, so hammering a full window does
    /// not extend the lockout.
    pub fn try_acquire(&self, caller_id: &str) -> bool {
        if self.max_per_minute == 0 {
            return true;
        }

        let now = Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(caller_id.to_string()).or_default();
        prune(window, now);
        if window.len() >= self.max_per_minute as usize {
            debug!("Rate limit reached for caller {}", caller_id);
            return false;
        }
        window.push_back(now);
        true
    }

    /// How many acquisitions the caller has left in the current window.
    pub fn remaining(&self, caller_id: &str) -> u32 {
        if self.max_per_minute == 0 {
            return UNLIMITED_REMAINING;
        }

        let now = Instant::now();
        let mut windows = self.windows.lock();
        match windows.get_mut(caller_id) {
            Some(window) => {
                prune(window, now);
                self.max_per_minute.saturating_sub(window.len() as u32)
            }
            None => self.max_per_minute,
        }
    }

    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[test]
    fn zero_limit_admits_everything() {
        let limiter = RateLimiter::new(0);
        for _ in 0..100 {
            assert!(limiter.try_acquire("caller"));
        }
        assert_eq!(limiter.remaining("caller"), UNLIMITED_REMAINING);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_after_sixty_seconds() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.try_acquire("caller"));
        assert!(limiter.try_acquire("caller"));
        assert!(!limiter.try_acquire("caller"));
        assert_eq!(limiter.remaining("caller"), 0);

        advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.remaining("caller"), 2);
        assert!(limiter.try_acquire("caller"));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_age_out_individually() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.try_acquire("caller"));
        advance(Duration::from_secs(30)).await;
        assert!(limiter.try_acquire("caller"));
        assert!(!limiter.try_acquire("caller"));

        // Only the first acquisition has aged out.
        advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.remaining("caller"), 1);
        assert!(limiter.try_acquire("caller"));
        assert!(!limiter.try_acquire("caller"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_calls_do_not_extend_the_lockout() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire("caller"));
        for _ in 0..5 {
            assert!(!limiter.try_acquire("caller"));
        }

        advance(Duration::from_secs(60)).await;
        assert!(limiter.try_acquire("caller"));
    }

    #[tokio::test]
    async fn callers_have_independent_windows() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire("a"));
        assert!(limiter.try_acquire("b"));
        assert!(!limiter.try_acquire("a"));
        assert_eq!(limiter.remaining("b"), 0);
        assert_eq!(limiter.remaining("c"), 1);
    }
}
