//! Global fixed-window admission rate limiter.
//!
//! One window is shared by every sender. A burst straddling a window edge can
//! see up to twice the configured limit admitted.

use parking_lot::Mutex;

use crate::util::clock::SharedClock;

/// Length of one rate window.
pub const RATE_WINDOW_MS: u64 = 60_000;

#[derive(Debug)]
struct Window {
    started_ms: u64,
    count: u32,
}

/// Caps admissions per minute across all senders.
pub struct RateLimiter {
    max_per_window: Option<u32>,
    window_ms: u64,
    window: Mutex<Window>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Limit admissions to `max_per_minute`; `None` disables limiting but
    /// keeps counting for the rate gauge.
    #[must_use]
    pub fn new(max_per_minute: Option<u32>, clock: SharedClock) -> Self {
        Self::with_window(max_per_minute, RATE_WINDOW_MS, clock)
    }

    /// Limit admissions to `max_per_window` per `window_ms`.
    #[must_use]
    pub fn with_window(max_per_window: Option<u32>, window_ms: u64, clock: SharedClock) -> Self {
        let window_ms = window_ms.max(1);
        let now = clock.now_ms();
        Self {
            max_per_window,
            window_ms,
            window: Mutex::new(Window {
                started_ms: now - now % window_ms,
                count: 0,
            }),
            clock,
        }
    }

    /// Take one admission slot. Returns `false` when the window is exhausted.
    pub fn try_consume(&self) -> bool {
        let now = self.clock.now_ms();
        let mut window = self.window.lock();
        self.roll(&mut window, now);
        if let Some(max) = self.max_per_window {
            if window.count >= max {
                return false;
            }
        }
        window.count = window.count.saturating_add(1);
        true
    }

    /// Admissions granted in the current window.
    #[must_use]
    pub fn current_count(&self) -> u32 {
        let now = self.clock.now_ms();
        let window = self.window.lock();
        if now.saturating_sub(window.started_ms) >= self.window_ms {
            0
        } else {
            window.count
        }
    }

    /// Configured limit, `None` when disabled.
    #[must_use]
    pub const fn limit(&self) -> Option<u32> {
        self.max_per_window
    }

    fn roll(&self, window: &mut Window, now: u64) {
        let elapsed = now.saturating_sub(window.started_ms);
        if elapsed >= self.window_ms {
            // stay on the window grid across idle gaps
            window.started_ms += elapsed - elapsed % self.window_ms;
            window.count = 0;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_per_window", &self.max_per_window)
            .field("window_ms", &self.window_ms)
            .field("window", &*self.window.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::ManualClock;
    use std::sync::Arc;

    #[test]
    fn test_denies_after_limit() {
        let clock = ManualClock::new(0);
        let limiter = RateLimiter::new(Some(3), Arc::new(clock));
        assert!(limiter.try_consume());
        assert!(limiter.try_consume());
        assert!(limiter.try_consume());
        assert!(!limiter.try_consume());
        assert_eq!(limiter.current_count(), 3);
    }

    #[test]
    fn test_window_resets() {
        let clock = ManualClock::new(0);
        let limiter = RateLimiter::new(Some(1), Arc::new(clock.clone()));
        assert!(limiter.try_consume());
        assert!(!limiter.try_consume());
        clock.advance_ms(RATE_WINDOW_MS);
        assert_eq!(limiter.current_count(), 0);
        assert!(limiter.try_consume());
    }

    #[test]
    fn test_window_boundaries_stay_aligned() {
        let clock = ManualClock::new(0);
        let limiter = RateLimiter::new(Some(1), Arc::new(clock.clone()));
        clock.set_ms(150_000);
        assert!(limiter.try_consume());
        // 150s sits in the window starting at 120s, which ends at 180s
        clock.set_ms(179_999);
        assert!(!limiter.try_consume());
        clock.set_ms(180_000);
        assert!(limiter.try_consume());
    }

    #[test]
    fn test_first_window_starts_on_grid() {
        let clock = ManualClock::new(150_000);
        let limiter = RateLimiter::new(Some(1), Arc::new(clock.clone()));
        assert!(limiter.try_consume());
        clock.set_ms(179_999);
        assert!(!limiter.try_consume());
        assert_eq!(limiter.current_count(), 1);
        clock.set_ms(180_000);
        assert_eq!(limiter.current_count(), 0);
        assert!(limiter.try_consume());
    }

    #[test]
    fn test_disabled_counts_but_never_denies() {
        let limiter = RateLimiter::new(None, Arc::new(ManualClock::new(0)));
        for _ in 0..10_000 {
            assert!(limiter.try_consume());
        }
        assert_eq!(limiter.current_count(), 10_000);
        assert_eq!(limiter.limit(), None);
    }
}
