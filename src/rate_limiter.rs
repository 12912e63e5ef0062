//! Global rate limiter enforcing requests-per-minute across all workers.
//!
//! A FIFO admission scheme: each admit computes the next eligible instant
//! from the last scheduled one, sleeps until then, and advances the clock.
//! Serializing admission through a single mutex gives N concurrent callers N
//! evenly spaced slots rather than a burst followed by silence.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::RateLimiterError;

/// Global FIFO rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    state: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `requests_per_minute` requests
    /// per minute. `0` disables throttling entirely.
    #[must_use]
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            state: Mutex::new(None),
        }
    }

    /// Constructs a limiter, rejecting a negative rate (only meaningful when
    /// the rate comes from a signed external source, e.g. a CLI flag parsed
    /// as an integer literal).
    ///
    /// # Errors
    ///
    /// Returns [`RateLimiterError::InvalidRpm`] if `rpm < 0`.
    pub fn try_new(rpm: i64) -> Result<Self, RateLimiterError> {
        if rpm < 0 {
            return Err(RateLimiterError::InvalidRpm(rpm));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self::new(rpm as u32))
    }

    /// Blocks the caller until it is this admission's turn, then returns.
    ///
    /// No-op when `requests_per_minute == 0`.
    pub async fn admit(&self) {
        if self.requests_per_minute == 0 {
            return;
        }

        let interval = Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute));
        let now = Instant::now();

        let next_slot = {
            let mut last = self.state.lock().await;
            let next = last.map_or(now, |l| l + interval).max(now);
            *last = Some(next);
            next
        };

        if next_slot > now {
            sleep(next_slot - now).await;
        }
    }

    /// The configured requests-per-minute rate.
    #[must_use]
    pub const fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn disabled_when_rpm_is_zero() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        for _ in 0..50 {
            limiter.admit().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn admits_at_configured_rate() {
        // 600 rpm => one slot every 100ms.
        let limiter = RateLimiter::new(600);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.admit().await;
        }
        let elapsed = start.elapsed();
        // 4 intervals of 100ms between 5 admissions.
        assert!(elapsed >= Duration::from_millis(380), "elapsed={elapsed:?}");
    }

    #[tokio::test]
    async fn concurrent_admits_are_serialized_into_evenly_spaced_slots() {
        let limiter = Arc::new(RateLimiter::new(600));
        let start = Instant::now();

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let limiter = Arc::clone(&limiter);
            tasks.push(tokio::spawn(async move {
                limiter.admit().await;
                Instant::now()
            }));
        }

        let mut completions: Vec<Instant> = Vec::new();
        for task in tasks {
            completions.push(task.await.unwrap_or_else(|e| unreachable!("{e}")));
        }
        completions.sort();

        // 5 gaps across 6 admissions at 100ms each, minus scheduling slack.
        let total = completions[5].duration_since(start);
        assert!(total >= Duration::from_millis(450), "total={total:?}");
    }

    #[test]
    fn try_new_rejects_negative_rate() {
        assert!(matches!(
            RateLimiter::try_new(-1),
            Err(RateLimiterError::InvalidRpm(-1))
        ));
    }

    #[test]
    fn try_new_accepts_zero_and_positive() {
        assert!(RateLimiter::try_new(0).is_ok());
        assert!(RateLimiter::try_new(60).is_ok());
    }
}
