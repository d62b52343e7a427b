//! Retry primitive for one unit of work against the gateway.
//!
//! Rate-limit signals are retried with exponential backoff (`base * 2^attempt`);
//! any other failure abandons the unit at once. Neither is ever propagated:
//! the caller gets a tagged [`Attempt`] and moves on to the next unit.

use crate::error::FetchError;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub n_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { n_retries: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn with_retries(mut self, n: u32) -> Self {
        self.n_retries = n.max(1);
        self
    }
    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    /// Wait before the retry that follows failed attempt `attempt` (0-based): 1s, 2s, 4s, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

/// Source of blocking pauses. Swapped out in tests so nothing actually sleeps.
pub trait Sleeper {
    fn sleep(&mut self, d: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &mut S {
    fn sleep(&mut self, d: Duration) {
        (**self).sleep(d)
    }
}

/// Outcome of one retried unit of work.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// Every attempt hit the rate limit.
    Exhausted { attempts: u32, last_error: String },
    /// A non-rate-limit failure; not retried.
    Failed(String),
}

impl<T> Attempt<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Attempt::Done(_))
    }
    pub fn ok(self) -> Option<T> {
        match self {
            Attempt::Done(v) => Some(v),
            _ => None,
        }
    }
    /// Error text for anything but `Done`.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Attempt::Done(_) => None,
            Attempt::Exhausted { last_error, .. } => Some(last_error),
            Attempt::Failed(e) => Some(e),
        }
    }
}

/// Run `op` under `policy`. `op` receives the 0-based attempt number so that
/// streaming callers can tell a fresh start from a restart.
pub fn run_with_retry<T, S, F>(policy: &RetryPolicy, unit: &str, sleeper: &mut S, mut op: F) -> Attempt<T>
where
    S: Sleeper + ?Sized,
    F: FnMut(u32) -> Result<T, FetchError>,
{
    let tries = policy.n_retries.max(1);
    let mut last_error = String::new();
    for attempt in 0..tries {
        match op(attempt) {
            Ok(v) => return Attempt::Done(v),
            Err(e) if e.is_rate_limited() => {
                last_error = e.to_string();
                tracing::warn!(unit, attempt = attempt + 1, error = %e, "rate limited");
                if attempt + 1 < tries {
                    let wait = policy.delay_for(attempt);
                    tracing::info!(unit, "retry {} of {} after waiting {:?}", attempt + 1, tries - 1, wait);
                    sleeper.sleep(wait);
                }
            }
            Err(e) => {
                tracing::warn!(unit, error = %e, "unresolved error, skipping unit");
                return Attempt::Failed(e.to_string());
            }
        }
    }
    tracing::warn!(unit, attempts = tries, "giving up after repeated rate limiting");
    Attempt::Exhausted { attempts: tries, last_error }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(1));
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
        let fast = p.with_base_delay(Duration::from_millis(10));
        assert_eq!(fast.delay_for(3), Duration::from_millis(80));
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let p = RetryPolicy::default();
        assert!(p.delay_for(40) >= Duration::from_secs(u32::MAX as u64));
    }
}
