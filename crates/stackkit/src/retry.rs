//! Retries for read-only calls that hit transient failures.
//!
//! Mutations (create, change set creation and execution) never come
//! through here.

use crate::error::{Error, Result};
use crate::wait::Clock;
use std::time::Duration;

/// How often, and how patiently, a failed read is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each later one
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl RetryConfig {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// A single attempt.
    pub const fn no_retry() -> Self {
        Self::new(1, Duration::from_secs(2))
    }

    /// Delay before retry number `retry` (0-indexed), capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, sleeping on `clock` between attempts while it fails with a
    /// retryable error.
    ///
    /// `on_retry` receives the retry number (1-indexed), the error and the
    /// delay before each retry. The last error is returned once attempts
    /// run out.
    pub fn run<T>(
        &self,
        clock: &dyn Clock,
        mut on_retry: impl FnMut(u32, &Error, Duration),
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut retry = 0;
        loop {
            match op() {
                Err(e) if e.is_retryable() && retry + 1 < attempts => {
                    let delay = self.backoff(retry);
                    retry += 1;
                    on_retry(retry, &e, delay);
                    clock.sleep(delay);
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::FakeClock;
    use std::cell::Cell;

    fn ignore(_: u32, _: &Error, _: Duration) {}

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::new(5, Duration::from_secs(2));
        assert_eq!(config.backoff(0), Duration::from_secs(2));
        assert_eq!(config.backoff(1), Duration::from_secs(4));
        assert_eq!(config.backoff(2), Duration::from_secs(8));
        assert_eq!(config.backoff(5), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_never_overflows() {
        let config = RetryConfig {
            max_delay: Duration::MAX,
            ..RetryConfig::new(u32::MAX, Duration::from_secs(u64::MAX / 2))
        };
        assert_eq!(config.backoff(31), Duration::MAX);
        assert_eq!(config.backoff(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_success_first_try() {
        let clock = FakeClock::new();
        let result = RetryConfig::no_retry().run(&clock, ignore, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_non_retryable_error_returns_at_once() {
        let clock = FakeClock::new();
        let attempts = Cell::new(0);

        let result: Result<()> = RetryConfig::default().run(&clock, ignore, || {
            attempts.set(attempts.get() + 1);
            Err(Error::Validation("Stack with id web does not exist".to_string()))
        });

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_eventual_success() {
        let clock = FakeClock::new();
        let attempts = Cell::new(0);
        let mut retries = Vec::new();

        let result = RetryConfig::new(3, Duration::from_secs(1)).run(
            &clock,
            |retry, _, delay| retries.push((retry, delay)),
            || {
                attempts.set(attempts.get() + 1);
                if attempts.get() < 3 {
                    Err(Error::Transport("Rate exceeded".to_string()))
                } else {
                    Ok(42)
                }
            },
        );

        assert_eq!(result.unwrap(), 42);
        assert_eq!(
            retries,
            vec![(1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
        );
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn test_gives_up_with_last_error() {
        let clock = FakeClock::new();
        let attempts = Cell::new(0);

        let config = RetryConfig::new(2, Duration::from_secs(1));
        let result: Result<()> = config.run(&clock, ignore, || {
            attempts.set(attempts.get() + 1);
            Err(Error::Transport(format!("timeout {}", attempts.get())))
        });

        assert!(result.unwrap_err().to_string().contains("timeout 2"));
        assert_eq!(attempts.get(), 2);
        assert_eq!(clock.sleeps().len(), 1);
    }
}
