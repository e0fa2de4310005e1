//! Time, cancellation and deadlines for the status wait loop.
//!
//! The wait loop never calls `thread::sleep` directly. It goes through a
//! [`Clock`], so tests drive it with [`FakeClock`] and finish instantly.

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Source of time for polling.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Block for a duration.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::time` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug)]
struct FakeState {
    start: Instant,
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

/// Clock whose sleeps return immediately and advance virtual time.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct FakeClock {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                start: Instant::now(),
                elapsed: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Number of sleeps of exactly `duration`.
    pub fn count_sleeps(&self, duration: Duration) -> usize {
        self.lock().sleeps.iter().filter(|d| **d == duration).count()
    }

    /// Total virtual time elapsed.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let state = self.lock();
        state.start + state.elapsed
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
        state.sleeps.push(duration);
    }
}

/// Shared flag that asks a wait loop to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polling configuration for the wait loop.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Sleep before the first read, letting the stack leave its prior state
    pub grace: Duration,
    /// Sleep between reads while the status is unchanged
    pub interval: Duration,
    /// Give up after this long. `None` waits forever.
    pub deadline: Option<Duration>,
    /// Stops the loop before its next read once cancelled
    pub cancel: CancelToken,
    /// Retries for read-only calls made while polling
    pub read_retry: RetryConfig,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(2),
            interval: Duration::from_secs(5),
            deadline: None,
            cancel: CancelToken::new(),
            read_retry: RetryConfig::no_retry(),
        }
    }
}

impl WaitOptions {
    /// Stop waiting after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Observe a cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retry transient read failures while polling.
    pub fn with_read_retry(mut self, config: RetryConfig) -> Self {
        self.read_retry = config;
        self
    }

    /// Set the grace and polling intervals.
    pub fn with_intervals(mut self, grace: Duration, interval: Duration) -> Self {
        self.grace = grace;
        self.interval = interval;
        self
    }
}

/// Tracks one wait against its deadline and cancellation token.
pub(crate) struct Waiter<'a> {
    clock: &'a dyn Clock,
    options: &'a WaitOptions,
    stack: &'a str,
    started: Instant,
}

impl<'a> Waiter<'a> {
    pub(crate) fn start(clock: &'a dyn Clock, options: &'a WaitOptions, stack: &'a str) -> Self {
        Self {
            clock,
            options,
            stack,
            started: clock.now(),
        }
    }

    /// Fail if cancelled or past the deadline. `status` is the last one seen.
    pub(crate) fn check(&self, status: &str) -> Result<()> {
        if self.options.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stack: self.stack.to_string(),
            });
        }
        if let Some(deadline) = self.options.deadline
            && self.clock.now().duration_since(self.started) >= deadline
        {
            return Err(Error::DeadlineExceeded {
                stack: self.stack.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn grace(&self) {
        self.clock.sleep(self.options.grace);
    }

    pub(crate) fn pause(&self) {
        self.clock.sleep(self.options.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_clock_advances_without_sleeping() {
        let clock = FakeClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_secs(3600));

        assert_eq!(clock.now().duration_since(before), Duration::from_secs(3600));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3600)]);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_waiter_deadline() {
        let clock = FakeClock::new();
        let options = WaitOptions::default().with_deadline(Duration::from_secs(10));
        let waiter = Waiter::start(&clock, &options, "web");

        assert!(waiter.check("UPDATE_IN_PROGRESS").is_ok());
        clock.sleep(Duration::from_secs(10));
        let err = waiter.check("UPDATE_IN_PROGRESS").unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded { ref status, .. } if status == "UPDATE_IN_PROGRESS"));
    }

    #[test]
    fn test_waiter_cancelled() {
        let clock = FakeClock::new();
        let options = WaitOptions::default();
        let waiter = Waiter::start(&clock, &options, "web");

        options.cancel.cancel();
        assert!(matches!(waiter.check(""), Err(Error::Cancelled { .. })));
    }

    #[test]
    fn test_default_is_unbounded() {
        let options = WaitOptions::default();
        assert_eq!(options.grace, Duration::from_secs(2));
        assert_eq!(options.interval, Duration::from_secs(5));
        assert!(options.deadline.is_none());
        assert_eq!(options.read_retry.max_attempts, 1);
    }
}
