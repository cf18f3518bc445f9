//! Bounded readiness polling.
//!
//! Both the container boot wait and the SSH probe are "retry a check at a
//! fixed interval until it passes or a deadline runs out". [`Poller`] is that
//! loop; the check decides what "ready" means and a predicate decides which
//! errors are only a sign of "not yet".

use crate::error::{Error, Result};
use smol::Timer;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a single readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The condition holds; stop polling
    Ready,
    /// Not yet; poll again after the interval
    NotReady,
}

impl From<bool> for Readiness {
    fn from(ready: bool) -> Self {
        if ready {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }
}

/// Retries a check at a fixed interval until it is ready or a deadline passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    deadline: Duration,
    interval: Duration,
    sleep_before_check: bool,
}

impl Poller {
    /// Check immediately, then every `interval` until `deadline` has elapsed
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self {
            deadline,
            interval,
            sleep_before_check: false,
        }
    }

    /// Sleep for the interval before every check, including the first
    pub fn sleep_before_each_check(mut self) -> Self {
        self.sleep_before_check = true;
        self
    }

    /// Total time allowed
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Pause between checks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll `check` until it reports [`Readiness::Ready`] or the deadline passes.
    ///
    /// Returns `Ok(false)` when time runs out. Errors for which `is_retryable`
    /// returns true are logged and polled through; any other error is returned
    /// immediately.
    pub async fn poll<F, Fut, P>(&self, what: &str, mut check: F, is_retryable: P) -> Result<bool>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Readiness>>,
        P: Fn(&Error) -> bool,
    {
        let started = Instant::now();
        // A deadline too far out to represent never expires
        let deadline = started.checked_add(self.deadline);
        let mut attempt = 0u32;

        while deadline.is_none_or(|deadline| Instant::now() < deadline) {
            if self.sleep_before_check {
                Timer::after(self.interval).await;
            }
            attempt += 1;

            match check().await {
                Ok(Readiness::Ready) => {
                    debug!(
                        "{} ready after {} attempt(s) in {:?}",
                        what,
                        attempt,
                        started.elapsed()
                    );
                    return Ok(true);
                }
                Ok(Readiness::NotReady) => {
                    debug!("{} not ready (attempt {})", what, attempt);
                }
                Err(e) if is_retryable(&e) => {
                    debug!("{} not ready (attempt {}): {}", what, attempt, e);
                }
                Err(e) => return Err(e),
            }

            if !self.sleep_before_check {
                Timer::after(self.interval).await;
            }
        }

        warn!(
            "{} not ready after {} attempt(s) within {:?}",
            what, attempt, self.deadline
        );
        Ok(false)
    }
}

/// Predicate for checks that have no retryable errors
pub fn never_retry(_: &Error) -> bool {
    false
}
