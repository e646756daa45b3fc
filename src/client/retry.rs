use std::{thread, time::Duration};
use tracing::warn;

/// Longest delay the policy will wait out after a rate-limit response.
const RATE_LIMIT_CAP_SECS: u64 = 60;

/// Errors that a [`RetryPolicy`] knows how to classify.
pub trait Retryable: std::fmt::Display {
    /// Remote throttling. The backoff delay is capped for these so a long
    /// run of 429s cannot escalate without bound.
    fn is_rate_limited(&self) -> bool;
}

/// Bounded exponential backoff for a single request.
///
/// Every attempt advances the same counter, whether the failure was a rate
/// limit or any other transport error. When the final attempt fails, the last
/// error is returned to the caller; there is no global retry budget across
/// requests, each one starts fresh.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        assert!(max_attempts > 0);

        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay after a failed attempt (0-based): `2^attempt` seconds,
    /// capped at 60 when the remote is rate limiting.
    pub fn delay(&self, attempt: u32, rate_limited: bool) -> Duration {
        let secs = 2_u64.saturating_pow(attempt);
        let secs = if rate_limited {
            secs.min(RATE_LIMIT_CAP_SECS)
        } else {
            secs
        };

        Duration::from_secs(secs)
    }

    /// Run `op` until it succeeds or the attempt budget is spent, sleeping
    /// between attempts.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Result<T, E>,
    {
        self.run_with_sleep(op, thread::sleep)
    }

    /// Like [`RetryPolicy::run`], with the sleep function injected. Tests use
    /// this to observe backoff delays without waiting them out.
    pub fn run_with_sleep<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Result<T, E>,
        S: FnMut(Duration),
    {
        for attempt in 0..self.max_attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 == self.max_attempts => return Err(err),
                Err(err) => {
                    let delay = self.delay(attempt, err.is_rate_limited());
                    warn!("Attempt {attempt} failed ({err}), retrying in {delay:?}");
                    sleep(delay);
                }
            }
        }

        unreachable!("max_attempts is asserted non-zero")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FetchError;
    use std::cell::RefCell;

    #[test]
    fn backoff_is_exponential_and_capped_when_rate_limited() {
        let policy = RetryPolicy::default();

        let delays: Vec<_> = (0..8).map(|a| policy.delay(a, true).as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8, 16, 32, 60, 60]);

        // Monotonically non-decreasing up to the cap.
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));

        // Other transport errors are not capped.
        assert_eq!(policy.delay(6, false).as_secs(), 64);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::default();
        let slept = RefCell::new(Vec::new());

        let mut attempts = 0;
        let result: Result<u32, FetchError> = policy.run_with_sleep(
            || {
                attempts += 1;
                if attempts < 3 {
                    Err(FetchError::Status(502))
                } else {
                    Ok(attempts)
                }
            },
            |d| slept.borrow_mut().push(d.as_secs()),
        );

        assert_eq!(result.unwrap(), 3);
        assert_eq!(*slept.borrow(), [1, 2]);
    }

    #[test]
    fn rate_limit_delays_are_capped() {
        let policy = RetryPolicy::new(9);
        let slept = RefCell::new(Vec::new());

        let result: Result<(), FetchError> = policy.run_with_sleep(
            || Err(FetchError::RateLimited),
            |d| slept.borrow_mut().push(d.as_secs()),
        );

        assert!(result.is_err());
        assert_eq!(*slept.borrow(), [1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn exhaustion_returns_the_last_error() {
        let policy = RetryPolicy::default();
        let slept = RefCell::new(Vec::new());

        let mut attempts = 0;
        let result: Result<(), FetchError> = policy.run_with_sleep(
            || {
                attempts += 1;
                Err(FetchError::Status(500 + attempts))
            },
            |d| slept.borrow_mut().push(d.as_secs()),
        );

        assert_eq!(attempts, 5);
        // No sleep after the final attempt.
        assert_eq!(*slept.borrow(), [1, 2, 4, 8]);
        assert!(matches!(result, Err(FetchError::Status(505))));
    }
}
