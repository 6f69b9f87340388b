//! Retry policy and run deadline
//!
//! All backoff and deadline accounting for a run lives here. The
//! orchestrator owns a [`Budget`] per run and lends it (by copy) to roles
//! for the calls they issue, so every call in a run races the same clock.

use crate::types::ServiceError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::warn;

/// How many times to attempt an operation and how long to wait between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per role invocation, including the first (at least 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles on each further failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after `failed_attempt` (1-based) failed
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Whether a failure on attempt `attempts_made` earns another attempt
    pub fn should_retry(&self, error: &ServiceError, attempts_made: u32) -> bool {
        error.kind.is_transient() && attempts_made < self.max_attempts
    }
}

/// The single wall-clock deadline of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// A deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(budget)
            .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365));
        Self { expires_at }
    }

    /// Time left, or `None` once the deadline has passed
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// Run one call against the remaining budget.
    ///
    /// An expired deadline short-circuits without polling `call`; a call
    /// still in flight when the budget reaches zero is dropped. Both are
    /// reported as `Timeout`.
    pub async fn run<F, T>(&self, what: &str, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let Some(remaining) = self.remaining() else {
            return Err(ServiceError::timeout(format!(
                "run deadline exhausted before {}",
                what
            )));
        };

        match timeout(remaining, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::timeout(format!(
                "run deadline reached during {}",
                what
            ))),
        }
    }

    /// Sleep for `delay`, capped at the remaining budget
    pub async fn backoff(&self, delay: Duration) {
        if let Some(remaining) = self.remaining() {
            sleep(delay.min(remaining)).await;
        }
    }
}

/// Retry policy plus deadline for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub policy: RetryPolicy,
    pub deadline: Deadline,
}

impl Budget {
    pub fn new(policy: RetryPolicy, deadline: Deadline) -> Self {
        Self { policy, deadline }
    }

    /// Issue `op` until it succeeds, fails fatally, runs out of attempts or
    /// the deadline passes.
    ///
    /// Returns the value with the number of attempts made, or the last
    /// failure with the number of attempts made.
    pub async fn call_with_retry<F, Fut, T>(
        &self,
        what: &str,
        mut op: F,
    ) -> Result<(T, u32), (ServiceError, u32)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempts = 0;

        loop {
            if self.deadline.is_expired() {
                return Err((
                    ServiceError::timeout(format!(
                        "run deadline exhausted after {} attempt(s) of {}",
                        attempts, what
                    )),
                    attempts,
                ));
            }

            attempts += 1;
            let error = match self.deadline.run(what, op()).await {
                Ok(value) => return Ok((value, attempts)),
                Err(error) => error,
            };

            if !self.policy.should_retry(&error, attempts) || self.deadline.is_expired() {
                return Err((error, attempts));
            }

            let delay = self.policy.backoff(attempts);
            warn!(
                call = what,
                attempt = attempts,
                kind = %error.kind,
                delay_ms = delay.as_millis() as u64,
                "call failed, backing off"
            );
            self.deadline.backoff(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_policy_never_retries_auth() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(&ServiceError::auth("bad key"), 1));
        assert!(policy.should_retry(&ServiceError::rate_limit("slow down"), 1));
        assert!(!policy.should_retry(&ServiceError::rate_limit("slow down"), 3));
    }

    #[test]
    fn test_max_attempts_at_least_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_short_circuits() {
        let deadline = Deadline::after(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let polled = AtomicU32::new(0);
        let result: Result<(), ServiceError> = deadline
            .run("status check", async {
                polled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result.unwrap_err().kind, FailureKind::Timeout);
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_call_is_cut_at_deadline() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let result: Result<(), ServiceError> = deadline
            .run("slow call", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
        assert!(err.message.contains("slow call"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_recovers_from_transient_failures() {
        let budget = Budget::new(
            RetryPolicy::new(3, Duration::from_millis(10)),
            Deadline::after(Duration::from_secs(60)),
        );
        let calls = AtomicU32::new(0);

        let result = budget
            .call_with_retry("flaky", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(ServiceError::timeout("slow"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok((3, 3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_stops_on_auth() {
        let budget = Budget::new(
            RetryPolicy::new(5, Duration::from_millis(10)),
            Deadline::after(Duration::from_secs(60)),
        );
        let calls = AtomicU32::new(0);

        let result: Result<((), u32), (ServiceError, u32)> = budget
            .call_with_retry("auth", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::auth("nope"))
            })
            .await;

        let (err, attempts) = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Auth);
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_exhausts_attempts() {
        let budget = Budget::new(
            RetryPolicy::new(3, Duration::from_millis(10)),
            Deadline::after(Duration::from_secs(60)),
        );
        let calls = AtomicU32::new(0);

        let result: Result<((), u32), (ServiceError, u32)> = budget
            .call_with_retry("always down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::unknown("502"))
            })
            .await;

        let (err, attempts) = result.unwrap_err();
        assert_eq!(err.kind, FailureKind::Unknown);
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
