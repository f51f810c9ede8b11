//! Bounded retry for API calls
//!
//! A call made with a timeout is retried until it succeeds or the deadline
//! elapses. There is no fixed attempt count: the delay between attempts grows
//! linearly (0s, 10s, 20s, ...) and the whole loop runs under a single
//! `tokio::time::timeout`, so the wall-clock budget is the only bound.

use super::error::{Result, SumoError};
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

/// Default increase of the delay between two attempts
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(10);

/// Retry budget for a single API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total wall-clock budget for all attempts
    pub timeout: Duration,
    /// Amount the delay grows by after each failed attempt
    pub step: Duration,
}

impl RetryPolicy {
    /// Policy with the default backoff step
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            step: DEFAULT_BACKOFF_STEP,
        }
    }

    /// Build a policy from an optional timeout in seconds
    pub fn from_secs(timeout: Option<u64>) -> Option<Self> {
        timeout.map(|secs| Self::with_timeout(Duration::from_secs(secs)))
    }
}

/// Linear backoff schedule starting at zero
#[derive(Debug, Clone)]
pub struct Backoff {
    step: Duration,
    next: Duration,
}

impl Backoff {
    pub fn linear(step: Duration) -> Self {
        Self {
            step,
            next: Duration::ZERO,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_add(self.step);
        delay
    }
}

#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    last_error: Option<String>,
}

/// Run `op` once, or under `policy` until it succeeds or the deadline elapses.
///
/// Errors that are not retryable (see [`SumoError::is_retryable`]) are
/// returned immediately even when a policy is given.
pub async fn run<T, F, Fut>(policy: Option<RetryPolicy>, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let Some(policy) = policy else {
        return op().await;
    };

    let mut state = RetryState::default();
    let outcome = time::timeout(
        policy.timeout,
        attempt_until_success(&mut op, &mut state, policy.step),
    )
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!(
                timeout = ?policy.timeout,
                attempts = state.attempts,
                "Giving up on API request"
            );
            Err(SumoError::TimeoutExceeded {
                timeout: policy.timeout,
                attempts: state.attempts,
                last_error: state.last_error,
            })
        }
    }
}

async fn attempt_until_success<T, F, Fut>(
    op: &mut F,
    state: &mut RetryState,
    step: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = Backoff::linear(step);

    loop {
        state.attempts += 1;
        match op().await {
            Ok(value) => {
                if state.attempts > 1 {
                    debug!(attempts = state.attempts, "API request succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                let delay = backoff.next_delay();
                warn!(
                    attempt = state.attempts,
                    retry_in = ?delay,
                    error = %err,
                    "API request failed, retrying"
                );
                state.last_error = Some(err.to_string());
                time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn server_error() -> SumoError {
        SumoError::Api {
            method: "GET".to_string(),
            url: "https://api.sumologic.com/api/v1/collectors".to_string(),
            status: 500,
            body: "internal error".to_string(),
        }
    }

    #[test]
    fn test_linear_backoff_schedule() {
        let mut backoff = Backoff::linear(Duration::from_secs(10));
        let delays: Vec<u64> = (0..4).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_policy_from_secs() {
        assert_eq!(RetryPolicy::from_secs(None), None);
        let policy = RetryPolicy::from_secs(Some(30)).unwrap();
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(policy.step, DEFAULT_BACKOFF_STEP);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_policy_single_attempt() {
        let mut calls = 0;
        let result: Result<()> = run(None, || {
            calls += 1;
            async { Err(server_error()) }
        })
        .await;

        assert!(matches!(result, Err(SumoError::Api { status: 500, .. })));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_deadline() {
        let start = Instant::now();
        let mut attempts_at = Vec::new();
        let result: Result<()> = run(
            Some(RetryPolicy::with_timeout(Duration::from_secs(25))),
            || {
                attempts_at.push(start.elapsed().as_secs());
                async { Err(server_error()) }
            },
        )
        .await;

        assert_eq!(attempts_at, vec![0, 0, 10]);
        assert_eq!(start.elapsed(), Duration::from_secs(25));
        match result {
            Err(SumoError::TimeoutExceeded {
                timeout,
                attempts,
                last_error,
            }) => {
                assert_eq!(timeout, Duration::from_secs(25));
                assert_eq!(attempts, 3);
                assert!(last_error.unwrap().contains("500"));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_thirty_second_budget() {
        let start = Instant::now();
        let result: Result<()> = run(
            Some(RetryPolicy::with_timeout(Duration::from_secs(30))),
            || async { Err(server_error()) },
        )
        .await;

        assert!(matches!(result, Err(SumoError::TimeoutExceeded { .. })));
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures() {
        let start = Instant::now();
        let mut calls = 0;
        let result = run(
            Some(RetryPolicy::with_timeout(Duration::from_secs(60))),
            || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err(server_error())
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_returned_immediately() {
        let start = Instant::now();
        let mut calls = 0;
        let result: Result<()> = run(
            Some(RetryPolicy::with_timeout(Duration::from_secs(30))),
            || {
                calls += 1;
                async {
                    Err(SumoError::EtagMismatch {
                        method: "PUT".to_string(),
                        url: "https://api.sumologic.com/api/v1/collectors/1/sources/2".to_string(),
                        status: 412,
                        body: String::new(),
                    })
                }
            },
        )
        .await;

        assert!(matches!(result, Err(SumoError::EtagMismatch { .. })));
        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
