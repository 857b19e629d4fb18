//! Waiters and retry helpers
//!
//! [`StateChangeConf`] polls a refresh function until the remote object
//! reaches a target state. The `retry_*` helpers re-run an operation while
//! its error is considered transient. All sleeps go through `tokio::time`,
//! so tests can run them with paused time.

use crate::error::{ProviderError, Result};
use crate::provider::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

const INITIAL_WAIT: Duration = Duration::from_millis(100);
const MAX_WAIT: Duration = Duration::from_secs(10);

/// Result of one refresh: `None` when the object does not exist (yet).
pub type Refresh<T> = Result<Option<(T, String)>>;

/// Configuration of a state-change wait
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Lower bound of the backoff between refreshes
    pub min_timeout: Duration,
    /// Fixed wait between refreshes, replacing the backoff
    pub poll_interval: Option<Duration>,
    /// Consecutive "not found" refreshes tolerated
    pub not_found_checks: usize,
    /// Consecutive target observations required
    pub continuous_target_occurence: usize,
}

impl StateChangeConf {
    pub fn new(target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: Vec::new(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout,
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            not_found_checks: 20,
            continuous_target_occurence: 1,
        }
    }

    pub fn pending(mut self, pending: &[&str]) -> Self {
        self.pending = pending.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn not_found_checks(mut self, checks: usize) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn continuous_target_occurence(mut self, occurrences: usize) -> Self {
        self.continuous_target_occurence = occurrences.max(1);
        self
    }

    fn next_wait(&self, wait: Duration) -> Duration {
        match self.poll_interval {
            Some(interval) => interval,
            None => wait.min(MAX_WAIT).max(self.min_timeout),
        }
    }

    /// Polls `refresh` until a target state is seen often enough.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Refresh<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let mut wait = INITIAL_WAIT;
        let mut not_found_ticks = 0;
        let mut target_occurence = 0;
        let mut last_state = String::new();

        loop {
            let expired = Instant::now() >= deadline;

            match refresh().await? {
                None => {
                    target_occurence = 0;
                    not_found_ticks += 1;
                    tracing::debug!(ticks = not_found_ticks, "waiting: object not found");
                    if not_found_ticks > self.not_found_checks {
                        return Err(ProviderError::not_found(format!(
                            "couldn't find resource ({} retries)",
                            self.not_found_checks
                        )));
                    }
                }
                Some((value, state)) => {
                    not_found_ticks = 0;
                    tracing::debug!(state = %state, "waiting: refreshed");

                    if self.target.contains(&state) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(value);
                        }
                    } else if self.pending.contains(&state) || self.pending.is_empty() {
                        target_occurence = 0;
                    } else {
                        return Err(ProviderError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                            last_error: None,
                        });
                    }
                    last_state = state;
                }
            }

            if expired {
                return Err(ProviderError::Timeout {
                    last_state,
                    expected: self.target.clone(),
                    timeout: self.timeout,
                    last_error: None,
                });
            }

            if target_occurence == 0 {
                wait *= 2;
            }
            wait = self.next_wait(wait);

            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(wait.min(remaining)).await;
        }
    }
}

/// Outcome of one attempt inside [`retry_context`]
#[derive(Debug)]
pub enum RetryError {
    Retryable(ProviderError),
    NonRetryable(ProviderError),
}

fn retry_backoff() -> RetryConfig {
    RetryConfig {
        max_attempts: u32::MAX,
        initial_delay: Duration::from_millis(500),
        max_delay: MAX_WAIT,
        backoff_multiplier: 2.0,
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// timeout passes. On timeout the last retryable error is returned.
pub async fn retry_when<T, F, Fut, P>(timeout: Duration, mut op: F, is_retryable: P) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&ProviderError) -> bool,
{
    let deadline = Instant::now() + timeout;
    let backoff = retry_backoff();
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(err);
                }
                tracing::debug!(attempt, error = %err, "retrying");
                sleep(backoff.delay_for_attempt(attempt).min(remaining)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Retries while the error carries one of `codes`.
pub async fn retry_when_code_equals<T, F, Fut>(
    timeout: Duration,
    op: F,
    codes: &[&str],
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(timeout, op, |err| err.code_equals(codes)).await
}

/// Retries "not found" only while the resource is being created, to ride
/// out eventual consistency right after a create.
pub async fn retry_when_new_resource_not_found<T, F, Fut>(
    timeout: Duration,
    is_new_resource: bool,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(timeout, op, |err| is_new_resource && err.is_not_found()).await
}

/// Runs `op` until it reports "not found".
pub async fn retry_until_not_found<T, F, Fut>(timeout: Duration, mut op: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + timeout;
    let backoff = retry_backoff();
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
            Ok(_) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(ProviderError::Timeout {
                        last_state: String::new(),
                        expected: Vec::new(),
                        timeout,
                        last_error: Some(Box::new(ProviderError::api("", "found resource"))),
                    });
                }
                sleep(backoff.delay_for_attempt(attempt).min(remaining)).await;
                attempt += 1;
            }
        }
    }
}

/// Runs `op` until it succeeds or returns [`RetryError::NonRetryable`].
/// On timeout returns a `Timeout` error carrying the last retryable error.
pub async fn retry_context<T, F, Fut>(timeout: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;
    let backoff = retry_backoff();
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(ProviderError::Timeout {
                        last_state: String::new(),
                        expected: Vec::new(),
                        timeout,
                        last_error: Some(Box::new(err)),
                    });
                }
                sleep(backoff.delay_for_attempt(attempt).min(remaining)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Refresh function that replays scripted states.
    fn scripted(states: &[Option<&str>]) -> (Mutex<VecDeque<Option<String>>>, Cell<usize>) {
        let queue = states
            .iter()
            .map(|s| s.map(str::to_string))
            .collect::<VecDeque<_>>();
        (Mutex::new(queue), Cell::new(0))
    }

    async fn next_state(
        script: &(Mutex<VecDeque<Option<String>>>, Cell<usize>),
    ) -> Refresh<String> {
        script.1.set(script.1.get() + 1);
        let mut queue = script.0.lock().unwrap();
        let state = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        Ok(state.map(|s| (s.clone(), s)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_target() {
        let script = scripted(&[Some("PENDING"), Some("PENDING"), Some("ISSUED")]);
        let conf = StateChangeConf::new(&["ISSUED"], Duration::from_secs(60)).pending(&["PENDING"]);

        let result = conf.wait_for_state(|| next_state(&script)).await.unwrap();
        assert_eq!(result, "ISSUED");
        assert_eq!(script.1.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_target_occurence() {
        let script = scripted(&[
            Some("true"),
            Some("false"),
            Some("true"),
            Some("true"),
            Some("true"),
        ]);
        let conf = StateChangeConf::new(&["true"], Duration::from_secs(180))
            .min_timeout(Duration::from_secs(10))
            .continuous_target_occurence(3);

        let start = Instant::now();
        conf.wait_for_state(|| next_state(&script)).await.unwrap();
        assert_eq!(script.1.get(), 5);
        assert!(start.elapsed() >= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state() {
        let script = scripted(&[Some("PENDING"), Some("FAILED")]);
        let conf = StateChangeConf::new(&["SUCCESS"], Duration::from_secs(60)).pending(&["PENDING"]);

        let err = conf.wait_for_state(|| next_state(&script)).await.unwrap_err();
        assert_eq!(err.to_string(), "unexpected state 'FAILED', wanted target 'SUCCESS'");
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_checks() {
        let script = scripted(&[None]);
        let conf = StateChangeConf::new(&["ISSUED"], Duration::from_secs(3600)).not_found_checks(3);

        let err = conf.wait_for_state(|| next_state(&script)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(script.1.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_last_state() {
        let script = scripted(&[Some("false")]);
        let conf = StateChangeConf::new(&["true"], Duration::from_secs(30))
            .delay(Duration::from_secs(5))
            .poll_interval(Duration::from_secs(5));

        let err = conf.wait_for_state(|| next_state(&script)).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "timeout while waiting for state to become 'true' (last state: 'false', timeout: 30s)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_aborts() {
        let calls = Cell::new(0);
        let conf = StateChangeConf::new(&["ok"], Duration::from_secs(60));
        let err = conf
            .wait_for_state(|| {
                calls.set(calls.get() + 1);
                async { Err::<Option<((), String)>, _>(ProviderError::api("AccessDenied", "no")) }
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("AccessDenied"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_code_equals() {
        let calls = Cell::new(0);
        let result = retry_when_code_equals(
            Duration::from_secs(120),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(ProviderError::api("NoSuchBucket", "not yet"))
                    } else {
                        Ok(n)
                    }
                }
            },
            &["NoSuchBucket"],
        )
        .await
        .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_returns_last_error_on_timeout() {
        let err = retry_when_code_equals(
            Duration::from_secs(5),
            || async { Err::<(), _>(ProviderError::api("ResourceInUseException", "in use")) },
            &["ResourceInUseException"],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some("ResourceInUseException"));

        let err = retry_when_code_equals(
            Duration::from_secs(5),
            || async { Err::<(), _>(ProviderError::api("AccessDenied", "no")) },
            &["ResourceInUseException"],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some("AccessDenied"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_not_found() {
        let calls = Cell::new(0);
        retry_until_not_found(Duration::from_secs(120), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 4 {
                    Ok(())
                } else {
                    Err(ProviderError::empty_result())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 4);

        let err = retry_until_not_found(Duration::from_secs(10), || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_context_timeout_carries_last_error() {
        let err = retry_context(Duration::from_secs(10), || async {
            Err::<(), _>(RetryError::Retryable(ProviderError::api("", "not stable")))
        })
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().ends_with(": not stable"));

        let err = retry_context(Duration::from_secs(10), || async {
            Err::<(), _>(RetryError::NonRetryable(ProviderError::api("Boom", "x")))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some("Boom"));
    }
}
