use std::future::Future;
use std::time::Duration;

use rand::Rng;

const DEFAULT_BASE_MS: u64 = 100;
const DEFAULT_MAX_MS: u64 = 10_000;

/// Exponential backoff: `base * 2^attempt + jitter`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(DEFAULT_BASE_MS),
            max: Duration::from_millis(DEFAULT_MAX_MS),
            jitter: true,
        }
    }
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: true,
        }
    }

    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay to wait after the zero-based `attempt` failed.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exp = self.base.saturating_mul(factor);
        let jitter = if self.jitter {
            let span = u64::try_from(self.base.as_millis() / 2).unwrap_or(u64::MAX);
            Duration::from_millis(rand::thread_rng().gen_range(0..=span))
        } else {
            Duration::ZERO
        };
        exp.saturating_add(jitter).min(self.max)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("{error}")]
    Aborted { attempts: u32, error: E },
}

impl<E> RetryError<E> {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted { error, .. } => error,
        }
    }
}

/// Attempt budget plus backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `op` until it succeeds or the budget is spent. Returns the value and the
    /// number of attempts used.
    ///
    /// # Errors
    ///
    /// Returns `RetryError::Exhausted` carrying the last error.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_with(op, |_| true, |_, _, _| {}).await
    }

    /// Like [`RetryPolicy::run`], with a `retryable` predicate and a `on_retry` hook
    /// called before each backoff sleep with `(attempt, error, delay)`.
    ///
    /// # Errors
    ///
    /// Returns `RetryError::Aborted` when `retryable` rejects an error, otherwise
    /// `RetryError::Exhausted` once the budget is spent.
    pub async fn run_with<T, E, F, Fut, R, N>(
        &self,
        op: F,
        retryable: R,
        on_retry: N,
    ) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
        N: FnMut(u32, &E, Duration),
    {
        self.run_until(op, retryable, on_retry, std::future::pending())
            .await
    }

    /// Like [`RetryPolicy::run_with`], but a backoff sleep ends early when `stop`
    /// completes. The pending error is then returned as `RetryError::Aborted`.
    ///
    /// # Errors
    ///
    /// Returns `RetryError::Aborted` when `retryable` rejects an error or `stop`
    /// fires during a backoff, otherwise `RetryError::Exhausted`.
    pub async fn run_until<T, E, F, Fut, R, N, S>(
        &self,
        mut op: F,
        retryable: R,
        mut on_retry: N,
        stop: S,
    ) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
        N: FnMut(u32, &E, Duration),
        S: Future<Output = ()>,
    {
        let mut stop = std::pin::pin!(stop);
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok((value, attempt + 1)),
                Err(error) => {
                    if !retryable(&error) {
                        return Err(RetryError::Aborted {
                            attempts: attempt + 1,
                            error,
                        });
                    }
                    if attempt + 1 >= max_attempts {
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            last: error,
                        });
                    }
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "attempt failed, retrying: {error}"
                    );
                    on_retry(attempt + 1, &error, delay);
                    tokio::select! {
                        () = &mut stop => {
                            return Err(RetryError::Aborted {
                                attempts: attempt + 1,
                                error,
                            });
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast() -> Backoff {
        Backoff::new(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn delay_doubles_without_jitter() {
        let b = Backoff::new(Duration::from_millis(10), Duration::from_secs(60)).without_jitter();
        assert_eq!(b.delay(0), Duration::from_millis(10));
        assert_eq!(b.delay(1), Duration::from_millis(20));
        assert_eq!(b.delay(3), Duration::from_millis(80));
    }

    #[test]
    fn delay_is_capped() {
        let b = Backoff::new(Duration::from_millis(100), Duration::from_millis(250));
        assert_eq!(b.delay(10), Duration::from_millis(250));
        assert_eq!(b.delay(40), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, fast());
        let c = calls.clone();
        let (value, attempts) = policy
            .run(move |_| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn exhausted_reports_last_error() {
        let policy = RetryPolicy::new(2, fast());
        let err = policy
            .run(|attempt| async move { Err::<(), _>(format!("fail {attempt}")) })
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 2);
        assert_eq!(err.into_inner(), "fail 1");
    }

    #[tokio::test]
    async fn stop_interrupts_backoff() {
        let policy = RetryPolicy::new(
            5,
            Backoff::new(Duration::from_secs(30), Duration::from_secs(60)).without_jitter(),
        );
        let started = std::time::Instant::now();
        let err = policy
            .run_until(
                |attempt| async move { Err::<(), _>(format!("fail {attempt}")) },
                |_| true,
                |_, _, _| {},
                tokio::time::sleep(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, RetryError::Aborted { attempts: 1, .. }));
        assert_eq!(err.into_inner(), "fail 0");
    }

    #[tokio::test]
    async fn zero_attempts_runs_once() {
        let policy = RetryPolicy::new(0, fast());
        let err = policy
            .run(|_| async { Err::<(), _>("nope") })
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_aborts() {
        let policy = RetryPolicy::new(5, fast());
        let mut retries = 0;
        let err = policy
            .run_with(
                |_| async { Err::<(), _>("fatal") },
                |e| *e != "fatal",
                |_, _, _| retries += 1,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Aborted { attempts: 1, .. }));
        assert_eq!(retries, 0);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(attempt in 0u32..64, base in 1u64..500, cap in 1u64..5000) {
            let b = Backoff::new(Duration::from_millis(base), Duration::from_millis(cap));
            prop_assert!(b.delay(attempt) <= Duration::from_millis(cap));
        }

        #[test]
        fn delay_is_monotonic_without_jitter(attempt in 0u32..30) {
            let b = Backoff::new(Duration::from_millis(3), Duration::from_secs(3600)).without_jitter();
            prop_assert!(b.delay(attempt + 1) >= b.delay(attempt));
        }
    }
}
