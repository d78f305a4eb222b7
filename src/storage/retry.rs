//! Bounded retry with a fixed delay.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// The final outcome of a retried operation.
#[derive(Debug)]
pub struct Retried<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with an error `is_retryable` rejects,
/// or `policy.max_attempts` is used up.
///
/// `op` receives the 1-based attempt number. Sleeps only between attempts,
/// never after the last one.
pub async fn retry<T, E, F, Fut, P>(policy: RetryPolicy, is_retryable: P, mut op: F) -> Retried<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        let result = op(attempt).await;
        match &result {
            Err(e) if attempt < policy.max_attempts && is_retryable(e) => {
                info!(
                    "Attempt {}/{} hit a transient error, waiting {:?} before retry",
                    attempt, policy.max_attempts, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            _ => {
                debug!("Finished after {} attempt(s)", attempt);
                return Retried {
                    result,
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum Fail {
        Busy,
        Broken,
    }

    fn busy(e: &Fail) -> bool {
        *e == Fail::Busy
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_two_delays() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let retried = retry(RetryPolicy::new(3, Duration::from_secs(2)), busy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(Fail::Busy)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(retried.result, Ok("done"));
        assert_eq!(retried.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_without_sleeping_after_the_last_attempt() {
        let start = Instant::now();

        let retried: Retried<(), Fail> =
            retry(RetryPolicy::new(3, Duration::from_secs(2)), busy, |_| async {
                Err(Fail::Busy)
            })
            .await;

        assert_eq!(retried.result, Err(Fail::Busy));
        assert_eq!(retried.attempts, 3);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let start = Instant::now();

        let retried: Retried<(), Fail> =
            retry(RetryPolicy::new(3, Duration::from_secs(2)), busy, |_| async {
                Err(Fail::Broken)
            })
            .await;

        assert_eq!(retried.result, Err(Fail::Broken));
        assert_eq!(retried.attempts, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
