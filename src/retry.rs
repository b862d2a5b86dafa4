// =============================================================================
// Retry helper — consolidated exponential backoff with jitter
// =============================================================================
//
// The corpus this engine grew from duplicated "retry with backoff" three
// times (market client, stream reconnect, order submission). This module is
// the single parameterized helper: attempts, base delay, jitter ratio, and a
// per-call classifier that decides whether a given error is worth retrying.
// =============================================================================

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::EngineError;

/// Whether an `EngineError` should trigger another retry attempt.
///
/// 4xx-shaped failures and out-of-scope errors abort immediately; 5xx-shaped
/// upstream failures and transient network hiccups are retried.
pub fn is_retryable(err: &EngineError) -> bool {
    match err {
        EngineError::Network(_) => true,
        EngineError::Upstream { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Run `op` up to `attempts` times, applying `base * 2^n` backoff with up to
/// `jitter_ratio` proportional jitter between attempts. Retries only while
/// `classify` returns true for the error; aborts immediately otherwise.
pub async fn retry_with_backoff<F, Fut, T>(
    attempts: u32,
    base: Duration,
    jitter_ratio: f64,
    classify: impl Fn(&EngineError) -> bool,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, EngineError>>,
{
    let mut last_err = None;
    for attempt in 0..attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = classify(&err);
                warn!(attempt, retryable, error = %err, "attempt failed");
                if !retryable || attempt + 1 >= attempts.max(1) {
                    last_err = Some(err);
                    break;
                }
                let delay = backoff_delay(base, attempt, jitter_ratio);
                tokio::time::sleep(delay).await;
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or(EngineError::Internal("retry loop exited without result".into())))
}

fn backoff_delay(base: Duration, attempt: u32, jitter_ratio: f64) -> Duration {
    let exp = base.as_millis() as f64 * 2f64.powi(attempt as i32);
    let jitter_span = exp * jitter_ratio.clamp(0.0, 1.0);
    let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
    let millis = (exp + jitter).max(0.0);
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn classifies_5xx_as_retryable_and_4xx_as_not() {
        assert!(is_retryable(&EngineError::Upstream {
            status: 503,
            body: String::new()
        }));
        assert!(!is_retryable(&EngineError::Upstream {
            status: 404,
            body: String::new()
        }));
        assert!(is_retryable(&EngineError::Network("boom".into())));
        assert!(!is_retryable(&EngineError::Protocol("bad json".into())));
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_call_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            3,
            Duration::from_millis(1),
            0.0,
            is_retryable,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, EngineError>(42)
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_attempt_limit_then_fails() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            3,
            Duration::from_millis(1),
            0.0,
            is_retryable,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(EngineError::Network("down".into()))
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn aborts_immediately_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            5,
            Duration::from_millis(1),
            0.0,
            is_retryable,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(EngineError::Upstream {
                    status: 400,
                    body: "bad request".into(),
                })
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
