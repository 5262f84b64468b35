//! Shared retry helper (spec §4.2).
//!
//! Up to 3 attempts for 5xx, 429, timeouts, and JSON-parse errors;
//! exponential backoff `min(base*2^attempt, cap)` with base 2s, cap 10s.
//! Non-429 4xx is not retried by the adapters that call this.

use std::future::Future;
use std::time::Duration;

use super::FetchError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_SECS: u64 = 2;
const CAP_SECS: u64 = 10;

pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let secs = BASE_SECS.saturating_mul(1u64 << attempt.min(10));
    Duration::from_secs(secs.min(CAP_SECS))
}

/// Classify a transport-level failure (connect/timeout/decode).
pub fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Transient(format!("timeout: {err}"))
    } else if err.is_decode() {
        FetchError::Transient(format!("json parse error: {err}"))
    } else {
        FetchError::Transient(err.to_string())
    }
}

/// Classify a non-2xx HTTP response. Returns `None` for 2xx.
pub fn classify_status(status: reqwest::StatusCode, body: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Some(FetchError::NotFound);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Some(FetchError::RateLimited { retry_after_secs: 10 });
    }
    if status.is_server_error() {
        return Some(FetchError::Transient(format!("server error {status}: {body}")));
    }
    Some(FetchError::Malformed(format!("client error {status}: {body}")))
}

pub async fn with_retry<T, F, Fut>(mut call: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let wait = match &err {
                    FetchError::RateLimited { retry_after_secs } => {
                        Duration::from_secs(*retry_after_secs).min(Duration::from_secs(CAP_SECS))
                    },
                    _ => backoff_for_attempt(attempt),
                };
                tracing::warn!(attempt, ?wait, error = %err, "retrying external call");
                tokio::time::sleep(wait).await;
                attempt += 1;
            },
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::Transient("boom".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32, FetchError> = with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Transient("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32, FetchError> = with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::NotFound) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(8));
        assert_eq!(backoff_for_attempt(5), Duration::from_secs(10));
    }
}
