//! Retry logic with a fixed delay between attempts
//!
//! The download primitive returns a classified error; this module decides from the
//! classification alone whether another attempt is worthwhile. There is no backoff:
//! every retry waits the same configured delay.
//!
//! # Example
//!
//! ```no_run
//! use ring_recordings_dl::retry::{IsRetryable, fetch_with_retry};
//! use ring_recordings_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let attempted = fetch_with_retry(
//!     &config,
//!     |_attempt| async { Ok::<_, MyError>(()) },
//!     |_err, _attempt, _will_retry| {},
//! )
//! .await;
//! assert_eq!(attempted.attempts, 1);
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, server busy, connection reset) should return `true`.
/// Permanent failures (recording gone, access denied, malformed response) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Final result of a retried operation plus how many attempts it took
#[derive(Debug)]
pub struct Attempted<T, E> {
    /// Success value or the last error
    pub result: Result<T, E>,
    /// Attempts made (at least 1)
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts
///
/// `operation` receives the 1-based attempt number. `on_failure` is called after every
/// failed attempt with the error, the attempt number, and whether another attempt will
/// follow; it runs before the retry delay.
///
/// At most `config.max_attempts()` attempts are made. The delay is only observed when
/// another attempt follows.
pub async fn fetch_with_retry<F, Fut, T, E, O>(
    config: &RetryConfig,
    mut operation: F,
    mut on_failure: O,
) -> Attempted<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    O: FnMut(&E, u32, bool),
{
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Attempted {
                    result: Ok(result),
                    attempts: attempt,
                };
            }
            Err(e) => {
                let will_retry = e.is_retryable() && attempt < max_attempts;
                on_failure(&e, attempt, will_retry);

                if !will_retry {
                    if e.is_retryable() {
                        tracing::error!(
                            error = %e,
                            attempts = attempt,
                            "Operation failed after all retry attempts exhausted"
                        );
                    } else {
                        tracing::error!(
                            error = %e,
                            attempts = attempt,
                            "Operation failed with non-retryable error"
                        );
                    }
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = config.retry_delay.as_millis(),
                    "Operation failed, retrying"
                );
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    }
}
