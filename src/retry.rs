//! Bounded retry for local filesystem contention
//!
//! Network requests are never retried (the rate limiter is the only throttle on them).
//! The only operation that retries is clearing the previous export tree, where a file-sync
//! client or an open explorer window can hold a directory handle for a moment.
//!
//! # Example
//!
//! ```no_run
//! use t2md::retry::{IsRetryable, with_retry};
//! use t2md::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Busy,
//!     Gone,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Busy)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Directory-busy style failures from sync clients and file explorers
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::ResourceBusy
                    | std::io::ErrorKind::DirectoryNotEmpty
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::Other
            ),
            // Network failures propagate without retry
            Error::Network(_) | Error::Http { .. } => false,
            Error::Config { .. }
            | Error::Serialization(_)
            | Error::InvalidBoard { .. }
            | Error::Attachment { .. }
            | Error::Card { .. }
            | Error::Board { .. }
            | Error::ExportFailed { .. }
            | Error::TaskFailed(_)
            | Error::Cancelled => false,
        }
    }
}

/// Execute an async operation, retrying transient failures
///
/// The operation runs once plus up to `config.max_attempts` retries. The delay starts at
/// `config.initial_delay` and is multiplied by `config.backoff_multiplier` after each retry
/// (a multiplier of 1.0 gives the fixed delay used for directory deletion), capped at
/// `config.max_delay`.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::debug!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                tokio::time::sleep(delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn io(kind: ErrorKind) -> Error {
        Error::Io(std::io::Error::from(kind))
    }

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 1.0,
        }
    }

    /// An operation failing with `kind` for its first `failures` calls
    async fn flaky(
        calls: &AtomicU32,
        failures: u32,
        kind: ErrorKind,
    ) -> Result<&'static str, Error> {
        if calls.fetch_add(1, Ordering::SeqCst) < failures {
            Err(io(kind))
        } else {
            Ok("removed")
        }
    }

    #[tokio::test]
    async fn busy_directory_eventually_removed() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&quick(5), || flaky(&calls, 2, ErrorKind::ResourceBusy)).await;

        assert_eq!(result.unwrap(), "removed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_success_is_not_repeated() {
        let calls = AtomicU32::new(0);
        with_retry(&quick(5), || flaky(&calls, 0, ErrorKind::ResourceBusy))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&quick(2), || {
            flaky(&calls, u32::MAX, ErrorKind::PermissionDenied)
        })
        .await;

        assert!(
            matches!(result, Err(Error::Io(ref e)) if e.kind() == ErrorKind::PermissionDenied)
        );
        // the first call plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result =
            with_retry(&quick(5), || flaky(&calls, u32::MAX, ErrorKind::InvalidInput)).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delay_grows_up_to_the_cap() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(30),
            backoff_multiplier: 2.0,
        };
        let calls = AtomicU32::new(0);
        let start = std::time::Instant::now();

        let _ = with_retry(&config, || flaky(&calls, u32::MAX, ErrorKind::ResourceBusy)).await;

        // 20ms, then 30ms twice (40ms capped)
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80), "waited {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "waited {elapsed:?}");
    }

    #[test]
    fn only_contention_errors_are_retryable() {
        for kind in [
            ErrorKind::PermissionDenied,
            ErrorKind::ResourceBusy,
            ErrorKind::DirectoryNotEmpty,
            ErrorKind::Interrupted,
            ErrorKind::Other,
        ] {
            assert!(io(kind).is_retryable(), "{kind:?}");
        }
        assert!(!io(ErrorKind::NotFound).is_retryable());

        let http = Error::Http {
            status: 503,
            url: "https://api.trello.com/1/members/me/boards".into(),
        };
        assert!(!http.is_retryable(), "network failures are never retried");
        assert!(!Error::invalid_board("b", "no name").is_retryable());
    }
}
