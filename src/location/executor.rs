//! Execution wrapper around provider calls.
//!
//! The geocoder never retries on its own: every provider call goes through a
//! [`ResilientExecutor`], which retries per its own policy or hands back the
//! final error.

use super::providers::RawPlace;
use crate::error::ProviderError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed provider call.
pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<RawPlace>, ProviderError>> + Send + 'a>>;

/// A repeatable provider call; each invocation starts a fresh attempt.
pub type ProviderOperation<'a> = Box<dyn Fn() -> ProviderFuture<'a> + Send + Sync + 'a>;

pub trait ResilientExecutor: Send + Sync {
    fn execute<'a>(&'a self, operation: ProviderOperation<'a>) -> ProviderFuture<'a>;
}

/// Runs the operation exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExecutor;

impl ResilientExecutor for PassthroughExecutor {
    fn execute<'a>(&'a self, operation: ProviderOperation<'a>) -> ProviderFuture<'a> {
        Box::pin(async move { operation().await })
    }
}

/// Retries transient failures with a linear backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryingExecutor {
    attempts: u32,
    backoff: Duration,
}

impl RetryingExecutor {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryingExecutor {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}

fn is_transient(e: &ProviderError) -> bool {
    match e {
        ProviderError::Timeout | ProviderError::Transport(_) => true,
        ProviderError::Http { status } => *status >= 500,
        _ => false,
    }
}

impl ResilientExecutor for RetryingExecutor {
    fn execute<'a>(&'a self, operation: ProviderOperation<'a>) -> ProviderFuture<'a> {
        Box::pin(async move {
            let mut attempt = 1;
            loop {
                match operation().await {
                    Ok(places) => return Ok(places),
                    Err(e) if attempt < self.attempts && is_transient(&e) => {
                        tracing::debug!(attempt, error = %e, "retrying provider call");
                        tokio::time::sleep(self.backoff * attempt).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_op<'a>(calls: &'a AtomicU32, fail_first: u32, error: ProviderError) -> ProviderOperation<'a> {
        Box::new(move || {
            let error = error.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < fail_first {
                    Err(error)
                } else {
                    Ok(Vec::new())
                }
            })
        })
    }

    #[tokio::test]
    async fn test_passthrough_runs_once() {
        let calls = AtomicU32::new(0);
        let result = PassthroughExecutor
            .execute(counting_op(&calls, 1, ProviderError::Timeout))
            .await;
        assert_eq!(result, Err(ProviderError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retrying_recovers_from_transient() {
        let calls = AtomicU32::new(0);
        let exec = RetryingExecutor::new(3, Duration::from_millis(1));
        let result = exec.execute(counting_op(&calls, 2, ProviderError::Timeout)).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_gives_up() {
        let calls = AtomicU32::new(0);
        let exec = RetryingExecutor::new(2, Duration::from_millis(1));
        let result = exec
            .execute(counting_op(&calls, 5, ProviderError::Http { status: 503 }))
            .await;
        assert_eq!(result, Err(ProviderError::Http { status: 503 }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_auth() {
        let calls = AtomicU32::new(0);
        let exec = RetryingExecutor::new(3, Duration::from_millis(1));
        let result = exec
            .execute(counting_op(&calls, 5, ProviderError::Auth("denied".into())))
            .await;
        assert!(matches!(result, Err(ProviderError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
