//! Retry with exponential backoff for outbound remote calls.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use thiserror::Error;
use tracing::warn;

use crm_core::error::DomainError;

/// Message a remote command service returns when the target aggregate does
/// not exist on its side.
pub const AGGREGATE_NOT_FOUND: &str = "aggregate not found";

/// Failure of a remote call, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote side does not know the target.
    #[error("not found: {0}")]
    NotFound(String),

    /// A temporary failure (unavailable, timeout, conflict).
    #[error("transient failure: {0}")]
    Transient(String),

    /// A failure retrying will not fix.
    #[error("terminal failure: {0}")]
    Terminal(String),
}

impl RemoteError {
    /// Only transient failures are retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` for a not-found answer about a missing aggregate.
    #[must_use]
    pub fn is_aggregate_not_found(&self) -> bool {
        matches!(self, Self::NotFound(msg) if msg.contains(AGGREGATE_NOT_FOUND))
    }
}

impl From<DomainError> for RemoteError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::WrongExpectedVersion { .. } | DomainError::Infrastructure(_) => {
                Self::Transient(err.to_string())
            }
            DomainError::AggregateNotFound(_) => Self::NotFound(err.to_string()),
            DomainError::Validation(_)
            | DomainError::UnsupportedEventType(_)
            | DomainError::Serialization(_) => Self::Terminal(err.to_string()),
        }
    }
}

/// Attempt budget and delays for outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteRetryPolicy {
    /// Total attempts per call; 0 is treated as 1.
    pub attempts: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RemoteRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RemoteRetryPolicy {
    /// Exponential backoff with jitter, one delay per retry.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times((self.attempts.max(1) - 1) as usize)
            .with_jitter()
    }
}

/// Runs `call` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are used up.
///
/// # Errors
///
/// Returns the last `RemoteError` observed.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RemoteRetryPolicy,
    operation: &str,
    call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    call.retry(policy.backoff())
        .when(RemoteError::is_transient)
        .notify(|err, delay| {
            warn!(
                operation,
                error = %err,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "remote call failed, retrying"
            );
        })
        .await
}
