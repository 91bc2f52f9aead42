//! Cancellable page-by-page processing for maintenance jobs.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Page size and pause between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    /// Maximum items per page.
    pub limit: usize,
    /// Pause after each full page.
    pub pause: Duration,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            pause: Duration::from_secs(5),
        }
    }
}

/// Totals of one paging run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingOutcome {
    /// Pages processed.
    pub pages: usize,
    /// Items processed across all pages.
    pub items: usize,
    /// Whether the run ended because of cancellation.
    pub cancelled: bool,
}

/// Repeatedly calls `process_page(limit)` until it reports fewer than `limit`
/// items. `process_page` must consume what it processes, so that the next call
/// sees the next page.
///
/// The token is checked before each page and during the pause between pages.
/// A page in progress is not interrupted.
///
/// # Errors
///
/// Returns the first error from `process_page`.
pub async fn drain_pages<F, Fut, E>(
    token: &CancellationToken,
    config: PagingConfig,
    mut process_page: F,
) -> Result<PagingOutcome, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<usize, E>>,
{
    let mut outcome = PagingOutcome::default();
    loop {
        if token.is_cancelled() {
            outcome.cancelled = true;
            break;
        }

        let processed = process_page(config.limit).await?;
        outcome.pages += 1;
        outcome.items += processed;
        debug!(page = outcome.pages, processed, "page processed");
        if processed < config.limit {
            break;
        }

        tokio::select! {
            () = token.cancelled() => {
                outcome.cancelled = true;
                break;
            }
            () = tokio::time::sleep(config.pause) => {}
        }
    }

    info!(
        pages = outcome.pages,
        items = outcome.items,
        cancelled = outcome.cancelled,
        "paging finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_stops_after_short_page() {
        let remaining = AtomicUsize::new(250);
        let token = CancellationToken::new();
        let config = PagingConfig {
            limit: 100,
            pause: Duration::from_millis(1),
        };

        let outcome = drain_pages(&token, config, |limit| {
            let remaining = &remaining;
            async move {
                let taken = remaining.load(Ordering::SeqCst).min(limit);
                remaining.fetch_sub(taken, Ordering::SeqCst);
                Ok::<_, Infallible>(taken)
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.items, 250);
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_token_processes_nothing() {
        let token = CancellationToken::new();
        token.cancel();

        let outcome = drain_pages(&token, PagingConfig::default(), |_| async {
            Ok::<_, Infallible>(100)
        })
        .await
        .unwrap();

        assert_eq!(outcome.pages, 0);
        assert!(outcome.cancelled);
    }

    #[tokio::test]
    async fn test_cancellation_during_pause_returns_promptly() {
        // Arrange
        let token = CancellationToken::new();
        let config = PagingConfig {
            limit: 10,
            pause: Duration::from_secs(3600),
        };
        let canceller = token.clone();

        // Act
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            drain_pages(&token, config, |limit| {
                canceller.cancel();
                async move { Ok::<_, Infallible>(limit) }
            }),
        )
        .await
        .expect("paging should stop once cancelled")
        .unwrap();

        // Assert
        assert_eq!(outcome.pages, 1);
        assert!(outcome.cancelled);
    }

    #[tokio::test]
    async fn test_page_error_is_returned() {
        let token = CancellationToken::new();

        let result = drain_pages(&token, PagingConfig::default(), |_| async {
            Err::<usize, _>("read store unavailable")
        })
        .await;

        assert_eq!(result, Err("read store unavailable"));
    }
}
