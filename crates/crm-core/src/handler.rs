//! Command handler: validate, load, handle, save, with a bounded retry loop on
//! optimistic-lock conflicts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBuilder};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, HandleCommand};
use crate::clock::Clock;
use crate::command::Command;
use crate::error::DomainError;
use crate::repository::StoredEvent;
use crate::store::AggregateStore;

/// Retry budget for optimistic-lock conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per command; 0 is treated as 1.
    pub attempts: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Randomize delays to spread out competing writers.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with `attempts` total attempts and default delays.
    #[must_use]
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    /// Effective number of attempts.
    #[must_use]
    pub fn effective_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Exponential backoff yielding one delay per retry.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times((self.effective_attempts() - 1) as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Receives committed events synchronously after a successful save.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver committed events, in commit order.
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError>;
}

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Id of the aggregate the command was applied to.
    pub aggregate_id: String,
    /// Events committed by the command; empty if the command was a no-op.
    pub events: Vec<StoredEvent>,
    /// Attempts it took, counting the successful one.
    pub attempts: u32,
}

/// Executes commands against aggregates with optimistic concurrency.
#[derive(Clone)]
pub struct CommandHandler {
    store: AggregateStore,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl CommandHandler {
    /// Creates a handler with the default retry policy and no publisher.
    #[must_use]
    pub fn new(store: AggregateStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
            publisher: None,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the publisher that receives committed events.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Returns the aggregate store.
    #[must_use]
    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Returns the clock events are stamped with.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Handles `command` against aggregate type `A`.
    ///
    /// Each attempt reloads the aggregate, so a retry after a conflict sees the
    /// competing writer's events. A create command without an object id gets a
    /// fresh id that stays the same across retries.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` before any I/O for malformed commands,
    /// `DomainError::AggregateNotFound` for non-create commands on a missing
    /// aggregate, `DomainError::WrongExpectedVersion` once the retry budget is
    /// spent, and any other error from loading, handling or saving unchanged.
    #[instrument(
        skip_all,
        fields(
            command_type = command.command_type(),
            aggregate_type = A::AGGREGATE_TYPE,
            tenant = %command.base().tenant,
            correlation_id = %command.correlation_id(),
        )
    )]
    pub async fn handle<A, C>(&self, command: &C) -> Result<CommandOutcome, DomainError>
    where
        A: HandleCommand<C>,
        C: Command,
    {
        command.validate()?;

        let object_id = command.base().object_id.trim();
        let aggregate_id = if object_id.is_empty() && command.creates_aggregate() {
            Uuid::new_v4().to_string()
        } else {
            object_id.to_owned()
        };

        let mut delays = self.retry.backoff().build();
        let mut attempt = 1u32;
        loop {
            match self.attempt::<A, C>(command, &aggregate_id).await {
                Ok(events) => {
                    info!(
                        %aggregate_id,
                        attempt,
                        events = events.len(),
                        "command handled"
                    );
                    self.publish(&events).await;
                    return Ok(CommandOutcome {
                        aggregate_id,
                        events,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_wrong_expected_version() => match delays.next() {
                    Some(delay) => {
                        warn!(
                            %aggregate_id,
                            attempt,
                            error = %err,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "optimistic lock conflict, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!(
                            %aggregate_id,
                            attempt,
                            error = %err,
                            "optimistic lock conflict, retries exhausted"
                        );
                        return Err(err);
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt<A, C>(
        &self,
        command: &C,
        aggregate_id: &str,
    ) -> Result<Vec<StoredEvent>, DomainError>
    where
        A: HandleCommand<C>,
        C: Command,
    {
        let mut aggregate: A = self
            .store
            .load(&command.base().tenant, aggregate_id)
            .await?;
        if aggregate.is_not_found() && !command.creates_aggregate() {
            return Err(DomainError::AggregateNotFound(
                aggregate.base().stream().clone(),
            ));
        }
        aggregate.handle(command, self.clock.as_ref())?;
        self.store.save(&mut aggregate).await
    }

    async fn publish(&self, events: &[StoredEvent]) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        if events.is_empty() {
            return;
        }
        if let Err(err) = publisher.publish(events).await {
            error!(error = %err, "publishing committed events failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::command::BaseCommand;
    use crate::event::StreamId;
    use crate::testing::{CreateLabel, FixedClock, Label, MemoryRepository, RenameLabel};

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
        }
    }

    fn handler(repo: Arc<MemoryRepository>, attempts: u32) -> CommandHandler {
        CommandHandler::new(AggregateStore::new(repo), Arc::new(FixedClock))
            .with_retry_policy(fast_retry(attempts))
    }

    fn create(object_id: &str, name: &str) -> CreateLabel {
        CreateLabel {
            base: BaseCommand::new("acme", object_id).by_user("u-1"),
            name: name.to_owned(),
        }
    }

    fn rename(object_id: &str, name: &str) -> RenameLabel {
        RenameLabel {
            base: BaseCommand::new("acme", object_id),
            name: name.to_owned(),
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<StoredEvent>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError> {
            self.published.lock().unwrap().extend_from_slice(events);
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _events: &[StoredEvent]) -> Result<(), DomainError> {
            Err(DomainError::Infrastructure("projection store down".into()))
        }
    }

    #[tokio::test]
    async fn test_validation_failure_performs_no_io() {
        let repo = Arc::new(MemoryRepository::default());

        let result = handler(repo.clone(), 3)
            .handle::<Label, _>(&create("l-1", " "))
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(repo.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_of_missing_aggregate_is_not_found() {
        let repo = Arc::new(MemoryRepository::default());

        let result = handler(repo.clone(), 3)
            .handle::<Label, _>(&rename("l-404", "x"))
            .await;

        match result {
            Err(DomainError::AggregateNotFound(stream)) => {
                assert_eq!(stream, StreamId::new("acme", "label", "l-404"));
            }
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
        assert_eq!(repo.appends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_without_object_id_generates_one() {
        let repo = Arc::new(MemoryRepository::default());

        let outcome = handler(repo.clone(), 3)
            .handle::<Label, _>(&create("", "inbox"))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&outcome.aggregate_id).is_ok());
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].stream.aggregate_id, outcome.aggregate_id);
        assert_eq!(outcome.events[0].metadata.user_id, "u-1");
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_until_save_succeeds() {
        // Arrange
        let repo = Arc::new(MemoryRepository::with_conflicts(2));

        // Act
        let outcome = handler(repo.clone(), 5)
            .handle::<Label, _>(&create("l-1", "inbox"))
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.attempts, 3);
        assert_eq!(repo.loads.load(Ordering::SeqCst), 3);
        let stored = repo.stream(&StreamId::new("acme", "label", "l-1")).await;
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_conflict_stops_after_exact_attempt_budget() {
        let repo = Arc::new(MemoryRepository::with_conflicts(usize::MAX));

        let result = handler(repo.clone(), 4)
            .handle::<Label, _>(&create("l-1", "inbox"))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::WrongExpectedVersion { .. })
        ));
        assert_eq!(repo.appends.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let repo = Arc::new(MemoryRepository::with_conflicts(usize::MAX));

        let result = handler(repo.clone(), 0)
            .handle::<Label, _>(&create("l-1", "inbox"))
            .await;

        assert!(result.is_err());
        assert_eq!(repo.appends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_committed_events_reach_publisher() {
        let repo = Arc::new(MemoryRepository::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let handler = handler(repo, 3).with_publisher(publisher.clone());

        handler
            .handle::<Label, _>(&create("l-1", "inbox"))
            .await
            .unwrap();
        handler
            .handle::<Label, _>(&rename("l-1", "archive"))
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        let versions: Vec<i64> = published.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_publisher_failure_does_not_fail_command() {
        let repo = Arc::new(MemoryRepository::default());
        let handler = handler(repo.clone(), 3).with_publisher(Arc::new(FailingPublisher));

        let outcome = handler
            .handle::<Label, _>(&create("l-1", "inbox"))
            .await
            .unwrap();

        assert_eq!(outcome.events.len(), 1);
        assert_eq!(
            repo.stream(&StreamId::new("acme", "label", "l-1"))
                .await
                .len(),
            1
        );
    }
}
