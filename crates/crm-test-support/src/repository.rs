//! Test repositories — mock `EventRepository` implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use crm_core::error::DomainError;
use crm_core::event::StreamId;
use crm_core::repository::{EventRepository, StoredEvent};

/// One recorded `append_events` call.
pub type AppendCall = (StreamId, i64, Vec<StoredEvent>);

/// An event repository that records all `append_events` calls. Returns the
/// configured history from `load_events` for every stream and always succeeds
/// on `append_events`.
#[derive(Debug)]
pub struct RecordingEventRepository {
    history: Vec<StoredEvent>,
    appended: Mutex<Vec<AppendCall>>,
}

impl RecordingEventRepository {
    /// Create a new recording repository that returns `history` from every
    /// `load_events` call.
    #[must_use]
    pub fn new(history: Vec<StoredEvent>) -> Self {
        Self {
            history,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all events that were appended.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<AppendCall> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, _stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.history.clone())
    }

    async fn append_events(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((stream.clone(), expected_version, events.to_vec()));
        Ok(())
    }

    async fn list_streams(&self, aggregate_type: &str) -> Result<Vec<StreamId>, DomainError> {
        let mut streams: Vec<StreamId> = self
            .history
            .iter()
            .filter(|event| event.stream.aggregate_type == aggregate_type)
            .map(|event| event.stream.clone())
            .collect();
        streams.dedup();
        Ok(streams)
    }
}

/// An event repository that always returns an empty event list and silently
/// accepts appends. Useful for testing "aggregate not found" scenarios and
/// creation commands.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(&self, _stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        _stream: &StreamId,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn list_streams(&self, _aggregate_type: &str) -> Result<Vec<StreamId>, DomainError> {
        Ok(vec![])
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _stream: &StreamId,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn list_streams(&self, _aggregate_type: &str) -> Result<Vec<StreamId>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// An event repository that rejects the first `conflicts` appends with a
/// version conflict, as if a concurrent writer had won each race, and
/// delegates everything else to `inner`.
pub struct ConflictingEventRepository<R> {
    inner: R,
    remaining: AtomicUsize,
    append_attempts: AtomicUsize,
}

impl<R: EventRepository> ConflictingEventRepository<R> {
    /// Wraps `inner`, failing its next `conflicts` appends.
    #[must_use]
    pub fn new(inner: R, conflicts: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(conflicts),
            append_attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `append_events` calls seen, conflicting or not.
    pub fn append_attempts(&self) -> usize {
        self.append_attempts.load(Ordering::SeqCst)
    }

    /// The wrapped repository.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: EventRepository> EventRepository for ConflictingEventRepository<R> {
    async fn load_events(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(stream).await
    }

    async fn append_events(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        let conflicted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(DomainError::WrongExpectedVersion {
                stream: stream.clone(),
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner
            .append_events(stream, expected_version, events)
            .await
    }

    async fn list_streams(&self, aggregate_type: &str) -> Result<Vec<StreamId>, DomainError> {
        self.inner.list_streams(aggregate_type).await
    }
}
