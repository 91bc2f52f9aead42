//! Test forwarders — mock `EventForwarder` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use crm_core::repository::StoredEvent;
use crm_dispatch::forwarder::EventForwarder;
use crm_dispatch::retry::RemoteError;

/// A forwarder that records every event it is given and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingForwarder {
    forwarded: Mutex<Vec<StoredEvent>>,
}

impl RecordingForwarder {
    /// Creates an empty recording forwarder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all forwarded events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn forwarded(&self) -> Vec<StoredEvent> {
        self.forwarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventForwarder for RecordingForwarder {
    async fn forward(&self, event: &StoredEvent) -> Result<(), RemoteError> {
        self.forwarded.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// A forwarder that fails every call with the configured error.
#[derive(Debug)]
pub struct FailingForwarder(pub RemoteError);

#[async_trait]
impl EventForwarder for FailingForwarder {
    async fn forward(&self, _event: &StoredEvent) -> Result<(), RemoteError> {
        Err(self.0.clone())
    }
}
