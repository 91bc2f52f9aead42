//! Periodic dispatcher draining the event buffer.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crm_core::buffer::{EventBufferEntry, EventBufferRepository};
use crm_core::clock::Clock;
use crm_core::error::DomainError;
use crm_core::policy::DispatchPolicy;

use crate::forwarder::EventForwarder;
use crate::retry::RemoteError;

/// Why an entry or a whole tick was not dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The event type is denylisted; the entry stays in the buffer.
    #[error("event type not supported for forwarding: {0}")]
    Unsupported(String),

    /// The forwarder rejected the event.
    #[error("forwarding failed: {0}")]
    Forward(#[from] RemoteError),

    /// Reading, decoding or deleting a buffer entry failed.
    #[error("event buffer error: {0}")]
    Repository(#[from] DomainError),
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Time between two drains.
    pub interval: Duration,
    /// Event types that are never forwarded.
    pub policy: DispatchPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            policy: DispatchPolicy::default(),
        }
    }
}

/// Counts of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Entries forwarded and removed.
    pub forwarded: usize,
    /// Entries whose forwarding failed; retried next tick.
    pub failed: usize,
    /// Denylisted entries left untouched.
    pub skipped: usize,
}

struct Drain {
    buffer: Arc<dyn EventBufferRepository>,
    forwarder: Arc<dyn EventForwarder>,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
}

impl Drain {
    #[instrument(skip(self), fields(policy_version = self.policy.version))]
    async fn run(&self) -> Result<DispatchSummary, DispatchError> {
        let now = self.clock.now();
        let entries = self.buffer.get_expired(now).await?;
        let mut summary = DispatchSummary::default();
        if entries.is_empty() {
            return Ok(summary);
        }

        for entry in &entries {
            match self.forward(entry).await {
                Ok(()) => {
                    self.buffer.delete(entry.id).await?;
                    summary.forwarded += 1;
                }
                Err(err @ DispatchError::Unsupported(_)) => {
                    warn!(entry_id = %entry.id, error = %err, "buffered event skipped");
                    summary.skipped += 1;
                }
                Err(err) => {
                    error!(
                        entry_id = %entry.id,
                        event_type = %entry.event_type,
                        error = %err,
                        "forwarding buffered event failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            forwarded = summary.forwarded,
            failed = summary.failed,
            skipped = summary.skipped,
            "event buffer drained"
        );
        Ok(summary)
    }

    async fn forward(&self, entry: &EventBufferEntry) -> Result<(), DispatchError> {
        if self.policy.is_denied(&entry.event_type) {
            return Err(DispatchError::Unsupported(entry.event_type.clone()));
        }
        let event = entry.event()?;
        self.forwarder.forward(&event).await?;
        Ok(())
    }
}

/// Drains due event-buffer entries into an [`EventForwarder`], on demand or
/// on a fixed interval between [`start`](Self::start) and
/// [`stop`](Self::stop).
pub struct EventBufferDispatcher {
    drain: Arc<Drain>,
    interval: Duration,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventBufferDispatcher {
    /// Creates a stopped dispatcher.
    #[must_use]
    pub fn new(
        buffer: Arc<dyn EventBufferRepository>,
        forwarder: Arc<dyn EventForwarder>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            drain: Arc::new(Drain {
                buffer,
                forwarder,
                clock,
                policy: config.policy,
            }),
            interval: config.interval,
            token: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Spawns the periodic drain on the current tokio runtime. The first
    /// drain runs one interval after start. Calling `start` again, or after
    /// `stop`, does nothing.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() || self.token.is_cancelled() {
            warn!("event buffer dispatcher already started or stopped");
            return;
        }

        let drain = Arc::clone(&self.drain);
        let token = self.token.clone();
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!("dispatching buffered events");
                        if let Err(err) = drain.run().await {
                            error!(error = %err, "event buffer dispatch failed");
                        }
                    }
                }
            }
            info!("event buffer dispatcher stopped");
        }));
        info!(interval_secs = interval.as_secs(), "event buffer dispatcher started");
    }

    /// Stops scheduling drains. A drain already running completes. Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stops the dispatcher and waits for the background task to finish.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "event buffer dispatcher task failed");
            }
        }
    }

    /// Returns `true` while the periodic drain is scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .task
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    /// Runs one drain now: forwards every due entry, deleting each one that
    /// was forwarded. Failed entries stay for the next drain.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Repository` if due entries cannot be read or a
    /// forwarded entry cannot be deleted; the drain stops at that point.
    pub async fn dispatch(&self) -> Result<DispatchSummary, DispatchError> {
        self.drain.run().await
    }
}

impl Drop for EventBufferDispatcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
