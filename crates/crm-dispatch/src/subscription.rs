//! Subscriber registry for synchronous delivery of committed events.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use crm_core::error::DomainError;
use crm_core::handler::EventPublisher;
use crm_core::repository::StoredEvent;

/// Registers a handler for every event type of an aggregate.
pub const ANY_EVENT_TYPE: &str = "*";

/// Reacts to committed events; projectors and side-effect handlers implement
/// this.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Handle one committed event.
    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError>;
}

struct Subscription {
    aggregate_type: String,
    event_type: String,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    fn matches(&self, event: &StoredEvent) -> bool {
        self.aggregate_type == event.stream.aggregate_type
            && (self.event_type == ANY_EVENT_TYPE || self.event_type == event.event_type)
    }
}

/// A handler failure recorded during dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFailure {
    /// Name of the failing handler.
    pub handler: String,
    /// Position of the event it failed on.
    pub position: String,
    /// Event type it failed on.
    pub event_type: String,
    /// The handler's error.
    pub error: DomainError,
}

/// Outcome of dispatching a batch of events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Successful handler invocations.
    pub delivered: usize,
    /// Failed handler invocations.
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    /// Returns `true` if every handler succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delivered, {} failed",
            self.delivered,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                "; {} on {} ({}): {}",
                failure.handler, failure.position, failure.event_type, failure.error
            )?;
        }
        Ok(())
    }
}

/// Routes committed events to the handlers registered for their aggregate and
/// event type.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `event_type` events of `aggregate_type`.
    /// [`ANY_EVENT_TYPE`] subscribes to all of the aggregate's events.
    pub fn register(
        &mut self,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) {
        self.subscriptions.push(Subscription {
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            handler,
        });
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Delivers `events` in order; for each event, matching handlers run in
    /// registration order. A failing handler does not stop the others.
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn dispatch(&self, events: &[StoredEvent]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            for subscription in self.subscriptions.iter().filter(|s| s.matches(event)) {
                let handler = subscription.handler.name();
                match subscription.handler.handle(event).await {
                    Ok(()) => {
                        debug!(handler, event_type = %event.event_type, "event handled");
                        report.delivered += 1;
                    }
                    Err(err) => {
                        error!(
                            handler,
                            event_type = %event.event_type,
                            position = %event.position(),
                            error = %err,
                            "event handler failed"
                        );
                        report.failures.push(HandlerFailure {
                            handler: handler.to_owned(),
                            position: event.position(),
                            event_type: event.event_type.clone(),
                            error: err,
                        });
                    }
                }
            }
        }
        report
    }
}

#[async_trait]
impl EventPublisher for SubscriptionRegistry {
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError> {
        let report = self.dispatch(events).await;
        if report.is_clean() {
            Ok(())
        } else {
            Err(DomainError::Infrastructure(format!(
                "event dispatch incomplete: {report}"
            )))
        }
    }
}
