//! Shared application state and component wiring.

use std::sync::Arc;

use crm_core::buffer::EventBufferRepository;
use crm_core::clock::Clock;
use crm_core::error::DomainError;
use crm_core::handler::CommandHandler;
use crm_core::repository::EventRepository;
use crm_core::store::AggregateStore;
use crm_dispatch::dispatcher::EventBufferDispatcher;
use crm_dispatch::forwarder::LogIngestionForwarder;
use crm_dispatch::outbox::EventOutbox;
use crm_dispatch::retry::RemoteRetryPolicy;
use crm_projections::read_store::{InMemoryReadStore, ReadStore};
use crm_projections::registration::{rebuild_read_models, subscriptions};
use crm_projections::renewal_rollout::RenewalRolloutJob;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Components shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Command handler publishing to the projections.
    pub handler: Arc<CommandHandler>,
    /// Buffer for deferred events.
    pub outbox: EventOutbox,
    /// Event log the read models are folded from.
    pub events: Arc<dyn EventRepository>,
    /// Read models kept current by the projectors.
    pub read_store: Arc<dyn ReadStore>,
    /// Drains the event buffer into the event log.
    pub dispatcher: Arc<EventBufferDispatcher>,
    /// Rolls renewal opportunities into their next cycle.
    pub rollout: Arc<RenewalRolloutJob>,
    /// Clock events and jobs are stamped with.
    pub clock: Arc<dyn Clock>,
    /// Cancelled when the process shuts down.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires command handling, projections and the buffer dispatcher over the
    /// given repositories. The dispatcher is returned stopped.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventRepository>,
        buffer: Arc<dyn EventBufferRepository>,
        clock: Arc<dyn Clock>,
        config: &WorkerConfig,
    ) -> Self {
        let read_store: Arc<dyn ReadStore> = Arc::new(InMemoryReadStore::new());
        let store = AggregateStore::new(Arc::clone(&events));
        let retry = config.retry_policy();

        let adjuster_handler =
            CommandHandler::new(store.clone(), Arc::clone(&clock)).with_retry_policy(retry);
        let registry = Arc::new(subscriptions(
            &read_store,
            &events,
            adjuster_handler,
            RemoteRetryPolicy::default(),
        ));

        let handler = Arc::new(
            CommandHandler::new(store, Arc::clone(&clock))
                .with_retry_policy(retry)
                .with_publisher(registry.clone()),
        );
        let forwarder =
            LogIngestionForwarder::new(Arc::clone(&events)).with_publisher(registry);
        let dispatcher = Arc::new(EventBufferDispatcher::new(
            Arc::clone(&buffer),
            Arc::new(forwarder),
            Arc::clone(&clock),
            config.dispatcher_config(),
        ));
        let rollout = Arc::new(RenewalRolloutJob::new(
            Arc::clone(&read_store),
            Arc::clone(&handler),
        ));

        Self {
            handler,
            outbox: EventOutbox::new(buffer, Arc::clone(&clock)),
            events,
            read_store,
            dispatcher,
            rollout,
            clock,
            shutdown: CancellationToken::new(),
        }
    }

    /// Refolds every read model from the event log. Run once at startup,
    /// before commands are accepted, since the read store starts empty.
    ///
    /// # Errors
    ///
    /// Returns the first error from reading the log or writing a record.
    pub async fn rebuild_read_models(&self) -> Result<usize, DomainError> {
        rebuild_read_models(&self.read_store, &self.events).await
    }
}
