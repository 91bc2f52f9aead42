//! Wiring of projectors and side-effect handlers into a subscription registry.

use std::sync::Arc;

use crm_core::error::DomainError;
use crm_core::handler::CommandHandler;
use crm_core::repository::EventRepository;
use crm_dispatch::retry::RemoteRetryPolicy;
use crm_dispatch::subscription::{ANY_EVENT_TYPE, EventHandler, SubscriptionRegistry};
use crm_organization::domain::events::{ORGANIZATION_CREATE_V1, ORGANIZATION_UPDATE_V1};

use crate::organization_adjuster::{CommandOrganizationClient, OrganizationAdjuster};
use crate::projector::{
    ContactProjection, IssueProjection, OpportunityProjection, OrganizationProjection,
    Projection, Projector, UserProjection,
};
use crate::read_store::ReadStore;

fn register_projector<P: Projection>(
    registry: &mut SubscriptionRegistry,
    read_store: &Arc<dyn ReadStore>,
    events: &Arc<dyn EventRepository>,
) {
    registry.register(
        P::KIND,
        ANY_EVENT_TYPE,
        Arc::new(Projector::<P>::new(Arc::clone(read_store), Arc::clone(events))),
    );
}

/// Registers a projector for every aggregate type.
pub fn register_projections(
    registry: &mut SubscriptionRegistry,
    read_store: &Arc<dyn ReadStore>,
    events: &Arc<dyn EventRepository>,
) {
    register_projector::<ContactProjection>(registry, read_store, events);
    register_projector::<IssueProjection>(registry, read_store, events);
    register_projector::<OpportunityProjection>(registry, read_store, events);
    register_projector::<OrganizationProjection>(registry, read_store, events);
    register_projector::<UserProjection>(registry, read_store, events);
}

async fn catch_up<P: Projection>(
    read_store: &Arc<dyn ReadStore>,
    events: &Arc<dyn EventRepository>,
) -> Result<usize, DomainError> {
    Projector::<P>::new(Arc::clone(read_store), Arc::clone(events))
        .catch_up()
        .await
}

/// Refolds every read record from the event log. Returns the number of
/// records written.
///
/// # Errors
///
/// Returns the first error any projection reports.
pub async fn rebuild_read_models(
    read_store: &Arc<dyn ReadStore>,
    events: &Arc<dyn EventRepository>,
) -> Result<usize, DomainError> {
    Ok(catch_up::<ContactProjection>(read_store, events).await?
        + catch_up::<IssueProjection>(read_store, events).await?
        + catch_up::<OpportunityProjection>(read_store, events).await?
        + catch_up::<OrganizationProjection>(read_store, events).await?
        + catch_up::<UserProjection>(read_store, events).await?)
}

/// Subscribes `adjuster` to organization creates and updates.
pub fn register_organization_adjuster(
    registry: &mut SubscriptionRegistry,
    adjuster: Arc<dyn EventHandler>,
) {
    registry.register("organization", ORGANIZATION_CREATE_V1, Arc::clone(&adjuster));
    registry.register("organization", ORGANIZATION_UPDATE_V1, adjuster);
}

/// Builds the registry the main command handler publishes to: projections
/// first, then the organization adjuster.
///
/// `adjuster_handler` issues the adjuster's corrections. It publishes to a
/// projections-only registry, so corrections reach the read models without
/// being adjusted again.
#[must_use]
pub fn subscriptions(
    read_store: &Arc<dyn ReadStore>,
    events: &Arc<dyn EventRepository>,
    adjuster_handler: CommandHandler,
    retry: RemoteRetryPolicy,
) -> SubscriptionRegistry {
    let mut projections_only = SubscriptionRegistry::new();
    register_projections(&mut projections_only, read_store, events);
    let adjuster_handler = adjuster_handler.with_publisher(Arc::new(projections_only));
    let client = CommandOrganizationClient::new(adjuster_handler, Arc::clone(read_store));
    let adjuster = OrganizationAdjuster::new(Arc::new(client)).with_retry_policy(retry);

    let mut registry = SubscriptionRegistry::new();
    register_projections(&mut registry, read_store, events);
    register_organization_adjuster(&mut registry, Arc::new(adjuster));
    registry
}
