//! Deferred notification of a new organization owner.

use chrono::Duration;
use crm_core::clock::Clock;
use crm_core::error::DomainError;
use crm_core::event::Event;
use crm_core::repository::StoredEvent;
use crm_dispatch::outbox::EventOutbox;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::events::{OrganizationEvent, OwnerUpdateNotification};

/// How long an owner change settles before the notification becomes due.
#[must_use]
pub fn owner_notification_delay() -> Duration {
    Duration::minutes(10)
}

/// Builds the notification for a committed owner change. Other events yield
/// `None`.
///
/// The notification is positioned right after the owner change; its version
/// is provisional until the buffered event is ingested.
///
/// # Errors
///
/// Returns the decoding error if `committed` is an unreadable organization
/// event.
pub fn owner_notification_for(
    committed: &StoredEvent,
    clock: &dyn Clock,
) -> Result<Option<StoredEvent>, DomainError> {
    let event = Event::<OrganizationEvent>::from_stored(committed)?;
    let OrganizationEvent::OwnerUpdated(owner) = event.payload else {
        return Ok(None);
    };
    let version = committed.version + 1;
    let notification = Event {
        event_id: committed.stream.event_id(version),
        stream: committed.stream.clone(),
        version,
        payload: OrganizationEvent::OwnerUpdateNotification(OwnerUpdateNotification {
            organization_id: committed.stream.aggregate_id.clone(),
            owner_user_id: owner.owner_user_id,
            actor_user_id: owner.actor_user_id,
            owner_updated_at: owner.updated_at,
        }),
        metadata: event.metadata,
        occurred_at: clock.now(),
    };
    Ok(Some(notification.to_stored()?))
}

/// Buffers an owner notification for every owner change in `committed`.
/// Returns the ids of the buffer entries.
///
/// # Errors
///
/// Returns the first decoding or buffer error.
#[instrument(skip_all, fields(events = committed.len()))]
pub async fn notify_owner_update(
    committed: &[StoredEvent],
    outbox: &EventOutbox,
    clock: &dyn Clock,
) -> Result<Vec<Uuid>, DomainError> {
    let mut deferred = Vec::new();
    for event in committed {
        if let Some(notification) = owner_notification_for(event, clock)? {
            deferred.push(outbox.defer(&notification, owner_notification_delay()).await?);
        }
    }
    Ok(deferred)
}
