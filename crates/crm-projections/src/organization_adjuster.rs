//! Normalizes the market and industry of new and updated organizations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crm_core::command::BaseCommand;
use crm_core::error::DomainError;
use crm_core::event::Event;
use crm_core::handler::CommandHandler;
use crm_core::repository::StoredEvent;
use crm_core::source::{FieldMask, INTERNAL_SOURCE};
use crm_dispatch::retry::{RemoteError, RemoteRetryPolicy, call_with_retry};
use crm_dispatch::subscription::EventHandler;
use crm_organization::domain::aggregates::{Organization, OrganizationState};
use crm_organization::domain::commands::{CreateOrganization, UpdateOrganization};
use crm_organization::domain::events::{
    FIELD_INDUSTRY, FIELD_MARKET, OrganizationDetails, OrganizationEvent,
};

use crate::projector::{OrganizationProjection, Projection};
use crate::read_store::{ReadStore, load_record};

/// App source stamped on corrections issued by the adjuster.
pub const ADJUSTER_APP_SOURCE: &str = "event-processing-platform-subscribers";

const MARKETS: [(&str, &str); 3] = [
    ("b2b", "B2B"),
    ("b2c", "B2C"),
    ("marketplace", "Marketplace"),
];

// Lower-cased alias, GICS industry name.
const INDUSTRIES: [(&str, &str); 20] = [
    ("software", "Software"),
    ("saas", "Software"),
    ("it services", "IT Services"),
    ("information technology", "IT Services"),
    ("banks", "Banks"),
    ("banking", "Banks"),
    ("insurance", "Insurance"),
    ("biotechnology", "Biotechnology"),
    ("biotech", "Biotechnology"),
    ("pharmaceuticals", "Pharmaceuticals"),
    ("media", "Media"),
    ("entertainment", "Entertainment"),
    ("automobiles", "Automobiles"),
    ("automotive", "Automobiles"),
    ("aerospace & defense", "Aerospace & Defense"),
    ("construction & engineering", "Construction & Engineering"),
    ("real estate", "Real Estate Management & Development"),
    ("telecom", "Diversified Telecommunication Services"),
    ("telecommunications", "Diversified Telecommunication Services"),
    ("healthcare", "Health Care Providers & Services"),
];

/// Maps a free-text market onto the platform's market values. Unknown values
/// are returned trimmed.
#[must_use]
pub fn normalize_market(market: &str) -> String {
    canonical(&MARKETS, market)
}

/// Maps a free-text industry onto a GICS industry name. Unknown values are
/// returned trimmed.
#[must_use]
pub fn normalize_industry(industry: &str) -> String {
    canonical(&INDUSTRIES, industry)
}

fn canonical(table: &[(&str, &str)], value: &str) -> String {
    let trimmed = value.trim();
    table
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
        .map_or_else(|| trimmed.to_owned(), |(_, name)| (*name).to_owned())
}

/// A correction of an organization's market and/or industry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOrganizationRequest {
    /// Tenant the record belongs to.
    pub tenant: String,
    /// Organization to adjust.
    pub organization_id: String,
    /// Market to map.
    pub market: String,
    /// Industry to map.
    pub industry: String,
    /// Only the corrected fields.
    pub fields_mask: FieldMask,
}

/// Command side of the organization context as seen by the adjuster.
#[async_trait]
pub trait OrganizationClient: Send + Sync {
    /// Apply a correction.
    async fn update_organization(&self, request: &UpdateOrganizationRequest)
    -> Result<(), RemoteError>;

    /// Recreate an organization the command side lost track of.
    async fn resync_organization(&self, tenant: &str, organization_id: &str)
    -> Result<(), RemoteError>;
}

/// [`OrganizationClient`] issuing commands through a local [`CommandHandler`].
///
/// Resyncs rebuild the organization from its read record.
pub struct CommandOrganizationClient {
    handler: CommandHandler,
    read_store: Arc<dyn ReadStore>,
}

impl CommandOrganizationClient {
    /// Creates a client that reads organizations from `read_store`.
    #[must_use]
    pub fn new(handler: CommandHandler, read_store: Arc<dyn ReadStore>) -> Self {
        Self {
            handler,
            read_store,
        }
    }
}

#[async_trait]
impl OrganizationClient for CommandOrganizationClient {
    async fn update_organization(
        &self,
        request: &UpdateOrganizationRequest,
    ) -> Result<(), RemoteError> {
        let command = UpdateOrganization {
            base: BaseCommand::new(&request.tenant, &request.organization_id)
                .from_app(ADJUSTER_APP_SOURCE),
            details: OrganizationDetails {
                market: request.market.clone(),
                industry: request.industry.clone(),
                ..OrganizationDetails::default()
            },
            source: INTERNAL_SOURCE.to_owned(),
            fields_mask: request.fields_mask.clone(),
            ..UpdateOrganization::default()
        };
        self.handler
            .handle::<Organization, _>(&command)
            .await
            .map_err(RemoteError::from)?;
        Ok(())
    }

    async fn resync_organization(
        &self,
        tenant: &str,
        organization_id: &str,
    ) -> Result<(), RemoteError> {
        let record = load_record::<OrganizationState>(
            self.read_store.as_ref(),
            OrganizationProjection::KIND,
            tenant,
            organization_id,
        )
        .await?
        .ok_or_else(|| {
            RemoteError::Terminal(format!("no read record for organization {organization_id}"))
        })?;
        let state = record.state;
        let command = CreateOrganization {
            base: BaseCommand::new(tenant, organization_id).from_app(ADJUSTER_APP_SOURCE),
            details: state.details,
            source: state.source,
            external_system: state.external_systems.into_iter().next(),
            created_at: state.created_at,
            updated_at: state.updated_at,
        };
        self.handler
            .handle::<Organization, _>(&command)
            .await
            .map_err(RemoteError::from)?;
        Ok(())
    }
}

/// Watches organization create/update events and corrects non-canonical
/// market and industry values through an [`OrganizationClient`].
///
/// Failures are logged; the triggering event is always acknowledged.
pub struct OrganizationAdjuster {
    client: Arc<dyn OrganizationClient>,
    retry: RemoteRetryPolicy,
}

impl OrganizationAdjuster {
    /// Wraps a client.
    #[must_use]
    pub fn new(client: Arc<dyn OrganizationClient>) -> Self {
        Self {
            client,
            retry: RemoteRetryPolicy::default(),
        }
    }

    /// Replaces the retry policy for client calls.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RemoteRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Works out the correction for one event, if any.
    ///
    /// # Errors
    ///
    /// Returns the decoding error for an unreadable organization event.
    pub fn correction_for(
        event: &StoredEvent,
    ) -> Result<Option<UpdateOrganizationRequest>, DomainError> {
        let decoded = Event::<OrganizationEvent>::from_stored(event)?;
        let (details, market_set, industry_set) = match &decoded.payload {
            OrganizationEvent::Created(p) => (&p.details, true, true),
            OrganizationEvent::Updated(p) => (
                &p.details,
                p.fields_mask.includes(FIELD_MARKET),
                p.fields_mask.includes(FIELD_INDUSTRY),
            ),
            OrganizationEvent::OwnerUpdated(_) | OrganizationEvent::OwnerUpdateNotification(_) => {
                return Ok(None);
            }
        };

        let mut request = UpdateOrganizationRequest {
            tenant: event.stream.tenant.clone(),
            organization_id: event.stream.aggregate_id.clone(),
            ..UpdateOrganizationRequest::default()
        };
        let mut fields = Vec::new();
        if market_set {
            let market = normalize_market(&details.market);
            if !market.is_empty() && market != details.market {
                request.market = market;
                fields.push(FIELD_MARKET);
            }
        }
        if industry_set {
            let industry = normalize_industry(&details.industry);
            if !industry.is_empty() && industry != details.industry {
                request.industry = industry;
                fields.push(FIELD_INDUSTRY);
            }
        }
        if fields.is_empty() {
            return Ok(None);
        }
        request.fields_mask = FieldMask::of(fields);
        Ok(Some(request))
    }

    async fn apply(&self, request: &UpdateOrganizationRequest) {
        let result = call_with_retry(&self.retry, "update_organization", || {
            self.client.update_organization(request)
        })
        .await;
        match result {
            Ok(()) => info!("organization fields adjusted"),
            Err(err) if err.is_aggregate_not_found() => {
                warn!(error = %err, "organization unknown to the command side, resyncing");
                if let Err(err) = self
                    .client
                    .resync_organization(&request.tenant, &request.organization_id)
                    .await
                {
                    error!(error = %err, "organization resync failed");
                }
            }
            Err(err) => error!(error = %err, "adjusting organization fields failed"),
        }
    }
}

#[async_trait]
impl EventHandler for OrganizationAdjuster {
    fn name(&self) -> &str {
        "organization-adjuster"
    }

    #[instrument(
        skip_all,
        fields(
            tenant = %event.stream.tenant,
            organization_id = %event.stream.aggregate_id,
            event_type = %event.event_type
        )
    )]
    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError> {
        match Self::correction_for(event) {
            Ok(Some(request)) => self.apply(&request).await,
            Ok(None) => debug!("organization fields already canonical"),
            Err(err) => error!(error = %err, "unreadable organization event"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use crm_core::event::StreamId;
    use crm_test_support::stored_event;

    use super::*;

    #[derive(Default)]
    struct ScriptedClient {
        failures: Mutex<Vec<RemoteError>>,
        updates: Mutex<Vec<UpdateOrganizationRequest>>,
        resyncs: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn failing_with(failures: Vec<RemoteError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl OrganizationClient for ScriptedClient {
        async fn update_organization(
            &self,
            request: &UpdateOrganizationRequest,
        ) -> Result<(), RemoteError> {
            self.updates.lock().unwrap().push(request.clone());
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        async fn resync_organization(
            &self,
            _tenant: &str,
            organization_id: &str,
        ) -> Result<(), RemoteError> {
            self.resyncs.lock().unwrap().push(organization_id.to_owned());
            Ok(())
        }
    }

    fn fast_retry() -> RemoteRetryPolicy {
        RemoteRetryPolicy {
            attempts: 3,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn created(market: &str, industry: &str) -> StoredEvent {
        stored_event(
            &StreamId::new("acme", "organization", "org-1"),
            1,
            "V1_ORGANIZATION_CREATE",
            serde_json::json!({
                "name": "Initech",
                "market": market,
                "industry": industry,
                "source": {"source": "hubspot"},
                "createdAt": "2026-01-01T00:00:00Z",
                "updatedAt": "2026-01-01T00:00:00Z"
            }),
        )
    }

    #[test]
    fn test_normalization_tables() {
        assert_eq!(normalize_market(" b2b "), "B2B");
        assert_eq!(normalize_market("MARKETPLACE"), "Marketplace");
        assert_eq!(normalize_market("Wholesale "), "Wholesale");
        assert_eq!(normalize_industry("SaaS"), "Software");
        assert_eq!(normalize_industry("  Knitting"), "Knitting");
        assert_eq!(normalize_industry(""), "");
    }

    #[tokio::test]
    async fn test_created_organization_gets_canonical_values() {
        // Arrange
        let client = Arc::new(ScriptedClient::default());
        let adjuster = OrganizationAdjuster::new(client.clone()).with_retry_policy(fast_retry());

        // Act
        adjuster.handle(&created("b2b", "Software")).await.unwrap();

        // Assert
        let updates = client.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].organization_id, "org-1");
        assert_eq!(updates[0].market, "B2B");
        assert!(updates[0].industry.is_empty());
        assert_eq!(updates[0].fields_mask, FieldMask::of([FIELD_MARKET]));
    }

    #[tokio::test]
    async fn test_update_outside_mask_is_ignored() {
        let client = Arc::new(ScriptedClient::default());
        let adjuster = OrganizationAdjuster::new(client.clone());
        let event = stored_event(
            &StreamId::new("acme", "organization", "org-1"),
            2,
            "V1_ORGANIZATION_UPDATE",
            serde_json::json!({
                "name": "Initech",
                "market": "b2c",
                "source": "hubspot",
                "updatedAt": "2026-01-02T00:00:00Z",
                "fieldsMask": ["name"]
            }),
        );

        adjuster.handle(&event).await.unwrap();

        assert!(client.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_aggregate_triggers_single_resync() {
        // Arrange
        let client = Arc::new(ScriptedClient::failing_with(vec![RemoteError::NotFound(
            "aggregate not found: organization-acme-org-1".into(),
        )]));
        let adjuster = OrganizationAdjuster::new(client.clone()).with_retry_policy(fast_retry());

        // Act
        adjuster.handle(&created("b2c", "saas")).await.unwrap();

        // Assert
        assert_eq!(client.updates.lock().unwrap().len(), 1);
        assert_eq!(*client.resyncs.lock().unwrap(), vec!["org-1".to_owned()]);
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_attempts_without_failing_the_event() {
        let client = Arc::new(ScriptedClient::failing_with(vec![
            RemoteError::Transient("unavailable".into()),
            RemoteError::Transient("unavailable".into()),
            RemoteError::Transient("unavailable".into()),
        ]));
        let adjuster = OrganizationAdjuster::new(client.clone()).with_retry_policy(fast_retry());

        let result = adjuster.handle(&created("b2c", "")).await;

        assert!(result.is_ok());
        assert_eq!(client.updates.lock().unwrap().len(), 3);
        assert!(client.resyncs.lock().unwrap().is_empty());
    }
}
