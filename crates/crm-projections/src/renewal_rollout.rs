//! Rolls lapsed renewal opportunities over to their next cycle.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crm_core::command::BaseCommand;
use crm_core::error::DomainError;
use crm_core::handler::CommandHandler;
use crm_dispatch::paging::{PagingConfig, PagingOutcome, drain_pages};
use crm_opportunity::application::command_handlers::handle_update_renewal_opportunity_next_cycle_date;
use crm_opportunity::domain::commands::UpdateRenewalOpportunityNextCycleDate;

use crate::read_store::ReadStore;

/// Length of one renewal cycle.
pub const RENEWAL_CYCLE: Months = Months::new(12);

/// First cycle date after `reference`, stepping from `renewed_at` one cycle
/// at a time.
#[must_use]
pub fn next_cycle_date(renewed_at: DateTime<Utc>, reference: DateTime<Utc>) -> DateTime<Utc> {
    let mut next = renewed_at;
    while next <= reference {
        match next.checked_add_months(RENEWAL_CYCLE) {
            Some(later) => next = later,
            None => break,
        }
    }
    next
}

/// Pages through renewal opportunities whose cycle date has passed and moves
/// each to its next cycle.
pub struct RenewalRolloutJob {
    read_store: Arc<dyn ReadStore>,
    handler: Arc<CommandHandler>,
    paging: PagingConfig,
}

impl RenewalRolloutJob {
    /// Creates a rollout over `read_store` that issues commands through `handler`.
    #[must_use]
    pub fn new(read_store: Arc<dyn ReadStore>, handler: Arc<CommandHandler>) -> Self {
        Self {
            read_store,
            handler,
            paging: PagingConfig::default(),
        }
    }

    /// Replaces the page size and inter-page pause.
    #[must_use]
    pub fn with_paging(mut self, paging: PagingConfig) -> Self {
        self.paging = paging;
        self
    }

    /// Rolls over every renewal due before `reference`. Stops between pages
    /// once `token` is cancelled.
    ///
    /// The read store is expected to reflect each rollover before the next
    /// page is fetched; a page made only of already handled opportunities
    /// ends the run.
    ///
    /// # Errors
    ///
    /// Returns the first read-store or command error; earlier rollovers stay
    /// committed.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn run(
        &self,
        token: &CancellationToken,
        reference: DateTime<Utc>,
    ) -> Result<PagingOutcome, DomainError> {
        let handled = Mutex::new(HashSet::new());
        let handled = &handled;
        drain_pages(token, self.paging, move |limit| async move {
            let due = self.read_store.renewals_due(reference, limit).await?;
            let mut processed = 0;
            for record in due {
                let key = (record.tenant.clone(), record.id.clone());
                if handled.lock().await.contains(&key) {
                    continue;
                }
                let Some(renewed_at) = record.state.renewal.renewed_at else {
                    continue;
                };
                let command = UpdateRenewalOpportunityNextCycleDate {
                    base: BaseCommand::new(&record.tenant, &record.id),
                    renewed_at: Some(next_cycle_date(renewed_at, reference)),
                    updated_at: None,
                };
                handle_update_renewal_opportunity_next_cycle_date(&command, &self.handler).await?;
                info!(tenant = %record.tenant, opportunity_id = %record.id, "renewal rolled over");
                handled.lock().await.insert(key);
                processed += 1;
            }
            Ok::<_, DomainError>(processed)
        })
        .await
    }
}
