//! Aggregate roots for the Opportunity context.

use chrono::{DateTime, Utc};
use crm_core::aggregate::{AggregateBase, AggregateRoot, HandleCommand};
use crm_core::clock::Clock;
use crm_core::command::BaseCommand;
use crm_core::error::DomainError;
use crm_core::event::Event;
use crm_core::source::{
    ExternalSystem, INTERNAL_SOURCE, Precedence, SourceFields, merge_external_system,
    source_or_internal,
};
use serde::{Deserialize, Serialize};

use super::commands::{
    CloseLooseOpportunity, CloseWinOpportunity, CreateOpportunity, CreateRenewalOpportunity,
    UpdateOpportunity, UpdateRenewalOpportunity, UpdateRenewalOpportunityNextCycleDate,
};
use super::events::{
    FIELD_ADJUSTED_RATE, FIELD_AMOUNT, FIELD_COMMENTS, FIELD_CURRENCY, FIELD_ESTIMATED_CLOSED_AT,
    FIELD_EXTERNAL_STAGE, FIELD_EXTERNAL_TYPE, FIELD_INTERNAL_STAGE, FIELD_LIKELIHOOD_RATE,
    FIELD_MAX_AMOUNT, FIELD_NAME, FIELD_NEXT_STEPS, FIELD_OWNER_USER_ID,
    FIELD_RENEWAL_LIKELIHOOD, FIELD_RENEWED_AT, InternalStage, InternalType, NextCycleDateUpdated,
    OpportunityClosed, OpportunityCreated, OpportunityEvent, OpportunityUpdated,
    RenewalLikelihood, RenewalOpportunityCreated, RenewalOpportunityUpdated,
};

/// Renewal-specific state of an opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenewalDetails {
    /// Normalized renewal likelihood.
    pub likelihood: Option<RenewalLikelihood>,
    /// Whether the renewal was approved.
    pub approved: bool,
    /// Date of the next renewal.
    pub renewed_at: Option<DateTime<Utc>>,
    /// Adjusted renewal rate, 0..=100.
    pub adjusted_rate: i64,
    /// Last user who changed the amount or the likelihood.
    pub updated_by_user_id: String,
    /// When that user made the change.
    pub updated_by_user_at: Option<DateTime<Utc>>,
}

/// Domain state of an opportunity, the fold of its events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpportunityState {
    /// Organization the record belongs to.
    pub organization_id: String,
    /// Contract being renewed.
    pub contract_id: String,
    /// Display name.
    pub name: String,
    /// Expected deal value.
    pub amount: f64,
    /// Upper bound of the deal value.
    pub max_amount: f64,
    /// ISO currency code of the amounts.
    pub currency: String,
    /// Probability of closing, in percent.
    pub likelihood_rate: i64,
    /// Kind of deal.
    pub internal_type: Option<InternalType>,
    /// Deal type as named by the external system.
    pub external_type: String,
    /// Pipeline stage.
    pub internal_stage: Option<InternalStage>,
    /// Pipeline stage as named by the external system.
    pub external_stage: String,
    /// Expected close date.
    pub estimated_closed_at: Option<DateTime<Utc>>,
    /// User who owns the record.
    pub owner_user_id: String,
    /// User who created the record.
    pub created_by_user_id: String,
    /// Free-form notes.
    pub general_notes: String,
    /// Agreed next steps.
    pub next_steps: String,
    /// Renewal comments.
    pub comments: String,
    /// Where the record came from.
    pub source: SourceFields,
    /// Links to the external systems that hold the record.
    pub external_systems: Vec<ExternalSystem>,
    /// Renewal-specific state.
    pub renewal: RenewalDetails,
    /// When the deal closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// When the record was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl OpportunityState {
    /// Folds one event into the state.
    pub fn fold(&mut self, event: &OpportunityEvent) {
        match event {
            OpportunityEvent::Created(p) => self.on_created(p),
            OpportunityEvent::Updated(p) => self.on_updated(p),
            OpportunityEvent::RenewalCreated(p) => self.on_renewal_created(p),
            OpportunityEvent::RenewalUpdated(p) => self.on_renewal_updated(p),
            OpportunityEvent::NextCycleDateUpdated(p) => {
                self.renewal.renewed_at = p.renewed_at;
                self.updated_at = Some(p.updated_at);
            }
            OpportunityEvent::ClosedWon(p) => self.on_closed(InternalStage::ClosedWon, p),
            OpportunityEvent::ClosedLost(p) => self.on_closed(InternalStage::ClosedLost, p),
        }
    }

    fn on_created(&mut self, p: &OpportunityCreated) {
        let d = &p.details;
        self.organization_id.clone_from(&d.organization_id);
        self.name.clone_from(&d.name);
        self.amount = d.amount;
        self.max_amount = d.max_amount;
        self.currency.clone_from(&d.currency);
        self.likelihood_rate = d.likelihood_rate;
        self.internal_type = d.internal_type;
        self.external_type.clone_from(&d.external_type);
        self.internal_stage = d.internal_stage;
        self.external_stage.clone_from(&d.external_stage);
        self.estimated_closed_at = d.estimated_closed_at;
        self.owner_user_id.clone_from(&d.owner_user_id);
        self.created_by_user_id.clone_from(&d.created_by_user_id);
        self.general_notes.clone_from(&d.general_notes);
        self.next_steps.clone_from(&d.next_steps);
        self.source = p.source.clone();
        self.created_at = Some(p.created_at);
        self.updated_at = Some(p.updated_at);
        merge_external_system(&mut self.external_systems, p.external_system.as_ref());
    }

    fn on_updated(&mut self, p: &OpportunityUpdated) {
        let d = &p.details;
        let mask = &p.fields_mask;
        let precedence = self.source.resolve_update(&p.source);
        if mask.includes(FIELD_NAME) {
            precedence.merge_str(&mut self.name, &d.name);
        }
        if precedence == Precedence::Overwrite {
            if mask.includes(FIELD_AMOUNT) {
                self.amount = d.amount;
            }
            if mask.includes(FIELD_MAX_AMOUNT) {
                self.max_amount = d.max_amount;
            }
            if mask.includes(FIELD_EXTERNAL_STAGE) {
                self.external_stage.clone_from(&d.external_stage);
            }
            if mask.includes(FIELD_EXTERNAL_TYPE) {
                self.external_type.clone_from(&d.external_type);
            }
            if mask.includes(FIELD_ESTIMATED_CLOSED_AT) {
                self.estimated_closed_at = d.estimated_closed_at;
            }
            if mask.includes(FIELD_OWNER_USER_ID) {
                self.owner_user_id.clone_from(&d.owner_user_id);
            }
            if mask.includes(FIELD_INTERNAL_STAGE) {
                self.internal_stage = d.internal_stage;
            }
            if mask.includes(FIELD_CURRENCY) {
                self.currency.clone_from(&d.currency);
            }
            if mask.includes(FIELD_NEXT_STEPS) {
                self.next_steps.clone_from(&d.next_steps);
            }
            if mask.includes(FIELD_LIKELIHOOD_RATE) {
                self.likelihood_rate = d.likelihood_rate;
            }
        }
        self.updated_at = Some(p.updated_at);
        merge_external_system(&mut self.external_systems, p.external_system.as_ref());
    }

    fn on_renewal_created(&mut self, p: &RenewalOpportunityCreated) {
        self.contract_id.clone_from(&p.contract_id);
        self.internal_type = Some(InternalType::Renewal);
        self.internal_stage = Some(p.internal_stage);
        self.source = p.source.clone();
        self.created_at = Some(p.created_at);
        self.updated_at = Some(p.updated_at);
        self.renewal = RenewalDetails {
            likelihood: Some(p.renewal_likelihood),
            approved: p.renewal_approved,
            renewed_at: p.renewed_at,
            adjusted_rate: p.renewal_adjusted_rate,
            ..RenewalDetails::default()
        };
    }

    fn on_renewal_updated(&mut self, p: &RenewalOpportunityUpdated) {
        let mask = &p.fields_mask;
        let amount_changed = (p.amount - self.amount).abs() > f64::EPSILON;
        let likelihood_changed = self.renewal.likelihood != Some(p.renewal_likelihood);
        if !p.updated_by_user_id.is_empty() && (amount_changed || likelihood_changed) {
            self.renewal
                .updated_by_user_id
                .clone_from(&p.updated_by_user_id);
            self.renewal.updated_by_user_at = Some(p.updated_at);
        }

        self.updated_at = Some(p.updated_at);
        if mask.includes(FIELD_RENEWAL_LIKELIHOOD) {
            self.renewal.likelihood = Some(p.renewal_likelihood);
        }
        if p.renewal_approved {
            self.renewal.approved = true;
        }
        if mask.includes(FIELD_COMMENTS) {
            self.comments.clone_from(&p.comments);
        }
        if mask.includes(FIELD_AMOUNT) {
            self.amount = p.amount;
        }
        if p.source == INTERNAL_SOURCE {
            self.source.source_of_truth = INTERNAL_SOURCE.to_owned();
        }
        if !p.owner_user_id.is_empty() {
            self.owner_user_id.clone_from(&p.owner_user_id);
        }
        if mask.includes(FIELD_RENEWED_AT) {
            self.renewal.renewed_at = p.renewed_at;
        }
        if mask.includes(FIELD_ADJUSTED_RATE) {
            self.renewal.adjusted_rate = p.renewal_adjusted_rate;
        }
    }

    fn on_closed(&mut self, stage: InternalStage, p: &OpportunityClosed) {
        self.internal_stage = Some(stage);
        self.closed_at = Some(p.closed_at);
        self.updated_at = Some(p.updated_at);
    }
}

/// The aggregate root for an opportunity.
#[derive(Debug)]
pub struct Opportunity {
    base: AggregateBase<OpportunityEvent>,
    state: OpportunityState,
}

impl Opportunity {
    /// Returns the folded domain state.
    #[must_use]
    pub fn state(&self) -> &OpportunityState {
        &self.state
    }

    /// Returns `true` for renewal opportunities.
    #[must_use]
    pub fn is_renewal(&self) -> bool {
        self.state.internal_type == Some(InternalType::Renewal)
    }

    fn ensure_new(&self) -> Result<(), DomainError> {
        if self.is_not_found() {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "opportunity {} already exists",
                self.aggregate_id()
            )))
        }
    }

    fn ensure_renewal(&self) -> Result<(), DomainError> {
        if self.is_renewal() {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "opportunity {} is not a renewal opportunity",
                self.aggregate_id()
            )))
        }
    }

    fn close(
        &mut self,
        stage: InternalStage,
        raise: fn(OpportunityClosed) -> OpportunityEvent,
        closed_at: Option<DateTime<Utc>>,
        command: &BaseCommand,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state.internal_stage == Some(stage) {
            return Ok(());
        }
        let now = clock.now();
        let event = raise(OpportunityClosed {
            closed_at: closed_at.unwrap_or(now),
            updated_at: now,
        });
        self.apply(event, command.event_metadata(), clock)
    }
}

/// Likelihood defaults to high; a high likelihood without a rate means 100%.
fn normalize_created_renewal(
    likelihood: Option<RenewalLikelihood>,
    adjusted_rate: i64,
) -> (RenewalLikelihood, i64) {
    let likelihood = likelihood.unwrap_or(RenewalLikelihood::High);
    let rate = if likelihood == RenewalLikelihood::High && adjusted_rate == 0 {
        100
    } else {
        adjusted_rate
    };
    (likelihood, rate.clamp(0, 100))
}

/// An update without a likelihood resets the renewal to high at 100%.
fn normalize_updated_renewal(
    likelihood: Option<RenewalLikelihood>,
    adjusted_rate: i64,
) -> (RenewalLikelihood, i64) {
    match likelihood {
        Some(likelihood) => (likelihood, adjusted_rate.clamp(0, 100)),
        None => (RenewalLikelihood::High, 100),
    }
}

impl AggregateRoot for Opportunity {
    type Event = OpportunityEvent;
    const AGGREGATE_TYPE: &'static str = "opportunity";

    fn new(tenant: &str, id: &str) -> Self {
        Self {
            base: AggregateBase::new(Self::AGGREGATE_TYPE, tenant, id),
            state: OpportunityState::default(),
        }
    }

    fn base(&self) -> &AggregateBase<OpportunityEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<OpportunityEvent> {
        &mut self.base
    }

    fn when(&mut self, event: &Event<OpportunityEvent>) -> Result<(), DomainError> {
        self.state.fold(&event.payload);
        Ok(())
    }
}

impl HandleCommand<CreateOpportunity> for Opportunity {
    fn handle(&mut self, command: &CreateOpportunity, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_new()?;
        let created_at = command.created_at.unwrap_or_else(|| clock.now());
        let mut details = command.details.clone();
        if details.created_by_user_id.is_empty() {
            details
                .created_by_user_id
                .clone_from(&command.base.logged_in_user_id);
        }
        let event = OpportunityEvent::Created(OpportunityCreated {
            details,
            source: command.base.source_fields(&command.source),
            external_system: command.external_system.clone(),
            created_at,
            updated_at: command.updated_at.unwrap_or(created_at),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateOpportunity> for Opportunity {
    fn handle(&mut self, command: &UpdateOpportunity, clock: &dyn Clock) -> Result<(), DomainError> {
        let event = OpportunityEvent::Updated(OpportunityUpdated {
            details: command.details.clone(),
            source: source_or_internal(&command.source),
            external_system: command.external_system.clone(),
            updated_at: command.updated_at.unwrap_or_else(|| clock.now()),
            fields_mask: command.fields_mask.clone(),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<CreateRenewalOpportunity> for Opportunity {
    fn handle(
        &mut self,
        command: &CreateRenewalOpportunity,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_new()?;
        let (renewal_likelihood, renewal_adjusted_rate) =
            normalize_created_renewal(command.renewal_likelihood, command.renewal_adjusted_rate);
        let created_at = command.created_at.unwrap_or_else(|| clock.now());
        let event = OpportunityEvent::RenewalCreated(RenewalOpportunityCreated {
            contract_id: command.contract_id.clone(),
            internal_stage: command.internal_stage.unwrap_or(InternalStage::Open),
            renewal_likelihood,
            renewal_approved: command.renewal_approved,
            renewed_at: command.renewed_at,
            renewal_adjusted_rate,
            source: command.base.source_fields(&command.source),
            created_at,
            updated_at: command.updated_at.unwrap_or(created_at),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateRenewalOpportunity> for Opportunity {
    fn handle(
        &mut self,
        command: &UpdateRenewalOpportunity,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_renewal()?;
        let (renewal_likelihood, renewal_adjusted_rate) =
            normalize_updated_renewal(command.renewal_likelihood, command.renewal_adjusted_rate);
        let event = OpportunityEvent::RenewalUpdated(RenewalOpportunityUpdated {
            renewal_likelihood,
            renewal_approved: command.renewal_approved,
            renewed_at: command.renewed_at,
            renewal_adjusted_rate,
            amount: command.amount,
            comments: command.comments.clone(),
            owner_user_id: command.owner_user_id.clone(),
            updated_by_user_id: command.base.logged_in_user_id.clone(),
            source: source_or_internal(&command.source),
            updated_at: command.updated_at.unwrap_or_else(|| clock.now()),
            fields_mask: command.fields_mask.clone(),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateRenewalOpportunityNextCycleDate> for Opportunity {
    fn handle(
        &mut self,
        command: &UpdateRenewalOpportunityNextCycleDate,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_renewal()?;
        if self.state.renewal.renewed_at == command.renewed_at {
            return Ok(());
        }
        let event = OpportunityEvent::NextCycleDateUpdated(NextCycleDateUpdated {
            renewed_at: command.renewed_at,
            updated_at: command.updated_at.unwrap_or_else(|| clock.now()),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<CloseWinOpportunity> for Opportunity {
    fn handle(
        &mut self,
        command: &CloseWinOpportunity,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.close(
            InternalStage::ClosedWon,
            OpportunityEvent::ClosedWon,
            command.closed_at,
            &command.base,
            clock,
        )
    }
}

impl HandleCommand<CloseLooseOpportunity> for Opportunity {
    fn handle(
        &mut self,
        command: &CloseLooseOpportunity,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.close(
            InternalStage::ClosedLost,
            OpportunityEvent::ClosedLost,
            command.closed_at,
            &command.base,
            clock,
        )
    }
}
