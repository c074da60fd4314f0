//! Workflow mutators and role-checked reads.
//!
//! Every operation takes an explicit [`Caller`] resolved at the HTTP
//! boundary. Mutators follow the same shape: load the deal, validate,
//! persist with a fresh `updated_at`, then record activity, notify the
//! owner, and publish an event. Only the persist step can fail the call.

use std::sync::Arc;

use dealflow_core::deal::{
    generate_qualification_code, handoff_timestamp, validate_notes, validate_requested_amount,
    HandoffTarget, ScoringStatus, MAX_ORIGINATOR_NAME_LENGTH,
};
use dealflow_core::error::CoreError;
use dealflow_core::roles::Caller;
use dealflow_core::stage::{validate_transition, AvailableTransitions, Stage};
use dealflow_core::types::DbId;
use dealflow_db::models::activity::DealActivity;
use dealflow_db::models::deal::{CreateDeal, Deal, PartnerDealView};
use dealflow_db::models::notification::CreateNotification;
use dealflow_db::repositories::deal_repo::DealFilter;
use dealflow_events::bus::{
    EVENT_DEAL_CREATED, EVENT_HANDOFF_CHANGED, EVENT_NOTES_UPDATED, EVENT_SCORING_FAILED,
    EVENT_SCORING_QUEUED, EVENT_STAGE_CHANGED,
};
use dealflow_events::{DealEvent, EventBus};
use serde::Serialize;

use crate::effects::{next_timestamp, notify, record_activity};
use crate::error::WorkflowResult;
use crate::mailer::PartnerMailer;
use crate::scoring::{ScoringInput, ScoringJob, ScoringQueue};
use crate::store::DealStore;

/// Attempts at generating a qualification code that is not yet taken.
const CODE_ATTEMPTS: usize = 3;

const UQ_QUALIFICATION_CODE: &str = "uq_deals_qualification_code";

/// Error recorded on jobs found unfinished at startup.
pub const SCORING_INTERRUPTED: &str = "Scoring was interrupted by a restart";

/// A deal as seen by the caller.
///
/// Internal staff see the full record; partners see the projection allowed
/// by their release.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DealView {
    Internal(Box<Deal>),
    Partner(PartnerDealView),
}

/// Entry point for all deal workflow operations.
#[derive(Clone)]
pub struct WorkflowService {
    pub(crate) store: Arc<dyn DealStore>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) mailer: Arc<dyn PartnerMailer>,
    scoring: Option<ScoringQueue>,
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn DealStore>,
        events: Arc<EventBus>,
        mailer: Arc<dyn PartnerMailer>,
    ) -> Self {
        Self {
            store,
            events,
            mailer,
            scoring: None,
        }
    }

    /// Enable scoring requests, feeding jobs into `queue`.
    pub fn with_scoring_queue(mut self, queue: ScoringQueue) -> Self {
        self.scoring = Some(queue);
        self
    }

    pub fn scoring_enabled(&self) -> bool {
        self.scoring.is_some()
    }

    pub(crate) async fn load_deal(&self, deal_id: DbId) -> WorkflowResult<Deal> {
        self.store.find_deal(deal_id).await?.ok_or_else(|| {
            CoreError::NotFound {
                entity: "Deal",
                id: deal_id,
            }
            .into()
        })
    }

    pub(crate) fn deal_gone(deal_id: DbId) -> CoreError {
        CoreError::NotFound {
            entity: "Deal",
            id: deal_id,
        }
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Create a deal in `draft` with a fresh qualification code.
    pub async fn create_deal(&self, caller: &Caller, input: CreateDeal) -> WorkflowResult<Deal> {
        caller.require_admin()?;
        let originator = input.originator_name.trim().to_string();
        if originator.is_empty() || originator.chars().count() > MAX_ORIGINATOR_NAME_LENGTH {
            return Err(CoreError::Validation(format!(
                "Originator name must be 1-{MAX_ORIGINATOR_NAME_LENGTH} characters"
            ))
            .into());
        }
        validate_requested_amount(input.requested_amount_cents)?;
        let input = CreateDeal {
            originator_name: originator,
            ..input
        };

        let mut attempt = 0;
        let deal = loop {
            attempt += 1;
            let code = generate_qualification_code();
            match self.store.create_deal(&code, &input).await {
                Ok(deal) => break deal,
                Err(sqlx::Error::Database(db))
                    if db.constraint() == Some(UQ_QUALIFICATION_CODE) && attempt < CODE_ATTEMPTS =>
                {
                    tracing::debug!(code = %code, attempt, "Qualification code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let details = serde_json::json!({
            "qualification_code": deal.qualification_code,
            "originator_name": deal.originator_name,
        });
        record_activity(
            self.store.as_ref(),
            deal.id,
            Some(caller.user_id),
            EVENT_DEAL_CREATED,
            details.clone(),
        )
        .await;
        self.events.publish(
            DealEvent::new(EVENT_DEAL_CREATED, deal.id)
                .with_actor(caller.user_id)
                .with_payload(details),
        );

        tracing::info!(
            deal_id = deal.id,
            qualification_code = %deal.qualification_code,
            user_id = caller.user_id,
            "Deal created"
        );
        Ok(deal)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read one deal, shaped for the caller's role.
    pub async fn read_deal(&self, caller: &Caller, deal_id: DbId) -> WorkflowResult<DealView> {
        let deal = self.load_deal(deal_id).await?;
        if caller.require_internal().is_ok() {
            return Ok(DealView::Internal(Box::new(deal)));
        }

        let partner_id = caller.require_partner()?;
        let release = self.store.find_release_for_pair(deal_id, partner_id).await?;
        // A hidden deal reads as missing, never as forbidden.
        if !caller.can_read_deal(deal.handoff_target, release.is_some()) {
            return Err(Self::deal_gone(deal_id).into());
        }
        let access_level = release.map(|r| r.access_level).unwrap_or_default();
        Ok(DealView::Partner(PartnerDealView::build(&deal, access_level)))
    }

    pub async fn list_deals(
        &self,
        caller: &Caller,
        filter: DealFilter,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<Deal>> {
        caller.require_internal()?;
        Ok(self.store.list_deals(filter, limit, offset).await?)
    }

    /// Current stage plus the stages the deal may move to next.
    pub async fn available_transitions(
        &self,
        caller: &Caller,
        deal_id: DbId,
    ) -> WorkflowResult<AvailableTransitions> {
        caller.require_internal()?;
        let deal = self.load_deal(deal_id).await?;
        Ok(AvailableTransitions::for_stage(deal.stage))
    }

    pub async fn activity(
        &self,
        caller: &Caller,
        deal_id: DbId,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<DealActivity>> {
        caller.require_internal()?;
        self.load_deal(deal_id).await?;
        Ok(self.store.list_activity(deal_id, limit, offset).await?)
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Move a deal to `target` if the transition rules allow it.
    ///
    /// Upstream triggers (scoring, handoff) are the caller's responsibility.
    pub async fn advance_stage(
        &self,
        caller: &Caller,
        deal_id: DbId,
        target: Stage,
    ) -> WorkflowResult<Deal> {
        caller.require_admin()?;
        let deal = self.load_deal(deal_id).await?;
        let from = deal.stage;
        validate_transition(from, target)?;

        let updated = self
            .store
            .update_stage(deal_id, target, next_timestamp(deal.updated_at))
            .await?
            .ok_or_else(|| Self::deal_gone(deal_id))?;

        let details = serde_json::json!({ "from": from, "to": target });
        record_activity(
            self.store.as_ref(),
            deal_id,
            Some(caller.user_id),
            EVENT_STAGE_CHANGED,
            details.clone(),
        )
        .await;
        notify(
            self.store.as_ref(),
            &self.events,
            CreateNotification {
                user_id: updated.owner_user_id,
                title: "Deal stage updated".into(),
                message: format!(
                    "Deal {} moved from {} to {}.",
                    updated.qualification_code,
                    from.label(),
                    target.label()
                ),
                deal_id: Some(deal_id),
            },
        )
        .await;
        self.events.publish(
            DealEvent::new(EVENT_STAGE_CHANGED, deal_id)
                .with_actor(caller.user_id)
                .with_payload(details),
        );

        tracing::info!(deal_id, from = %from, to = %target, user_id = caller.user_id, "Deal stage advanced");
        Ok(updated)
    }

    /// Assign which internal team owns follow-up.
    ///
    /// Re-assigning the current team keeps the original `handed_off_at`;
    /// clearing to `none` clears it.
    pub async fn set_handoff(
        &self,
        caller: &Caller,
        deal_id: DbId,
        target: HandoffTarget,
    ) -> WorkflowResult<Deal> {
        caller.require_admin()?;
        let deal = self.load_deal(deal_id).await?;
        let now = next_timestamp(deal.updated_at);
        let handed_off_at =
            handoff_timestamp(deal.handoff_target, deal.handed_off_at, target, now);

        let updated = self
            .store
            .update_handoff(deal_id, target, handed_off_at, now)
            .await?
            .ok_or_else(|| Self::deal_gone(deal_id))?;

        let details = serde_json::json!({ "from": deal.handoff_target, "to": target });
        record_activity(
            self.store.as_ref(),
            deal_id,
            Some(caller.user_id),
            EVENT_HANDOFF_CHANGED,
            details.clone(),
        )
        .await;
        if target != HandoffTarget::None && target != deal.handoff_target {
            notify(
                self.store.as_ref(),
                &self.events,
                CreateNotification {
                    user_id: updated.owner_user_id,
                    title: "Deal handed off".into(),
                    message: format!(
                        "Deal {} was handed off to {}.",
                        updated.qualification_code,
                        match target {
                            HandoffTarget::Legal => "legal",
                            _ => "the funding partner team",
                        }
                    ),
                    deal_id: Some(deal_id),
                },
            )
            .await;
        }
        self.events.publish(
            DealEvent::new(EVENT_HANDOFF_CHANGED, deal_id)
                .with_actor(caller.user_id)
                .with_payload(details),
        );

        tracing::info!(deal_id, target = %target, user_id = caller.user_id, "Deal handoff set");
        Ok(updated)
    }

    /// Overwrite internal notes. Last write wins.
    pub async fn save_notes(
        &self,
        caller: &Caller,
        deal_id: DbId,
        notes: &str,
    ) -> WorkflowResult<Deal> {
        caller.require_admin()?;
        validate_notes(notes)?;
        let deal = self.load_deal(deal_id).await?;

        let updated = self
            .store
            .update_notes(deal_id, notes, next_timestamp(deal.updated_at))
            .await?
            .ok_or_else(|| Self::deal_gone(deal_id))?;

        let details = serde_json::json!({ "length": notes.chars().count() });
        record_activity(
            self.store.as_ref(),
            deal_id,
            Some(caller.user_id),
            EVENT_NOTES_UPDATED,
            details.clone(),
        )
        .await;
        self.events.publish(
            DealEvent::new(EVENT_NOTES_UPDATED, deal_id)
                .with_actor(caller.user_id)
                .with_payload(details),
        );

        tracing::debug!(deal_id, user_id = caller.user_id, "Deal notes saved");
        Ok(updated)
    }

    /// Queue the deal for scoring.
    ///
    /// Fails with `Conflict` if scoring is not configured, the queue is
    /// full, or a job for this deal is already queued or running.
    pub async fn request_scoring(
        &self,
        caller: &Caller,
        deal_id: DbId,
        input: ScoringInput,
    ) -> WorkflowResult<Deal> {
        caller.require_admin()?;
        input.validate()?;
        let queue = self
            .scoring
            .as_ref()
            .ok_or_else(|| CoreError::Conflict("Scoring is not configured".into()))?;
        let deal = self.load_deal(deal_id).await?;
        if matches!(
            deal.scoring_status,
            ScoringStatus::Queued | ScoringStatus::Processing
        ) {
            return Err(CoreError::Conflict(format!(
                "Deal {deal_id} is already being scored"
            ))
            .into());
        }

        let permit = queue.try_reserve()?;
        let updated = self
            .store
            .update_scoring_status(
                deal_id,
                ScoringStatus::Queued,
                None,
                next_timestamp(deal.updated_at),
            )
            .await?
            .ok_or_else(|| Self::deal_gone(deal_id))?;

        let rows = input.loan_tape.len();
        permit.send(ScoringJob {
            deal_id,
            requested_by: caller.user_id,
            input,
        });

        let details = serde_json::json!({ "loan_tape_rows": rows });
        record_activity(
            self.store.as_ref(),
            deal_id,
            Some(caller.user_id),
            EVENT_SCORING_QUEUED,
            details.clone(),
        )
        .await;
        self.events.publish(
            DealEvent::new(EVENT_SCORING_QUEUED, deal_id)
                .with_actor(caller.user_id)
                .with_payload(details),
        );

        tracing::info!(deal_id, rows, user_id = caller.user_id, "Deal queued for scoring");
        Ok(updated)
    }

    /// Fail scoring jobs a previous process left `queued` or `processing`.
    ///
    /// The queue lives in memory, so after a restart nothing will finish
    /// them. Called once at startup, before the worker runs.
    pub async fn recover_interrupted_scoring(&self) -> WorkflowResult<Vec<DbId>> {
        let reset = self.store.fail_interrupted_scoring(SCORING_INTERRUPTED).await?;
        for &deal_id in &reset {
            let details = serde_json::json!({ "error": SCORING_INTERRUPTED });
            record_activity(
                self.store.as_ref(),
                deal_id,
                None,
                EVENT_SCORING_FAILED,
                details.clone(),
            )
            .await;
            self.events
                .publish(DealEvent::new(EVENT_SCORING_FAILED, deal_id).with_payload(details));
        }
        if !reset.is_empty() {
            tracing::warn!(count = reset.len(), "Failed interrupted scoring jobs");
        }
        Ok(reset)
    }
}
