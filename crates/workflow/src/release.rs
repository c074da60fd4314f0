//! Release gate and partner-side release actions.
//!
//! Releasing a deal to a funding partner requires a recorded score that
//! scoring did not reject, and an active partner. A repeat release to the
//! same partner is a no-op that returns the existing record. Partner actions (`view`, `interest`,
//! `pass`) are plain field writes and are not checked against the deal's
//! stage.

use std::sync::Arc;

use dealflow_core::deal::{AccessLevel, PartnerAction, ReleaseStatus, ACCESS_RELEASED};
use dealflow_core::error::CoreError;
use dealflow_core::roles::Caller;
use dealflow_core::types::DbId;
use dealflow_db::models::deal::{Deal, PartnerDealView};
use dealflow_db::models::notification::CreateNotification;
use dealflow_db::models::partner::FundingPartner;
use dealflow_db::models::release::{CreateDealRelease, DealRelease};
use dealflow_events::bus::{EVENT_DEAL_RELEASED, EVENT_RELEASE_ENGAGEMENT};
use dealflow_events::{DealEvent, ReleaseEmail};
use serde::Serialize;

use crate::effects::{next_timestamp, notify, record_activity};
use crate::error::WorkflowResult;
use crate::mailer::PartnerMailer;
use crate::service::WorkflowService;

/// Result of [`WorkflowService::release_deal`].
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    pub deal: Deal,
    pub release: DealRelease,
    /// `false` when the deal was already released to this partner.
    pub created: bool,
}

/// A release together with the deal projection it grants.
#[derive(Debug, Clone, Serialize)]
pub struct PartnerReleaseView {
    pub release: DealRelease,
    pub deal: PartnerDealView,
}

impl WorkflowService {
    /// Release a scored deal to a funding partner.
    ///
    /// Checks run in order: recorded score, not rejected by scoring, active
    /// partner, existing release for the pair. The release row and the
    /// deal's release fields are written together. The partner email is
    /// sent in the background and its failure never affects the release.
    pub async fn release_deal(
        &self,
        caller: &Caller,
        deal_id: DbId,
        partner_id: DbId,
        access_level: Option<AccessLevel>,
    ) -> WorkflowResult<ReleaseOutcome> {
        caller.require_admin()?;
        let deal = self.load_deal(deal_id).await?;

        if !deal.has_score() {
            return Err(CoreError::ScoringRequired { deal_id }.into());
        }
        if deal.release_status == ReleaseStatus::Rejected {
            return Err(CoreError::DealRejected { deal_id }.into());
        }

        let partner = self
            .store
            .find_partner(partner_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CoreError::PartnerNotFound { partner_id })?;

        if let Some(existing) = self.store.find_release_for_pair(deal_id, partner_id).await? {
            tracing::debug!(deal_id, partner_id, release_id = existing.id, "Deal already released to partner");
            return self.existing_release(caller, deal, existing).await;
        }

        let input = CreateDealRelease {
            deal_id,
            partner_id,
            access_level: access_level.unwrap_or_default(),
            released_by: caller.user_id,
            released_at: next_timestamp(deal.updated_at),
        };
        let Some((release, deal)) = self.store.release_to_partner(&input).await? else {
            // Lost a race with a concurrent release of the same pair.
            let existing = self
                .store
                .find_release_for_pair(deal_id, partner_id)
                .await?
                .ok_or_else(|| {
                    CoreError::Internal(format!(
                        "Release for deal {deal_id} and partner {partner_id} vanished"
                    ))
                })?;
            let deal = self.load_deal(deal_id).await?;
            return self.existing_release(caller, deal, existing).await;
        };

        self.log_release_access(caller, &release).await;

        let details = serde_json::json!({
            "partner_id": partner_id,
            "partner_name": partner.name,
            "release_id": release.id,
            "access_level": release.access_level,
        });
        record_activity(
            self.store.as_ref(),
            deal_id,
            Some(caller.user_id),
            EVENT_DEAL_RELEASED,
            details.clone(),
        )
        .await;
        notify(
            self.store.as_ref(),
            &self.events,
            CreateNotification {
                user_id: deal.owner_user_id,
                title: "Deal released".into(),
                message: format!(
                    "Deal {} was released to {}.",
                    deal.qualification_code, partner.name
                ),
                deal_id: Some(deal_id),
            },
        )
        .await;
        self.events.publish(
            DealEvent::new(EVENT_DEAL_RELEASED, deal_id)
                .with_actor(caller.user_id)
                .with_payload(details),
        );

        spawn_release_email(Arc::clone(&self.mailer), &partner, &deal, release.access_level);

        tracing::info!(
            deal_id,
            partner_id,
            release_id = release.id,
            user_id = caller.user_id,
            "Deal released to partner"
        );
        Ok(ReleaseOutcome {
            deal,
            release,
            created: true,
        })
    }

    /// Answer a repeat release with the existing record.
    ///
    /// A release row whose deal never reached `released` (written before
    /// the combined write existed, or by hand) is completed here.
    async fn existing_release(
        &self,
        caller: &Caller,
        deal: Deal,
        existing: DealRelease,
    ) -> WorkflowResult<ReleaseOutcome> {
        let deal = if deal.release_status == ReleaseStatus::Released {
            deal
        } else {
            let repaired = self
                .store
                .mark_released(deal.id, existing.partner_id, next_timestamp(deal.updated_at))
                .await?
                .ok_or_else(|| Self::deal_gone(deal.id))?;
            self.log_release_access(caller, &existing).await;
            tracing::warn!(
                deal_id = deal.id,
                partner_id = existing.partner_id,
                release_id = existing.id,
                "Completed release status for an existing release"
            );
            repaired
        };
        Ok(ReleaseOutcome {
            deal,
            release: existing,
            created: false,
        })
    }

    async fn log_release_access(&self, caller: &Caller, release: &DealRelease) {
        if let Err(e) = self
            .store
            .insert_access_log(release.deal_id, release.partner_id, caller.user_id, ACCESS_RELEASED)
            .await
        {
            tracing::warn!(
                deal_id = release.deal_id,
                partner_id = release.partner_id,
                error = %e,
                "Failed to write release access log"
            );
        }
    }

    /// All releases of one deal, for the admin dashboard.
    pub async fn list_releases_for_deal(
        &self,
        caller: &Caller,
        deal_id: DbId,
    ) -> WorkflowResult<Vec<DealRelease>> {
        caller.require_admin()?;
        self.load_deal(deal_id).await?;
        Ok(self.store.list_releases_for_deal(deal_id).await?)
    }

    /// Releases granted to the calling partner.
    pub async fn list_partner_releases(&self, caller: &Caller) -> WorkflowResult<Vec<DealRelease>> {
        let partner_id = caller.require_partner()?;
        Ok(self.store.list_releases_for_partner(partner_id).await?)
    }

    /// The deal projection one release grants to the calling partner.
    pub async fn partner_release_view(
        &self,
        caller: &Caller,
        release_id: DbId,
    ) -> WorkflowResult<PartnerReleaseView> {
        let release = self.load_own_release(caller, release_id).await?;
        let deal = self.load_deal(release.deal_id).await?;
        if !caller.can_read_deal(deal.handoff_target, true) {
            return Err(Self::deal_gone(deal.id).into());
        }
        let view = PartnerDealView::build(&deal, release.access_level);
        Ok(PartnerReleaseView {
            release,
            deal: view,
        })
    }

    /// Record a partner's view, interest, or pass on a release.
    pub async fn partner_action(
        &self,
        caller: &Caller,
        release_id: DbId,
        action: PartnerAction,
    ) -> WorkflowResult<DealRelease> {
        let release = self.load_own_release(caller, release_id).await?;
        let updated = self
            .store
            .apply_partner_action(release_id, action, next_timestamp(release.updated_at))
            .await?
            .ok_or(CoreError::NotFound {
                entity: "DealRelease",
                id: release_id,
            })?;

        if let Err(e) = self
            .store
            .insert_access_log(
                updated.deal_id,
                updated.partner_id,
                caller.user_id,
                action.access_log_action(),
            )
            .await
        {
            tracing::warn!(release_id, action = %action, error = %e, "Failed to write access log");
        }

        let details = serde_json::json!({
            "release_id": release_id,
            "partner_id": updated.partner_id,
            "action": action,
            "status": updated.status,
        });
        record_activity(
            self.store.as_ref(),
            updated.deal_id,
            Some(caller.user_id),
            EVENT_RELEASE_ENGAGEMENT,
            details.clone(),
        )
        .await;

        if action != PartnerAction::View {
            match self.store.find_deal(updated.deal_id).await {
                Ok(Some(deal)) => {
                    let verb = match action {
                        PartnerAction::Interest => "expressed interest in",
                        _ => "passed on",
                    };
                    notify(
                        self.store.as_ref(),
                        &self.events,
                        CreateNotification {
                            user_id: deal.owner_user_id,
                            title: "Partner engagement".into(),
                            message: format!(
                                "A funding partner {verb} deal {}.",
                                deal.qualification_code
                            ),
                            deal_id: Some(deal.id),
                        },
                    )
                    .await;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(deal_id = updated.deal_id, error = %e, "Failed to load deal for engagement notice");
                }
            }
        }

        self.events.publish(
            DealEvent::new(EVENT_RELEASE_ENGAGEMENT, updated.deal_id)
                .with_actor(caller.user_id)
                .with_payload(details),
        );

        tracing::info!(
            release_id,
            deal_id = updated.deal_id,
            action = %action,
            "Partner action recorded"
        );
        Ok(updated)
    }

    /// Load a release owned by the calling partner. Releases of other
    /// partners are reported as missing.
    async fn load_own_release(
        &self,
        caller: &Caller,
        release_id: DbId,
    ) -> WorkflowResult<DealRelease> {
        let partner_id = caller.require_partner()?;
        self.store
            .find_release(release_id)
            .await?
            .filter(|r| r.partner_id == partner_id)
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "DealRelease",
                    id: release_id,
                }
                .into()
            })
    }
}

fn spawn_release_email(
    mailer: Arc<dyn PartnerMailer>,
    partner: &FundingPartner,
    deal: &Deal,
    access_level: AccessLevel,
) {
    let to = partner.contact_email.clone();
    let email = ReleaseEmail {
        partner_name: partner.name.clone(),
        qualification_code: deal.qualification_code.clone(),
        originator_name: deal.originator_name.clone(),
        requested_amount_cents: deal.requested_amount_cents,
        grade: deal.grade.clone(),
        access_level,
    };
    let deal_id = deal.id;
    tokio::spawn(async move {
        if let Err(e) = mailer.send_release(&to, &email).await {
            tracing::warn!(deal_id, to = %to, error = %e, "Release email failed");
        }
    });
}
