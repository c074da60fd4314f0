//! Persistence seam for the workflow.
//!
//! [`DealStore`] is the row store the workflow reads and writes: get by id,
//! partial update by id, insert, and (deal, partner) uniqueness for
//! releases. [`PgDealStore`] backs it with the `dealflow-db` repositories.

use async_trait::async_trait;
use dealflow_core::deal::{HandoffTarget, PartnerAction, ReleaseStatus, ScoringStatus};
use dealflow_core::stage::Stage;
use dealflow_core::types::{DbId, Timestamp};
use dealflow_db::models::activity::{CreateDealActivity, DealActivity};
use dealflow_db::models::deal::{CreateDeal, Deal, ScoreRecord};
use dealflow_db::models::notification::{CreateNotification, Notification};
use dealflow_db::models::partner::FundingPartner;
use dealflow_db::models::release::{CreateDealRelease, DealRelease};
use dealflow_db::repositories::deal_repo::DealFilter;
use dealflow_db::repositories::{
    AccessLogRepo, ActivityRepo, DealRepo, NotificationRepo, PartnerRepo, ReleaseRepo,
};
use dealflow_db::DbPool;

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Row store used by workflow mutators, the release gate, and the scoring
/// worker.
///
/// Update methods return `None` when the deal (or release) no longer
/// exists.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn create_deal(&self, qualification_code: &str, input: &CreateDeal) -> StoreResult<Deal>;
    async fn find_deal(&self, id: DbId) -> StoreResult<Option<Deal>>;
    async fn list_deals(&self, filter: DealFilter, limit: i64, offset: i64)
        -> StoreResult<Vec<Deal>>;

    async fn update_stage(&self, id: DbId, stage: Stage, now: Timestamp)
        -> StoreResult<Option<Deal>>;
    async fn update_handoff(
        &self,
        id: DbId,
        target: HandoffTarget,
        handed_off_at: Option<Timestamp>,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>>;
    async fn update_notes(&self, id: DbId, notes: &str, now: Timestamp)
        -> StoreResult<Option<Deal>>;
    async fn mark_released(&self, id: DbId, partner_id: DbId, now: Timestamp)
        -> StoreResult<Option<Deal>>;
    async fn update_scoring_status(
        &self,
        id: DbId,
        status: ScoringStatus,
        error: Option<&str>,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>>;
    async fn record_score(
        &self,
        id: DbId,
        record: &ScoreRecord,
        release_status: ReleaseStatus,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>>;
    /// Fail every deal left `queued` or `processing`, returning their ids.
    async fn fail_interrupted_scoring(&self, error: &str) -> StoreResult<Vec<DbId>>;

    async fn find_partner(&self, id: DbId) -> StoreResult<Option<FundingPartner>>;

    async fn find_release(&self, id: DbId) -> StoreResult<Option<DealRelease>>;
    async fn find_release_for_pair(
        &self,
        deal_id: DbId,
        partner_id: DbId,
    ) -> StoreResult<Option<DealRelease>>;
    /// Insert the release and mark the deal released, atomically.
    ///
    /// `None` when the (deal, partner) pair already has a release; nothing
    /// is written then.
    async fn release_to_partner(
        &self,
        input: &CreateDealRelease,
    ) -> StoreResult<Option<(DealRelease, Deal)>>;
    async fn list_releases_for_deal(&self, deal_id: DbId) -> StoreResult<Vec<DealRelease>>;
    async fn list_releases_for_partner(&self, partner_id: DbId) -> StoreResult<Vec<DealRelease>>;
    async fn apply_partner_action(
        &self,
        release_id: DbId,
        action: PartnerAction,
        now: Timestamp,
    ) -> StoreResult<Option<DealRelease>>;

    async fn insert_activity(&self, entry: &CreateDealActivity) -> StoreResult<DbId>;
    async fn list_activity(&self, deal_id: DbId, limit: i64, offset: i64)
        -> StoreResult<Vec<DealActivity>>;
    async fn insert_access_log(
        &self,
        deal_id: DbId,
        partner_id: DbId,
        user_id: DbId,
        action: &str,
    ) -> StoreResult<DbId>;
    async fn create_notification(&self, input: &CreateNotification)
        -> StoreResult<Notification>;
}

/// [`DealStore`] over Postgres.
#[derive(Clone)]
pub struct PgDealStore {
    pool: DbPool,
}

impl PgDealStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DealStore for PgDealStore {
    async fn create_deal(&self, qualification_code: &str, input: &CreateDeal) -> StoreResult<Deal> {
        DealRepo::create(&self.pool, qualification_code, input).await
    }

    async fn find_deal(&self, id: DbId) -> StoreResult<Option<Deal>> {
        DealRepo::find_by_id(&self.pool, id).await
    }

    async fn list_deals(
        &self,
        filter: DealFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Deal>> {
        DealRepo::list_filtered(&self.pool, filter, limit, offset).await
    }

    async fn update_stage(
        &self,
        id: DbId,
        stage: Stage,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        DealRepo::update_stage(&self.pool, id, stage, now).await
    }

    async fn update_handoff(
        &self,
        id: DbId,
        target: HandoffTarget,
        handed_off_at: Option<Timestamp>,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        DealRepo::update_handoff(&self.pool, id, target, handed_off_at, now).await
    }

    async fn update_notes(
        &self,
        id: DbId,
        notes: &str,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        DealRepo::update_notes(&self.pool, id, notes, now).await
    }

    async fn mark_released(
        &self,
        id: DbId,
        partner_id: DbId,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        DealRepo::mark_released(&self.pool, id, partner_id, now).await
    }

    async fn update_scoring_status(
        &self,
        id: DbId,
        status: ScoringStatus,
        error: Option<&str>,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        DealRepo::update_scoring_status(&self.pool, id, status, error, now).await
    }

    async fn record_score(
        &self,
        id: DbId,
        record: &ScoreRecord,
        release_status: ReleaseStatus,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        DealRepo::record_score(&self.pool, id, record, release_status, now).await
    }

    async fn fail_interrupted_scoring(&self, error: &str) -> StoreResult<Vec<DbId>> {
        DealRepo::fail_interrupted_scoring(&self.pool, error).await
    }

    async fn find_partner(&self, id: DbId) -> StoreResult<Option<FundingPartner>> {
        PartnerRepo::find_by_id(&self.pool, id).await
    }

    async fn find_release(&self, id: DbId) -> StoreResult<Option<DealRelease>> {
        ReleaseRepo::find_by_id(&self.pool, id).await
    }

    async fn find_release_for_pair(
        &self,
        deal_id: DbId,
        partner_id: DbId,
    ) -> StoreResult<Option<DealRelease>> {
        ReleaseRepo::find_for_pair(&self.pool, deal_id, partner_id).await
    }

    async fn release_to_partner(
        &self,
        input: &CreateDealRelease,
    ) -> StoreResult<Option<(DealRelease, Deal)>> {
        ReleaseRepo::create_and_mark_released(&self.pool, input).await
    }

    async fn list_releases_for_deal(&self, deal_id: DbId) -> StoreResult<Vec<DealRelease>> {
        ReleaseRepo::list_for_deal(&self.pool, deal_id).await
    }

    async fn list_releases_for_partner(&self, partner_id: DbId) -> StoreResult<Vec<DealRelease>> {
        ReleaseRepo::list_for_partner(&self.pool, partner_id).await
    }

    async fn apply_partner_action(
        &self,
        release_id: DbId,
        action: PartnerAction,
        now: Timestamp,
    ) -> StoreResult<Option<DealRelease>> {
        ReleaseRepo::apply_partner_action(&self.pool, release_id, action, now).await
    }

    async fn insert_activity(&self, entry: &CreateDealActivity) -> StoreResult<DbId> {
        ActivityRepo::insert(&self.pool, entry).await
    }

    async fn list_activity(
        &self,
        deal_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<DealActivity>> {
        ActivityRepo::list_for_deal(&self.pool, deal_id, limit, offset).await
    }

    async fn insert_access_log(
        &self,
        deal_id: DbId,
        partner_id: DbId,
        user_id: DbId,
        action: &str,
    ) -> StoreResult<DbId> {
        AccessLogRepo::insert(&self.pool, deal_id, partner_id, user_id, action).await
    }

    async fn create_notification(&self, input: &CreateNotification) -> StoreResult<Notification> {
        NotificationRepo::create(&self.pool, input).await
    }
}
