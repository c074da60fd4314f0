//! Repository for the `deals` table.
//!
//! Every mutating query sets `updated_at` from the caller-supplied `now`
//! so the workflow layer owns timestamp semantics.

use dealflow_core::deal::{HandoffTarget, ReleaseStatus, ScoringStatus};
use dealflow_core::stage::Stage;
use dealflow_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::deal::{CreateDeal, Deal, ScoreRecord};

/// Column list for `deals` queries.
pub(crate) const COLUMNS: &str = "\
    id, qualification_code, owner_user_id, originator_name, requested_amount_cents, \
    stage, handoff_target, handed_off_at, release_status, release_partner_id, \
    internal_notes, score, grade, score_breakdown, scoring_status, scoring_error, \
    scored_at, created_at, updated_at";

/// Filters accepted by [`DealRepo::list_filtered`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DealFilter {
    pub stage: Option<Stage>,
    pub handoff_target: Option<HandoffTarget>,
    pub release_status: Option<ReleaseStatus>,
}

/// Provides queries and partial updates for deals.
pub struct DealRepo;

impl DealRepo {
    /// Insert a new deal in `draft`, returning the full row.
    pub async fn create(
        pool: &PgPool,
        qualification_code: &str,
        input: &CreateDeal,
    ) -> Result<Deal, sqlx::Error> {
        let query = format!(
            "INSERT INTO deals \
                (qualification_code, owner_user_id, originator_name, requested_amount_cents) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(qualification_code)
            .bind(input.owner_user_id)
            .bind(&input.originator_name)
            .bind(input.requested_amount_cents)
            .fetch_one(pool)
            .await
    }

    /// Find a deal by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM deals WHERE id = $1");
        sqlx::query_as::<_, Deal>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List deals with optional filters, most recently updated first.
    pub async fn list_filtered(
        pool: &PgPool,
        filter: DealFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Deal>, sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut param_idx: usize = 1;

        if filter.stage.is_some() {
            conditions.push(format!("stage = ${param_idx}"));
            param_idx += 1;
        }
        if filter.handoff_target.is_some() {
            conditions.push(format!("handoff_target = ${param_idx}"));
            param_idx += 1;
        }
        if filter.release_status.is_some() {
            conditions.push(format!("release_status = ${param_idx}"));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM deals {where_clause} \
             ORDER BY updated_at DESC, id DESC \
             LIMIT ${param_idx} OFFSET ${}",
            param_idx + 1
        );

        let mut q = sqlx::query_as::<_, Deal>(&query);
        if let Some(stage) = filter.stage {
            q = q.bind(stage.as_str());
        }
        if let Some(target) = filter.handoff_target {
            q = q.bind(target.as_str());
        }
        if let Some(status) = filter.release_status {
            q = q.bind(status.as_str());
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Set the stage. Returns the updated row if found.
    pub async fn update_stage(
        pool: &PgPool,
        id: DbId,
        stage: Stage,
        now: Timestamp,
    ) -> Result<Option<Deal>, sqlx::Error> {
        let query =
            format!("UPDATE deals SET stage = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Deal>(&query)
            .bind(stage.as_str())
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set the handoff target and its timestamp.
    pub async fn update_handoff(
        pool: &PgPool,
        id: DbId,
        target: HandoffTarget,
        handed_off_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!(
            "UPDATE deals SET handoff_target = $1, handed_off_at = $2, updated_at = $3 \
             WHERE id = $4 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(target.as_str())
            .bind(handed_off_at)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite internal notes (last write wins).
    pub async fn update_notes(
        pool: &PgPool,
        id: DbId,
        notes: &str,
        now: Timestamp,
    ) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!(
            "UPDATE deals SET internal_notes = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(notes)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Mark the deal released to `partner_id`.
    pub async fn mark_released(
        pool: &PgPool,
        id: DbId,
        partner_id: DbId,
        now: Timestamp,
    ) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!(
            "UPDATE deals SET release_status = $1, release_partner_id = $2, updated_at = $3 \
             WHERE id = $4 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(ReleaseStatus::Released.as_str())
            .bind(partner_id)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fail every deal still `queued` or `processing`.
    ///
    /// Run at startup: the in-process queue does not survive a restart, so
    /// such jobs will never complete. Returns the ids that were reset.
    pub async fn fail_interrupted_scoring(
        pool: &PgPool,
        error: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE deals SET scoring_status = $1, scoring_error = $2, \
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond') \
             WHERE scoring_status IN ($3, $4) RETURNING id",
        )
        .bind(ScoringStatus::Failed.as_str())
        .bind(error)
        .bind(ScoringStatus::Queued.as_str())
        .bind(ScoringStatus::Processing.as_str())
        .fetch_all(pool)
        .await
    }

    /// Move the scoring lifecycle, recording an error message on failure.
    pub async fn update_scoring_status(
        pool: &PgPool,
        id: DbId,
        status: ScoringStatus,
        error: Option<&str>,
        now: Timestamp,
    ) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!(
            "UPDATE deals SET scoring_status = $1, scoring_error = $2, updated_at = $3 \
             WHERE id = $4 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(status.as_str())
            .bind(error)
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record a completed assessment and the resulting release status.
    pub async fn record_score(
        pool: &PgPool,
        id: DbId,
        record: &ScoreRecord,
        release_status: ReleaseStatus,
        now: Timestamp,
    ) -> Result<Option<Deal>, sqlx::Error> {
        let query = format!(
            "UPDATE deals SET score = $1, grade = $2, score_breakdown = $3, \
                scoring_status = $4, scoring_error = NULL, scored_at = $5, \
                release_status = $6, updated_at = $5 \
             WHERE id = $7 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Deal>(&query)
            .bind(record.score)
            .bind(&record.grade)
            .bind(&record.breakdown)
            .bind(ScoringStatus::Completed.as_str())
            .bind(now)
            .bind(release_status.as_str())
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
