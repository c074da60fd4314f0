//! Scoring collaborator, its job queue, and the worker that drains it.
//!
//! Scoring requests are enqueued onto a bounded in-process channel. A
//! single [`ScoringWorker`] calls the [`Scorer`] once per job and writes the
//! result (or the failure) back to the deal, so completion and failure are
//! observable through `scoring_status`, the activity log, and events.
//! Failed jobs are not retried. Every path that gives up on a job writes
//! `failed`, so the deal can be queued again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dealflow_core::deal::{validate_score, ReleaseStatus, ScoringStatus};
use dealflow_core::error::CoreError;
use dealflow_core::types::DbId;
use dealflow_db::models::deal::{Deal, ScoreRecord};
use dealflow_db::models::notification::CreateNotification;
use dealflow_events::bus::{EVENT_DEAL_SCORED, EVENT_SCORING_FAILED};
use dealflow_events::{DealEvent, EventBus};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::effects::{next_timestamp, notify, record_activity};
use crate::store::DealStore;

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// One loan from the parsed loan tape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTapeRow {
    pub loan_id: String,
    pub principal_cents: i64,
    pub interest_rate_bps: i32,
    pub term_months: i32,
    #[serde(default)]
    pub days_past_due: i32,
}

/// One period of historical portfolio performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRow {
    pub period: String,
    pub collections_cents: i64,
    #[serde(default)]
    pub charge_offs_cents: i64,
    #[serde(default)]
    pub delinquency_rate: f64,
}

/// Parsed rows handed to the scoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringInput {
    pub loan_tape: Vec<LoanTapeRow>,
    #[serde(default)]
    pub performance_history: Vec<PerformanceRow>,
}

impl ScoringInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.loan_tape.is_empty() {
            return Err(CoreError::Validation(
                "Loan tape must contain at least one row".into(),
            ));
        }
        if let Some(row) = self.loan_tape.iter().find(|r| r.principal_cents <= 0) {
            return Err(CoreError::Validation(format!(
                "Loan '{}' has a non-positive principal",
                row.loan_id
            )));
        }
        Ok(())
    }
}

/// What the scoring collaborator returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreAssessment {
    pub score: f64,
    pub grade: String,
    pub eligible: bool,
    #[serde(default)]
    pub breakdown: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Scoring request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scoring service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Scoring service returned an invalid assessment: {0}")]
    InvalidAssessment(String),
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Computes an assessment from loan-tape and performance rows.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, input: &ScoringInput) -> Result<ScoreAssessment, ScoringError>;
}

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Scoring collaborator settings.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub url: String,
    pub timeout: Duration,
    pub queue_capacity: usize,
}

impl ScoringConfig {
    /// Load from `SCORING_URL`, `SCORING_TIMEOUT_SECS`, and
    /// `SCORING_QUEUE_CAPACITY`. Returns `None` when `SCORING_URL` is unset.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SCORING_URL").ok()?;
        let timeout_secs: u64 = std::env::var("SCORING_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let queue_capacity: usize = std::env::var("SCORING_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);
        Some(Self {
            url,
            timeout: Duration::from_secs(timeout_secs),
            queue_capacity,
        })
    }
}

/// [`Scorer`] that POSTs the input as JSON to the hosted scoring service.
pub struct HttpScorer {
    client: reqwest::Client,
    url: String,
}

impl HttpScorer {
    pub fn new(config: &ScoringConfig) -> Result<Self, ScoringError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, input: &ScoringInput) -> Result<ScoreAssessment, ScoringError> {
        let response = self.client.post(&self.url).json(input).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let assessment: ScoreAssessment = response.json().await?;
        validate_score(assessment.score, &assessment.grade)
            .map_err(|e| ScoringError::InvalidAssessment(e.to_string()))?;
        Ok(assessment)
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// A queued request to score one deal.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    pub deal_id: DbId,
    pub requested_by: DbId,
    pub input: ScoringInput,
}

/// Producer side of the scoring channel.
#[derive(Clone)]
pub struct ScoringQueue {
    sender: mpsc::Sender<ScoringJob>,
}

impl ScoringQueue {
    /// Create a bounded queue, returning the receiver for the worker.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ScoringJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Reserve a slot, failing with `Conflict` when the queue is full or the
    /// worker has stopped.
    pub(crate) fn try_reserve(&self) -> Result<mpsc::Permit<'_, ScoringJob>, CoreError> {
        self.sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => {
                CoreError::Conflict("Scoring queue is full, try again later".into())
            }
            mpsc::error::TrySendError::Closed(()) => {
                CoreError::Conflict("Scoring worker is not running".into())
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Result of processing one job.
#[derive(Debug)]
pub enum ScoringOutcome {
    Completed(Deal),
    Failed { deal_id: DbId, error: String },
    /// The deal disappeared or could not be loaded.
    Skipped { deal_id: DbId },
}

/// Error recorded on jobs that were still queued when the worker stopped.
pub const WORKER_STOPPED: &str = "Scoring worker stopped before the job ran";

/// Drains the scoring queue, one job at a time.
pub struct ScoringWorker {
    store: Arc<dyn DealStore>,
    events: Arc<EventBus>,
    scorer: Arc<dyn Scorer>,
}

impl ScoringWorker {
    pub fn new(store: Arc<dyn DealStore>, events: Arc<EventBus>, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            store,
            events,
            scorer,
        }
    }

    /// Process jobs until `cancel` fires or every producer is dropped.
    pub async fn run(self, mut jobs: mpsc::Receiver<ScoringJob>, cancel: CancellationToken) {
        tracing::info!("Scoring worker started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Scoring worker stopping");
                    self.abandon_queued(&mut jobs).await;
                    break;
                }
                job = jobs.recv() => {
                    match job {
                        Some(job) => {
                            self.process(job).await;
                        }
                        None => {
                            tracing::info!("Scoring queue closed, worker exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Fail whatever is still buffered so those deals are not left
    /// `queued`.
    async fn abandon_queued(&self, jobs: &mut mpsc::Receiver<ScoringJob>) {
        jobs.close();
        let mut abandoned = 0usize;
        while let Ok(job) = jobs.try_recv() {
            self.abandon(&job, WORKER_STOPPED.to_string()).await;
            abandoned += 1;
        }
        if abandoned > 0 {
            tracing::warn!(abandoned, "Queued scoring jobs failed on shutdown");
        }
    }

    /// Record a job that will not run as failed.
    async fn abandon(&self, job: &ScoringJob, error: String) -> ScoringOutcome {
        let deal_id = job.deal_id;
        match self.store.find_deal(deal_id).await {
            Ok(Some(deal)) => self.fail(&deal, job.requested_by, error).await,
            Ok(None) => ScoringOutcome::Skipped { deal_id },
            Err(e) => {
                tracing::error!(deal_id, error = %e, "Failed to load deal to record scoring failure");
                if let Err(e) = self
                    .store
                    .update_scoring_status(deal_id, ScoringStatus::Failed, Some(&error), Utc::now())
                    .await
                {
                    tracing::error!(deal_id, error = %e, "Failed to record scoring failure");
                }
                ScoringOutcome::Failed { deal_id, error }
            }
        }
    }

    /// Score one deal and record the outcome.
    pub async fn process(&self, job: ScoringJob) -> ScoringOutcome {
        let deal_id = job.deal_id;
        let deal = match self.store.find_deal(deal_id).await {
            Ok(Some(deal)) => deal,
            Ok(None) => {
                tracing::warn!(deal_id, "Scoring job for missing deal dropped");
                return ScoringOutcome::Skipped { deal_id };
            }
            Err(e) => {
                tracing::error!(deal_id, error = %e, "Failed to load deal for scoring");
                return self
                    .abandon(&job, format!("Failed to load deal for scoring: {e}"))
                    .await;
            }
        };

        let deal = match self
            .store
            .update_scoring_status(
                deal_id,
                ScoringStatus::Processing,
                None,
                next_timestamp(deal.updated_at),
            )
            .await
        {
            Ok(Some(deal)) => deal,
            Ok(None) => return ScoringOutcome::Skipped { deal_id },
            Err(e) => {
                return self
                    .fail(&deal, job.requested_by, format!("Failed to start scoring: {e}"))
                    .await;
            }
        };

        tracing::debug!(deal_id, rows = job.input.loan_tape.len(), "Scoring deal");

        let assessment = self.scorer.score(&job.input).await.and_then(|a| {
            validate_score(a.score, &a.grade)
                .map(|()| a)
                .map_err(|e| ScoringError::InvalidAssessment(e.to_string()))
        });

        match assessment {
            Ok(assessment) => self.complete(&deal, job.requested_by, assessment).await,
            Err(e) => self.fail(&deal, job.requested_by, e.to_string()).await,
        }
    }

    async fn complete(
        &self,
        deal: &Deal,
        requested_by: DbId,
        assessment: ScoreAssessment,
    ) -> ScoringOutcome {
        // Only an untouched deal moves out of `pending`; a released or
        // rejected deal keeps its release status when re-scored.
        let release_status = match (deal.release_status, assessment.eligible) {
            (ReleaseStatus::Pending, true) => ReleaseStatus::ReadyForRelease,
            (ReleaseStatus::Pending, false) => ReleaseStatus::Rejected,
            (current, _) => current,
        };
        let record = ScoreRecord {
            score: assessment.score,
            grade: assessment.grade.clone(),
            breakdown: assessment.breakdown.clone(),
        };

        let updated = match self
            .store
            .record_score(deal.id, &record, release_status, next_timestamp(deal.updated_at))
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => return ScoringOutcome::Skipped { deal_id: deal.id },
            Err(e) => {
                return self
                    .fail(deal, requested_by, format!("Failed to record score: {e}"))
                    .await;
            }
        };

        let details = serde_json::json!({
            "score": assessment.score,
            "grade": assessment.grade,
            "eligible": assessment.eligible,
            "release_status": release_status,
        });
        record_activity(
            self.store.as_ref(),
            deal.id,
            Some(requested_by),
            EVENT_DEAL_SCORED,
            details.clone(),
        )
        .await;
        self.events.publish(
            DealEvent::new(EVENT_DEAL_SCORED, deal.id)
                .with_actor(requested_by)
                .with_payload(details),
        );
        notify(
            self.store.as_ref(),
            &self.events,
            CreateNotification {
                user_id: updated.owner_user_id,
                title: "Scoring completed".into(),
                message: format!(
                    "Deal {} scored {:.1} ({}).",
                    updated.qualification_code, assessment.score, assessment.grade
                ),
                deal_id: Some(deal.id),
            },
        )
        .await;

        tracing::info!(
            deal_id = deal.id,
            score = assessment.score,
            grade = %assessment.grade,
            eligible = assessment.eligible,
            "Deal scored"
        );
        ScoringOutcome::Completed(updated)
    }

    async fn fail(&self, deal: &Deal, requested_by: DbId, error: String) -> ScoringOutcome {
        tracing::error!(deal_id = deal.id, error = %error, "Scoring failed");

        if let Err(e) = self
            .store
            .update_scoring_status(
                deal.id,
                ScoringStatus::Failed,
                Some(&error),
                next_timestamp(deal.updated_at),
            )
            .await
        {
            tracing::error!(deal_id = deal.id, error = %e, "Failed to record scoring failure");
        }

        let details = serde_json::json!({ "error": error });
        record_activity(
            self.store.as_ref(),
            deal.id,
            Some(requested_by),
            EVENT_SCORING_FAILED,
            details.clone(),
        )
        .await;
        self.events.publish(
            DealEvent::new(EVENT_SCORING_FAILED, deal.id)
                .with_actor(requested_by)
                .with_payload(details),
        );
        notify(
            self.store.as_ref(),
            &self.events,
            CreateNotification {
                user_id: deal.owner_user_id,
                title: "Scoring failed".into(),
                message: format!("Scoring for deal {} failed.", deal.qualification_code),
                deal_id: Some(deal.id),
            },
        )
        .await;

        ScoringOutcome::Failed {
            deal_id: deal.id,
            error,
        }
    }
}
