#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dealflow_core::deal::{
    EngagementStatus, HandoffTarget, PartnerAction, ReleaseStatus, ScoringStatus,
};
use dealflow_core::roles::Caller;
use dealflow_core::stage::Stage;
use dealflow_core::types::{DbId, Timestamp};
use dealflow_db::models::activity::{AccessLogEntry, CreateDealActivity, DealActivity};
use dealflow_db::models::deal::{CreateDeal, Deal, ScoreRecord};
use dealflow_db::models::notification::{CreateNotification, Notification};
use dealflow_db::models::partner::FundingPartner;
use dealflow_db::models::release::{CreateDealRelease, DealRelease};
use dealflow_db::repositories::deal_repo::DealFilter;
use dealflow_events::{EmailError, EventBus, ReleaseEmail};
use dealflow_workflow::scoring::{ScoreAssessment, Scorer, ScoringError, ScoringInput, LoanTapeRow};
use dealflow_workflow::store::StoreResult;
use dealflow_workflow::{DealStore, PartnerMailer, WorkflowService};

pub const ADMIN: Caller = Caller {
    user_id: 1,
    role: dealflow_core::roles::Role::Admin,
    partner_id: None,
};

pub const OWNER_ID: DbId = 50;

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    next_id: DbId,
    deals: BTreeMap<DbId, Deal>,
    partners: BTreeMap<DbId, FundingPartner>,
    releases: BTreeMap<DbId, DealRelease>,
    activity: Vec<DealActivity>,
    access_logs: Vec<AccessLogEntry>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// `DealStore` over plain maps. Side-effect tables (activity, access log,
/// notifications) can be made to fail, and single store calls can be made
/// to fail once with [`MemoryStore::fail_next`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_side_effects: AtomicBool,
    fail_once: Mutex<HashSet<&'static str>>,
}

fn injected() -> sqlx::Error {
    sqlx::Error::Protocol("injected failure".into())
}

impl MemoryStore {
    pub fn fail_side_effects(&self, fail: bool) {
        self.fail_side_effects.store(fail, Ordering::SeqCst);
    }

    fn side_effects_fail(&self) -> bool {
        self.fail_side_effects.load(Ordering::SeqCst)
    }

    /// Make the next call to the named store method fail without writing.
    ///
    /// `update_scoring_status` is keyed by the status it writes, e.g.
    /// `"update_scoring_status:processing"`.
    pub fn fail_next(&self, op: &'static str) {
        self.fail_once.lock().unwrap().insert(op);
    }

    fn take_failure(&self, op: &str) -> StoreResult<()> {
        if self.fail_once.lock().unwrap().remove(op) {
            return Err(injected());
        }
        Ok(())
    }

    /// A release row whose deal was never marked released, as left by a
    /// write that stopped halfway.
    pub fn insert_bare_release(&self, deal_id: DbId, partner_id: DbId) -> DealRelease {
        let mut t = self.tables.lock().unwrap();
        let id = t.id();
        let now = Utc::now();
        let release = DealRelease {
            id,
            deal_id,
            partner_id,
            status: EngagementStatus::Pending,
            access_level: dealflow_core::deal::AccessLevel::Summary,
            released_by: ADMIN.user_id,
            released_at: now,
            viewed_at: None,
            interested_at: None,
            passed_at: None,
            created_at: now,
            updated_at: now,
        };
        t.releases.insert(id, release.clone());
        release
    }

    pub fn set_release_status(&self, id: DbId, status: ReleaseStatus) {
        self.tables
            .lock()
            .unwrap()
            .deals
            .get_mut(&id)
            .unwrap()
            .release_status = status;
    }

    pub fn set_scoring_status(&self, id: DbId, status: ScoringStatus) {
        self.tables
            .lock()
            .unwrap()
            .deals
            .get_mut(&id)
            .unwrap()
            .scoring_status = status;
    }

    pub fn add_partner(&self, slug: &str, is_active: bool) -> FundingPartner {
        let mut t = self.tables.lock().unwrap();
        let id = t.id();
        let now = Utc::now();
        let partner = FundingPartner {
            id,
            slug: slug.to_string(),
            name: format!("{slug} capital"),
            contact_email: format!("deals@{slug}.example"),
            is_active,
            created_at: now,
            updated_at: now,
        };
        t.partners.insert(id, partner.clone());
        partner
    }

    pub fn deal(&self, id: DbId) -> Deal {
        self.tables.lock().unwrap().deals[&id].clone()
    }

    pub fn set_stage(&self, id: DbId, stage: Stage) {
        self.tables.lock().unwrap().deals.get_mut(&id).unwrap().stage = stage;
    }

    pub fn set_handoff(&self, id: DbId, target: HandoffTarget) {
        self.tables
            .lock()
            .unwrap()
            .deals
            .get_mut(&id)
            .unwrap()
            .handoff_target = target;
    }

    pub fn set_score(&self, id: DbId, score: f64, grade: &str) {
        let mut t = self.tables.lock().unwrap();
        let deal = t.deals.get_mut(&id).unwrap();
        deal.score = Some(score);
        deal.grade = Some(grade.to_string());
        deal.scoring_status = ScoringStatus::Completed;
    }

    pub fn releases(&self) -> Vec<DealRelease> {
        self.tables.lock().unwrap().releases.values().cloned().collect()
    }

    pub fn access_actions(&self, deal_id: DbId) -> Vec<String> {
        self.tables
            .lock()
            .unwrap()
            .access_logs
            .iter()
            .filter(|e| e.deal_id == deal_id)
            .map(|e| e.action.clone())
            .collect()
    }

    pub fn activity_actions(&self, deal_id: DbId) -> Vec<String> {
        self.tables
            .lock()
            .unwrap()
            .activity
            .iter()
            .filter(|a| a.deal_id == deal_id)
            .map(|a| a.action.clone())
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.tables.lock().unwrap().notifications.clone()
    }

    fn update_deal(&self, id: DbId, f: impl FnOnce(&mut Deal)) -> StoreResult<Option<Deal>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.deals.get_mut(&id).map(|deal| {
            f(deal);
            deal.clone()
        }))
    }
}

#[async_trait]
impl DealStore for MemoryStore {
    async fn create_deal(&self, qualification_code: &str, input: &CreateDeal) -> StoreResult<Deal> {
        let mut t = self.tables.lock().unwrap();
        let id = t.id();
        let now = Utc::now();
        let deal = Deal {
            id,
            qualification_code: qualification_code.to_string(),
            owner_user_id: input.owner_user_id,
            originator_name: input.originator_name.clone(),
            requested_amount_cents: input.requested_amount_cents,
            stage: Stage::Draft,
            handoff_target: HandoffTarget::None,
            handed_off_at: None,
            release_status: ReleaseStatus::Pending,
            release_partner_id: None,
            internal_notes: String::new(),
            score: None,
            grade: None,
            score_breakdown: None,
            scoring_status: ScoringStatus::NotStarted,
            scoring_error: None,
            scored_at: None,
            created_at: now,
            updated_at: now,
        };
        t.deals.insert(id, deal.clone());
        Ok(deal)
    }

    async fn find_deal(&self, id: DbId) -> StoreResult<Option<Deal>> {
        self.take_failure("find_deal")?;
        Ok(self.tables.lock().unwrap().deals.get(&id).cloned())
    }

    async fn list_deals(
        &self,
        filter: DealFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Deal>> {
        let t = self.tables.lock().unwrap();
        Ok(t.deals
            .values()
            .filter(|d| filter.stage.map_or(true, |s| d.stage == s))
            .filter(|d| filter.handoff_target.map_or(true, |h| d.handoff_target == h))
            .filter(|d| filter.release_status.map_or(true, |r| d.release_status == r))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_stage(&self, id: DbId, stage: Stage, now: Timestamp) -> StoreResult<Option<Deal>> {
        self.update_deal(id, |d| {
            d.stage = stage;
            d.updated_at = now;
        })
    }

    async fn update_handoff(
        &self,
        id: DbId,
        target: HandoffTarget,
        handed_off_at: Option<Timestamp>,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        self.update_deal(id, |d| {
            d.handoff_target = target;
            d.handed_off_at = handed_off_at;
            d.updated_at = now;
        })
    }

    async fn update_notes(&self, id: DbId, notes: &str, now: Timestamp) -> StoreResult<Option<Deal>> {
        self.update_deal(id, |d| {
            d.internal_notes = notes.to_string();
            d.updated_at = now;
        })
    }

    async fn mark_released(
        &self,
        id: DbId,
        partner_id: DbId,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        self.update_deal(id, |d| {
            d.release_status = ReleaseStatus::Released;
            d.release_partner_id = Some(partner_id);
            d.updated_at = now;
        })
    }

    async fn update_scoring_status(
        &self,
        id: DbId,
        status: ScoringStatus,
        error: Option<&str>,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        self.take_failure(&format!("update_scoring_status:{}", status.as_str()))?;
        self.update_deal(id, |d| {
            d.scoring_status = status;
            d.scoring_error = error.map(str::to_string);
            d.updated_at = now;
        })
    }

    async fn record_score(
        &self,
        id: DbId,
        record: &ScoreRecord,
        release_status: ReleaseStatus,
        now: Timestamp,
    ) -> StoreResult<Option<Deal>> {
        self.take_failure("record_score")?;
        self.update_deal(id, |d| {
            d.score = Some(record.score);
            d.grade = Some(record.grade.clone());
            d.score_breakdown = Some(record.breakdown.clone());
            d.scoring_status = ScoringStatus::Completed;
            d.scoring_error = None;
            d.scored_at = Some(now);
            d.release_status = release_status;
            d.updated_at = now;
        })
    }

    async fn fail_interrupted_scoring(&self, error: &str) -> StoreResult<Vec<DbId>> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();
        Ok(t.deals
            .values_mut()
            .filter(|d| {
                matches!(
                    d.scoring_status,
                    ScoringStatus::Queued | ScoringStatus::Processing
                )
            })
            .map(|d| {
                d.scoring_status = ScoringStatus::Failed;
                d.scoring_error = Some(error.to_string());
                d.updated_at = now;
                d.id
            })
            .collect())
    }

    async fn find_partner(&self, id: DbId) -> StoreResult<Option<FundingPartner>> {
        Ok(self.tables.lock().unwrap().partners.get(&id).cloned())
    }

    async fn find_release(&self, id: DbId) -> StoreResult<Option<DealRelease>> {
        Ok(self.tables.lock().unwrap().releases.get(&id).cloned())
    }

    async fn find_release_for_pair(
        &self,
        deal_id: DbId,
        partner_id: DbId,
    ) -> StoreResult<Option<DealRelease>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .releases
            .values()
            .find(|r| r.deal_id == deal_id && r.partner_id == partner_id)
            .cloned())
    }

    async fn release_to_partner(
        &self,
        input: &CreateDealRelease,
    ) -> StoreResult<Option<(DealRelease, Deal)>> {
        self.take_failure("release_to_partner")?;
        let mut t = self.tables.lock().unwrap();
        if t.releases
            .values()
            .any(|r| r.deal_id == input.deal_id && r.partner_id == input.partner_id)
        {
            return Ok(None);
        }
        if !t.deals.contains_key(&input.deal_id) {
            return Err(sqlx::Error::RowNotFound);
        }
        let id = t.id();
        let release = DealRelease {
            id,
            deal_id: input.deal_id,
            partner_id: input.partner_id,
            status: EngagementStatus::Pending,
            access_level: input.access_level,
            released_by: input.released_by,
            released_at: input.released_at,
            viewed_at: None,
            interested_at: None,
            passed_at: None,
            created_at: input.released_at,
            updated_at: input.released_at,
        };
        t.releases.insert(id, release.clone());
        let deal = t.deals.get_mut(&input.deal_id).unwrap();
        deal.release_status = ReleaseStatus::Released;
        deal.release_partner_id = Some(input.partner_id);
        deal.updated_at = input.released_at;
        Ok(Some((release, deal.clone())))
    }

    async fn list_releases_for_deal(&self, deal_id: DbId) -> StoreResult<Vec<DealRelease>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .releases
            .values()
            .filter(|r| r.deal_id == deal_id)
            .cloned()
            .collect())
    }

    async fn list_releases_for_partner(&self, partner_id: DbId) -> StoreResult<Vec<DealRelease>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .releases
            .values()
            .filter(|r| r.partner_id == partner_id)
            .cloned()
            .collect())
    }

    async fn apply_partner_action(
        &self,
        release_id: DbId,
        action: PartnerAction,
        now: Timestamp,
    ) -> StoreResult<Option<DealRelease>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.releases.get_mut(&release_id).map(|r| {
            r.status = action.resulting_status();
            match action {
                PartnerAction::View => r.viewed_at = Some(now),
                PartnerAction::Interest => r.interested_at = Some(now),
                PartnerAction::Pass => r.passed_at = Some(now),
            }
            r.updated_at = now;
            r.clone()
        }))
    }

    async fn insert_activity(&self, entry: &CreateDealActivity) -> StoreResult<DbId> {
        if self.side_effects_fail() {
            return Err(injected());
        }
        let mut t = self.tables.lock().unwrap();
        let id = t.id();
        t.activity.push(DealActivity {
            id,
            deal_id: entry.deal_id,
            actor_user_id: entry.actor_user_id,
            action: entry.action.to_string(),
            details: entry.details.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_activity(
        &self,
        deal_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<DealActivity>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .activity
            .iter()
            .rev()
            .filter(|a| a.deal_id == deal_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn insert_access_log(
        &self,
        deal_id: DbId,
        partner_id: DbId,
        user_id: DbId,
        action: &str,
    ) -> StoreResult<DbId> {
        if self.side_effects_fail() {
            return Err(injected());
        }
        let mut t = self.tables.lock().unwrap();
        let id = t.id();
        t.access_logs.push(AccessLogEntry {
            id,
            deal_id,
            partner_id,
            user_id,
            action: action.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn create_notification(&self, input: &CreateNotification) -> StoreResult<Notification> {
        if self.side_effects_fail() {
            return Err(injected());
        }
        let mut t = self.tables.lock().unwrap();
        let id = t.id();
        let notification = Notification {
            id,
            user_id: input.user_id,
            title: input.title.clone(),
            message: input.message.clone(),
            deal_id: input.deal_id,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        t.notifications.push(notification.clone());
        Ok(notification)
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// Records every send; optionally fails all of them.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, ReleaseEmail)>>,
    attempts: Mutex<usize>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.fail.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn sent(&self) -> Vec<(String, ReleaseEmail)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for the spawned send tasks to run.
    pub async fn wait_for_attempts(&self, expected: usize) -> usize {
        for _ in 0..200 {
            let attempts = *self.attempts.lock().unwrap();
            if attempts >= expected {
                return attempts;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl PartnerMailer for RecordingMailer {
    async fn send_release(&self, to: &str, email: &ReleaseEmail) -> Result<(), EmailError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmailError::Build("smtp unavailable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), email.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Returns a canned assessment, or fails.
pub enum StubScorer {
    Returns(ScoreAssessment),
    Fails,
}

impl StubScorer {
    pub fn eligible(score: f64, grade: &str) -> Self {
        StubScorer::Returns(ScoreAssessment {
            score,
            grade: grade.to_string(),
            eligible: true,
            breakdown: serde_json::json!({ "collections": 0.9 }),
        })
    }

    pub fn ineligible(score: f64, grade: &str) -> Self {
        StubScorer::Returns(ScoreAssessment {
            score,
            grade: grade.to_string(),
            eligible: false,
            breakdown: serde_json::json!({ "collections": 0.4 }),
        })
    }
}

#[async_trait]
impl Scorer for StubScorer {
    async fn score(&self, _input: &ScoringInput) -> Result<ScoreAssessment, ScoringError> {
        match self {
            StubScorer::Returns(assessment) => Ok(assessment.clone()),
            StubScorer::Fails => Err(ScoringError::Rejected {
                status: 503,
                body: "scoring offline".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub events: Arc<EventBus>,
    pub service: WorkflowService,
}

pub fn harness() -> Harness {
    harness_with_mailer(RecordingMailer::default())
}

pub fn harness_with_mailer(mailer: RecordingMailer) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let mailer = Arc::new(mailer);
    let events = Arc::new(EventBus::default());
    let service = WorkflowService::new(store.clone(), events.clone(), mailer.clone());
    Harness {
        store,
        mailer,
        events,
        service,
    }
}

impl Harness {
    pub async fn new_deal(&self) -> Deal {
        self.service
            .create_deal(
                &ADMIN,
                CreateDeal {
                    owner_user_id: OWNER_ID,
                    originator_name: "Harbor Lending".to_string(),
                    requested_amount_cents: 5_000_000_00,
                },
            )
            .await
            .expect("deal should be created")
    }

    pub async fn scored_deal(&self, score: f64) -> Deal {
        let deal = self.new_deal().await;
        self.store.set_score(deal.id, score, "B+");
        self.store.deal(deal.id)
    }
}

pub fn sample_input() -> ScoringInput {
    ScoringInput {
        loan_tape: vec![LoanTapeRow {
            loan_id: "L-100".into(),
            principal_cents: 25_000_00,
            interest_rate_bps: 1_150,
            term_months: 36,
            days_past_due: 0,
        }],
        performance_history: vec![],
    }
}
