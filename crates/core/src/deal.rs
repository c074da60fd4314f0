//! Deal record enums and field validation.
//!
//! Covers the handoff target, the deal-level release status, the
//! partner-facing release engagement status, access levels, and the
//! scoring lifecycle. Release engagement is deliberately not tied to the
//! deal's stage; the two are independent state machines.

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

define_str_enum! {
    /// Which internal team currently owns follow-up on a deal.
    HandoffTarget ("handoff target") {
        None => "none",
        Legal => "legal",
        FundingPartner => "funding_partner",
    }
}

/// Decide the `handed_off_at` value after a handoff change.
///
/// - clearing the handoff (`none`) clears the timestamp
/// - re-assigning the same team keeps the original timestamp
/// - assigning a different team records `now`
pub fn handoff_timestamp<T: Copy>(
    previous: HandoffTarget,
    previous_at: Option<T>,
    next: HandoffTarget,
    now: T,
) -> Option<T> {
    match next {
        HandoffTarget::None => None,
        _ if next == previous && previous_at.is_some() => previous_at,
        _ => Some(now),
    }
}

// ---------------------------------------------------------------------------
// Release status (deal level)
// ---------------------------------------------------------------------------

define_str_enum! {
    /// Deal-level release state. Only the release gate sets `released`.
    ReleaseStatus ("release status") {
        Pending => "pending",
        ReadyForRelease => "ready_for_release",
        Released => "released",
        Rejected => "rejected",
    }
}

// ---------------------------------------------------------------------------
// Release engagement (partner level)
// ---------------------------------------------------------------------------

define_str_enum! {
    /// A partner's own engagement with a released deal.
    EngagementStatus ("release engagement status") {
        Pending => "pending",
        Viewed => "viewed",
        Interested => "interested",
        Reviewing => "reviewing",
        DueDiligence => "due_diligence",
        TermSheet => "term_sheet",
        Passed => "passed",
        Funded => "funded",
    }
}

define_str_enum! {
    /// Partner-initiated actions on a release.
    PartnerAction ("partner action") {
        View => "view",
        Interest => "interest",
        Pass => "pass",
    }
}

impl PartnerAction {
    /// The engagement status the action writes.
    pub fn resulting_status(self) -> EngagementStatus {
        match self {
            PartnerAction::View => EngagementStatus::Viewed,
            PartnerAction::Interest => EngagementStatus::Interested,
            PartnerAction::Pass => EngagementStatus::Passed,
        }
    }
}

// ---------------------------------------------------------------------------
// Access level
// ---------------------------------------------------------------------------

define_str_enum! {
    /// How much of the deal package a partner may see.
    AccessLevel ("access level") {
        Summary => "summary",
        Full => "full",
        Documents => "documents",
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        AccessLevel::Summary
    }
}

impl AccessLevel {
    fn rank(self) -> u8 {
        match self {
            AccessLevel::Summary => 0,
            AccessLevel::Full => 1,
            AccessLevel::Documents => 2,
        }
    }

    /// Whether this level grants at least `required`.
    pub fn grants(self, required: AccessLevel) -> bool {
        self.rank() >= required.rank()
    }
}

// ---------------------------------------------------------------------------
// Access log actions
// ---------------------------------------------------------------------------

/// Access-log action written by the release gate.
pub const ACCESS_RELEASED: &str = "released";
/// Access-log action written when a partner opens a release.
pub const ACCESS_VIEWED: &str = "viewed";
/// Access-log action written when a partner expresses interest.
pub const ACCESS_INTERESTED: &str = "interested";
/// Access-log action written when a partner passes.
pub const ACCESS_PASSED: &str = "passed";

impl PartnerAction {
    pub fn access_log_action(self) -> &'static str {
        match self {
            PartnerAction::View => ACCESS_VIEWED,
            PartnerAction::Interest => ACCESS_INTERESTED,
            PartnerAction::Pass => ACCESS_PASSED,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

define_str_enum! {
    /// Lifecycle of the document-scoring job for a deal.
    ScoringStatus ("scoring status") {
        NotStarted => "not_started",
        Queued => "queued",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Letter grades the scoring collaborator may assign.
pub const VALID_GRADES: &[&str] = &[
    "A+", "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D", "F",
];

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Validate a score/grade pair returned by the scoring collaborator.
pub fn validate_score(score: f64, grade: &str) -> Result<(), CoreError> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(CoreError::Validation(format!(
            "Score must be between {MIN_SCORE} and {MAX_SCORE} (got {score})"
        )));
    }
    if !VALID_GRADES.contains(&grade) {
        return Err(CoreError::Validation(format!(
            "Invalid grade '{grade}'. Must be one of: {VALID_GRADES:?}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Field constraints
// ---------------------------------------------------------------------------

/// Maximum length of internal notes (characters).
pub const MAX_NOTES_LENGTH: usize = 20_000;

/// Maximum length of an originator name.
pub const MAX_ORIGINATOR_NAME_LENGTH: usize = 200;

/// Prefix of generated qualification codes.
pub const QUALIFICATION_CODE_PREFIX: &str = "PCQ-";

/// Length of the random part of a qualification code.
const QUALIFICATION_CODE_SUFFIX_LEN: usize = 8;

/// Validate internal notes length.
pub fn validate_notes(notes: &str) -> Result<(), CoreError> {
    let len = notes.chars().count();
    if len > MAX_NOTES_LENGTH {
        return Err(CoreError::Validation(format!(
            "Notes exceed maximum length of {MAX_NOTES_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

/// Validate a requested funding amount.
pub fn validate_requested_amount(amount_cents: i64) -> Result<(), CoreError> {
    if amount_cents <= 0 {
        return Err(CoreError::Validation(
            "Requested amount must be positive".into(),
        ));
    }
    Ok(())
}

/// Generate a human-readable qualification code, e.g. `PCQ-7K2M9QXA`.
pub fn generate_qualification_code() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(QUALIFICATION_CODE_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{QUALIFICATION_CODE_PREFIX}{suffix}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
