//! Deal pipeline stage taxonomy and transition rules.
//!
//! The forward pipeline is strictly ordered; `declined` and `withdrawn` are
//! alternate exits reachable from every non-terminal stage. No stage may be
//! skipped and nothing leaves a terminal stage.

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

define_str_enum! {
    /// Position of a deal in the qualification-to-funding pipeline.
    Stage ("stage") {
        Draft => "draft",
        Qualified => "qualified",
        DocumentsRequested => "documents_requested",
        DocumentsInReview => "documents_in_review",
        DueDiligence => "due_diligence",
        TermSheet => "term_sheet",
        Negotiation => "negotiation",
        Closing => "closing",
        Funded => "funded",
        Declined => "declined",
        Withdrawn => "withdrawn",
    }
}

/// Forward pipeline order, `draft` through `funded`.
pub const PIPELINE: &[Stage] = &[
    Stage::Draft,
    Stage::Qualified,
    Stage::DocumentsRequested,
    Stage::DocumentsInReview,
    Stage::DueDiligence,
    Stage::TermSheet,
    Stage::Negotiation,
    Stage::Closing,
    Stage::Funded,
];

/// Stages with no outgoing transitions.
pub const TERMINAL_STAGES: &[Stage] = &[Stage::Funded, Stage::Declined, Stage::Withdrawn];

impl Stage {
    /// Human-readable label shown in the pipeline dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Draft => "Draft",
            Stage::Qualified => "Qualified",
            Stage::DocumentsRequested => "Documents Requested",
            Stage::DocumentsInReview => "Documents In Review",
            Stage::DueDiligence => "Due Diligence",
            Stage::TermSheet => "Term Sheet",
            Stage::Negotiation => "Negotiation",
            Stage::Closing => "Closing",
            Stage::Funded => "Funded",
            Stage::Declined => "Declined",
            Stage::Withdrawn => "Withdrawn",
        }
    }

    /// Badge color (hex) for the stage.
    pub fn color(self) -> &'static str {
        match self {
            Stage::Draft => "#6B7280",
            Stage::Qualified => "#3B82F6",
            Stage::DocumentsRequested => "#F59E0B",
            Stage::DocumentsInReview => "#EAB308",
            Stage::DueDiligence => "#8B5CF6",
            Stage::TermSheet => "#6366F1",
            Stage::Negotiation => "#EC4899",
            Stage::Closing => "#14B8A6",
            Stage::Funded => "#22C55E",
            Stage::Declined => "#EF4444",
            Stage::Withdrawn => "#9CA3AF",
        }
    }

    /// Whether the stage admits no further transitions.
    pub fn is_terminal(self) -> bool {
        TERMINAL_STAGES.contains(&self)
    }

    /// The single next stage in forward order, if any.
    pub fn next_in_pipeline(self) -> Option<Stage> {
        let idx = PIPELINE.iter().position(|s| *s == self)?;
        PIPELINE.get(idx + 1).copied()
    }
}

// ---------------------------------------------------------------------------
// Transition rules
// ---------------------------------------------------------------------------

/// Returns the set of stages `from` may move to.
///
/// Transition rules:
/// - every non-terminal stage -> its successor, `declined`, `withdrawn`
/// - `closing` -> `funded`, `declined`, `withdrawn`
/// - `funded`, `declined`, `withdrawn` -> (none)
pub fn valid_transitions(from: Stage) -> &'static [Stage] {
    use Stage::*;
    match from {
        Draft => &[Qualified, Declined, Withdrawn],
        Qualified => &[DocumentsRequested, Declined, Withdrawn],
        DocumentsRequested => &[DocumentsInReview, Declined, Withdrawn],
        DocumentsInReview => &[DueDiligence, Declined, Withdrawn],
        DueDiligence => &[TermSheet, Declined, Withdrawn],
        TermSheet => &[Negotiation, Declined, Withdrawn],
        Negotiation => &[Closing, Declined, Withdrawn],
        Closing => &[Funded, Declined, Withdrawn],
        Funded | Declined | Withdrawn => &[],
    }
}

/// Check whether moving from `from` to `to` is allowed.
pub fn can_transition(from: Stage, to: Stage) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a stage transition, naming both stages on failure.
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

// ---------------------------------------------------------------------------
// Presentation metadata
// ---------------------------------------------------------------------------

/// Display metadata for one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageInfo {
    pub id: Stage,
    pub label: &'static str,
    pub color: &'static str,
    pub is_terminal: bool,
}

impl From<Stage> for StageInfo {
    fn from(stage: Stage) -> Self {
        Self {
            id: stage,
            label: stage.label(),
            color: stage.color(),
            is_terminal: stage.is_terminal(),
        }
    }
}

/// The full taxonomy: forward pipeline first, then the alternate exits.
pub fn taxonomy() -> Vec<StageInfo> {
    PIPELINE
        .iter()
        .chain([Stage::Declined, Stage::Withdrawn].iter())
        .copied()
        .map(StageInfo::from)
        .collect()
}

/// What the dashboard needs to render stage controls for one deal.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableTransitions {
    pub current: StageInfo,
    pub next: Vec<StageInfo>,
}

impl AvailableTransitions {
    pub fn for_stage(stage: Stage) -> Self {
        Self {
            current: stage.into(),
            next: valid_transitions(stage)
                .iter()
                .copied()
                .map(StageInfo::from)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn taxonomy_covers_every_stage_once() {
        let ids: Vec<Stage> = taxonomy().into_iter().map(|info| info.id).collect();
        assert_eq!(ids.len(), Stage::ALL.len());
        for stage in Stage::ALL {
            assert!(ids.contains(stage), "{stage} missing from taxonomy");
        }
    }

    #[test]
    fn stage_strings_round_trip() {
        for stage in Stage::ALL {
            let parsed: Stage = stage.as_str().parse().unwrap();
            assert_eq!(parsed, *stage);
        }
        assert!("approved".parse::<Stage>().is_err());
        assert!("".parse::<Stage>().is_err());
    }

    #[test]
    fn every_non_terminal_stage_allows_successor_and_exits() {
        for stage in Stage::ALL.iter().filter(|s| !s.is_terminal()) {
            let next = valid_transitions(*stage);
            assert_eq!(next.len(), 3, "{stage}");
            assert!(next.contains(&stage.next_in_pipeline().unwrap()));
            assert!(next.contains(&Stage::Declined));
            assert!(next.contains(&Stage::Withdrawn));
        }
    }

    #[test]
    fn terminal_stages_have_no_transitions() {
        for stage in TERMINAL_STAGES {
            assert!(stage.is_terminal());
            assert!(valid_transitions(*stage).is_empty());
            for target in Stage::ALL {
                assert!(!can_transition(*stage, *target));
            }
        }
    }

    #[test]
    fn validate_matches_valid_transitions_for_all_pairs() {
        for from in Stage::ALL {
            for to in Stage::ALL {
                let expected = valid_transitions(*from).contains(to);
                assert_eq!(validate_transition(*from, *to).is_ok(), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn skipping_stages_is_rejected_with_both_names() {
        let err = validate_transition(Stage::Qualified, Stage::DueDiligence).unwrap_err();
        assert_matches!(
            err,
            CoreError::InvalidTransition {
                from: Stage::Qualified,
                to: Stage::DueDiligence
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("qualified"));
        assert!(msg.contains("due_diligence"));
    }

    #[test]
    fn self_transition_is_rejected() {
        assert!(!can_transition(Stage::Draft, Stage::Draft));
    }

    #[test]
    fn closing_leads_to_funded() {
        assert_eq!(Stage::Closing.next_in_pipeline(), Some(Stage::Funded));
        assert_eq!(Stage::Funded.next_in_pipeline(), None);
        assert_eq!(Stage::Declined.next_in_pipeline(), None);
    }

    #[test]
    fn available_transitions_for_terminal_stage_is_empty() {
        let available = AvailableTransitions::for_stage(Stage::Withdrawn);
        assert!(available.current.is_terminal);
        assert!(available.next.is_empty());
    }

    #[test]
    fn stage_serializes_as_snake_case_string() {
        let json = serde_json::to_value(Stage::DocumentsInReview).unwrap();
        assert_eq!(json, "documents_in_review");
        let parsed: Stage = serde_json::from_value(serde_json::json!("term_sheet")).unwrap();
        assert_eq!(parsed, Stage::TermSheet);
    }
}
