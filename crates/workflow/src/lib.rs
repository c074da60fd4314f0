//! Deal workflow service.
//!
//! Owns every state change a deal goes through after intake:
//!
//! - [`service::WorkflowService`] -- stage advancement, handoff, notes,
//!   reads with role checks, and scoring requests.
//! - [`release`] -- the release gate and partner-side actions.
//! - [`scoring`] -- the scoring collaborator, its queue, and the worker that
//!   drains it.
//! - [`store`], [`mailer`] -- collaborator seams with Postgres and SMTP
//!   implementations.

pub mod effects;
pub mod error;
pub mod mailer;
pub mod release;
pub mod scoring;
pub mod service;
pub mod store;

pub use error::{WorkflowError, WorkflowResult};
pub use mailer::{DisabledMailer, PartnerMailer, SmtpPartnerMailer};
pub use release::{PartnerReleaseView, ReleaseOutcome};
pub use scoring::{
    HttpScorer, ScoreAssessment, Scorer, ScoringConfig, ScoringError, ScoringInput, ScoringJob,
    ScoringOutcome, ScoringQueue, ScoringWorker,
};
pub use service::{DealView, WorkflowService};
pub use store::{DealStore, PgDealStore};
