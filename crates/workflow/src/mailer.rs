//! Partner email seam.
//!
//! Release emails are best-effort: the release gate spawns the send and
//! only logs a failure.

use async_trait::async_trait;
use dealflow_events::{EmailDelivery, EmailError, ReleaseEmail};

/// Delivers the "deal released to you" email to a partner contact.
#[async_trait]
pub trait PartnerMailer: Send + Sync {
    async fn send_release(&self, to: &str, email: &ReleaseEmail) -> Result<(), EmailError>;
}

/// SMTP-backed mailer.
pub struct SmtpPartnerMailer {
    delivery: EmailDelivery,
}

impl SmtpPartnerMailer {
    pub fn new(delivery: EmailDelivery) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl PartnerMailer for SmtpPartnerMailer {
    async fn send_release(&self, to: &str, email: &ReleaseEmail) -> Result<(), EmailError> {
        self.delivery.deliver_release(to, email).await
    }
}

/// Used when SMTP is not configured; drops every email.
pub struct DisabledMailer;

#[async_trait]
impl PartnerMailer for DisabledMailer {
    async fn send_release(&self, to: &str, email: &ReleaseEmail) -> Result<(), EmailError> {
        tracing::debug!(
            to,
            qualification_code = %email.qualification_code,
            "Email delivery disabled, release email skipped"
        );
        Ok(())
    }
}
