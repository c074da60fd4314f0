//! Partner release email delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send the
//! HTML "new deal released to you" email. Configuration is loaded from
//! environment variables; if `SMTP_HOST` is not set,
//! [`EmailConfig::from_env`] returns `None` and no mailer should be
//! constructed.

use dealflow_core::deal::AccessLevel;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "deals@dealflow.local";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable         | Required | Default                 |
    /// |------------------|----------|-------------------------|
    /// | `SMTP_HOST`      | yes      | --                      |
    /// | `SMTP_PORT`      | no       | `587`                   |
    /// | `SMTP_FROM`      | no       | `deals@dealflow.local`  |
    /// | `SMTP_USER`      | no       | --                      |
    /// | `SMTP_PASSWORD`  | no       | --                      |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// ReleaseEmail
// ---------------------------------------------------------------------------

/// Deal summary sent to a partner contact when a deal is released.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseEmail {
    pub partner_name: String,
    pub qualification_code: String,
    pub originator_name: String,
    pub requested_amount_cents: i64,
    pub grade: Option<String>,
    pub access_level: AccessLevel,
}

impl ReleaseEmail {
    pub fn subject(&self) -> String {
        format!("New deal available: {}", self.qualification_code)
    }

    /// Render the HTML body. Interpolated values are escaped.
    pub fn html_body(&self) -> String {
        let amount = format_usd(self.requested_amount_cents);
        let grade = self.grade.as_deref().unwrap_or("Pending");
        format!(
            "<html><body>\
             <p>Hello {partner},</p>\
             <p>A new private-credit opportunity has been released to you.</p>\
             <table>\
             <tr><td>Reference</td><td>{code}</td></tr>\
             <tr><td>Originator</td><td>{originator}</td></tr>\
             <tr><td>Requested</td><td>{amount}</td></tr>\
             <tr><td>Grade</td><td>{grade}</td></tr>\
             <tr><td>Access</td><td>{access}</td></tr>\
             </table>\
             <p>Sign in to the partner portal to review the package.</p>\
             </body></html>",
            partner = escape_html(&self.partner_name),
            code = escape_html(&self.qualification_code),
            originator = escape_html(&self.originator_name),
            amount = amount,
            grade = escape_html(grade),
            access = self.access_level,
        )
    }
}

fn format_usd(cents: i64) -> String {
    let dollars = cents / 100;
    let digits = dollars.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if dollars < 0 { "-" } else { "" };
    format!("{sign}${grouped}")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends partner emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send the release email to a partner contact address.
    pub async fn deliver_release(
        &self,
        to_email: &str,
        email: &ReleaseEmail,
    ) -> Result<(), EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let message = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(email.subject())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(message).await?;

        tracing::info!(
            to = to_email,
            qualification_code = %email.qualification_code,
            "Release email sent"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
