//! Submission notification service.
//!
//! After a successful migration the applicant and the admin distribution
//! list receive a rendered summary of the application. Delivery is
//! fire-and-forget from the wizard's perspective: a failed send is logged
//! and never affects submission success.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use dealdesk_core::models::SectionKey;
use dealdesk_core::Config;

use crate::auth::AuthenticatedUser;

/// Notification errors. Callers treat every variant as non-fatal.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Message build failed: {0}")]
    MessageBuild(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Everything the summary email renders, captured at migration time.
#[derive(Debug, Clone)]
pub struct IntakeSummary {
    pub application_id: Uuid,
    pub applicant_email: String,
    pub applicant_name: String,
    pub company_name: String,
    pub industry: String,
    pub stage: String,
    pub business_model: String,
    pub transaction_path: String,
    pub investment_amount: Option<f64>,
    pub security_type: String,
    pub pre_money_valuation: Option<f64>,
    pub founder_intent: String,
    pub sections_with_data: usize,
    pub document_count: usize,
    pub submitted_at: DateTime<Utc>,
}

impl IntakeSummary {
    /// Assemble the summary from the migrated drafts.
    pub fn from_drafts(
        application_id: Uuid,
        user: &AuthenticatedUser,
        company_name: String,
        drafts: &HashMap<SectionKey, Value>,
        sections_with_data: usize,
        document_count: usize,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let empty = Value::Null;
        let company = drafts.get(&SectionKey::Company).unwrap_or(&empty);
        let transaction = drafts.get(&SectionKey::Transaction).unwrap_or(&empty);
        let cap_table = drafts.get(&SectionKey::CapTable).unwrap_or(&empty);

        let text = |blob: &Value, field: &str| -> String {
            blob.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let number = |blob: &Value, field: &str| -> Option<f64> {
            match blob.get(field) {
                Some(Value::Number(n)) => n.as_f64(),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            }
        };

        let applicant_name = user
            .full_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| text(company, "founder_name"));

        IntakeSummary {
            application_id,
            applicant_email: user.email.clone(),
            applicant_name,
            company_name,
            industry: text(company, "industry"),
            stage: text(company, "stage"),
            business_model: text(company, "business_model"),
            transaction_path: text(transaction, "path"),
            investment_amount: number(transaction, "investment_amount"),
            security_type: text(transaction, "security_type"),
            pre_money_valuation: number(cap_table, "pre_money_valuation"),
            founder_intent: text(transaction, "founder_intent"),
            sections_with_data,
            document_count,
            submitted_at,
        }
    }
}

/// Notification port.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_intake_summary(&self, summary: &IntakeSummary) -> Result<(), NotifyError>;
}

fn fmt_currency(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let whole = v.round() as i64;
            let digits = whole.abs().to_string();
            let mut grouped = String::new();
            for (i, c) in digits.chars().rev().enumerate() {
                if i > 0 && i % 3 == 0 {
                    grouped.push(',');
                }
                grouped.push(c);
            }
            let grouped: String = grouped.chars().rev().collect();
            if whole < 0 {
                format!("-${grouped}")
            } else {
                format!("${grouped}")
            }
        }
        None => "N/A".to_string(),
    }
}

fn fmt_path(path: &str) -> &str {
    match path {
        "equity_investment" => "Equity Investment",
        "ma" => "Merger & Acquisition",
        "both" => "Both / Open to Either",
        "" => "Not specified",
        other => other,
    }
}

fn fmt_or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Plain-text body shared by the applicant and admin emails.
pub fn render_summary(s: &IntakeSummary) -> String {
    format!(
        "Application Summary\n\
         Submitted {submitted}\n\
         \n\
         Company Information\n\
         Company Name:       {company}\n\
         Industry:           {industry}\n\
         Stage:              {stage}\n\
         Business Model:     {model}\n\
         Applicant:          {name} ({email})\n\
         \n\
         Transaction Details\n\
         Transaction Path:   {path}\n\
         Investment Amount:  {amount}\n\
         Security Type:      {security}\n\
         Pre-Money Valuation: {premoney}\n\
         Founder Intent:     {intent}\n\
         \n\
         Submission Stats\n\
         Sections Completed: {sections} of 10\n\
         Documents Uploaded: {documents}\n\
         \n\
         Reference: {id}\n",
        submitted = s.submitted_at.format("%B %e, %Y %H:%M UTC"),
        company = fmt_or_na(&s.company_name),
        industry = fmt_or_na(&s.industry),
        stage = fmt_or_na(&s.stage),
        model = fmt_or_na(&s.business_model),
        name = fmt_or_na(&s.applicant_name),
        email = s.applicant_email,
        path = fmt_path(&s.transaction_path),
        amount = fmt_currency(s.investment_amount),
        security = fmt_or_na(&s.security_type),
        premoney = fmt_currency(s.pre_money_valuation),
        intent = fmt_or_na(&s.founder_intent),
        sections = s.sections_with_data,
        documents = s.document_count,
        id = s.application_id,
    )
}

/// SMTP-backed notifier. No-op constructor result when email is disabled or
/// unconfigured.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    admin_recipients: Vec<String>,
}

impl SmtpNotifier {
    /// Build from config. Returns `None` when disabled or SMTP is not
    /// configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.email_enabled {
            tracing::debug!("Submission emails disabled (EMAIL_ENABLED=false)");
            return None;
        }
        let host = config.smtp_host.as_deref()?;
        let from = config.smtp_from.clone()?;
        let port = config.smtp_port.unwrap_or(587);

        let mailer = if config.smtp_tls {
            let b = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).ok()?;
            let b = b.port(port);
            let b = if let (Some(u), Some(p)) = (&config.smtp_user, &config.smtp_password) {
                b.credentials(Credentials::new(u.clone(), p.clone()))
            } else {
                b
            };
            tracing::info!(host = %host, port = port, "Notifier initialized (SMTP with STARTTLS)");
            b.build()
        } else {
            let b = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
            let b = if let (Some(u), Some(p)) = (&config.smtp_user, &config.smtp_password) {
                b.credentials(Credentials::new(u.clone(), p.clone()))
            } else {
                b
            };
            tracing::info!(host = %host, port = port, "Notifier initialized (SMTP)");
            b.build()
        };

        Some(SmtpNotifier {
            mailer: Arc::new(mailer),
            from,
            admin_recipients: config.admin_notify_emails.clone(),
        })
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let to_addr: Mailbox = to
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?;
        let from_addr: Mailbox = self
            .from
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(self.from.clone()))?;

        let email = Message::builder()
            .from(from_addr)
            .to(to_addr)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_intake_summary(&self, summary: &IntakeSummary) -> Result<(), NotifyError> {
        let body = render_summary(summary);

        self.send(
            &summary.applicant_email,
            "Your application has been received",
            &body,
        )
        .await?;

        for admin in &self.admin_recipients {
            if let Err(e) = self
                .send(admin, "New intake application submitted", &body)
                .await
            {
                // One bad admin address must not block the rest.
                tracing::warn!(recipient = %admin, error = %e, "Admin summary send failed");
            }
        }

        tracing::info!(
            application_id = %summary.application_id,
            admin_count = self.admin_recipients.len(),
            "Intake summary emails sent"
        );
        Ok(())
    }
}

/// Test notifier that records every summary it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<IntakeSummary>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<IntakeSummary> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_intake_summary(&self, summary: &IntakeSummary) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(summary.clone());
        Ok(())
    }
}
