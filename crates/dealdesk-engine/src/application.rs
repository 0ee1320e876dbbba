//! Authenticated application lifecycle.
//!
//! Users who sign in before filling the form skip the anonymous flow: the
//! application record and its ten empty sections are created up front, and
//! section saves go straight to the record store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use dealdesk_core::models::{
    Application, ApplicationStatus, AuditAction, Section, SectionKey, SectionStatus,
};
use dealdesk_core::AppError;
use dealdesk_db::{ApplicationFilter, NewApplication, NewAuditEntry, NewSection, RecordStore};

use crate::auth::AuthenticatedUser;

/// Application CRUD for the authenticated flow.
pub struct ApplicationService {
    records: Arc<dyn RecordStore>,
}

impl ApplicationService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Create a draft application with all ten sections in one pass, and
    /// log its creation.
    pub async fn create(&self, user: &AuthenticatedUser) -> Result<Application, AppError> {
        let now = Utc::now();
        let expires_at = Application::expiry_for(now);

        let app = self
            .records
            .create_application(NewApplication {
                user_id: Some(user.id),
                company_name: None,
                company_website: None,
                status: ApplicationStatus::Draft,
                current_section: 1,
                submitted_at: None,
                expires_at,
            })
            .await?;

        let rows = SectionKey::ALL
            .iter()
            .map(|&key| NewSection {
                application_id: app.id,
                section_key: key,
                status: SectionStatus::NotStarted,
                data: json!({}),
                last_saved_at: None,
                submitted_at: None,
            })
            .collect();
        self.records.insert_sections(rows).await?;

        self.records
            .append_audit(NewAuditEntry {
                application_id: app.id,
                user_id: Some(user.id),
                action: AuditAction::ApplicationCreated,
                section_key: None,
                details: json!({"expires_at": expires_at.to_rfc3339()}),
            })
            .await?;

        tracing::info!(application_id = %app.id, user_id = %user.id, "Application created");
        Ok(app)
    }

    /// Newest-first listing of one user's applications.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Application>, AppError> {
        self.records
            .list_applications(&ApplicationFilter {
                user_id: Some(user_id),
                ..Default::default()
            })
            .await
    }

    /// One application with its sections in wizard order.
    pub async fn load(&self, id: Uuid) -> Result<(Application, Vec<Section>), AppError> {
        let app = self
            .records
            .get_application(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("application {id}")))?;
        let sections = self.records.list_sections(id).await?;
        Ok((app, sections))
    }

    /// Denormalize the company name onto the application for listings.
    pub async fn set_company_name(&self, id: Uuid, name: &str) -> Result<(), AppError> {
        self.records.set_company_name(id, name).await
    }

    /// Persist the wizard position pointer.
    pub async fn set_current_section(
        &self,
        id: Uuid,
        section_number: i32,
    ) -> Result<(), AppError> {
        self.records.set_current_section(id, section_number).await
    }

    /// Submit the whole application and log it.
    pub async fn submit(&self, id: Uuid, user: &AuthenticatedUser) -> Result<(), AppError> {
        self.records
            .set_application_status(id, ApplicationStatus::Submitted)
            .await?;
        self.records
            .append_audit(NewAuditEntry {
                application_id: id,
                user_id: Some(user.id),
                action: AuditAction::ApplicationSubmitted,
                section_key: None,
                details: json!({}),
            })
            .await?;
        tracing::info!(application_id = %id, "Application submitted");
        Ok(())
    }
}
