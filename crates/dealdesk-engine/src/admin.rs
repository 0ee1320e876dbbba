//! Admin review surface.
//!
//! Read-heavy: list and filter applications, load one application's full
//! bundle, move its status, and leave per-section reviewer notes. Status
//! transitions are deliberately unrestricted; any status may be set at any
//! time.

use std::sync::Arc;

use uuid::Uuid;

use dealdesk_core::constants::SIGNED_URL_TTL;
use dealdesk_core::models::{
    Application, ApplicationStatus, AuditLogEntry, Document, Section,
};
use dealdesk_core::AppError;
use dealdesk_db::{ApplicationFilter, RecordStore};
use dealdesk_store::BlobStorage;

/// Everything the review screen needs for one application.
#[derive(Debug, Clone)]
pub struct ReviewBundle {
    pub application: Application,
    /// Sections in wizard order.
    pub sections: Vec<Section>,
    /// Non-deleted documents, newest first.
    pub documents: Vec<Document>,
    /// Audit trail, newest first.
    pub audit: Vec<AuditLogEntry>,
}

/// Admin operations over submitted applications.
pub struct AdminReview {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStorage>,
}

impl AdminReview {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self { records, blobs }
    }

    /// Newest-first listing with optional status and company-name filters.
    pub async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, AppError> {
        self.records.list_applications(filter).await
    }

    /// Load one application with its sections, documents, and audit trail.
    pub async fn load(&self, application_id: Uuid) -> Result<ReviewBundle, AppError> {
        let application = self
            .records
            .get_application(application_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("application {application_id}")))?;
        let sections = self.records.list_sections(application_id).await?;
        let documents = self.records.list_documents(application_id).await?;
        let audit = self.records.list_audit(application_id).await?;

        Ok(ReviewBundle {
            application,
            sections,
            documents,
            audit,
        })
    }

    /// Set any status without transition checks.
    pub async fn set_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        self.records
            .set_application_status(application_id, status)
            .await?;
        tracing::info!(application_id = %application_id, status = %status, "Application status updated");
        Ok(())
    }

    /// Save reviewer notes on one section.
    pub async fn save_notes(&self, section_id: Uuid, notes: &str) -> Result<(), AppError> {
        self.records.set_reviewer_notes(section_id, notes).await
    }

    /// Time-limited download URL for a reviewed document.
    pub async fn document_url(&self, document: &Document) -> Result<String, AppError> {
        self.blobs
            .signed_url(&document.storage_path, SIGNED_URL_TTL)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationService;
    use crate::auth::AuthenticatedUser;
    use dealdesk_core::models::SectionKey;
    use dealdesk_db::MemoryRecordStore;
    use dealdesk_store::MemoryBlobStorage;

    async fn setup() -> (AdminReview, ApplicationService, AuthenticatedUser) {
        let records = Arc::new(MemoryRecordStore::new());
        let blobs = Arc::new(MemoryBlobStorage::new());
        let admin = AdminReview::new(records.clone(), blobs);
        let service = ApplicationService::new(records);
        let user = AuthenticatedUser {
            id: Uuid::new_v4(),
            email: "dana@acme.example".to_string(),
            full_name: None,
        };
        (admin, service, user)
    }

    #[tokio::test]
    async fn bundle_holds_sections_in_order() {
        let (admin, service, user) = setup().await;
        let app = service.create(&user).await.unwrap();

        let bundle = admin.load(app.id).await.unwrap();
        assert_eq!(bundle.application.id, app.id);
        assert_eq!(bundle.sections.len(), 10);
        assert_eq!(bundle.sections[0].section_key, SectionKey::Company);
        assert_eq!(bundle.sections[9].section_key, SectionKey::Summary);
        assert!(bundle.documents.is_empty());
        assert_eq!(bundle.audit.len(), 1);
    }

    #[tokio::test]
    async fn any_status_transition_is_accepted() {
        let (admin, service, user) = setup().await;
        let app = service.create(&user).await.unwrap();

        // No transition table: even approved back to draft goes through.
        admin
            .set_status(app.id, ApplicationStatus::Approved)
            .await
            .unwrap();
        admin
            .set_status(app.id, ApplicationStatus::Draft)
            .await
            .unwrap();

        let bundle = admin.load(app.id).await.unwrap();
        assert_eq!(bundle.application.status, ApplicationStatus::Draft);
    }

    #[tokio::test]
    async fn reviewer_notes_land_on_the_section() {
        let (admin, service, user) = setup().await;
        let app = service.create(&user).await.unwrap();
        let bundle = admin.load(app.id).await.unwrap();
        let section_id = bundle.sections[2].id;

        admin
            .save_notes(section_id, "TTM looks thin; request bank statements")
            .await
            .unwrap();

        let bundle = admin.load(app.id).await.unwrap();
        assert_eq!(
            bundle.sections[2].reviewer_notes.as_deref(),
            Some("TTM looks thin; request bank statements")
        );
    }

    #[tokio::test]
    async fn missing_application_is_not_found() {
        let (admin, _, _) = setup().await;
        let err = admin.load(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
