//! The record-store port and its insert payloads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use dealdesk_core::models::{
    Application, ApplicationStatus, AuditAction, AuditLogEntry, Document, ScanStatus, Section,
    SectionKey, SectionStatus,
};
use dealdesk_core::AppError;

/// Insert payload for an application record.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub status: ApplicationStatus,
    pub current_section: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Insert payload for a section row. Exactly one row may exist per
/// (application, section key) pair; the store enforces that invariant.
#[derive(Debug, Clone)]
pub struct NewSection {
    pub application_id: Uuid,
    pub section_key: SectionKey,
    pub status: SectionStatus,
    pub data: Value,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Insert payload for a document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub application_id: Uuid,
    pub section_key: SectionKey,
    pub checklist_item: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub storage_path: String,
    pub scan_status: ScanStatus,
    pub uploaded_by: Option<Uuid>,
}

/// Insert payload for an audit log entry.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub application_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub section_key: Option<SectionKey>,
    pub details: Value,
}

/// Admin-side listing filter.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    /// Case-insensitive substring match on the denormalized company name.
    pub company_query: Option<String>,
    pub user_id: Option<Uuid>,
}

/// CRUD over the four record kinds of the remote store.
///
/// Implementations stamp their own timestamps; callers never supply `now`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ── Applications ──

    async fn create_application(&self, new: NewApplication) -> Result<Application, AppError>;

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, AppError>;

    /// Newest-first listing with optional status / company / owner filters.
    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, AppError>;

    /// Set the application status. Moving to `Submitted` also stamps
    /// `submitted_at`.
    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<(), AppError>;

    /// Update the denormalized company name used by listings.
    async fn set_company_name(&self, id: Uuid, name: &str) -> Result<(), AppError>;

    /// Move the wizard position pointer (1..=10).
    async fn set_current_section(&self, id: Uuid, section_number: i32) -> Result<(), AppError>;

    // ── Sections ──

    /// Bulk insert; used to create all ten rows alongside their application.
    async fn insert_sections(&self, rows: Vec<NewSection>) -> Result<(), AppError>;

    async fn get_section(
        &self,
        application_id: Uuid,
        key: SectionKey,
    ) -> Result<Option<Section>, AppError>;

    /// All sections of one application, ordered by section number.
    async fn list_sections(&self, application_id: Uuid) -> Result<Vec<Section>, AppError>;

    /// Persist a data blob, moving the section to the given status and
    /// stamping `last_saved_at`.
    async fn save_section_data(
        &self,
        application_id: Uuid,
        key: SectionKey,
        data: &Value,
        status: SectionStatus,
    ) -> Result<(), AppError>;

    /// Final write: data, submitted status, and `submitted_at` in one
    /// update.
    async fn submit_section(
        &self,
        application_id: Uuid,
        key: SectionKey,
        data: &Value,
    ) -> Result<(), AppError>;

    /// Admin-only notes mutation; leaves data and status untouched.
    async fn set_reviewer_notes(&self, section_id: Uuid, notes: &str) -> Result<(), AppError>;

    // ── Documents ──

    async fn insert_document(&self, new: NewDocument) -> Result<Document, AppError>;

    /// Non-deleted documents of one application, newest upload first.
    async fn list_documents(&self, application_id: Uuid) -> Result<Vec<Document>, AppError>;

    /// Soft delete: the record survives but disappears from listings.
    async fn soft_delete_document(&self, id: Uuid) -> Result<(), AppError>;

    // ── Audit log ──

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), AppError>;

    /// Audit trail of one application, newest first.
    async fn list_audit(&self, application_id: Uuid) -> Result<Vec<AuditLogEntry>, AppError>;
}
