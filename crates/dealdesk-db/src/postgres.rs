//! Postgres implementation of the record-store port.
//!
//! Queries are dynamic `sqlx::query` calls so the crate builds without a
//! live DATABASE_URL / `sqlx prepare` step. Row structs are converted into
//! domain models at the boundary; status columns travel as text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use dealdesk_core::models::{
    Application, ApplicationStatus, AuditAction, AuditLogEntry, Document, ScanStatus, Section,
    SectionKey, SectionStatus,
};
use dealdesk_core::AppError;

use crate::records::{
    ApplicationFilter, NewApplication, NewAuditEntry, NewDocument, NewSection, RecordStore,
};

/// Record store backed by Postgres.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    user_id: Option<Uuid>,
    company_name: Option<String>,
    company_website: Option<String>,
    status: String,
    current_section: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = AppError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        let status = ApplicationStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown application status: {}", row.status)))?;
        Ok(Application {
            id: row.id,
            user_id: row.user_id,
            company_name: row.company_name,
            company_website: row.company_website,
            status,
            current_section: row.current_section,
            created_at: row.created_at,
            updated_at: row.updated_at,
            submitted_at: row.submitted_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SectionRow {
    id: Uuid,
    application_id: Uuid,
    section_key: String,
    section_number: i32,
    status: String,
    data: Value,
    reviewer_notes: Option<String>,
    last_saved_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SectionRow> for Section {
    type Error = AppError;

    fn try_from(row: SectionRow) -> Result<Self, Self::Error> {
        let section_key = SectionKey::parse(&row.section_key)
            .ok_or_else(|| AppError::Internal(format!("Unknown section key: {}", row.section_key)))?;
        let status = SectionStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown section status: {}", row.status)))?;
        Ok(Section {
            id: row.id,
            application_id: row.application_id,
            section_key,
            section_number: row.section_number,
            status,
            data: row.data,
            reviewer_notes: row.reviewer_notes,
            last_saved_at: row.last_saved_at,
            submitted_at: row.submitted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    application_id: Uuid,
    section_key: String,
    checklist_item: Option<String>,
    file_name: String,
    file_size: i64,
    file_type: String,
    storage_path: String,
    scan_status: String,
    uploaded_by: Option<Uuid>,
    uploaded_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = AppError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let section_key = SectionKey::parse(&row.section_key)
            .ok_or_else(|| AppError::Internal(format!("Unknown section key: {}", row.section_key)))?;
        let scan_status = ScanStatus::parse(&row.scan_status)
            .ok_or_else(|| AppError::Internal(format!("Unknown scan status: {}", row.scan_status)))?;
        Ok(Document {
            id: row.id,
            application_id: row.application_id,
            section_key,
            checklist_item: row.checklist_item,
            file_name: row.file_name,
            file_size: row.file_size,
            file_type: row.file_type,
            storage_path: row.storage_path,
            scan_status,
            uploaded_by: row.uploaded_by,
            uploaded_at: row.uploaded_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    application_id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    section_key: Option<String>,
    details: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action)
            .ok_or_else(|| AppError::Internal(format!("Unknown audit action: {}", row.action)))?;
        let section_key = match row.section_key {
            Some(ref s) => Some(
                SectionKey::parse(s)
                    .ok_or_else(|| AppError::Internal(format!("Unknown section key: {s}")))?,
            ),
            None => None,
        };
        Ok(AuditLogEntry {
            id: row.id,
            application_id: row.application_id,
            user_id: row.user_id,
            action,
            section_key,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

const APPLICATION_COLUMNS: &str = "id, user_id, company_name, company_website, status, \
     current_section, created_at, updated_at, submitted_at, expires_at";

const SECTION_COLUMNS: &str = "id, application_id, section_key, section_number, status, data, \
     reviewer_notes, last_saved_at, submitted_at, created_at, updated_at";

const DOCUMENT_COLUMNS: &str = "id, application_id, section_key, checklist_item, file_name, \
     file_size, file_type, storage_path, scan_status, uploaded_by, uploaded_at, deleted_at";

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create_application(&self, new: NewApplication) -> Result<Application, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            r#"
            INSERT INTO intake_applications (
                user_id, company_name, company_website, status,
                current_section, submitted_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {APPLICATION_COLUMNS}
            "#,
        ))
        .bind(new.user_id)
        .bind(new.company_name)
        .bind(new.company_website)
        .bind(new.status.as_str())
        .bind(new.current_section)
        .bind(new.submitted_at)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM intake_applications WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Application::try_from).transpose()
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, AppError> {
        let mut builder: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {APPLICATION_COLUMNS} FROM intake_applications WHERE 1=1",
        ));
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(ref query) = filter.company_query {
            builder
                .push(" AND company_name ILIKE ")
                .push_bind(format!("%{query}%"));
        }
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<ApplicationRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Application::try_from).collect()
    }

    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        // Moving to submitted also stamps the submission timestamp.
        let query = if status == ApplicationStatus::Submitted {
            r#"
            UPDATE intake_applications
            SET status = $2, submitted_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#
        } else {
            r#"
            UPDATE intake_applications
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#
        };
        sqlx::query(query)
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_company_name(&self, id: Uuid, name: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE intake_applications
            SET company_name = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_current_section(&self, id: Uuid, section_number: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE intake_applications
            SET current_section = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(section_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_sections(&self, rows: Vec<NewSection>) -> Result<(), AppError> {
        // The unique (application_id, section_key) index in the store backs
        // the one-row-per-pair invariant.
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO intake_sections (
                    application_id, section_key, section_number, status,
                    data, last_saved_at, submitted_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(row.application_id)
            .bind(row.section_key.as_str())
            .bind(row.section_key.number())
            .bind(row.status.as_str())
            .bind(&row.data)
            .bind(row.last_saved_at)
            .bind(row.submitted_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn get_section(
        &self,
        application_id: Uuid,
        key: SectionKey,
    ) -> Result<Option<Section>, AppError> {
        let row = sqlx::query_as::<_, SectionRow>(&format!(
            r#"
            SELECT {SECTION_COLUMNS} FROM intake_sections
            WHERE application_id = $1 AND section_key = $2
            "#,
        ))
        .bind(application_id)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Section::try_from).transpose()
    }

    async fn list_sections(&self, application_id: Uuid) -> Result<Vec<Section>, AppError> {
        let rows = sqlx::query_as::<_, SectionRow>(&format!(
            r#"
            SELECT {SECTION_COLUMNS} FROM intake_sections
            WHERE application_id = $1
            ORDER BY section_number
            "#,
        ))
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Section::try_from).collect()
    }

    async fn save_section_data(
        &self,
        application_id: Uuid,
        key: SectionKey,
        data: &Value,
        status: SectionStatus,
    ) -> Result<(), AppError> {
        // TODO: re-validate blobs server-side before persisting; the section
        // validators currently run client-side only.
        sqlx::query(
            r#"
            UPDATE intake_sections
            SET data = $3, status = $4, last_saved_at = NOW(), updated_at = NOW()
            WHERE application_id = $1 AND section_key = $2
            "#,
        )
        .bind(application_id)
        .bind(key.as_str())
        .bind(data)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn submit_section(
        &self,
        application_id: Uuid,
        key: SectionKey,
        data: &Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE intake_sections
            SET data = $3, status = 'submitted', submitted_at = NOW(),
                last_saved_at = NOW(), updated_at = NOW()
            WHERE application_id = $1 AND section_key = $2
            "#,
        )
        .bind(application_id)
        .bind(key.as_str())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_reviewer_notes(&self, section_id: Uuid, notes: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE intake_sections
            SET reviewer_notes = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(section_id)
        .bind(notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_document(&self, new: NewDocument) -> Result<Document, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            INSERT INTO intake_documents (
                application_id, section_key, checklist_item, file_name,
                file_size, file_type, storage_path, scan_status, uploaded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DOCUMENT_COLUMNS}
            "#,
        ))
        .bind(new.application_id)
        .bind(new.section_key.as_str())
        .bind(new.checklist_item)
        .bind(new.file_name)
        .bind(new.file_size)
        .bind(new.file_type)
        .bind(new.storage_path)
        .bind(new.scan_status.as_str())
        .bind(new.uploaded_by)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_documents(&self, application_id: Uuid) -> Result<Vec<Document>, AppError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            SELECT {DOCUMENT_COLUMNS} FROM intake_documents
            WHERE application_id = $1 AND deleted_at IS NULL
            ORDER BY uploaded_at DESC
            "#,
        ))
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Document::try_from).collect()
    }

    async fn soft_delete_document(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE intake_documents
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO intake_audit_log (
                application_id, user_id, action, section_key, details
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.application_id)
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.section_key.map(|k| k.as_str()))
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(&self, application_id: Uuid) -> Result<Vec<AuditLogEntry>, AppError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, application_id, user_id, action, section_key, details, created_at
            FROM intake_audit_log
            WHERE application_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}
