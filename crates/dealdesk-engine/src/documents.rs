//! Document upload and retrieval for authenticated applications.
//!
//! Uploads are type- and size-gated, written to blob storage first, then
//! recorded and audited. Deletion is always soft; the blob itself is never
//! purged by the core.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use dealdesk_core::constants::{ALLOWED_CONTENT_TYPES, MAX_FILE_SIZE_BYTES, SIGNED_URL_TTL};
use dealdesk_core::models::{AuditAction, Document, ScanStatus, SectionKey};
use dealdesk_core::AppError;
use dealdesk_db::{NewAuditEntry, NewDocument, RecordStore};
use dealdesk_store::BlobStorage;

/// Upload request for one file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub section_key: SectionKey,
    pub checklist_item: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Document operations scoped to one application.
pub struct DocumentService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStorage>,
}

impl DocumentService {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self { records, blobs }
    }

    /// Validate, store, record, and audit one upload.
    pub async fn upload(
        &self,
        application_id: Uuid,
        user_id: Option<Uuid>,
        request: UploadRequest,
    ) -> Result<Document, AppError> {
        if !ALLOWED_CONTENT_TYPES.contains(&request.content_type.as_str()) {
            return Err(AppError::InvalidInput(
                "File type not allowed. Accepted: PDF, XLSX, XLS, DOCX, PNG, JPEG".to_string(),
            ));
        }
        if request.data.len() as i64 > MAX_FILE_SIZE_BYTES {
            return Err(AppError::PayloadTooLarge(
                "Maximum file size is 50MB".to_string(),
            ));
        }

        let storage_path = format!(
            "{}/{}/{}_{}",
            application_id,
            request.section_key,
            Utc::now().timestamp_millis(),
            request.file_name
        );
        self.blobs
            .upload(&storage_path, &request.content_type, request.data.clone())
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let document = self
            .records
            .insert_document(NewDocument {
                application_id,
                section_key: request.section_key,
                checklist_item: request.checklist_item.clone(),
                file_name: request.file_name.clone(),
                file_size: request.data.len() as i64,
                file_type: request.content_type.clone(),
                storage_path,
                scan_status: ScanStatus::Pending,
                uploaded_by: user_id,
            })
            .await?;

        self.records
            .append_audit(NewAuditEntry {
                application_id,
                user_id,
                action: AuditAction::FileUploaded,
                section_key: Some(request.section_key),
                details: json!({
                    "file_name": request.file_name,
                    "file_size": request.data.len(),
                    "checklist_item": request.checklist_item,
                }),
            })
            .await?;

        tracing::info!(
            application_id = %application_id,
            file = %document.file_name,
            size_bytes = document.file_size,
            "Document uploaded"
        );
        Ok(document)
    }

    /// Non-deleted documents, newest first.
    pub async fn list(&self, application_id: Uuid) -> Result<Vec<Document>, AppError> {
        self.records.list_documents(application_id).await
    }

    /// Soft-delete; the stored blob stays in place.
    pub async fn delete(&self, document_id: Uuid) -> Result<(), AppError> {
        self.records.soft_delete_document(document_id).await
    }

    /// Time-limited download URL for a stored document.
    pub async fn download_url(&self, document: &Document) -> Result<String, AppError> {
        self.blobs
            .signed_url(&document.storage_path, SIGNED_URL_TTL)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }
}
