//! In-memory implementation of the record-store port.
//!
//! Substitutes the Postgres backend in tests and embedded setups. Mirrors
//! the store-side uniqueness guarantee (one section row per application +
//! key pair) by rejecting duplicate inserts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use dealdesk_core::models::{
    Application, ApplicationStatus, AuditLogEntry, Document, Section, SectionKey, SectionStatus,
};
use dealdesk_core::AppError;

use crate::records::{
    ApplicationFilter, NewApplication, NewAuditEntry, NewDocument, NewSection, RecordStore,
};

#[derive(Default)]
struct Inner {
    applications: HashMap<Uuid, Application>,
    sections: Vec<Section>,
    documents: Vec<Document>,
    audit: Vec<AuditLogEntry>,
}

/// Record store held entirely in memory.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total section rows across all applications; test helper.
    pub async fn section_count(&self) -> usize {
        self.inner.lock().await.sections.len()
    }

    /// Total audit entries across all applications; test helper.
    pub async fn audit_count(&self) -> usize {
        self.inner.lock().await.audit.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_application(&self, new: NewApplication) -> Result<Application, AppError> {
        let now = Utc::now();
        let app = Application {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            company_name: new.company_name,
            company_website: new.company_website,
            status: new.status,
            current_section: new.current_section,
            created_at: now,
            updated_at: now,
            submitted_at: new.submitted_at,
            expires_at: new.expires_at,
        };
        self.inner
            .lock()
            .await
            .applications
            .insert(app.id, app.clone());
        Ok(app)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, AppError> {
        Ok(self.inner.lock().await.applications.get(&id).cloned())
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, AppError> {
        let inner = self.inner.lock().await;
        let mut apps: Vec<Application> = inner
            .applications
            .values()
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .filter(|a| {
                filter.company_query.as_ref().is_none_or(|q| {
                    a.company_name
                        .as_deref()
                        .map(|name| name.to_lowercase().contains(&q.to_lowercase()))
                        .unwrap_or(false)
                })
            })
            .filter(|a| filter.user_id.is_none_or(|u| a.user_id == Some(u)))
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn set_application_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let app = inner
            .applications
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("application {id}")))?;
        app.status = status;
        app.updated_at = Utc::now();
        if status == ApplicationStatus::Submitted {
            app.submitted_at = Some(app.updated_at);
        }
        Ok(())
    }

    async fn set_company_name(&self, id: Uuid, name: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let app = inner
            .applications
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("application {id}")))?;
        app.company_name = Some(name.to_string());
        app.updated_at = Utc::now();
        Ok(())
    }

    async fn set_current_section(&self, id: Uuid, section_number: i32) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let app = inner
            .applications
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("application {id}")))?;
        app.current_section = section_number;
        app.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_sections(&self, rows: Vec<NewSection>) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        for row in rows {
            let duplicate = inner.sections.iter().any(|s| {
                s.application_id == row.application_id && s.section_key == row.section_key
            });
            if duplicate {
                return Err(AppError::Conflict(format!(
                    "section {} already exists for application {}",
                    row.section_key, row.application_id
                )));
            }
            let now = Utc::now();
            inner.sections.push(Section {
                id: Uuid::new_v4(),
                application_id: row.application_id,
                section_key: row.section_key,
                section_number: row.section_key.number(),
                status: row.status,
                data: row.data,
                reviewer_notes: None,
                last_saved_at: row.last_saved_at,
                submitted_at: row.submitted_at,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(())
    }

    async fn get_section(
        &self,
        application_id: Uuid,
        key: SectionKey,
    ) -> Result<Option<Section>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sections
            .iter()
            .find(|s| s.application_id == application_id && s.section_key == key)
            .cloned())
    }

    async fn list_sections(&self, application_id: Uuid) -> Result<Vec<Section>, AppError> {
        let inner = self.inner.lock().await;
        let mut sections: Vec<Section> = inner
            .sections
            .iter()
            .filter(|s| s.application_id == application_id)
            .cloned()
            .collect();
        sections.sort_by_key(|s| s.section_number);
        Ok(sections)
    }

    async fn save_section_data(
        &self,
        application_id: Uuid,
        key: SectionKey,
        data: &Value,
        status: SectionStatus,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let section = inner
            .sections
            .iter_mut()
            .find(|s| s.application_id == application_id && s.section_key == key)
            .ok_or_else(|| AppError::NotFound(format!("section {key} of {application_id}")))?;
        let now = Utc::now();
        section.data = data.clone();
        section.status = status;
        section.last_saved_at = Some(now);
        section.updated_at = now;
        Ok(())
    }

    async fn submit_section(
        &self,
        application_id: Uuid,
        key: SectionKey,
        data: &Value,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let section = inner
            .sections
            .iter_mut()
            .find(|s| s.application_id == application_id && s.section_key == key)
            .ok_or_else(|| AppError::NotFound(format!("section {key} of {application_id}")))?;
        let now = Utc::now();
        section.data = data.clone();
        section.status = SectionStatus::Submitted;
        section.submitted_at = Some(now);
        section.last_saved_at = Some(now);
        section.updated_at = now;
        Ok(())
    }

    async fn set_reviewer_notes(&self, section_id: Uuid, notes: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let section = inner
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| AppError::NotFound(format!("section {section_id}")))?;
        section.reviewer_notes = Some(notes.to_string());
        section.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_document(&self, new: NewDocument) -> Result<Document, AppError> {
        let doc = Document {
            id: Uuid::new_v4(),
            application_id: new.application_id,
            section_key: new.section_key,
            checklist_item: new.checklist_item,
            file_name: new.file_name,
            file_size: new.file_size,
            file_type: new.file_type,
            storage_path: new.storage_path,
            scan_status: new.scan_status,
            uploaded_by: new.uploaded_by,
            uploaded_at: Utc::now(),
            deleted_at: None,
        };
        self.inner.lock().await.documents.push(doc.clone());
        Ok(doc)
    }

    async fn list_documents(&self, application_id: Uuid) -> Result<Vec<Document>, AppError> {
        let inner = self.inner.lock().await;
        let mut docs: Vec<Document> = inner
            .documents
            .iter()
            .filter(|d| d.application_id == application_id && !d.is_deleted())
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(docs)
    }

    async fn soft_delete_document(&self, id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let doc = inner
            .documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::NotFound(format!("document {id}")))?;
        if doc.deleted_at.is_none() {
            doc.deleted_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), AppError> {
        let record = AuditLogEntry {
            id: Uuid::new_v4(),
            application_id: entry.application_id,
            user_id: entry.user_id,
            action: entry.action,
            section_key: entry.section_key,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.inner.lock().await.audit.push(record);
        Ok(())
    }

    async fn list_audit(&self, application_id: Uuid) -> Result<Vec<AuditLogEntry>, AppError> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<AuditLogEntry> = inner
            .audit
            .iter()
            .filter(|e| e.application_id == application_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealdesk_core::models::ScanStatus;
    use serde_json::json;

    fn new_app() -> NewApplication {
        let now = Utc::now();
        NewApplication {
            user_id: None,
            company_name: Some("Acme Robotics".to_string()),
            company_website: None,
            status: ApplicationStatus::Draft,
            current_section: 1,
            submitted_at: None,
            expires_at: Application::expiry_for(now),
        }
    }

    #[tokio::test]
    async fn duplicate_section_insert_is_rejected() {
        let store = MemoryRecordStore::new();
        let app = store.create_application(new_app()).await.unwrap();

        let row = NewSection {
            application_id: app.id,
            section_key: SectionKey::Company,
            status: SectionStatus::NotStarted,
            data: json!({}),
            last_saved_at: None,
            submitted_at: None,
        };
        store.insert_sections(vec![row.clone()]).await.unwrap();
        let err = store.insert_sections(vec![row]).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn submitted_status_stamps_timestamp() {
        let store = MemoryRecordStore::new();
        let app = store.create_application(new_app()).await.unwrap();
        assert!(app.submitted_at.is_none());

        store
            .set_application_status(app.id, ApplicationStatus::Submitted)
            .await
            .unwrap();
        let app = store.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert!(app.submitted_at.is_some());
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_company() {
        let store = MemoryRecordStore::new();
        let a = store.create_application(new_app()).await.unwrap();
        let mut other = new_app();
        other.company_name = Some("Beta Industrial".to_string());
        let b = store.create_application(other).await.unwrap();
        store
            .set_application_status(b.id, ApplicationStatus::UnderReview)
            .await
            .unwrap();

        let drafts = store
            .list_applications(&ApplicationFilter {
                status: Some(ApplicationStatus::Draft),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, a.id);

        let by_name = store
            .list_applications(&ApplicationFilter {
                company_query: Some("beta".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, b.id);
    }

    #[tokio::test]
    async fn soft_deleted_documents_leave_listings() {
        let store = MemoryRecordStore::new();
        let app = store.create_application(new_app()).await.unwrap();
        let doc = store
            .insert_document(NewDocument {
                application_id: app.id,
                section_key: SectionKey::Documents,
                checklist_item: Some("pitch_deck".to_string()),
                file_name: "deck.pdf".to_string(),
                file_size: 2048,
                file_type: "application/pdf".to_string(),
                storage_path: format!("{}/documents/deck.pdf", app.id),
                scan_status: ScanStatus::Pending,
                uploaded_by: None,
            })
            .await
            .unwrap();

        assert_eq!(store.list_documents(app.id).await.unwrap().len(), 1);
        store.soft_delete_document(doc.id).await.unwrap();
        assert!(store.list_documents(app.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_section_is_one_atomic_update() {
        let store = MemoryRecordStore::new();
        let app = store.create_application(new_app()).await.unwrap();
        store
            .insert_sections(vec![NewSection {
                application_id: app.id,
                section_key: SectionKey::Summary,
                status: SectionStatus::InProgress,
                data: json!({}),
                last_saved_at: None,
                submitted_at: None,
            }])
            .await
            .unwrap();

        let blob = json!({"attested": true, "attested_name": "Dana", "attested_title": "CEO"});
        store
            .submit_section(app.id, SectionKey::Summary, &blob)
            .await
            .unwrap();

        let section = store
            .get_section(app.id, SectionKey::Summary)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(section.status, SectionStatus::Submitted);
        assert_eq!(section.data, blob);
        assert!(section.submitted_at.is_some());
        assert_eq!(section.last_saved_at, section.submitted_at);
    }
}
