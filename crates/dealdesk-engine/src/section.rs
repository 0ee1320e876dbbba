//! Unified section facade.
//!
//! Section UIs talk to one interface in both flows. The mode is an explicit
//! tagged union chosen once at open time from the presence of an
//! application id; an instance never switches modes. After migration the
//! caller re-opens fresh Remote instances against the new application.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use dealdesk_core::models::{SectionKey, SectionStatus};
use dealdesk_core::AppError;
use dealdesk_db::RecordStore;
use dealdesk_store::{DraftStore, LocalSectionStore};

use crate::remote::RemoteSectionStore;

/// One section's persistence handle: device-local drafts in anonymous mode,
/// record-store rows once an application id exists.
pub enum SectionStore {
    Local(LocalSectionStore),
    Remote(RemoteSectionStore),
}

impl SectionStore {
    /// Open a handle for `key`. With an application id present every
    /// operation goes to the record store; otherwise to device storage.
    pub async fn open(
        application_id: Option<Uuid>,
        key: SectionKey,
        user_id: Option<Uuid>,
        drafts: Arc<dyn DraftStore>,
        records: Arc<dyn RecordStore>,
    ) -> SectionStore {
        match application_id {
            Some(app_id) => SectionStore::Remote(
                RemoteSectionStore::open(records, app_id, key, user_id).await,
            ),
            None => SectionStore::Local(LocalSectionStore::open(drafts, key).await),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SectionStore::Remote(_))
    }

    pub fn section_key(&self) -> SectionKey {
        match self {
            SectionStore::Local(s) => s.section_key(),
            SectionStore::Remote(s) => s.section_key(),
        }
    }

    pub fn data(&self) -> Value {
        match self {
            SectionStore::Local(s) => s.data(),
            SectionStore::Remote(s) => s.data(),
        }
    }

    pub fn status(&self) -> SectionStatus {
        match self {
            SectionStore::Local(s) => s.status(),
            SectionStore::Remote(s) => s.status(),
        }
    }

    /// Local drafts load synchronously at open, so only remote handles
    /// report a loading phase.
    pub fn loading(&self) -> bool {
        match self {
            SectionStore::Local(_) => false,
            SectionStore::Remote(s) => s.loading(),
        }
    }

    pub fn saving(&self) -> bool {
        match self {
            SectionStore::Local(s) => s.saving(),
            SectionStore::Remote(s) => s.saving(),
        }
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        match self {
            SectionStore::Local(s) => s.last_saved(),
            SectionStore::Remote(s) => s.last_saved(),
        }
    }

    /// Local writes degrade silently; only remote handles surface errors.
    pub fn last_error(&self) -> Option<String> {
        match self {
            SectionStore::Local(_) => None,
            SectionStore::Remote(s) => s.last_error(),
        }
    }

    pub fn save_field(&self, field: &str, value: Value) {
        match self {
            SectionStore::Local(s) => s.save_field(field, value),
            SectionStore::Remote(s) => s.save_field(field, value),
        }
    }

    pub fn save_bulk(&self, blob: Value) {
        match self {
            SectionStore::Local(s) => s.save_bulk(blob),
            SectionStore::Remote(s) => s.save_bulk(blob),
        }
    }

    pub async fn save_now(&self, blob: Option<Value>) -> Result<(), AppError> {
        match self {
            SectionStore::Local(s) => {
                s.save_now(blob).await;
                Ok(())
            }
            SectionStore::Remote(s) => s.save_now(blob).await,
        }
    }

    /// Submit the section. Anonymous mode has nothing remote to submit yet,
    /// so the local arm only flips the in-memory flag.
    pub async fn submit(&self) -> Result<(), AppError> {
        match self {
            SectionStore::Local(s) => {
                s.mark_submitted();
                Ok(())
            }
            SectionStore::Remote(s) => s.submit().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealdesk_core::models::{Application, ApplicationStatus};
    use dealdesk_db::{MemoryRecordStore, NewApplication, NewSection};
    use dealdesk_store::MemoryDraftStore;
    use serde_json::json;

    #[tokio::test]
    async fn open_without_id_is_local() {
        let drafts: Arc<dyn DraftStore> = Arc::new(MemoryDraftStore::new());
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let handle =
            SectionStore::open(None, SectionKey::Company, None, drafts, records).await;
        assert!(!handle.is_remote());
        assert!(!handle.loading());
        assert!(handle.last_error().is_none());
    }

    #[tokio::test]
    async fn open_with_id_is_remote() {
        let drafts: Arc<dyn DraftStore> = Arc::new(MemoryDraftStore::new());
        let records = Arc::new(MemoryRecordStore::new());
        let app = records
            .create_application(NewApplication {
                user_id: None,
                company_name: None,
                company_website: None,
                status: ApplicationStatus::Draft,
                current_section: 1,
                submitted_at: None,
                expires_at: Application::expiry_for(Utc::now()),
            })
            .await
            .unwrap();
        records
            .insert_sections(vec![NewSection {
                application_id: app.id,
                section_key: SectionKey::Company,
                status: SectionStatus::InProgress,
                data: json!({"legal_name": "Acme"}),
                last_saved_at: None,
                submitted_at: None,
            }])
            .await
            .unwrap();

        let handle = SectionStore::open(
            Some(app.id),
            SectionKey::Company,
            None,
            drafts,
            records.clone(),
        )
        .await;
        assert!(handle.is_remote());
        assert_eq!(handle.data()["legal_name"], "Acme");
        assert_eq!(handle.status(), SectionStatus::InProgress);
    }
}
