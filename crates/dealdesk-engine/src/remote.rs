//! Debounced remote section adapter (authenticated mode).
//!
//! Same logical operations as the local adapter, but scoped by an
//! application id and backed by the record store. The debounce window is
//! longer because every flush is a remote write. Failed writes surface
//! through `last_error` while the in-memory data is kept, so the user can
//! retry by editing again; there is no automatic retry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use dealdesk_core::constants::REMOTE_SAVE_DEBOUNCE;
use dealdesk_core::models::{AuditAction, SectionKey, SectionStatus};
use dealdesk_core::AppError;
use dealdesk_db::{NewAuditEntry, RecordStore};

struct RemoteState {
    data: Value,
    status: SectionStatus,
    loading: bool,
    saving: bool,
    last_saved: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Remote persistence adapter for one section of one application.
///
/// As with the local adapter, a pending debounce timer survives a drop of
/// the adapter handle; the in-flight flush still reaches the store.
#[derive(Clone)]
pub struct RemoteSectionStore {
    application_id: Uuid,
    key: SectionKey,
    user_id: Option<Uuid>,
    records: Arc<dyn RecordStore>,
    debounce: Duration,
    state: Arc<Mutex<RemoteState>>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RemoteSectionStore {
    /// Open the adapter and load the section row. A load failure surfaces
    /// through `last_error` and leaves an empty blob in memory.
    pub async fn open(
        records: Arc<dyn RecordStore>,
        application_id: Uuid,
        key: SectionKey,
        user_id: Option<Uuid>,
    ) -> Self {
        let adapter = RemoteSectionStore {
            application_id,
            key,
            user_id,
            records,
            debounce: REMOTE_SAVE_DEBOUNCE,
            state: Arc::new(Mutex::new(RemoteState {
                data: json!({}),
                status: SectionStatus::NotStarted,
                loading: true,
                saving: false,
                last_saved: None,
                last_error: None,
            })),
            pending: Arc::new(Mutex::new(None)),
        };

        let loaded = adapter
            .records
            .get_section(application_id, key)
            .await;
        {
            let mut state = adapter.lock_state();
            match loaded {
                Ok(Some(section)) => {
                    state.data = section.data;
                    state.status = section.status;
                    state.last_saved = section.last_saved_at;
                }
                Ok(None) => {
                    state.last_error = Some(format!("section {key} not found"));
                }
                Err(e) => {
                    tracing::error!(section = %key, error = %e, "Failed to load section");
                    state.last_error = Some(e.to_string());
                }
            }
            state.loading = false;
        }
        adapter
    }

    pub fn section_key(&self) -> SectionKey {
        self.key
    }

    pub fn data(&self) -> Value {
        self.lock_state().data.clone()
    }

    pub fn status(&self) -> SectionStatus {
        self.lock_state().status
    }

    pub fn loading(&self) -> bool {
        self.lock_state().loading
    }

    pub fn saving(&self) -> bool {
        self.lock_state().saving
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.lock_state().last_saved
    }

    /// Last remote failure, cleared by the next successful write.
    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }

    /// Merge one field and schedule a debounced remote write.
    pub fn save_field(&self, field: &str, value: Value) {
        {
            let mut state = self.lock_state();
            if !state.data.is_object() {
                state.data = json!({});
            }
            if let Some(map) = state.data.as_object_mut() {
                map.insert(field.to_string(), value);
            }
        }
        self.schedule_flush();
    }

    /// Replace the whole blob and schedule a debounced remote write.
    pub fn save_bulk(&self, blob: Value) {
        self.lock_state().data = blob;
        self.schedule_flush();
    }

    /// Flush immediately. On behalf of an authenticated user this also
    /// appends a `section_saved` audit entry carrying the field count.
    pub async fn save_now(&self, blob: Option<Value>) -> Result<(), AppError> {
        self.cancel_pending();
        {
            let mut state = self.lock_state();
            if let Some(blob) = blob {
                state.data = blob;
            }
            state.saving = true;
        }
        let outcome = Self::flush(
            &*self.records,
            self.application_id,
            self.key,
            &self.state,
        )
        .await;
        outcome?;

        if let Some(user_id) = self.user_id {
            let field_count = self
                .lock_state()
                .data
                .as_object()
                .map(|m| m.len())
                .unwrap_or(0);
            self.records
                .append_audit(NewAuditEntry {
                    application_id: self.application_id,
                    user_id: Some(user_id),
                    action: AuditAction::SectionSaved,
                    section_key: Some(self.key),
                    details: json!({"field_count": field_count}),
                })
                .await?;
        }
        Ok(())
    }

    /// Final write: data, submitted status, and submission timestamp in a
    /// single store update.
    pub async fn submit(&self) -> Result<(), AppError> {
        self.cancel_pending();
        let snapshot = {
            let mut state = self.lock_state();
            state.saving = true;
            state.data.clone()
        };

        let result = self
            .records
            .submit_section(self.application_id, self.key, &snapshot)
            .await;

        let mut state = self.lock_state();
        state.saving = false;
        match result {
            Ok(()) => {
                let now = Utc::now();
                state.status = SectionStatus::Submitted;
                state.last_saved = Some(now);
                state.last_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!(section = %self.key, error = %e, "Failed to submit section");
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn schedule_flush(&self) {
        self.lock_state().saving = true;
        let records = Arc::clone(&self.records);
        let state = Arc::clone(&self.state);
        let application_id = self.application_id;
        let key = self.key;
        let debounce = self.debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let _ = Self::flush(&*records, application_id, key, &state).await;
        });

        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = pending.replace(handle) {
            old.abort();
        }
    }

    fn cancel_pending(&self) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = pending.take() {
            old.abort();
        }
    }

    async fn flush(
        records: &dyn RecordStore,
        application_id: Uuid,
        key: SectionKey,
        state: &Mutex<RemoteState>,
    ) -> Result<(), AppError> {
        let (snapshot, status) = {
            let state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let status = if state.status == SectionStatus::NotStarted {
                SectionStatus::InProgress
            } else {
                state.status
            };
            (state.data.clone(), status)
        };

        let result = records
            .save_section_data(application_id, key, &snapshot, status)
            .await;

        let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.saving = false;
        match result {
            Ok(()) => {
                state.last_saved = Some(Utc::now());
                state.status = status;
                state.last_error = None;
                Ok(())
            }
            Err(e) => {
                // In-memory edits are retained; re-editing re-triggers the
                // write.
                tracing::error!(section = %key, error = %e, "Failed to save section");
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dealdesk_core::models::{Application, ApplicationStatus};
    use dealdesk_db::{ApplicationFilter, MemoryRecordStore, NewApplication, NewSection};
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn seeded_store() -> (Arc<MemoryRecordStore>, Uuid) {
        let store = Arc::new(MemoryRecordStore::new());
        let app = store
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
        store.insert_sections(rows).await.unwrap();
        (store, app.id)
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_edits_reach_the_store_once() {
        let (store, app_id) = seeded_store().await;
        let adapter =
            RemoteSectionStore::open(store.clone(), app_id, SectionKey::Company, None).await;
        assert!(!adapter.loading());

        adapter.save_field("legal_name", json!("Acme"));
        adapter.save_field("industry", json!("Technology"));
        tokio::time::sleep(Duration::from_millis(1600)).await;

        let section = store
            .get_section(app_id, SectionKey::Company)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(section.data["legal_name"], "Acme");
        assert_eq!(section.status, SectionStatus::InProgress);
        assert!(adapter.last_error().is_none());
    }

    #[tokio::test]
    async fn save_now_appends_audit_for_authenticated_user() {
        let (store, app_id) = seeded_store().await;
        let user_id = Uuid::new_v4();
        let adapter =
            RemoteSectionStore::open(store.clone(), app_id, SectionKey::Kpis, Some(user_id)).await;

        adapter
            .save_now(Some(json!({"kpis": [{"name": "Churn", "current_value": "2%"}]})))
            .await
            .unwrap();

        let audit = store.list_audit(app_id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::SectionSaved);
        assert_eq!(audit[0].section_key, Some(SectionKey::Kpis));
        assert_eq!(audit[0].details["field_count"], 1);
    }

    #[tokio::test]
    async fn save_now_without_user_skips_audit() {
        let (store, app_id) = seeded_store().await;
        let adapter =
            RemoteSectionStore::open(store.clone(), app_id, SectionKey::Kpis, None).await;
        adapter.save_now(Some(json!({"a": 1}))).await.unwrap();
        assert!(store.list_audit(app_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_sets_status_and_timestamp_atomically() {
        let (store, app_id) = seeded_store().await;
        let adapter =
            RemoteSectionStore::open(store.clone(), app_id, SectionKey::Summary, None).await;

        adapter.save_field("attested", json!(true));
        adapter.submit().await.unwrap();

        let section = store
            .get_section(app_id, SectionKey::Summary)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(section.status, SectionStatus::Submitted);
        assert!(section.submitted_at.is_some());
        assert_eq!(section.data["attested"], true);
        assert_eq!(adapter.status(), SectionStatus::Submitted);
    }

    /// Record store that fails every write once armed; reads pass through.
    struct FlakyStore {
        inner: MemoryRecordStore,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn arm(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        fn disarm(&self) {
            self.failing.store(false, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), AppError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(AppError::Internal("injected write failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn create_application(
            &self,
            new: NewApplication,
        ) -> Result<Application, AppError> {
            self.check()?;
            self.inner.create_application(new).await
        }

        async fn get_application(&self, id: Uuid) -> Result<Option<Application>, AppError> {
            self.inner.get_application(id).await
        }

        async fn list_applications(
            &self,
            filter: &ApplicationFilter,
        ) -> Result<Vec<Application>, AppError> {
            self.inner.list_applications(filter).await
        }

        async fn set_application_status(
            &self,
            id: Uuid,
            status: ApplicationStatus,
        ) -> Result<(), AppError> {
            self.check()?;
            self.inner.set_application_status(id, status).await
        }

        async fn set_company_name(&self, id: Uuid, name: &str) -> Result<(), AppError> {
            self.check()?;
            self.inner.set_company_name(id, name).await
        }

        async fn set_current_section(
            &self,
            id: Uuid,
            section_number: i32,
        ) -> Result<(), AppError> {
            self.check()?;
            self.inner.set_current_section(id, section_number).await
        }

        async fn insert_sections(&self, rows: Vec<NewSection>) -> Result<(), AppError> {
            self.check()?;
            self.inner.insert_sections(rows).await
        }

        async fn get_section(
            &self,
            application_id: Uuid,
            key: SectionKey,
        ) -> Result<Option<dealdesk_core::models::Section>, AppError> {
            self.inner.get_section(application_id, key).await
        }

        async fn list_sections(
            &self,
            application_id: Uuid,
        ) -> Result<Vec<dealdesk_core::models::Section>, AppError> {
            self.inner.list_sections(application_id).await
        }

        async fn save_section_data(
            &self,
            application_id: Uuid,
            key: SectionKey,
            data: &Value,
            status: SectionStatus,
        ) -> Result<(), AppError> {
            self.check()?;
            self.inner
                .save_section_data(application_id, key, data, status)
                .await
        }

        async fn submit_section(
            &self,
            application_id: Uuid,
            key: SectionKey,
            data: &Value,
        ) -> Result<(), AppError> {
            self.check()?;
            self.inner.submit_section(application_id, key, data).await
        }

        async fn set_reviewer_notes(
            &self,
            section_id: Uuid,
            notes: &str,
        ) -> Result<(), AppError> {
            self.check()?;
            self.inner.set_reviewer_notes(section_id, notes).await
        }

        async fn insert_document(
            &self,
            new: dealdesk_db::NewDocument,
        ) -> Result<dealdesk_core::models::Document, AppError> {
            self.check()?;
            self.inner.insert_document(new).await
        }

        async fn list_documents(
            &self,
            application_id: Uuid,
        ) -> Result<Vec<dealdesk_core::models::Document>, AppError> {
            self.inner.list_documents(application_id).await
        }

        async fn soft_delete_document(&self, id: Uuid) -> Result<(), AppError> {
            self.check()?;
            self.inner.soft_delete_document(id).await
        }

        async fn append_audit(&self, entry: NewAuditEntry) -> Result<(), AppError> {
            self.check()?;
            self.inner.append_audit(entry).await
        }

        async fn list_audit(
            &self,
            application_id: Uuid,
        ) -> Result<Vec<dealdesk_core::models::AuditLogEntry>, AppError> {
            self.inner.list_audit(application_id).await
        }
    }

    #[tokio::test]
    async fn failed_write_surfaces_error_and_keeps_data() {
        let flaky = Arc::new(FlakyStore {
            inner: MemoryRecordStore::new(),
            failing: AtomicBool::new(false),
        });
        let app = flaky
            .inner
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
        flaky
            .inner
            .insert_sections(vec![NewSection {
                application_id: app.id,
                section_key: SectionKey::Company,
                status: SectionStatus::NotStarted,
                data: json!({}),
                last_saved_at: None,
                submitted_at: None,
            }])
            .await
            .unwrap();

        let adapter =
            RemoteSectionStore::open(flaky.clone(), app.id, SectionKey::Company, None).await;

        flaky.arm();
        let err = adapter.save_now(Some(json!({"legal_name": "Acme"}))).await;
        assert!(err.is_err());
        assert!(adapter.last_error().is_some());
        // The edit is retained in memory for a manual retry.
        assert_eq!(adapter.data()["legal_name"], "Acme");

        flaky.disarm();
        adapter.save_now(None).await.unwrap();
        assert!(adapter.last_error().is_none());
        let section = flaky
            .inner
            .get_section(app.id, SectionKey::Company)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(section.data["legal_name"], "Acme");
    }
}
