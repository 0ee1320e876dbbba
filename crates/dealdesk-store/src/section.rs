//! Debounced local section adapter (anonymous mode).
//!
//! Stores one section's data blob on the device, keyed by section name with
//! no application context: anonymous mode implies exactly one in-progress
//! application per device. Rapid edits collapse into a single persisted
//! write after a quiet period; storage failures are logged and swallowed so
//! edits survive in memory even when the device store rejects the write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use dealdesk_core::constants::{DRAFT_KEY_PREFIX, LOCAL_SAVE_DEBOUNCE};
use dealdesk_core::models::{SectionKey, SectionStatus};

use crate::draft::DraftStore;

/// Namespaced device-storage key for a section draft.
pub fn draft_key(key: SectionKey) -> String {
    format!("{DRAFT_KEY_PREFIX}{key}")
}

struct SectionState {
    data: Value,
    status: SectionStatus,
    saving: bool,
    last_saved: Option<DateTime<Utc>>,
}

/// Local persistence adapter for one section.
///
/// A pending debounce timer is not cancelled when the adapter is dropped;
/// the spawned flush holds its own handles to the state and store and still
/// fires.
#[derive(Clone)]
pub struct LocalSectionStore {
    key: SectionKey,
    storage_key: String,
    store: Arc<dyn DraftStore>,
    debounce: Duration,
    state: Arc<Mutex<SectionState>>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LocalSectionStore {
    /// Open the adapter, loading any draft already on the device. A draft
    /// that fails to parse is treated as absent.
    pub async fn open(store: Arc<dyn DraftStore>, key: SectionKey) -> Self {
        let storage_key = draft_key(key);
        let stored = store.get(&storage_key).await.ok().flatten();
        let (data, status) = match stored.and_then(|s| serde_json::from_str::<Value>(&s).ok()) {
            Some(data) if data.is_object() => (data, SectionStatus::InProgress),
            _ => (json!({}), SectionStatus::NotStarted),
        };

        LocalSectionStore {
            key,
            storage_key,
            store,
            debounce: LOCAL_SAVE_DEBOUNCE,
            state: Arc::new(Mutex::new(SectionState {
                data,
                status,
                saving: false,
                last_saved: None,
            })),
            pending: Arc::new(Mutex::new(None)),
        }
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

    /// True while a flush is pending or running.
    pub fn saving(&self) -> bool {
        self.lock_state().saving
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.lock_state().last_saved
    }

    /// Merge one field into the draft and schedule a debounced flush.
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

    /// Replace the whole draft blob (array-shaped data such as monthly
    /// grids) and schedule a debounced flush.
    pub fn save_bulk(&self, blob: Value) {
        self.lock_state().data = blob;
        self.schedule_flush();
    }

    /// Flush immediately, bypassing the debounce. With `Some(blob)` the
    /// given blob replaces the draft first.
    pub async fn save_now(&self, blob: Option<Value>) {
        self.cancel_pending();
        {
            let mut state = self.lock_state();
            if let Some(blob) = blob {
                state.data = blob;
            }
            state.saving = true;
        }
        Self::flush(&*self.store, &self.storage_key, &self.state).await;
    }

    /// Anonymous mode has no server-side submitted state until migration;
    /// this only flips the in-memory status flag.
    pub fn mark_submitted(&self) {
        self.lock_state().status = SectionStatus::Submitted;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SectionState> {
        // The state mutex is only held for field updates, never across an
        // await, so poisoning can only follow a panic elsewhere.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel-and-reschedule: at most one pending timer per section, and the
    /// latest edit wins the write.
    fn schedule_flush(&self) {
        self.lock_state().saving = true;
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let storage_key = self.storage_key.clone();
        let debounce = self.debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            Self::flush(&*store, &storage_key, &state).await;
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

    async fn flush(store: &dyn DraftStore, storage_key: &str, state: &Mutex<SectionState>) {
        let snapshot = {
            let state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.data.clone()
        };
        let serialized = match serde_json::to_string(&snapshot) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Failed to serialize draft");
                state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .saving = false;
                return;
            }
        };

        let result = store.put(storage_key, &serialized).await;
        let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match result {
            Ok(()) => {
                state.last_saved = Some(Utc::now());
                if state.status == SectionStatus::NotStarted {
                    state.status = SectionStatus::InProgress;
                }
            }
            Err(e) => {
                // Quota and similar device-storage failures stay silent;
                // the edit is retained in memory.
                tracing::warn!(key = %storage_key, error = %e, "Draft write failed");
            }
        }
        state.saving = false;
    }
}

/// Gather every stored draft, keyed by section. Drafts that fail to parse
/// are skipped. Used to collect the whole application for migration.
pub async fn load_all_drafts(store: &dyn DraftStore) -> HashMap<SectionKey, Value> {
    let mut drafts = HashMap::new();
    for key in SectionKey::ALL {
        let stored = match store.get(&draft_key(key)).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(section = %key, error = %e, "Failed to read draft");
                None
            }
        };
        if let Some(raw) = stored {
            if let Ok(blob) = serde_json::from_str::<Value>(&raw) {
                drafts.insert(key, blob);
            }
        }
    }
    drafts
}

/// Wipe all ten draft keys. Called once migration has succeeded.
pub async fn clear_all_drafts(store: &dyn DraftStore) {
    for key in SectionKey::ALL {
        if let Err(e) = store.remove(&draft_key(key)).await {
            tracing::warn!(section = %key, error = %e, "Failed to clear draft");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::MemoryDraftStore;
    use serde_json::json;
    use std::time::Duration;

    async fn settle() {
        // Paused-clock tests: sleeping past the debounce window auto-advances
        // the clock and runs the scheduled flush.
        tokio::time::sleep(Duration::from_millis(700)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_one_write() {
        let store = Arc::new(MemoryDraftStore::new());
        let section = LocalSectionStore::open(store.clone(), SectionKey::Company).await;

        section.save_field("legal_name", json!("Acme"));
        section.save_field("industry", json!("Technology"));
        section.save_field("stage", json!("Seed"));
        assert!(section.saving());

        settle().await;

        assert_eq!(store.write_count(), 1);
        assert!(!section.saving());
        assert!(section.last_saved().is_some());

        let stored: Value =
            serde_json::from_str(&store.get(&draft_key(SectionKey::Company)).await.unwrap().unwrap())
                .unwrap();
        assert_eq!(stored["legal_name"], "Acme");
        assert_eq!(stored["stage"], "Seed");
    }

    #[tokio::test(start_paused = true)]
    async fn save_bulk_round_trips_after_debounce() {
        let store = Arc::new(MemoryDraftStore::new());
        let section = LocalSectionStore::open(store.clone(), SectionKey::FinancialsHist).await;

        let blob = json!({"monthly_data": [
            {"revenue": "100", "cogs": "40", "opex": "30"},
            {"revenue": "200", "cogs": "80", "opex": "50"},
        ]});
        section.save_bulk(blob.clone());
        settle().await;

        let reopened = LocalSectionStore::open(store.clone(), SectionKey::FinancialsHist).await;
        assert_eq!(reopened.data(), blob);
        assert_eq!(reopened.status(), SectionStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_bypasses_the_debounce() {
        let store = Arc::new(MemoryDraftStore::new());
        let section = LocalSectionStore::open(store.clone(), SectionKey::Kpis).await;

        section.save_field("kpis", json!([{"name": "Churn", "current_value": "2%"}]));
        // Flush immediately; the pending timer must not produce a second write.
        section.save_now(None).await;
        assert_eq!(store.write_count(), 1);

        settle().await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_twice_with_same_blob_is_idempotent() {
        let store = Arc::new(MemoryDraftStore::new());
        let section = LocalSectionStore::open(store.clone(), SectionKey::Valuation).await;

        let blob = json!({"wacc": "12", "terminal_growth_rate": "2"});
        section.save_now(Some(blob.clone())).await;
        let stored_once = store.get(&draft_key(SectionKey::Valuation)).await.unwrap();

        section.save_now(Some(blob)).await;
        let stored_twice = store.get(&draft_key(SectionKey::Valuation)).await.unwrap();

        // Same logical content, still a single key; no duplicates appear.
        assert_eq!(stored_once, stored_twice);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_flush_survives_adapter_drop() {
        let store = Arc::new(MemoryDraftStore::new());
        let section = LocalSectionStore::open(store.clone(), SectionKey::Transaction).await;

        section.save_field("path", json!("equity_investment"));
        drop(section);

        settle().await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_submitted_is_memory_only() {
        let store = Arc::new(MemoryDraftStore::new());
        let section = LocalSectionStore::open(store.clone(), SectionKey::Summary).await;

        section.mark_submitted();
        assert_eq!(section.status(), SectionStatus::Submitted);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn load_all_and_clear_all_cover_the_ten_keys() {
        let store = Arc::new(MemoryDraftStore::new());
        for key in [SectionKey::Company, SectionKey::Transaction, SectionKey::Kpis] {
            let section = LocalSectionStore::open(store.clone(), key).await;
            section.save_now(Some(json!({"filled": true}))).await;
        }

        let drafts = load_all_drafts(&*store).await;
        assert_eq!(drafts.len(), 3);
        assert!(drafts.contains_key(&SectionKey::Company));

        clear_all_drafts(&*store).await;
        assert!(load_all_drafts(&*store).await.is_empty());
    }
}
