//! Wizard controller: progressive unlock over the ten sections and the
//! anonymous-to-authenticated migration.
//!
//! Step gating tracks a completion watermark: the highest step index that
//! has ever passed its validator this session. A step is reachable when it
//! is at or behind the current step, or at most one past the watermark.
//! Locked-step jumps are silent no-ops.
//!
//! Migration moves every local draft (plus locally buffered files) into the
//! record store in one pass. It is deliberately not atomic: a failure
//! before the application record exists aborts with drafts intact, while
//! every later step is logged and swallowed and drafts are cleared
//! regardless, yielding at-least-once semantics that operators reconcile
//! manually on the rare partial failure.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use dealdesk_core::models::{
    Application, ApplicationStatus, AuditAction, ScanStatus, SectionKey, SectionStatus,
};
use dealdesk_core::validation::validate_section;
use dealdesk_core::AppError;
use dealdesk_db::{NewApplication, NewAuditEntry, NewDocument, NewSection, RecordStore};
use dealdesk_store::{clear_all_drafts, load_all_drafts, BlobStorage, DraftStore};

use crate::auth::AuthenticatedUser;
use crate::notify::{IntakeSummary, Notifier};

/// A file attached to a section before any application exists. Raw bytes
/// are buffered in memory because device storage only holds JSON drafts.
#[derive(Debug, Clone)]
pub struct BufferedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Controller-side state of one wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Not yet reachable.
    Locked,
    /// Reachable, validator not passed yet.
    Unlocked,
    /// Validator passed on last check.
    Complete,
}

/// Migration failure before the application record was created. Later
/// failures are swallowed per step and never surface here.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to create application: {0}")]
    ApplicationCreate(#[source] AppError),
}

/// Outcome of a completed migration.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub application_id: Uuid,
    pub sections_with_data: usize,
    pub files_uploaded: usize,
    pub files_failed: usize,
}

/// State machine over the ten fixed sections for the anonymous flow.
pub struct WizardController {
    drafts: Arc<dyn DraftStore>,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStorage>,
    notifier: Arc<dyn Notifier>,
    current: usize,
    /// Highest step index ever validated complete, `None` before the first.
    watermark: Option<usize>,
    validation_errors: Vec<String>,
    files: HashMap<SectionKey, Vec<BufferedFile>>,
}

impl WizardController {
    /// Build the controller, restoring the watermark from drafts already on
    /// the device so returning users keep their unlocked steps.
    pub async fn open(
        drafts: Arc<dyn DraftStore>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let watermark = restore_watermark(&*drafts).await;
        WizardController {
            drafts,
            records,
            blobs,
            notifier,
            current: 0,
            watermark,
            validation_errors: Vec::new(),
            files: HashMap::new(),
        }
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn current_section(&self) -> SectionKey {
        SectionKey::ALL[self.current]
    }

    pub fn watermark(&self) -> Option<usize> {
        self.watermark
    }

    /// Errors from the last failed advance or submit attempt.
    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    pub fn step_state(&self, idx: usize) -> StepState {
        if self.watermark.is_some_and(|w| idx <= w) {
            StepState::Complete
        } else if self.is_reachable(idx) {
            StepState::Unlocked
        } else {
            StepState::Locked
        }
    }

    fn is_reachable(&self, idx: usize) -> bool {
        if idx >= SectionKey::ALL.len() {
            return false;
        }
        // Backward and current are always free; forward only to one past the
        // watermark.
        idx <= self.current || idx <= self.watermark.map_or(0, |w| w + 1)
    }

    /// Validate the step's draft. The documents step passes unconditionally
    /// in the anonymous flow: checklist uploads happen after authentication.
    pub async fn validate_step(&self, idx: usize) -> Vec<String> {
        let Some(key) = SectionKey::from_index(idx) else {
            return Vec::new();
        };
        if key == SectionKey::Documents {
            return Vec::new();
        }
        let drafts = load_all_drafts(&*self.drafts).await;
        let blob = drafts.get(&key).cloned().unwrap_or_else(|| json!({}));
        validate_section(key, &blob, &[])
    }

    /// Advance one step if the current step validates. On failure the error
    /// list is surfaced and the position is unchanged.
    pub async fn go_next(&mut self) -> bool {
        if self.current >= SectionKey::ALL.len() - 1 {
            return false;
        }
        let errors = self.validate_step(self.current).await;
        if !errors.is_empty() {
            self.validation_errors = errors;
            return false;
        }
        self.validation_errors.clear();
        self.watermark = Some(self.watermark.map_or(self.current, |w| w.max(self.current)));
        self.current += 1;
        true
    }

    /// Step back without re-validating.
    pub fn go_prev(&mut self) {
        if self.current > 0 {
            self.validation_errors.clear();
            self.current -= 1;
        }
    }

    /// Jump to a step. A locked target is ignored, not an error.
    pub fn go_to_step(&mut self, idx: usize) {
        if self.is_reachable(idx) {
            self.validation_errors.clear();
            self.current = idx;
        }
    }

    /// Buffer a file against a section for upload at migration time.
    pub fn attach_file(&mut self, key: SectionKey, file: BufferedFile) {
        self.files.entry(key).or_default().push(file);
    }

    pub fn buffered_file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Validate the summary step ahead of submission. `Ok` means the caller
    /// should run the external authentication sub-flow and then call
    /// [`WizardController::migrate`] with the authenticated user.
    pub async fn submit(&mut self) -> Result<(), Vec<String>> {
        let errors = self.validate_step(SectionKey::Summary.index()).await;
        if errors.is_empty() {
            self.validation_errors.clear();
            Ok(())
        } else {
            self.validation_errors = errors.clone();
            Err(errors)
        }
    }

    /// Move every local draft and buffered file into the record store.
    ///
    /// Only a failure to create the application record aborts (drafts stay
    /// intact so the user can retry). From the moment the application
    /// exists, section inserts, file uploads, the audit entry, and the
    /// notification each fail independently without rolling anything back,
    /// and local drafts are cleared regardless.
    pub async fn migrate(
        &mut self,
        user: &AuthenticatedUser,
    ) -> Result<MigrationReport, MigrationError> {
        let drafts = load_all_drafts(&*self.drafts).await;
        let company = drafts
            .get(&SectionKey::Company)
            .cloned()
            .unwrap_or_else(|| json!({}));
        let now = Utc::now();

        let company_name = company
            .get("legal_name")
            .or_else(|| company.get("dba"))
            .and_then(Value::as_str)
            .map(String::from);
        let company_website = company
            .get("website")
            .and_then(Value::as_str)
            .map(String::from);

        let app = self
            .records
            .create_application(NewApplication {
                user_id: Some(user.id),
                company_name: company_name.clone(),
                company_website,
                status: ApplicationStatus::Submitted,
                current_section: SectionKey::ALL.len() as i32,
                submitted_at: Some(now),
                expires_at: Application::expiry_for(now),
            })
            .await
            .map_err(MigrationError::ApplicationCreate)?;

        tracing::info!(application_id = %app.id, "Application created from local drafts");

        let sections_with_data = drafts.len();
        let rows: Vec<NewSection> = SectionKey::ALL
            .iter()
            .map(|&key| {
                let blob = drafts.get(&key).cloned().unwrap_or_else(|| json!({}));
                let has_data = blob.as_object().is_some_and(|m| !m.is_empty());
                NewSection {
                    application_id: app.id,
                    section_key: key,
                    status: if has_data {
                        SectionStatus::Submitted
                    } else {
                        SectionStatus::NotStarted
                    },
                    data: blob,
                    last_saved_at: Some(now),
                    submitted_at: Some(now),
                }
            })
            .collect();

        if let Err(e) = self.records.insert_sections(rows).await {
            tracing::error!(application_id = %app.id, error = %e, "Section insert failed during migration");
        }

        let mut files_uploaded = 0usize;
        let mut files_failed = 0usize;
        for (&key, files) in &self.files {
            for file in files {
                match self.upload_one(app.id, key, user.id, file).await {
                    Ok(()) => files_uploaded += 1,
                    Err(e) => {
                        files_failed += 1;
                        tracing::error!(
                            application_id = %app.id,
                            section = %key,
                            file = %file.name,
                            error = %e,
                            "File migration failed"
                        );
                    }
                }
            }
        }

        if let Err(e) = self
            .records
            .append_audit(NewAuditEntry {
                application_id: app.id,
                user_id: Some(user.id),
                action: AuditAction::ApplicationSubmitted,
                section_key: None,
                details: json!({
                    "source": "public_form",
                    "sections_with_data": sections_with_data,
                    "files_uploaded": files_uploaded,
                }),
            })
            .await
        {
            tracing::error!(application_id = %app.id, error = %e, "Audit append failed during migration");
        }

        // Fire-and-forget: the submission already succeeded, mail delivery
        // must not block or fail it.
        let summary = IntakeSummary::from_drafts(
            app.id,
            user,
            company_name.unwrap_or_default(),
            &drafts,
            sections_with_data,
            files_uploaded,
            now,
        );
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send_intake_summary(&summary).await {
                tracing::warn!(error = %e, "Intake summary notification failed");
            }
        });

        clear_all_drafts(&*self.drafts).await;
        self.files.clear();

        Ok(MigrationReport {
            application_id: app.id,
            sections_with_data,
            files_uploaded,
            files_failed,
        })
    }

    async fn upload_one(
        &self,
        application_id: Uuid,
        key: SectionKey,
        user_id: Uuid,
        file: &BufferedFile,
    ) -> Result<(), AppError> {
        let storage_path = format!(
            "{}/{}/{}_{}",
            application_id,
            key,
            Utc::now().timestamp_millis(),
            file.name
        );
        self.blobs
            .upload(&storage_path, &file.content_type, file.data.clone())
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        self.records
            .insert_document(NewDocument {
                application_id,
                section_key: key,
                checklist_item: None,
                file_name: file.name.clone(),
                file_size: file.data.len() as i64,
                file_type: file.content_type.clone(),
                storage_path,
                scan_status: ScanStatus::Pending,
                uploaded_by: Some(user_id),
            })
            .await?;
        Ok(())
    }
}

/// Scan drafts in step order and return the highest index where every step
/// up to and including it holds data that validates. Stops at the first
/// incomplete step; documents counts as complete in the anonymous flow.
async fn restore_watermark(drafts: &dyn DraftStore) -> Option<usize> {
    let stored = load_all_drafts(drafts).await;
    let mut highest = None;

    for (idx, key) in SectionKey::ALL.iter().enumerate() {
        if *key == SectionKey::Documents {
            highest = Some(idx);
            continue;
        }
        match stored.get(key) {
            Some(blob)
                if blob.as_object().is_some_and(|m| !m.is_empty())
                    && validate_section(*key, blob, &[]).is_empty() =>
            {
                highest = Some(idx);
            }
            _ => break,
        }
    }

    highest
}
