use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SectionKey;

/// Malware-scan state for an uploaded file. Scanning itself is performed by
/// an external service; the core only records the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Clean,
    Infected,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => "infected",
        }
    }

    pub fn parse(s: &str) -> Option<ScanStatus> {
        match s {
            "pending" => Some(ScanStatus::Pending),
            "clean" => Some(ScanStatus::Clean),
            "infected" => Some(ScanStatus::Infected),
            _ => None,
        }
    }
}

/// An uploaded file tied to an application and optionally to a diligence
/// checklist item. Never hard-deleted; `deleted_at` hides it from listings
/// and validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub application_id: Uuid,
    pub section_key: SectionKey,
    pub checklist_item: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub storage_path: String,
    pub scan_status: ScanStatus,
    pub uploaded_by: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True for live documents fulfilling the given checklist item.
    pub fn fulfills(&self, checklist_key: &str) -> bool {
        !self.is_deleted() && self.checklist_item.as_deref() == Some(checklist_key)
    }
}
