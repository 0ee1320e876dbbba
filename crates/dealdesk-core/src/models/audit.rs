use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::SectionKey;

/// Actions recorded in the append-only audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ApplicationCreated,
    SectionSaved,
    FileUploaded,
    ApplicationSubmitted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ApplicationCreated => "application_created",
            AuditAction::SectionSaved => "section_saved",
            AuditAction::FileUploaded => "file_uploaded",
            AuditAction::ApplicationSubmitted => "application_submitted",
        }
    }

    pub fn parse(s: &str) -> Option<AuditAction> {
        match s {
            "application_created" => Some(AuditAction::ApplicationCreated),
            "section_saved" => Some(AuditAction::SectionSaved),
            "file_uploaded" => Some(AuditAction::FileUploaded),
            "application_submitted" => Some(AuditAction::ApplicationSubmitted),
            _ => None,
        }
    }
}

/// Immutable record of a significant action against an application.
/// Append-only: entries are never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub application_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub section_key: Option<SectionKey>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_action_round_trips_through_str() {
        for action in [
            AuditAction::ApplicationCreated,
            AuditAction::SectionSaved,
            AuditAction::FileUploaded,
            AuditAction::ApplicationSubmitted,
        ] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("section_deleted"), None);
    }
}
