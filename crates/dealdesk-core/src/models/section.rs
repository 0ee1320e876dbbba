use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The ten fixed wizard sections, in step order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Company,
    Transaction,
    FinancialsHist,
    FinancialsProj,
    CapTable,
    Valuation,
    UseOfProceeds,
    Kpis,
    Documents,
    Summary,
}

impl SectionKey {
    /// All sections in wizard order (steps 0..=9).
    pub const ALL: [SectionKey; 10] = [
        SectionKey::Company,
        SectionKey::Transaction,
        SectionKey::FinancialsHist,
        SectionKey::FinancialsProj,
        SectionKey::CapTable,
        SectionKey::Valuation,
        SectionKey::UseOfProceeds,
        SectionKey::Kpis,
        SectionKey::Documents,
        SectionKey::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Company => "company",
            SectionKey::Transaction => "transaction",
            SectionKey::FinancialsHist => "financials_hist",
            SectionKey::FinancialsProj => "financials_proj",
            SectionKey::CapTable => "cap_table",
            SectionKey::Valuation => "valuation",
            SectionKey::UseOfProceeds => "use_of_proceeds",
            SectionKey::Kpis => "kpis",
            SectionKey::Documents => "documents",
            SectionKey::Summary => "summary",
        }
    }

    pub fn parse(s: &str) -> Option<SectionKey> {
        SectionKey::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Zero-based wizard step index.
    pub fn index(&self) -> usize {
        SectionKey::ALL
            .iter()
            .position(|k| k == self)
            .unwrap_or_default()
    }

    /// One-based ordinal as stored on the section row (1..=10).
    pub fn number(&self) -> i32 {
        self.index() as i32 + 1
    }

    pub fn from_index(idx: usize) -> Option<SectionKey> {
        SectionKey::ALL.get(idx).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            SectionKey::Company => "Company",
            SectionKey::Transaction => "Transaction",
            SectionKey::FinancialsHist => "Historical Financials",
            SectionKey::FinancialsProj => "Projected Financials",
            SectionKey::CapTable => "Cap Table",
            SectionKey::Valuation => "Valuation",
            SectionKey::UseOfProceeds => "Use of Proceeds",
            SectionKey::Kpis => "KPIs & Operations",
            SectionKey::Documents => "Documents",
            SectionKey::Summary => "Summary & Attestation",
        }
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-section review status as stored on the section row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    NotStarted,
    InProgress,
    Submitted,
    Accepted,
    NeedsUpdate,
    AdditionalInfoRequested,
    Locked,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionStatus::NotStarted => "not_started",
            SectionStatus::InProgress => "in_progress",
            SectionStatus::Submitted => "submitted",
            SectionStatus::Accepted => "accepted",
            SectionStatus::NeedsUpdate => "needs_update",
            SectionStatus::AdditionalInfoRequested => "additional_info_requested",
            SectionStatus::Locked => "locked",
        }
    }

    pub fn parse(s: &str) -> Option<SectionStatus> {
        match s {
            "not_started" => Some(SectionStatus::NotStarted),
            "in_progress" => Some(SectionStatus::InProgress),
            "submitted" => Some(SectionStatus::Submitted),
            "accepted" => Some(SectionStatus::Accepted),
            "needs_update" => Some(SectionStatus::NeedsUpdate),
            "additional_info_requested" => Some(SectionStatus::AdditionalInfoRequested),
            "locked" => Some(SectionStatus::Locked),
            _ => None,
        }
    }
}

/// One of the ten form slots of an application. The `data` blob is free-form
/// per section key and opaque to the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub application_id: Uuid,
    pub section_key: SectionKey,
    pub section_number: i32,
    pub status: SectionStatus,
    pub data: Value,
    pub reviewer_notes: Option<String>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Section {
    /// True when the data blob holds at least one field.
    pub fn has_data(&self) -> bool {
        blob_has_data(&self.data)
    }
}

/// True when a section data blob is a non-empty JSON object.
pub fn blob_has_data(data: &Value) -> bool {
    data.as_object().map(|m| !m.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_keys_are_ordered_one_to_ten() {
        assert_eq!(SectionKey::Company.number(), 1);
        assert_eq!(SectionKey::Summary.number(), 10);
        assert_eq!(SectionKey::from_index(4), Some(SectionKey::CapTable));
        assert_eq!(SectionKey::from_index(10), None);
    }

    #[test]
    fn section_key_round_trips_through_str() {
        for key in SectionKey::ALL {
            assert_eq!(SectionKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(SectionKey::parse("payroll"), None);
    }

    #[test]
    fn section_status_round_trips_through_str() {
        for s in [
            SectionStatus::NotStarted,
            SectionStatus::InProgress,
            SectionStatus::Submitted,
            SectionStatus::Accepted,
            SectionStatus::NeedsUpdate,
            SectionStatus::AdditionalInfoRequested,
            SectionStatus::Locked,
        ] {
            assert_eq!(SectionStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn blob_has_data_requires_non_empty_object() {
        assert!(blob_has_data(&json!({"legal_name": "Acme"})));
        assert!(!blob_has_data(&json!({})));
        assert!(!blob_has_data(&Value::Null));
        assert!(!blob_has_data(&json!([1, 2])));
    }
}
