//! Fixed intake-wizard constants: timing windows, upload limits, and the
//! document checklist.

use std::time::Duration;

/// Days before an application expires and becomes read-only.
pub const APPLICATION_LIFETIME_DAYS: i64 = 45;

/// Quiet period before a local draft edit is flushed to device storage.
pub const LOCAL_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Quiet period before a remote section edit is flushed to the record store.
/// Longer than the local window because every flush is a network write.
pub const REMOTE_SAVE_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Lifetime of minted document download URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Namespace prefix for device-local draft keys, one key per section.
pub const DRAFT_KEY_PREFIX: &str = "dealdesk_intake_";

/// Maximum accepted upload size (50 MiB).
pub const MAX_FILE_SIZE_BYTES: i64 = 50 * 1024 * 1024;

/// Content types accepted for document uploads.
pub const ALLOWED_CONTENT_TYPES: [&str; 6] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/png",
    "image/jpeg",
];

/// One diligence-checklist entry for the documents section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistItem {
    pub key: &'static str,
    pub label: &'static str,
    pub required: bool,
}

/// Full diligence checklist, in display order. The required entries gate the
/// documents section validator.
pub const DOCUMENT_CHECKLIST: [ChecklistItem; 22] = [
    ChecklistItem { key: "pitch_deck", label: "Pitch Deck", required: true },
    ChecklistItem { key: "executive_summary", label: "Executive Summary", required: true },
    ChecklistItem { key: "financial_statements_2y", label: "Financial Statements (2 years)", required: true },
    ChecklistItem { key: "tax_returns_2y", label: "Tax Returns (2 years)", required: true },
    ChecklistItem { key: "balance_sheet", label: "Current Balance Sheet", required: true },
    ChecklistItem { key: "pl_statement", label: "P&L Statement", required: true },
    ChecklistItem { key: "cash_flow_statement", label: "Cash Flow Statement", required: true },
    ChecklistItem { key: "cap_table_doc", label: "Cap Table Document", required: true },
    ChecklistItem { key: "articles_incorporation", label: "Articles of Incorporation", required: true },
    ChecklistItem { key: "operating_agreement", label: "Operating Agreement", required: false },
    ChecklistItem { key: "bylaws", label: "Corporate Bylaws", required: false },
    ChecklistItem { key: "shareholder_agreement", label: "Shareholder Agreement", required: false },
    ChecklistItem { key: "ip_documentation", label: "IP Documentation (Patents/Trademarks)", required: false },
    ChecklistItem { key: "customer_contracts", label: "Key Customer Contracts", required: false },
    ChecklistItem { key: "vendor_contracts", label: "Key Vendor Contracts", required: false },
    ChecklistItem { key: "employee_agreements", label: "Employee/Contractor Agreements", required: false },
    ChecklistItem { key: "insurance_policies", label: "Insurance Policies", required: false },
    ChecklistItem { key: "litigation_summary", label: "Litigation Summary", required: false },
    ChecklistItem { key: "org_chart", label: "Organization Chart", required: false },
    ChecklistItem { key: "brand_guidelines", label: "Brand Guidelines / Assets", required: false },
    ChecklistItem { key: "market_research", label: "Market Research / TAM Analysis", required: false },
    ChecklistItem { key: "other", label: "Other Supporting Documents", required: false },
];

/// Checklist keys that must have a non-deleted upload before the documents
/// section validates.
pub fn required_checklist_keys() -> impl Iterator<Item = &'static str> {
    DOCUMENT_CHECKLIST
        .iter()
        .filter(|item| item.required)
        .map(|item| item.key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_checklist_items_are_required() {
        assert_eq!(required_checklist_keys().count(), 9);
    }

    #[test]
    fn checklist_keys_are_unique() {
        let mut keys: Vec<&str> = DOCUMENT_CHECKLIST.iter().map(|i| i.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), DOCUMENT_CHECKLIST.len());
    }
}
