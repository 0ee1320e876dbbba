//! Per-section validation rules.
//!
//! One pure function per section key; each returns an ordered list of
//! human-readable error strings (empty = valid). These are advisory gates
//! for wizard advancement, enforced client-side only.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::calc::loose_field;
use crate::constants::required_checklist_keys;
use crate::models::{Document, SectionKey};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

/// Validate one section's data blob. The documents section additionally
/// needs the application's non-deleted document list.
pub fn validate_section(key: SectionKey, data: &Value, documents: &[Document]) -> Vec<String> {
    match key {
        SectionKey::Company => validate_company(data),
        SectionKey::Transaction => validate_transaction(data),
        SectionKey::FinancialsHist => validate_financials_hist(data),
        SectionKey::FinancialsProj => validate_financials_proj(data),
        SectionKey::CapTable => validate_cap_table(data),
        SectionKey::Valuation => validate_valuation(data),
        SectionKey::UseOfProceeds => validate_use_of_proceeds(data),
        SectionKey::Kpis => validate_kpis(data),
        SectionKey::Documents => validate_documents(data, documents),
        SectionKey::Summary => validate_summary(data),
    }
}

/// Trimmed non-empty string field, if present.
fn text<'a>(data: &'a Value, field: &str) -> Option<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// True when a field is absent, null, or an empty string. Numbers count as
/// entered.
fn is_blank(data: &Value, field: &str) -> bool {
    match data.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn is_truthy(data: &Value, field: &str) -> bool {
    match data.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) != 0.0,
        _ => false,
    }
}

pub fn validate_company(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if text(data, "legal_name").is_none() {
        errors.push("Legal name is required".to_string());
    }
    if is_blank(data, "industry") {
        errors.push("Industry is required".to_string());
    }
    if is_blank(data, "business_model") {
        errors.push("Business model is required".to_string());
    }
    if is_blank(data, "stage") {
        errors.push("Company stage is required".to_string());
    }
    if text(data, "founder_name").is_none() {
        errors.push("Founder / CEO name is required".to_string());
    }
    match text(data, "founder_email") {
        None => errors.push("Founder / CEO email is required".to_string()),
        Some(email) if !EMAIL_RE.is_match(email) => {
            errors.push("Founder email is not valid".to_string());
        }
        Some(_) => {}
    }
    if let Some(website) = text(data, "website") {
        if !website.starts_with("http://") && !website.starts_with("https://") {
            errors.push("Website must start with http:// or https://".to_string());
        }
    }
    errors
}

pub fn validate_transaction(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if is_blank(data, "path") {
        errors.push("Transaction path is required".to_string());
    }
    // An M&A-only path carries no investment terms.
    let is_ma = data.get("path").and_then(Value::as_str) == Some("ma");
    if is_blank(data, "investment_amount") && !is_ma {
        errors.push("Investment amount is required".to_string());
    }
    if is_blank(data, "security_type") && !is_ma {
        errors.push("Security type is required".to_string());
    }
    errors
}

pub fn validate_financials_hist(data: &Value) -> Vec<String> {
    let months = data
        .get("monthly_data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let has_any = months.iter().any(|m| match m.get("revenue") {
        Some(Value::Null) | None => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    });
    if has_any {
        Vec::new()
    } else {
        vec!["At least one month of historical financials is required".to_string()]
    }
}

pub fn validate_financials_proj(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if is_blank(data, "revenue_cagr") {
        errors.push("Revenue CAGR is required".to_string());
    }
    if is_blank(data, "gross_margin_target") {
        errors.push("Gross margin target is required".to_string());
    }
    errors
}

pub fn validate_cap_table(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if is_blank(data, "common_shares") {
        errors.push("Common shares outstanding is required".to_string());
    }
    if is_blank(data, "pre_money_valuation") {
        errors.push("Pre-money valuation is required".to_string());
    }
    errors
}

pub fn validate_valuation(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if is_blank(data, "wacc") {
        errors.push("WACC / discount rate is required".to_string());
    }
    if is_blank(data, "terminal_growth_rate") {
        errors.push("Terminal growth rate is required".to_string());
    }
    let weight_sum = loose_field(data, "dcf_weight")
        + loose_field(data, "comps_weight")
        + loose_field(data, "precedent_weight");
    if (weight_sum - 100.0).abs() > 0.01 {
        errors.push("Valuation weights must sum to 100%".to_string());
    }
    errors
}

pub fn validate_use_of_proceeds(data: &Value) -> Vec<String> {
    let categories = data
        .get("categories")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let has_any = categories
        .iter()
        .any(|c| !is_blank(c, "category") && !is_blank(c, "amount"));
    if has_any {
        Vec::new()
    } else {
        vec!["At least one use of proceeds category is required".to_string()]
    }
}

pub fn validate_kpis(data: &Value) -> Vec<String> {
    let kpis = data
        .get("kpis")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let has_any = kpis.iter().any(|k| text(k, "current_value").is_some());
    if has_any {
        Vec::new()
    } else {
        vec!["At least one KPI with a current value is required".to_string()]
    }
}

pub fn validate_documents(_data: &Value, documents: &[Document]) -> Vec<String> {
    let mut errors = Vec::new();
    for key in required_checklist_keys() {
        if !documents.iter().any(|d| d.fulfills(key)) {
            errors.push(format!("Required document missing: {}", title_case(key)));
        }
    }
    errors
}

pub fn validate_summary(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if !is_truthy(data, "attested") {
        errors.push("You must check the attestation box".to_string());
    }
    if text(data, "attested_name").is_none() {
        errors.push("Your full name is required for attestation".to_string());
    }
    if text(data, "attested_title").is_none() {
        errors.push("Your title is required for attestation".to_string());
    }
    errors
}

/// `pitch_deck` -> `Pitch Deck`, for human-readable checklist errors.
fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
