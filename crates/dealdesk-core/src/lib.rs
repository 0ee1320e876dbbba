//! Dealdesk Core Library
//!
//! This crate provides the domain models, error types, configuration, section
//! validators, and derived-field calculators shared across all dealdesk
//! components.

pub mod calc;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use models::{
    Application, ApplicationStatus, AuditAction, AuditLogEntry, Document, ScanStatus, Section,
    SectionKey, SectionStatus,
};
