//! Data models for the intake pipeline
//!
//! One sub-module per record kind: applications, sections, documents, and
//! audit log entries.

mod application;
mod audit;
mod document;
mod section;

pub use application::*;
pub use audit::*;
pub use document::*;
pub use section::*;
