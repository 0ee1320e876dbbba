//! Record-store access layer.
//!
//! The remote relational store is reached through the `RecordStore` port:
//! CRUD over the four record kinds (applications, sections, documents,
//! audit log entries). `PgRecordStore` is the Postgres backend;
//! `MemoryRecordStore` substitutes it in tests and embedded setups.

mod memory;
mod postgres;
mod records;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use records::{
    ApplicationFilter, NewApplication, NewAuditEntry, NewDocument, NewSection, RecordStore,
};
