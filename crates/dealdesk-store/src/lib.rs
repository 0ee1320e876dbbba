//! Device-local persistence for the intake wizard.
//!
//! This crate holds the anonymous-mode side of the dual-mode section
//! contract: an injected key-value draft store with file-backed and
//! in-memory implementations, the debounced local section adapter built on
//! top of it, and the blob-storage port used for document uploads.

pub mod blob;
pub mod draft;
pub mod section;

pub use blob::{BlobError, BlobStorage, LocalBlobStorage, MemoryBlobStorage};
pub use draft::{DraftError, DraftStore, FileDraftStore, MemoryDraftStore};
pub use section::{clear_all_drafts, draft_key, load_all_drafts, LocalSectionStore};
