//! Intake wizard engine.
//!
//! Orchestrates the dual-mode section contract: the unified section facade,
//! the progressive-unlock wizard controller with its anonymous-to-
//! authenticated migration, the authenticated application lifecycle, the
//! document service, admin review, and the submission notifier.

pub mod admin;
pub mod application;
pub mod auth;
pub mod documents;
pub mod notify;
pub mod remote;
pub mod section;
pub mod wizard;

pub use admin::{AdminReview, ReviewBundle};
pub use application::ApplicationService;
pub use auth::{is_admin_email, AuthPhase, AuthenticatedUser, IdentityProvider, IdentityWatch};
pub use documents::DocumentService;
pub use notify::{IntakeSummary, Notifier, RecordingNotifier, SmtpNotifier};
pub use remote::RemoteSectionStore;
pub use section::SectionStore;
pub use wizard::{BufferedFile, MigrationError, MigrationReport, StepState, WizardController};
