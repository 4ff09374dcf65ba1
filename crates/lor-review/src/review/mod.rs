//! Recommendation letter review: applicant storage, branch normalization,
//! letter generation, and the reviewer actions that tie them together.

pub mod artifact;
pub mod branch;
pub mod controller;
pub mod domain;
pub mod letter;
pub mod notify;
pub mod repository;
pub mod roster;
pub mod router;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use artifact::{ArtifactError, ArtifactStore, FsArtifactStore};
pub use branch::{BranchMatch, BranchMatcher, MeasureKind, SimilarityMeasure};
pub use controller::{
    ApprovalReport, ReviewAction, ReviewCommand, ReviewController, ReviewError, ReviewOutcome,
    Stage, StageError, SubmissionOutcome, ValidationError,
};
pub use domain::{ApplicantRecord, ProfileDetails, ProfileUpdate, Requirement, Username};
pub use letter::{LetterComposer, LetterFields, TemplateCatalog, TemplateError};
pub use notify::{NotificationDispatcher, OutboundMessage, SmtpDispatcher, TransportError};
pub use repository::{ApplicantRepository, RepositoryError};
pub use roster::write_roster;
pub use router::review_router;
pub use sqlite::SqliteApplicantRepository;
