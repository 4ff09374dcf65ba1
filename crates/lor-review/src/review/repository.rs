use super::domain::{ApplicantRecord, ProfileDetails, ProfileUpdate, Username};

/// Storage abstraction so the controller can be exercised in isolation.
pub trait ApplicantRepository: Send + Sync {
    /// Every record in insertion order.
    fn list_all(&self) -> Result<Vec<ApplicantRecord>, RepositoryError>;
    fn get_by_username(&self, username: &Username) -> Result<ApplicantRecord, RepositoryError>;
    fn insert(&self, record: &ApplicantRecord) -> Result<(), RepositoryError>;
    /// Null-coalescing merge: `None` fields keep their stored value.
    fn update_partial(
        &self,
        username: &Username,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError>;
    fn update_full(
        &self,
        username: &Username,
        details: &ProfileDetails,
    ) -> Result<(), RepositoryError>;
    /// Returns whether a record was removed. Unknown usernames are not an error.
    fn delete(&self, username: &Username) -> Result<bool, RepositoryError>;
    /// Add each missing column as nullable text; existing columns are untouched.
    fn ensure_columns(&self, columns: &[&str]) -> Result<(), RepositoryError>;
    /// Signatory for generated letters; an empty admin table yields `None`.
    fn admin_username(&self) -> Result<Option<String>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("applicant '{0}' already exists")]
    Conflict(Username),
    #[error("applicant '{0}' not found")]
    NotFound(Username),
    #[error("'{0}' is not a valid column name")]
    InvalidColumn(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}
