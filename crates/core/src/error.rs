use corridor_types::TextError;

/// Errors raised by the corridor core.
///
/// The first four variants are the workflow taxonomy. Validation and guard failures are
/// reported to the caller with the record left untouched. Unknown ids on update or delete
/// are not errors at all; they surface as [`crate::Outcome::NotFound`]. The remaining
/// variants belong to the JSON record store.
#[derive(Debug, thiserror::Error)]
pub enum CorridorError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("transition not allowed: {0}")]
    GuardViolation(String),
    #[error("patient not found: {0}")]
    NotFound(String),
    #[error("advisory service unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read patient file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write patient file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to delete patient file: {0}")]
    FileDelete(std::io::Error),
    #[error("failed to serialize patient: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize patient: {0}")]
    Deserialization(serde_json::Error),
    #[error("invalid patient record: {0}")]
    InvalidRecord(String),
    #[error("record store lock poisoned")]
    LockPoisoned,
}

impl CorridorError {
    /// True for the errors a caller is expected to recover from locally by rejecting the
    /// action.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CorridorError::Validation(_) | CorridorError::GuardViolation(_)
        )
    }
}

impl From<TextError> for CorridorError {
    fn from(err: TextError) -> Self {
        CorridorError::Validation(err.to_string())
    }
}

pub type CorridorResult<T> = std::result::Result<T, CorridorError>;
