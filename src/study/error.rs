//! Failure taxonomy for a participant session.
//!
//! Fatal variants stop the current interaction until the operator
//! fixes the input. `Backend` and `StoreWrite` are recovered where
//! they happen and only ever reported.

/// Errors raised while running a study session.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    /// No participant identifier was supplied.
    #[error("Please add your user identifier (user_id)")]
    MissingIdentifier,
    /// The participant identifier is not an integer.
    #[error("Participant identifier '{0}' is not an integer")]
    InvalidIdentifier(String),
    /// The prompt store has no document for the assigned case.
    #[error("No prompt document found for case {0}")]
    PromptNotFound(u32),
    /// No uploaded document was available to choose from.
    #[error("No prompt documents were uploaded")]
    NoUploadedPrompts,
    /// The participant has no stored session yet.
    #[error("No session found for participant {0}")]
    SessionNotFound(String),
    /// The prompt store could not be listed or read.
    #[error("Prompt store unavailable: {0}")]
    PromptStore(String),
    /// The completion request failed.
    #[error("Error getting response: {0}")]
    Backend(String),
    /// Persisting the transcript failed.
    #[error("Failed to write transcript '{key}': {reason}")]
    StoreWrite { key: String, reason: String },
    /// A credential needed by a backend or store is not configured.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

impl StudyError {
    /// Whether the session can't proceed until the input is fixed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StudyError::Backend(_) | StudyError::StoreWrite { .. })
    }
}
