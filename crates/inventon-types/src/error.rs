use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a core operation can report to its caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field was missing or blank.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("invalid status '{0}' (expected one of: open, in_progress, solved, closed)")]
    InvalidStatus(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The record store could not be reached or failed internally.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
