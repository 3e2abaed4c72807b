use thiserror::Error;

/// Failures of Message Store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing message, or one in a thread the caller cannot see.
    #[error("{0} not found")]
    NotFound(String),

    /// Caller is not the author of the message it tries to change.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl StoreError {
    pub fn message_not_found(id: i64) -> Self {
        Self::NotFound(format!("message {}", id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
