//! Error types for the access guard

use thiserror::Error;

/// Access guard errors
#[derive(Debug, Error)]
pub enum AccessError {
    /// User or role does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Separation of duty violation
    #[error("Separation of duty conflict: {0}")]
    Conflict(String),

    /// The user's role changed between validation and write
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Role graph references rows that do not exist
    #[error("Role data integrity error: {0}")]
    DataIntegrity(String),

    /// Administrative data kept changing while the role graph was loaded
    #[error("Inconsistent role graph snapshot: {0}")]
    InconsistentSnapshot(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage backend error
    #[error("Store error: {0}")]
    Store(String),

    /// Bearer token rejected
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AccessError {
    fn from(err: sqlx::Error) -> Self {
        AccessError::Store(err.to_string())
    }
}

/// Result type for access guard operations
pub type Result<T> = std::result::Result<T, AccessError>;
