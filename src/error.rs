//! Error types for qbrack operations.

use thiserror::Error;

/// Result type alias for qbrack operations.
pub type Result<T> = std::result::Result<T, QbrackError>;

/// Main error type for qbrack operations.
#[derive(Error, Debug)]
pub enum QbrackError {
    /// Database errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input that never reached validation (bad ids, bad arguments)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input rejected by a domain rule; the payload is a stable code
    #[error("Validation error: {0}")]
    Validation(String),

    /// A row addressed by id, name or path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Password hashing or verification errors
    #[error("Password error: {0}")]
    Password(String),

    /// Too many operations from one client
    #[error("Rate limited: {0}")]
    RateLimited(String),
}

impl QbrackError {
    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new invalid input error.
    pub fn invalid_input<T: ToString>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new conflict error.
    pub fn conflict<T: ToString>(msg: T) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Creates a new password error.
    pub fn password<T: ToString>(msg: T) -> Self {
        Self::Password(msg.to_string())
    }

    /// Creates a new rate limit error.
    pub fn rate_limited<T: ToString>(msg: T) -> Self {
        Self::RateLimited(msg.to_string())
    }

    /// The validation code, if this is a validation error.
    pub fn validation_code(&self) -> Option<&str> {
        match self {
            Self::Validation(code) => Some(code),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for QbrackError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => Self::Storage(err.to_string()),
        }
    }
}
