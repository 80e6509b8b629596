//! Error types for portal-core

use thiserror::Error;

/// Result type alias using portal-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Classified cause of a rejected remote operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteFault {
    /// The backend policy refused the request
    #[error("Permission denied. Please check the database security rules. ({0})")]
    PermissionDenied(String),

    /// Network or transport failure
    #[error("Error connecting to database: {0}")]
    Connection(String),
}

/// Errors that can occur in portal-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Anonymous identity could not be established
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Live subscription was rejected or lost
    #[error(transparent)]
    Remote(RemoteFault),

    /// A create or update mutation failed
    #[error("Failed to save changes: {0}")]
    Write(RemoteFault),

    /// Local input failed validation
    #[error("{0}")]
    Validation(String),

    /// Local preference storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error classification for callers that branch on the failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthFailure,
    PermissionDenied,
    ConnectionError,
    WriteFailure,
    ValidationError,
    StorageError,
    ConfigError,
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) => ErrorKind::AuthFailure,
            Self::Remote(RemoteFault::PermissionDenied(_)) => ErrorKind::PermissionDenied,
            Self::Remote(RemoteFault::Connection(_)) => ErrorKind::ConnectionError,
            Self::Write(_) => ErrorKind::WriteFailure,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::StorageError,
            Self::Config(_) => ErrorKind::ConfigError,
        }
    }
}

impl From<RemoteFault> for Error {
    fn from(fault: RemoteFault) -> Self {
        Self::Remote(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_failure_keeps_underlying_cause() {
        let error = Error::Write(RemoteFault::PermissionDenied("rules".to_string()));
        assert_eq!(error.kind(), ErrorKind::WriteFailure);
        assert!(error.to_string().contains("Permission denied"));
    }

    #[test]
    fn remote_faults_classify_by_cause() {
        assert_eq!(
            Error::from(RemoteFault::Connection("offline".to_string())).kind(),
            ErrorKind::ConnectionError
        );
        assert_eq!(
            Error::from(RemoteFault::PermissionDenied("rules".to_string())).kind(),
            ErrorKind::PermissionDenied
        );
    }
}
