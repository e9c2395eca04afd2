//! Core error types for REEL.

use crate::hash::HashError;
use crate::version::VersionError;
use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Hash mismatch
    HashMismatch {
        /// What was being checked (usually a file path)
        subject: String,
        /// Hash recorded alongside the content
        expected: String,
        /// Hash computed from the content
        actual: String,
    },

    /// Invalid hash text
    InvalidHash {
        /// Why parsing failed
        reason: String,
    },

    /// Invalid version text
    InvalidVersion {
        /// Why parsing failed
        reason: String,
    },

    /// Version is not readable by this build
    IncompatibleVersion {
        /// Version this build understands
        supported: String,
        /// Version found
        found: String,
    },

    /// Parse error
    ParseError {
        /// Parser message
        message: String,
    },

    /// Validation error
    Validation {
        /// Offending field
        field: String,
        /// Why it is invalid
        reason: String,
    },

    /// I/O failure while reading or writing a journal
    Io {
        /// Operation that failed
        operation: String,
        /// Underlying error message
        message: String,
    },
}

impl CoreError {
    /// Shorthand for a validation error
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the operation that produced it
    #[must_use]
    pub fn io(operation: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch {
                subject,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Hash mismatch for {}: expected {}, got {}",
                    subject, expected, actual
                )
            }
            Self::InvalidHash { reason } => write!(f, "Invalid hash: {}", reason),
            Self::InvalidVersion { reason } => write!(f, "Invalid version: {}", reason),
            Self::IncompatibleVersion { supported, found } => {
                write!(
                    f,
                    "Incompatible version: supports {}, found {}",
                    supported, found
                )
            }
            Self::ParseError { message } => write!(f, "Parse error: {}", message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::Io { operation, message } => write!(f, "I/O error during {}: {}", operation, message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<HashError> for CoreError {
    fn from(err: HashError) -> Self {
        Self::InvalidHash {
            reason: err.to_string(),
        }
    }
}

impl From<VersionError> for CoreError {
    fn from(err: VersionError) -> Self {
        Self::InvalidVersion {
            reason: err.to_string(),
        }
    }
}
