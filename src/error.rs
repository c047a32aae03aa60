//! Error types for icon map resolution.
//!
//! `IconMapError` is `Clone` because a single fetch failure is handed to every
//! caller coalesced on the same pending load. Wrapped library errors are
//! therefore stored by message.

use std::io;
use thiserror::Error;

/// Result type for icon map operations
pub type Result<T> = std::result::Result<T, IconMapError>;

/// Errors that can occur while building, transporting or resolving icon maps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IconMapError {
    /// Malformed or unknown theme identifier at the transport boundary
    #[error("Invalid parameter value for '{param}': {message}")]
    Validation { param: &'static str, message: String },

    /// Network or transport failure while acquiring the map
    #[error("Failed to fetch icon map: {0}")]
    Fetch(String),

    /// The fetch did not complete within the configured timeout
    #[error("Icon map fetch timed out after {0} ms")]
    FetchTimeout(u64),

    /// The remote service answered with an exception payload
    #[error("Remote service error ({errorcode}): {message}")]
    Remote { errorcode: String, message: String },

    /// A persisted snapshot or response body could not be parsed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// A snapshot could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot storage I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The template renderer rejected the context
    #[error("Template error: {0}")]
    Template(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IconMapError {
    pub(crate) fn validation(param: &'static str, message: impl Into<String>) -> Self {
        IconMapError::Validation {
            param,
            message: message.into(),
        }
    }

    /// Whether a later `init()` may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IconMapError::Fetch(_) | IconMapError::FetchTimeout(_) | IconMapError::Io(_)
        )
    }
}

impl From<io::Error> for IconMapError {
    fn from(err: io::Error) -> Self {
        IconMapError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for IconMapError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IconMapError::Io(err.to_string())
        } else {
            IconMapError::Deserialization(err.to_string())
        }
    }
}

impl From<reqwest::Error> for IconMapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IconMapError::Deserialization(err.to_string())
        } else {
            IconMapError::Fetch(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = IconMapError::validation("themename", "contains '/'");
        assert!(err.to_string().contains("themename"));
        assert!(err.to_string().contains("contains '/'"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fetch_errors_are_retryable() {
        assert!(IconMapError::Fetch("connection refused".into()).is_retryable());
        assert!(IconMapError::FetchTimeout(30_000).is_retryable());
    }

    #[test]
    fn test_json_error_maps_to_deserialization() {
        let err: IconMapError = serde_json::from_str::<Vec<String>>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, IconMapError::Deserialization(_)));
    }
}
