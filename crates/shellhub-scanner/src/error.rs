//! Scanner error types.

use shellhub_core::{CoreError, SourceKind};
use shellhub_index::IndexError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scanning sources or managing endpoints.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Malformed or unsupported source locator
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A source with this name already exists
    #[error("Endpoint already exists: {0}")]
    Conflict(String),

    /// No driver is available for the source kind
    #[error("No resource driver for {0} sources")]
    Unsupported(SourceKind),

    /// I/O error while reading a source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A container could not be decoded
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Part of the source could not be listed
    #[error("Incomplete listing: {0}")]
    Incomplete(String),

    /// Driver-specific failure
    #[error("Driver error: {0}")]
    Driver(String),

    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// The orchestrator is no longer running
    #[error("Orchestrator stopped")]
    Stopped,
}

impl From<CoreError> for ScanError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Configuration(message) => ScanError::Configuration(message),
            CoreError::Io(e) => ScanError::Io(e),
            CoreError::Serialization(message) => ScanError::Driver(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_keeps_kind() {
        let err: ScanError = CoreError::Configuration("bad locator".to_string()).into();
        assert!(matches!(err, ScanError::Configuration(_)));
    }

    #[test]
    fn test_unsupported_display() {
        let err = ScanError::Unsupported(SourceKind::OpcUa);
        assert_eq!(err.to_string(), "No resource driver for opc_ua sources");
    }
}
