//! Index error types.

use shellhub_core::CoreError;
use thiserror::Error;

/// Errors that can occur in index, cache and hierarchy operations.
///
/// Lookup misses are not errors: reads return `None` or an empty page.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Backing store failure; the mutation that hit it was rolled back
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Content could not be loaded from its source
    #[error("Load error for {key}: {message}")]
    Load { key: String, message: String },

    /// Invalid source or configuration
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<rusqlite::Error> for IndexError {
    fn from(e: rusqlite::Error) -> Self {
        IndexError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for IndexError {
    fn from(e: tokio::task::JoinError) -> Self {
        IndexError::Storage(format!("storage task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_error_maps_to_storage() {
        let err: IndexError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, IndexError::Storage(_)));
    }

    #[test]
    fn test_configuration_error_passes_through() {
        let err: IndexError = CoreError::Configuration("bad locator".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: bad locator");
    }
}
