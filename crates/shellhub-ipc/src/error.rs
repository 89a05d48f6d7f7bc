//! IPC Error types

use crate::ErrorCode;
use thiserror::Error;

/// Errors that can occur during IPC operations
#[derive(Debug, Error)]
pub enum IpcError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame size exceeded maximum
    #[error("Frame too large ({0} bytes)")]
    FrameTooLarge(usize),

    /// Failed to deserialize message
    #[error("Deserialization failed: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    /// Failed to serialize message
    #[error("Serialization failed: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    /// Request timed out
    #[error("Request timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Daemon not running
    #[error("Daemon not running (socket not found)")]
    DaemonNotRunning,

    /// The daemon answered with an error response
    #[error("Daemon error ({code:?}): {message}")]
    Remote { code: ErrorCode, message: String },

    /// The daemon answered with a response of the wrong shape
    #[error("Unexpected response")]
    UnexpectedResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: IpcError = io_err.into();
        let msg = format!("{}", err);
        assert!(msg.contains("IO error"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_error_display_frame_too_large() {
        let err = IpcError::FrameTooLarge(2_000_000);
        assert!(err.to_string().contains("2000000"));
    }

    #[test]
    fn test_error_display_remote() {
        let err = IpcError::Remote {
            code: ErrorCode::NotFound,
            message: "no document A/x".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("NotFound"));
        assert!(msg.contains("A/x"));
    }

    #[test]
    fn test_error_display_daemon_not_running() {
        let err = IpcError::DaemonNotRunning;
        let msg = format!("{}", err);
        assert!(msg.contains("Daemon not running"));
        assert!(msg.contains("socket"));
    }
}
