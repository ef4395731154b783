//! Error types for availability probes.

use thiserror::Error;

/// Errors that can occur while probing the scheduling source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Connection failure, timeout, or an unreadable response stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The source answered with a non-success status code.
    #[error("scheduling source returned status {0}")]
    BadStatus(u16),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProbeError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ProbeError::BadStatus(status.as_u16())
        } else {
            ProbeError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Decode(err.to_string())
    }
}
