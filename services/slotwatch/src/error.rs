//! Error types for the watcher service.

use thiserror::Error;

/// Failure delivering a message to one subscriber.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The chat API could not be reached or timed out.
    #[error("chat transport error: {0}")]
    Transport(String),

    /// The chat API refused the message.
    #[error("chat API rejected message (status {status}): {description}")]
    Rejected { status: u16, description: String },

    /// The chat API answered with something we could not decode.
    #[error("invalid chat API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DeliveryError::InvalidResponse(err.to_string())
        } else {
            DeliveryError::Transport(err.to_string())
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} has an invalid probe target: {reason}")]
    InvalidTarget { var: &'static str, reason: String },

    #[error("{var} must name at least one probe target")]
    NoTargets { var: &'static str },

    #[error("{var} must be one of {expected}, got {value:?}")]
    InvalidChoice {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}
