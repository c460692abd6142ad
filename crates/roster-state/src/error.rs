//! Error types for roster-state

use thiserror::Error;

/// Errors that can occur talking to the roster store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend answered with a non-success status
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// No response was received (connect failure, timeout, dropped connection)
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// A response arrived but its body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The store was configured with unusable settings
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// HTTP status of the response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        StoreError::Rejected {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            StoreError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else if err.is_builder() {
            StoreError::Config(err.to_string())
        } else {
            StoreError::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}
