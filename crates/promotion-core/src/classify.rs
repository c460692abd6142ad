//! Classification of remote store failures.
//!
//! [`classify`] is a pure function of the failure signal. It never retries;
//! whether to try again is the caller's decision.

use roster_state::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Closed taxonomy of remote transition failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A student already belongs to the destination group (409).
    Conflict,
    /// A student's current status forbids the transition (426).
    IneligibleState,
    /// The payload was incomplete or malformed (400).
    InvalidRequest,
    /// No response was received.
    Unreachable,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status to a kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            409 => ErrorKind::Conflict,
            426 => ErrorKind::IneligibleState,
            400 => ErrorKind::InvalidRequest,
            _ => ErrorKind::Unknown,
        }
    }

    /// User-facing explanation of the failure.
    pub fn explanation(self) -> &'static str {
        match self {
            ErrorKind::Conflict => {
                "one or more students already belong to the destination group"
            }
            ErrorKind::IneligibleState => {
                "a selected student's current status does not allow this change"
            }
            ErrorKind::InvalidRequest => "the request sent to the server was incomplete",
            ErrorKind::Unreachable => "the server could not be reached; try again later",
            ErrorKind::Unknown => "the operation failed",
        }
    }
}

/// A classified remote failure: machine-readable kind plus the raw message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}: {message}", .kind.explanation())]
pub struct TransitionError {
    pub kind: ErrorKind,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Raw message from the store.
    pub message: String,
}

impl TransitionError {
    pub fn new(kind: ErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        TransitionError {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn explanation(&self) -> &'static str {
        self.kind.explanation()
    }
}

/// Classify a store failure.
pub fn classify(failure: &StoreError) -> TransitionError {
    match failure {
        StoreError::Rejected { status, message } => {
            TransitionError::new(ErrorKind::from_status(*status), Some(*status), message.clone())
        }
        StoreError::Unreachable(message) => {
            TransitionError::new(ErrorKind::Unreachable, None, message.clone())
        }
        StoreError::Decode(_) | StoreError::Config(_) => {
            TransitionError::new(ErrorKind::Unknown, None, failure.to_string())
        }
    }
}

impl From<StoreError> for TransitionError {
    fn from(failure: StoreError) -> Self {
        classify(&failure)
    }
}
