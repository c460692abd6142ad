//! Error taxonomy for the promotion engine.
//!
//! Local validation failures (nothing was sent) are distinct variants from
//! remote failures, which always carry a classified [`TransitionError`].

use roster_state::{GroupId, StudentId};
use thiserror::Error;

use crate::classify::TransitionError;
use crate::executor::BatchFailure;

/// Errors produced by planning, executing or refreshing transitions.
#[derive(Debug, Clone, Error)]
pub enum PromotionError {
    /// The selection in scope is empty.
    #[error("select at least one student")]
    NoSelection,

    /// "Apply to all" was requested but some groups have no target group.
    #[error("no target group selected for: {}", .group_names.join(", "))]
    MissingTarget {
        group_ids: Vec<GroupId>,
        group_names: Vec<String>,
    },

    /// The group is not part of the loaded roster.
    #[error("group {0} is not in the loaded roster")]
    UnknownGroup(GroupId),

    /// The student is not in the loaded roster, or not in the given group.
    #[error("student {student} is not in the loaded roster")]
    UnknownStudent {
        group: Option<GroupId>,
        student: StudentId,
    },

    /// The chosen target is not an eligible destination for the source group.
    #[error("group {target} is not an eligible target for group {from}")]
    IneligibleTarget { from: GroupId, target: GroupId },

    /// A transition or refresh is still in flight.
    #[error("another transition is still in progress")]
    Busy,

    /// A single remote call failed.
    #[error(transparent)]
    Remote(#[from] TransitionError),

    /// A batch failed part-way; earlier requests stay applied.
    #[error(transparent)]
    Batch(#[from] BatchFailure),
}

impl PromotionError {
    /// `true` when the error was raised before any network call.
    pub fn is_local(&self) -> bool {
        !matches!(self, PromotionError::Remote(_) | PromotionError::Batch(_))
    }

    /// The classified remote failure, if this error came from the store.
    pub fn transition_error(&self) -> Option<&TransitionError> {
        match self {
            PromotionError::Remote(err) => Some(err),
            PromotionError::Batch(failure) => Some(&failure.error),
            _ => None,
        }
    }
}

/// Result type for promotion operations.
pub type Result<T> = std::result::Result<T, PromotionError>;
