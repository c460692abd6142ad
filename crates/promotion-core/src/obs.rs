//! Structured observability hooks for the promotion workflow.
//!
//! This module provides:
//! - Batch-scoped tracing spans via the `BatchSpan` RAII guard
//! - Emission functions for key lifecycle events: plan built, request sent,
//!   request failed, batch finished, roster refreshed

use tracing::{info, warn};
use uuid::Uuid;

use crate::classify::TransitionError;
use crate::planner::TransitionKind;

/// The batch-scoped span, for attaching to futures with `Instrument`.
pub fn batch_span(batch_id: Uuid) -> tracing::Span {
    tracing::info_span!("promotion.batch", batch_id = %batch_id)
}

/// RAII guard that enters a batch-scoped tracing span.
///
/// The guard is not `Send`; inside async code use [`batch_span`] with
/// `Instrument` instead.
///
/// # Example
///
/// ```ignore
/// let _span = BatchSpan::enter(plan.batch_id);
/// // every event below is tagged with batch_id
/// ```
pub struct BatchSpan {
    _span: tracing::span::EnteredSpan,
}

impl BatchSpan {
    pub fn enter(batch_id: Uuid) -> Self {
        Self {
            _span: batch_span(batch_id).entered(),
        }
    }
}

fn kind_label(kind: &TransitionKind) -> &'static str {
    match kind {
        TransitionKind::StatusChange { .. } => "status_change",
        TransitionKind::GroupMove { .. } => "group_move",
    }
}

/// Emit event: a plan was built from the current selection.
pub fn emit_plan_built(batch_id: Uuid, requests: usize, students: usize, concurrent: bool) {
    info!(
        event = "plan.built",
        batch_id = %batch_id,
        requests = requests,
        students = students,
        concurrent = concurrent,
    );
}

/// Emit event: one request handed to the store.
pub fn emit_transition_sent(batch_id: Uuid, kind: &TransitionKind, students: usize) {
    info!(
        event = "transition.sent",
        batch_id = %batch_id,
        kind = kind_label(kind),
        students = students,
    );
}

/// Emit event: the store rejected a request or never answered (warning level).
pub fn emit_transition_failed(batch_id: Uuid, kind: &TransitionKind, error: &TransitionError) {
    warn!(
        event = "transition.failed",
        batch_id = %batch_id,
        kind = kind_label(kind),
        error_kind = ?error.kind,
        status = ?error.status,
        message = %error.message,
    );
}

/// Emit event: every request of a batch has resolved.
pub fn emit_batch_finished(batch_id: Uuid, applied: usize, attempted: usize) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        applied = applied,
        attempted = attempted,
        success = applied == attempted,
    );
}

/// Emit event: the roster snapshot was re-fetched from the store.
pub fn emit_roster_refreshed(groups: usize, students: usize) {
    info!(event = "roster.refreshed", groups = groups, students = students);
}
