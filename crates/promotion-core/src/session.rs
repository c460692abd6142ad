//! The promotion workflow: plan, execute, patch locally, refresh.
//!
//! A [`PromotionSession`] owns the roster snapshot, the selection and the
//! per-group target assignments. Every confirmed transition is followed by
//! a full re-fetch from the store, which stays the source of truth.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use roster_state::{GroupId, PromotionStatus, RosterStore, StudentId};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::classify::TransitionError;
use crate::error::{PromotionError, Result};
use crate::executor::{BatchFailure, ExecutionReport, ExecutorConfig, TransitionExecutor};
use crate::metrics::METRICS;
use crate::obs;
use crate::planner::{TargetAssignments, TransitionIntent, TransitionPlanner};
use crate::roster::Roster;
use crate::selection::{SelectionScope, SelectionState};

/// Who is operating the session, and for which academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub academic_year: i32,
    pub operator: Option<String>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            academic_year: Utc::now().year(),
            operator: None,
        }
    }
}

impl SessionContext {
    pub fn new(academic_year: i32) -> Self {
        Self {
            academic_year,
            operator: None,
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

/// What a confirmed transition did.
#[must_use = "a transition outcome may carry a remote failure"]
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub batch_id: Uuid,
    pub intent: TransitionIntent,
    pub attempted: usize,
    pub applied_requests: usize,
    /// Students covered by accepted requests.
    pub students: usize,
    /// First failure in plan order.
    pub error: Option<TransitionError>,
    /// Set when the follow-up refresh failed; the roster then holds only the
    /// optimistic patch.
    pub refresh_error: Option<TransitionError>,
}

impl TransitionOutcome {
    fn new(
        intent: TransitionIntent,
        report: &ExecutionReport,
        refresh_error: Option<TransitionError>,
    ) -> Self {
        TransitionOutcome {
            batch_id: report.batch_id,
            intent,
            attempted: report.attempted(),
            applied_requests: report.applied_requests(),
            students: report.applied_students(),
            error: report.first_error().cloned(),
            refresh_error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn verb(&self) -> String {
        match self.intent {
            TransitionIntent::PromoteGroup(_) | TransitionIntent::PromoteAll => {
                "promoted".to_string()
            }
            TransitionIntent::ChangeStatus { status, .. } => format!("marked {status}"),
        }
    }

    /// One-line human summary, e.g. `5 students promoted`.
    pub fn summary(&self) -> String {
        let noun = if self.students == 1 { "student" } else { "students" };
        let mut line = match &self.error {
            None => format!("{} {noun} {}", self.students, self.verb()),
            Some(err) if self.applied_requests == 0 => {
                format!("no students {}: {err}", self.verb())
            }
            Some(err) => format!(
                "{} {noun} {}; {} of {} requests failed: {err}",
                self.students,
                self.verb(),
                self.attempted - self.applied_requests,
                self.attempted,
            ),
        };
        if let Some(err) = &self.refresh_error {
            line.push_str(&format!(" (roster not refreshed: {err})"));
        }
        line
    }

    /// Surface a remote failure as an error.
    ///
    /// A single request that failed becomes [`PromotionError::Remote`]; any
    /// other failure becomes [`PromotionError::Batch`] with the applied count.
    pub fn into_result(self) -> Result<Self> {
        match self.error.clone() {
            None => Ok(self),
            Some(error) if self.attempted == 1 => Err(PromotionError::Remote(error)),
            Some(error) => Err(PromotionError::Batch(BatchFailure {
                applied: self.applied_requests,
                attempted: self.attempted,
                error,
            })),
        }
    }
}

/// Interactive promotion state over one roster store.
pub struct PromotionSession {
    executor: TransitionExecutor,
    context: SessionContext,
    roster: Roster,
    selection: SelectionState,
    targets: TargetAssignments,
    refresh_pending: bool,
}

impl PromotionSession {
    /// Fetch the roster and the active groups, and preselect every
    /// promotable student.
    #[instrument(skip(store, config), fields(academic_year = context.academic_year))]
    pub async fn load(
        store: Arc<dyn RosterStore>,
        context: SessionContext,
        config: ExecutorConfig,
    ) -> Result<Self> {
        let roster = fetch_roster(store.as_ref()).await?;
        let selection = SelectionState::with_defaults(&roster);
        info!(
            groups = roster.groups().len(),
            students = roster.student_count(),
            operator = context.operator.as_deref().unwrap_or("-"),
            "roster loaded"
        );
        Ok(PromotionSession {
            executor: TransitionExecutor::with_config(store, config),
            context,
            roster,
            selection,
            targets: TargetAssignments::new(),
            refresh_pending: false,
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn targets(&self) -> &TargetAssignments {
        &self.targets
    }

    /// `true` while a confirmed transition still owes a refresh.
    pub fn is_refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    /// Re-fetch the roster from the store.
    ///
    /// On success the selection is reset to its defaults and target
    /// assignments that no longer resolve are dropped. On failure the current
    /// snapshot is kept and any pending refresh stays pending.
    pub async fn refresh(&mut self) -> Result<()> {
        let roster = fetch_roster(self.executor.store().as_ref()).await?;
        self.roster = roster;
        self.selection.reset_to_defaults(&self.roster);
        self.targets.retain_valid(&self.roster);
        self.refresh_pending = false;
        METRICS.inc_roster_refreshes();
        obs::emit_roster_refreshed(self.roster.groups().len(), self.roster.student_count());
        Ok(())
    }

    pub fn toggle_student(&mut self, group: GroupId, student: StudentId) -> Result<bool> {
        self.selection.toggle_student(&self.roster, group, student)
    }

    pub fn set_student(
        &mut self,
        group: GroupId,
        student: StudentId,
        selected: bool,
    ) -> Result<()> {
        self.selection.set_student(&self.roster, group, student, selected)
    }

    pub fn toggle_group(&mut self, group: GroupId, selected: bool) -> Result<()> {
        self.selection.toggle_group(&self.roster, group, selected)
    }

    pub fn toggle_all(&mut self, selected: bool) {
        self.selection.toggle_all(&self.roster, selected)
    }

    pub fn set_only_promotable(&mut self, only_promotable: bool) {
        self.selection.set_only_promotable(only_promotable)
    }

    pub fn is_group_fully_selected(&self, group: GroupId) -> bool {
        self.selection.is_group_fully_selected(&self.roster, group)
    }

    pub fn is_all_selected(&self) -> bool {
        self.selection.is_all_selected(&self.roster)
    }

    /// Choose the "promote to" group for `source`.
    pub fn assign_target(&mut self, source: GroupId, target: GroupId) -> Result<()> {
        self.targets.assign(&self.roster, source, target)
    }

    pub fn clear_target(&mut self, source: GroupId) {
        self.targets.clear(source)
    }

    /// Move the selected students of `group` to its assigned target.
    pub async fn promote_group(&mut self, group: GroupId) -> Result<TransitionOutcome> {
        self.run(TransitionIntent::PromoteGroup(group)).await
    }

    /// Move the selected students of every group to their assigned targets.
    pub async fn promote_all(&mut self) -> Result<TransitionOutcome> {
        self.run(TransitionIntent::PromoteAll).await
    }

    /// Change the promotion status of the students in `scope`.
    pub async fn change_status(
        &mut self,
        scope: SelectionScope,
        status: PromotionStatus,
    ) -> Result<TransitionOutcome> {
        self.run(TransitionIntent::ChangeStatus { scope, status }).await
    }

    async fn run(&mut self, intent: TransitionIntent) -> Result<TransitionOutcome> {
        if self.refresh_pending {
            return Err(PromotionError::Busy);
        }
        let plan =
            TransitionPlanner::new(&self.roster, &self.selection, &self.targets).plan(intent)?;
        obs::emit_plan_built(
            plan.batch_id,
            plan.requests.len(),
            plan.student_count(),
            plan.concurrent,
        );
        info!(
            batch_id = %plan.batch_id,
            academic_year = self.context.academic_year,
            operator = self.context.operator.as_deref().unwrap_or("-"),
            ?intent,
            "submitting transition"
        );

        self.refresh_pending = true;
        let report = self.executor.execute(&plan).await;
        report.apply_to(&mut self.roster);

        let mut refresh_error = None;
        if report.applied_requests() > 0 {
            if let Err(err) = self.refresh().await {
                warn!(batch_id = %plan.batch_id, error = %err, "refresh after transition failed");
                refresh_error = err.transition_error().cloned();
            }
        } else {
            // Nothing changed remotely, so the snapshot is still current.
            self.refresh_pending = false;
        }

        Ok(TransitionOutcome::new(intent, &report, refresh_error))
    }
}

async fn fetch_roster(store: &dyn RosterStore) -> Result<Roster> {
    let (rows, active_groups) =
        tokio::try_join!(store.students_by_group(), store.active_groups())
            .map_err(TransitionError::from)?;
    Ok(Roster::from_rows(rows, active_groups))
}
