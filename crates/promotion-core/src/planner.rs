//! Turning a selection into transition requests.
//!
//! Both kinds of transition go through [`TransitionPlanner::plan`]:
//!
//! - group moves, one request per distinct destination group, with the ids of
//!   every source group sharing that destination merged into it
//! - status-only changes, one request for the chosen scope
//!
//! All validation here is local; a failed plan never reaches the store.

use std::collections::HashMap;

use roster_state::{GroupId, PromotionStatus, StudentId};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{PromotionError, Result};
use crate::roster::Roster;
use crate::selection::{SelectionScope, SelectionState};

/// What a request does to the students it lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionKind {
    /// Change `promotionStatus` without moving groups.
    StatusChange { status: PromotionStatus },
    /// Move into `target` and mark the students Active.
    GroupMove { target: GroupId },
}

/// One call to the store. The id list is sent as a single atomic payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRequest {
    pub kind: TransitionKind,
    pub scope: SelectionScope,
    pub student_ids: Vec<StudentId>,
    /// Groups the listed students currently belong to.
    pub source_groups: Vec<GroupId>,
}

impl TransitionRequest {
    /// The promotion status the students end up with.
    pub fn resulting_status(&self) -> PromotionStatus {
        match self.kind {
            TransitionKind::StatusChange { status } => status,
            TransitionKind::GroupMove { .. } => PromotionStatus::Active,
        }
    }

    /// Status changes for a single student use the single-student endpoint.
    pub fn is_single_student(&self) -> bool {
        matches!(self.scope, SelectionScope::Student(_))
    }
}

/// Requests built from one confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionPlan {
    pub batch_id: Uuid,
    pub requests: Vec<TransitionRequest>,
    /// Requests may be issued concurrently (group-move "apply to all").
    pub concurrent: bool,
}

impl TransitionPlan {
    fn new(requests: Vec<TransitionRequest>, concurrent: bool) -> Self {
        TransitionPlan {
            batch_id: Uuid::new_v4(),
            requests,
            concurrent,
        }
    }

    pub fn student_count(&self) -> usize {
        self.requests.iter().map(|r| r.student_ids.len()).sum()
    }
}

/// The user's intent at confirmation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionIntent {
    /// Move the selected students of one group to its assigned target.
    PromoteGroup(GroupId),
    /// Move the selected students of every group to their assigned targets.
    PromoteAll,
    /// Change the promotion status of the students in `scope`.
    ChangeStatus {
        scope: SelectionScope,
        status: PromotionStatus,
    },
}

/// Per-source-group choice of destination ("promote to").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetAssignments {
    targets: HashMap<GroupId, GroupId>,
}

impl TargetAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a destination. The target must be eligible for the source.
    pub fn assign(&mut self, roster: &Roster, source: GroupId, target: GroupId) -> Result<()> {
        let group = roster
            .group(source)
            .ok_or(PromotionError::UnknownGroup(source))?;
        if !group.accepts_target(target) {
            return Err(PromotionError::IneligibleTarget {
                from: source,
                target,
            });
        }
        self.targets.insert(source, target);
        Ok(())
    }

    pub fn clear(&mut self, source: GroupId) {
        self.targets.remove(&source);
    }

    pub fn target_for(&self, source: GroupId) -> Option<GroupId> {
        self.targets.get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Drop assignments whose source group or target is no longer valid.
    pub fn retain_valid(&mut self, roster: &Roster) {
        self.targets.retain(|source, target| {
            roster
                .group(*source)
                .map(|group| group.accepts_target(*target))
                .unwrap_or(false)
        });
    }
}

/// Builds plans from a roster snapshot, the selection and target assignments.
pub struct TransitionPlanner<'a> {
    roster: &'a Roster,
    selection: &'a SelectionState,
    targets: &'a TargetAssignments,
}

impl<'a> TransitionPlanner<'a> {
    pub fn new(
        roster: &'a Roster,
        selection: &'a SelectionState,
        targets: &'a TargetAssignments,
    ) -> Self {
        TransitionPlanner {
            roster,
            selection,
            targets,
        }
    }

    pub fn plan(&self, intent: TransitionIntent) -> Result<TransitionPlan> {
        match intent {
            TransitionIntent::PromoteGroup(group_id) => self.plan_group_move(group_id),
            TransitionIntent::PromoteAll => self.plan_group_move_all(),
            TransitionIntent::ChangeStatus { scope, status } => {
                self.plan_status_change(scope, status)
            }
        }
    }

    /// One request moving the selected students of `source` to its target.
    pub fn plan_group_move(&self, source: GroupId) -> Result<TransitionPlan> {
        let group = self
            .roster
            .group(source)
            .ok_or(PromotionError::UnknownGroup(source))?;
        let target = self
            .targets
            .target_for(source)
            .ok_or_else(|| PromotionError::MissingTarget {
                group_ids: vec![source],
                group_names: vec![group.group.name.clone()],
            })?;
        let student_ids = self
            .selection
            .selected_student_ids(self.roster, SelectionScope::Group(source));
        if student_ids.is_empty() {
            return Err(PromotionError::NoSelection);
        }
        Ok(TransitionPlan::new(
            vec![TransitionRequest {
                kind: TransitionKind::GroupMove { target },
                scope: SelectionScope::Group(source),
                student_ids,
                source_groups: vec![source],
            }],
            false,
        ))
    }

    /// One request per distinct target, merging every source group that
    /// shares it. Fails without building anything if any group has no target.
    pub fn plan_group_move_all(&self) -> Result<TransitionPlan> {
        let unassigned: Vec<_> = self
            .roster
            .groups()
            .iter()
            .filter(|g| self.targets.target_for(g.id()).is_none())
            .collect();
        if !unassigned.is_empty() {
            return Err(PromotionError::MissingTarget {
                group_ids: unassigned.iter().map(|g| g.id()).collect(),
                group_names: unassigned.iter().map(|g| g.group.name.clone()).collect(),
            });
        }

        let mut requests: Vec<TransitionRequest> = Vec::new();
        for group in self.roster.groups() {
            let ids = self
                .selection
                .selected_student_ids(self.roster, SelectionScope::Group(group.id()));
            if ids.is_empty() {
                continue;
            }
            let Some(target) = self.targets.target_for(group.id()) else {
                continue;
            };
            let kind = TransitionKind::GroupMove { target };
            match requests.iter_mut().find(|r| r.kind == kind) {
                Some(request) => {
                    request.student_ids.extend(ids);
                    request.source_groups.push(group.id());
                }
                None => requests.push(TransitionRequest {
                    kind,
                    scope: SelectionScope::All,
                    student_ids: ids,
                    source_groups: vec![group.id()],
                }),
            }
        }
        if requests.is_empty() {
            return Err(PromotionError::NoSelection);
        }
        Ok(TransitionPlan::new(requests, true))
    }

    /// One status-change request for `scope`.
    ///
    /// A single-student scope names the student explicitly and does not
    /// consult the selection.
    pub fn plan_status_change(
        &self,
        scope: SelectionScope,
        status: PromotionStatus,
    ) -> Result<TransitionPlan> {
        let (student_ids, source_groups) = match scope {
            SelectionScope::Student(id) => {
                let (group, _) =
                    self.roster
                        .student(id)
                        .ok_or(PromotionError::UnknownStudent {
                            group: None,
                            student: id,
                        })?;
                (vec![id], vec![group.id()])
            }
            SelectionScope::Group(group_id) => {
                if self.roster.group(group_id).is_none() {
                    return Err(PromotionError::UnknownGroup(group_id));
                }
                let ids = self.selection.selected_student_ids(self.roster, scope);
                (ids, vec![group_id])
            }
            SelectionScope::All => {
                let ids = self.selection.selected_student_ids(self.roster, scope);
                let groups = self
                    .roster
                    .groups()
                    .iter()
                    .filter(|g| g.students.iter().any(|s| ids.contains(&s.id)))
                    .map(|g| g.id())
                    .collect();
                (ids, groups)
            }
        };
        if student_ids.is_empty() {
            return Err(PromotionError::NoSelection);
        }
        Ok(TransitionPlan::new(
            vec![TransitionRequest {
                kind: TransitionKind::StatusChange { status },
                scope,
                student_ids,
                source_groups,
            }],
            false,
        ))
    }
}
