//! Per-group rosters reduced from the backend's flat `{ group, student }` join.
//!
//! A [`Roster`] is an immutable snapshot: it is rebuilt from the store after
//! every confirmed transition. The only in-place edits are the optimistic
//! patches applied between a confirmation and the refresh that follows it.

use chrono::{DateTime, Utc};
use roster_state::{EnrollmentStatus, Group, GroupId, PromotionStatus, StudentGroupRow, StudentId};
use serde::Serialize;
use tracing::debug;

use crate::eligibility::eligible_targets;
use crate::ladder::level_order;

/// Status shown for a student. Promotion status wins over enrollment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Active,
    Inactive,
    Pending,
    Repeating,
    Unknown,
}

impl DisplayStatus {
    pub fn derive(status: &EnrollmentStatus, promotion: Option<PromotionStatus>) -> Self {
        match promotion {
            Some(PromotionStatus::Pending) => DisplayStatus::Pending,
            Some(PromotionStatus::Repeating) => DisplayStatus::Repeating,
            _ => match status {
                EnrollmentStatus::Active => DisplayStatus::Active,
                EnrollmentStatus::Inactive => DisplayStatus::Inactive,
                EnrollmentStatus::Unknown(_) => DisplayStatus::Unknown,
            },
        }
    }
}

/// A student as listed under a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterStudent {
    pub id: StudentId,
    pub name: String,
    pub status: EnrollmentStatus,
    pub promotion_status: Option<PromotionStatus>,
}

impl RosterStudent {
    /// Only students with an active enrollment can be promoted.
    pub fn is_promotable(&self) -> bool {
        self.status.is_active()
    }

    pub fn display_status(&self) -> DisplayStatus {
        DisplayStatus::derive(&self.status, self.promotion_status)
    }
}

/// One group with its members and the groups they may move to.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRoster {
    pub group: Group,
    pub level_order: u32,
    pub students: Vec<RosterStudent>,
    /// Computed from the active groups of the same snapshot.
    pub eligible_targets: Vec<Group>,
}

impl GroupRoster {
    fn new(group: Group, active_groups: &[Group]) -> Self {
        GroupRoster {
            level_order: level_order(&group.level.name),
            eligible_targets: eligible_targets(&group, active_groups),
            group,
            students: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.group.id
    }

    pub fn contains(&self, student_id: StudentId) -> bool {
        self.students.iter().any(|s| s.id == student_id)
    }

    pub fn accepts_target(&self, target: GroupId) -> bool {
        self.eligible_targets.iter().any(|g| g.id == target)
    }
}

/// Snapshot of every group's roster plus the active-group list.
#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    groups: Vec<GroupRoster>,
    active_groups: Vec<Group>,
    loaded_at: DateTime<Utc>,
}

impl Roster {
    /// Reduce the flat join into per-group rosters, in first-appearance order.
    ///
    /// Duplicate (group, student) rows are dropped.
    pub fn from_rows(rows: Vec<StudentGroupRow>, active_groups: Vec<Group>) -> Self {
        let mut groups: Vec<GroupRoster> = Vec::new();
        for StudentGroupRow { group, student } in rows {
            let index = match groups.iter().position(|g| g.group.id == group.id) {
                Some(index) => index,
                None => {
                    groups.push(GroupRoster::new(group, &active_groups));
                    groups.len() - 1
                }
            };
            let roster = &mut groups[index];
            if roster.contains(student.id) {
                continue;
            }
            roster.students.push(RosterStudent {
                id: student.id,
                name: student.display_name(),
                status: student.status,
                promotion_status: student.promotion_status,
            });
        }
        Roster {
            groups,
            active_groups,
            loaded_at: Utc::now(),
        }
    }

    pub fn groups(&self) -> &[GroupRoster] {
        &self.groups
    }

    pub fn active_groups(&self) -> &[Group] {
        &self.active_groups
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupRoster> {
        self.groups.iter().find(|g| g.group.id == id)
    }

    pub fn active_group(&self, id: GroupId) -> Option<&Group> {
        self.active_groups.iter().find(|g| g.id == id)
    }

    /// The group a student currently belongs to, with the student record.
    pub fn student(&self, id: StudentId) -> Option<(&GroupRoster, &RosterStudent)> {
        self.groups.iter().find_map(|group| {
            group
                .students
                .iter()
                .find(|s| s.id == id)
                .map(|student| (group, student))
        })
    }

    pub fn student_count(&self) -> usize {
        self.groups.iter().map(|g| g.students.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Optimistically mirror a confirmed status change.
    pub fn apply_status(&mut self, ids: &[StudentId], status: PromotionStatus) {
        for student in self.groups.iter_mut().flat_map(|g| g.students.iter_mut()) {
            if ids.contains(&student.id) {
                student.promotion_status = Some(status);
            }
        }
    }

    /// Optimistically mirror a confirmed group move.
    ///
    /// When the target is in neither the roster nor the active groups the
    /// roster is left as is; the refresh will place the students.
    pub fn apply_group_move(
        &mut self,
        ids: &[StudentId],
        target: GroupId,
        status: PromotionStatus,
    ) {
        if !ids.iter().any(|id| self.student(*id).is_some()) {
            return;
        }
        let index = match self.groups.iter().position(|g| g.group.id == target) {
            Some(index) => index,
            None => match self.active_group(target).cloned() {
                Some(group) => {
                    self.groups.push(GroupRoster::new(group, &self.active_groups));
                    self.groups.len() - 1
                }
                None => {
                    debug!(target_group_id = %target, "move target not loaded locally");
                    return;
                }
            },
        };

        let mut moved = Vec::new();
        for group in self.groups.iter_mut().filter(|g| g.group.id != target) {
            let (leaving, staying): (Vec<_>, Vec<_>) = group
                .students
                .drain(..)
                .partition(|s| ids.contains(&s.id));
            group.students = staying;
            moved.extend(leaving);
        }
        for student in &mut moved {
            student.promotion_status = Some(status);
        }
        self.groups[index].students.extend(moved);
    }
}
