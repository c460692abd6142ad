//! Which students are marked for the next transition.
//!
//! The state is a single set of selected student ids plus the
//! "only promotable" filter. Group-level and global "all selected" flags are
//! never stored: they are computed from the set and the roster on every read,
//! so they cannot drift from the individual toggles.

use std::collections::BTreeSet;

use roster_state::{GroupId, StudentId};
use serde::{Deserialize, Serialize};

use crate::error::{PromotionError, Result};
use crate::roster::{GroupRoster, Roster, RosterStudent};

/// The part of the roster an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "id")]
pub enum SelectionScope {
    Student(StudentId),
    Group(GroupId),
    All,
}

/// Selected students and the active display filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    selected: BTreeSet<StudentId>,
    only_promotable: bool,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    /// Empty selection with the "only promotable" filter on.
    pub fn new() -> Self {
        SelectionState {
            selected: BTreeSet::new(),
            only_promotable: true,
        }
    }

    /// Every promotable student preselected, as after a load or refresh.
    pub fn with_defaults(roster: &Roster) -> Self {
        let mut state = Self::new();
        state.reset_to_defaults(roster);
        state
    }

    /// Replace the selection with every promotable student of `roster`.
    /// The filter setting is kept.
    pub fn reset_to_defaults(&mut self, roster: &Roster) {
        self.selected = roster
            .groups()
            .iter()
            .flat_map(|g| g.students.iter())
            .filter(|s| s.is_promotable())
            .map(|s| s.id)
            .collect();
    }

    pub fn only_promotable(&self) -> bool {
        self.only_promotable
    }

    /// Change the filter. Existing selections are left untouched.
    pub fn set_only_promotable(&mut self, only_promotable: bool) {
        self.only_promotable = only_promotable;
    }

    fn is_visible(&self, student: &RosterStudent) -> bool {
        !self.only_promotable || student.is_promotable()
    }

    /// Members of `group` that pass the current filter.
    pub fn visible_students<'a>(&self, group: &'a GroupRoster) -> Vec<&'a RosterStudent> {
        group
            .students
            .iter()
            .filter(|s| self.is_visible(s))
            .collect()
    }

    pub fn is_selected(&self, student_id: StudentId) -> bool {
        self.selected.contains(&student_id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Flip one student. Returns the new value.
    pub fn toggle_student(
        &mut self,
        roster: &Roster,
        group_id: GroupId,
        student_id: StudentId,
    ) -> Result<bool> {
        let selected = !self.is_selected(student_id);
        self.set_student(roster, group_id, student_id, selected)?;
        Ok(selected)
    }

    /// Set one student to `selected`, regardless of its current value.
    pub fn set_student(
        &mut self,
        roster: &Roster,
        group_id: GroupId,
        student_id: StudentId,
        selected: bool,
    ) -> Result<()> {
        let group = roster
            .group(group_id)
            .ok_or(PromotionError::UnknownGroup(group_id))?;
        if !group.contains(student_id) {
            return Err(PromotionError::UnknownStudent {
                group: Some(group_id),
                student: student_id,
            });
        }
        if selected {
            self.selected.insert(student_id);
        } else {
            self.selected.remove(&student_id);
        }
        Ok(())
    }

    /// Set every visible member of a group to `selected`.
    pub fn toggle_group(
        &mut self,
        roster: &Roster,
        group_id: GroupId,
        selected: bool,
    ) -> Result<()> {
        let group = roster
            .group(group_id)
            .ok_or(PromotionError::UnknownGroup(group_id))?;
        self.set_members(group, selected);
        Ok(())
    }

    /// Set every visible student of every group to `selected`.
    pub fn toggle_all(&mut self, roster: &Roster, selected: bool) {
        for group in roster.groups() {
            self.set_members(group, selected);
        }
    }

    fn set_members(&mut self, group: &GroupRoster, selected: bool) {
        let ids: Vec<StudentId> = self.visible_students(group).iter().map(|s| s.id).collect();
        for id in ids {
            if selected {
                self.selected.insert(id);
            } else {
                self.selected.remove(&id);
            }
        }
    }

    /// `true` when the group has visible members and all of them are selected.
    pub fn is_group_fully_selected(&self, roster: &Roster, group_id: GroupId) -> bool {
        roster
            .group(group_id)
            .map(|group| self.all_selected(self.visible_students(group)))
            .unwrap_or(false)
    }

    /// `true` when at least one student is visible and every visible student
    /// in every group is selected.
    pub fn is_all_selected(&self, roster: &Roster) -> bool {
        let visible: Vec<&RosterStudent> = roster
            .groups()
            .iter()
            .flat_map(|g| self.visible_students(g))
            .collect();
        self.all_selected(visible)
    }

    fn all_selected(&self, students: Vec<&RosterStudent>) -> bool {
        !students.is_empty() && students.iter().all(|s| self.is_selected(s.id))
    }

    /// Selected ids within `scope`, in roster order.
    ///
    /// Selections hidden by the filter are still included: the filter only
    /// governs display and bulk toggles.
    pub fn selected_student_ids(&self, roster: &Roster, scope: SelectionScope) -> Vec<StudentId> {
        let in_group = |group: &GroupRoster| -> Vec<StudentId> {
            group
                .students
                .iter()
                .filter(|s| self.is_selected(s.id))
                .map(|s| s.id)
                .collect()
        };
        match scope {
            SelectionScope::Student(id) => {
                if self.is_selected(id) && roster.student(id).is_some() {
                    vec![id]
                } else {
                    Vec::new()
                }
            }
            SelectionScope::Group(group_id) => {
                roster.group(group_id).map(in_group).unwrap_or_default()
            }
            SelectionScope::All => roster.groups().iter().flat_map(in_group).collect(),
        }
    }

    /// Forget ids that are no longer in the roster.
    pub fn retain_known(&mut self, roster: &Roster) {
        self.selected.retain(|id| roster.student(*id).is_some());
    }
}
