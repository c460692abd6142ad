//! In-memory fake roster store (testing only)
//!
//! `MemoryRosterStore` enforces the same rejection rules as the backend
//! (400 / 409 / 426), records every call it receives, and supports failure
//! injection so callers can exercise their error paths.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schema::*;
use crate::store::{RosterStore, StoreResult};

/// A call received by the fake, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    StudentsByGroup,
    ActiveGroups,
    UpdatePromotionStatus {
        student_id: StudentId,
        status: PromotionStatus,
    },
    BulkUpdatePromotionStatus(Vec<PromotionStatusUpdate>),
    PromoteStudents(PromotionPayload),
}

impl StoreCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, StoreCall::StudentsByGroup | StoreCall::ActiveGroups)
    }
}

#[derive(Debug)]
struct GroupEntry {
    group: Group,
    active: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    groups: Vec<GroupEntry>,
    /// (group, student) memberships in insertion order.
    memberships: Vec<(GroupId, Student)>,
    calls: Vec<StoreCall>,
    unreachable: bool,
    injected: VecDeque<StoreError>,
    rejected_targets: HashMap<GroupId, StoreError>,
}

impl FakeState {
    fn group(&self, id: GroupId) -> Option<&GroupEntry> {
        self.groups.iter().find(|entry| entry.group.id == id)
    }

    fn student_mut(&mut self, id: StudentId) -> Option<&mut Student> {
        self.memberships
            .iter_mut()
            .map(|(_, student)| student)
            .find(|student| student.id == id)
    }

    /// Record the call, then apply connectivity and injected failures.
    fn begin(&mut self, call: StoreCall) -> StoreResult<()> {
        self.calls.push(call);
        if self.unreachable {
            return Err(StoreError::Unreachable(
                "connection refused by fake store".to_string(),
            ));
        }
        match self.injected.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory roster store backed by a list of memberships.
#[derive(Debug, Default)]
pub struct MemoryRosterStore {
    state: Mutex<FakeState>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active group (a valid promotion target).
    pub fn add_group(&self, group: Group) {
        let mut state = self.state.lock().unwrap();
        state.groups.push(GroupEntry {
            group,
            active: true,
        });
    }

    /// Register a group that still holds students but is not a valid target.
    pub fn add_inactive_group(&self, group: Group) {
        let mut state = self.state.lock().unwrap();
        state.groups.push(GroupEntry {
            group,
            active: false,
        });
    }

    /// Enroll a student into a registered group.
    pub fn add_student(&self, group_id: GroupId, student: Student) {
        let mut state = self.state.lock().unwrap();
        state.memberships.push((group_id, student));
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of mutating calls received so far.
    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Simulate a lost connection: every call fails without a response.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Make the next call (of any kind) fail with the given status.
    pub fn fail_next_with(&self, status: u16, message: &str) {
        self.state
            .lock()
            .unwrap()
            .injected
            .push_back(StoreError::rejected(status, message));
    }

    /// Reject every promotion into `target` with the given status.
    pub fn reject_promotions_to(&self, target: GroupId, status: u16, message: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_targets
            .insert(target, StoreError::rejected(status, message));
    }

    /// Current group of a student, if enrolled.
    pub fn group_of(&self, student_id: StudentId) -> Option<GroupId> {
        let state = self.state.lock().unwrap();
        state
            .memberships
            .iter()
            .find(|(_, student)| student.id == student_id)
            .map(|(group_id, _)| *group_id)
    }

    /// Current record of a student, if enrolled.
    pub fn student(&self, student_id: StudentId) -> Option<Student> {
        let state = self.state.lock().unwrap();
        state
            .memberships
            .iter()
            .find(|(_, student)| student.id == student_id)
            .map(|(_, student)| student.clone())
    }
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn students_by_group(&self) -> StoreResult<Vec<StudentGroupRow>> {
        let mut state = self.state.lock().unwrap();
        state.begin(StoreCall::StudentsByGroup)?;
        let rows = state
            .memberships
            .iter()
            .filter_map(|(group_id, student)| {
                state.group(*group_id).map(|entry| StudentGroupRow {
                    group: entry.group.clone(),
                    student: student.clone(),
                })
            })
            .collect();
        Ok(rows)
    }

    async fn active_groups(&self) -> StoreResult<Vec<Group>> {
        let mut state = self.state.lock().unwrap();
        state.begin(StoreCall::ActiveGroups)?;
        Ok(state
            .groups
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.group.clone())
            .collect())
    }

    async fn update_promotion_status(
        &self,
        student_id: StudentId,
        status: PromotionStatus,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.begin(StoreCall::UpdatePromotionStatus { student_id, status })?;
        let student = state
            .student_mut(student_id)
            .ok_or_else(|| StoreError::rejected(404, format!("student {student_id} not found")))?;
        student.promotion_status = Some(status);
        Ok(())
    }

    async fn bulk_update_promotion_status(
        &self,
        updates: &[PromotionStatusUpdate],
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.begin(StoreCall::BulkUpdatePromotionStatus(updates.to_vec()))?;
        if updates.is_empty() {
            return Err(StoreError::rejected(400, "no students in request"));
        }
        if let Some(missing) = updates
            .iter()
            .find(|update| state.student_mut(update.id).is_none())
        {
            return Err(StoreError::rejected(
                404,
                format!("student {} not found", missing.id),
            ));
        }
        for update in updates {
            if let Some(student) = state.student_mut(update.id) {
                student.promotion_status = Some(update.promotion_status);
            }
        }
        Ok(())
    }

    async fn promote_students(&self, payload: &PromotionPayload) -> StoreResult<Vec<StudentId>> {
        let mut state = self.state.lock().unwrap();
        state.begin(StoreCall::PromoteStudents(payload.clone()))?;

        if let Some(err) = state.rejected_targets.get(&payload.target_group_id) {
            return Err(err.clone());
        }
        if payload.student_ids.is_empty() {
            return Err(StoreError::rejected(400, "studentIds must not be empty"));
        }
        match state.group(payload.target_group_id) {
            Some(entry) if entry.active => {}
            _ => {
                return Err(StoreError::rejected(
                    400,
                    format!("target group {} is not active", payload.target_group_id),
                ))
            }
        }

        let mut members = Vec::with_capacity(payload.student_ids.len());
        for id in &payload.student_ids {
            let (group_id, student) = state
                .memberships
                .iter()
                .find(|(_, student)| student.id == *id)
                .ok_or_else(|| StoreError::rejected(400, format!("student {id} not found")))?;
            members.push((*group_id, student.status.clone(), *id));
        }
        if let Some((_, _, id)) = members
            .iter()
            .find(|(group_id, _, _)| *group_id == payload.target_group_id)
        {
            return Err(StoreError::rejected(
                409,
                format!(
                    "student {id} is already assigned to group {}",
                    payload.target_group_id
                ),
            ));
        }
        if let Some((_, _, id)) = members.iter().find(|(_, status, _)| !status.is_active()) {
            return Err(StoreError::rejected(426, format!("student {id} is not active")));
        }

        for (group_id, student) in state.memberships.iter_mut() {
            if payload.student_ids.contains(&student.id) {
                *group_id = payload.target_group_id;
                student.promotion_status = Some(payload.promotion_status);
            }
        }
        Ok(payload.student_ids.clone())
    }
}
