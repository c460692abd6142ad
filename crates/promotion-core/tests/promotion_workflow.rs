//! End-to-end promotion workflow against the in-memory roster store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use promotion_core::*;
use roster_state::fakes::{MemoryRosterStore, StoreCall};
use roster_state::{
    EnrollmentStatus, Group, GroupId, Level, LevelId, PromotionPayload, PromotionStatus,
    PromotionStatusUpdate, RosterStore, StoreError, StoreResult, Student, StudentGroupRow,
    StudentId,
};

// ===========================================================================
// Fixtures
// ===========================================================================

const SEGUNDO_A: GroupId = GroupId(1);
const SEGUNDO_B: GroupId = GroupId(2);
const TERCERO_A: GroupId = GroupId(3);
const TERCERO_B: GroupId = GroupId(4);
const SEXTO_A: GroupId = GroupId(5);

fn group(id: GroupId, name: &str, level: &str) -> Group {
    Group {
        id,
        name: name.to_string(),
        level: Level {
            id: LevelId(id.0 * 100),
            name: level.to_string(),
        },
        code: None,
    }
}

fn student(id: i64, status: &str) -> Student {
    Student {
        id: StudentId(id),
        first_name: format!("Student{id}"),
        last_name: "Test".to_string(),
        status: EnrollmentStatus::from(status.to_string()),
        promotion_status: None,
    }
}

/// Segundo A: 10, 11, 12 active. Segundo B: 20, 21 active, 22 inactive.
/// Tercero A: 30 active. Tercero B and Sexto A are empty.
fn seeded() -> Arc<MemoryRosterStore> {
    let store = MemoryRosterStore::new();
    store.add_group(group(SEGUNDO_A, "Segundo A", "SEGUNDO"));
    store.add_group(group(SEGUNDO_B, "Segundo B", "SEGUNDO"));
    store.add_group(group(TERCERO_A, "Tercero A", "TERCERO"));
    store.add_group(group(TERCERO_B, "Tercero B", "TERCERO"));
    store.add_group(group(SEXTO_A, "Sexto A", "SEXTO"));
    for id in [10, 11, 12] {
        store.add_student(SEGUNDO_A, student(id, "A"));
    }
    store.add_student(SEGUNDO_B, student(20, "A"));
    store.add_student(SEGUNDO_B, student(21, "A"));
    store.add_student(SEGUNDO_B, student(22, "I"));
    store.add_student(TERCERO_A, student(30, "A"));
    Arc::new(store)
}

async fn session_over(store: Arc<dyn RosterStore>) -> PromotionSession {
    PromotionSession::load(store, SessionContext::new(2026), ExecutorConfig::default())
        .await
        .expect("load session")
}

fn ids(raw: &[i64]) -> Vec<StudentId> {
    raw.iter().copied().map(StudentId).collect()
}

fn promotions(store: &MemoryRosterStore) -> Vec<PromotionPayload> {
    store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::PromoteStudents(payload) => Some(payload),
            _ => None,
        })
        .collect()
}

// ===========================================================================
// Loading and eligibility
// ===========================================================================

#[tokio::test]
async fn load_reduces_roster_and_preselects_active_students() {
    let store = seeded();
    let session = session_over(store.clone()).await;

    assert_eq!(session.roster().groups().len(), 3);
    assert_eq!(session.roster().student_count(), 7);
    assert_eq!(session.selection().selected_count(), 6);
    assert!(!session.selection().is_selected(StudentId(22)));
    assert!(session.is_all_selected());
    assert_eq!(store.mutation_count(), 0);
}

#[tokio::test]
async fn eligible_targets_allow_lateral_and_one_level_up() {
    let session = session_over(seeded()).await;

    let segundo_b = session.roster().group(SEGUNDO_B).unwrap();
    let targets: Vec<GroupId> = segundo_b.eligible_targets.iter().map(|g| g.id).collect();
    assert_eq!(targets, vec![SEGUNDO_A, TERCERO_A, TERCERO_B]);
    assert!(!segundo_b.accepts_target(SEXTO_A));
    assert!(!segundo_b.accepts_target(SEGUNDO_B));
}

#[tokio::test]
async fn assigning_an_ineligible_target_is_rejected() {
    let mut session = session_over(seeded()).await;

    let err = session.assign_target(SEGUNDO_A, SEXTO_A).unwrap_err();
    assert!(matches!(
        err,
        PromotionError::IneligibleTarget {
            from: SEGUNDO_A,
            target: SEXTO_A
        }
    ));
    assert!(session.targets().is_empty());
}

// ===========================================================================
// Local validation never reaches the store
// ===========================================================================

#[tokio::test]
async fn empty_selection_fails_locally() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();
    session.toggle_group(SEGUNDO_A, false).unwrap();

    let err = session.promote_group(SEGUNDO_A).await.unwrap_err();
    assert!(matches!(err, PromotionError::NoSelection));
    assert!(err.is_local());

    let err = session
        .change_status(SelectionScope::Group(SEGUNDO_A), PromotionStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, PromotionError::NoSelection));
    assert_eq!(store.mutation_count(), 0);
}

#[tokio::test]
async fn promote_all_requires_a_target_for_every_group() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();

    match session.promote_all().await {
        Err(PromotionError::MissingTarget {
            group_ids,
            group_names,
        }) => {
            assert_eq!(group_ids, vec![SEGUNDO_B, TERCERO_A]);
            assert_eq!(group_names, vec!["Segundo B", "Tercero A"]);
        }
        other => panic!("expected MissingTarget, got {other:?}"),
    }
    assert_eq!(store.mutation_count(), 0);
}

#[tokio::test]
async fn promote_all_with_nothing_selected_sends_nothing() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();
    session.assign_target(SEGUNDO_B, TERCERO_A).unwrap();
    session.assign_target(TERCERO_A, TERCERO_B).unwrap();
    session.toggle_all(false);

    let err = session.promote_all().await.unwrap_err();
    assert!(matches!(err, PromotionError::NoSelection));
    assert_eq!(store.mutation_count(), 0);
    assert!(!session.is_refresh_pending());
}

// ===========================================================================
// Selection
// ===========================================================================

#[tokio::test]
async fn toggle_all_follows_the_promotable_filter() {
    let mut session = session_over(seeded()).await;

    session.set_only_promotable(false);
    assert!(!session.is_all_selected());
    session.toggle_all(true);
    assert_eq!(session.selection().selected_count(), 7);
    assert!(session.is_all_selected());

    // With the filter back on, the hidden inactive student keeps its mark.
    session.set_only_promotable(true);
    session.toggle_all(false);
    assert_eq!(session.selection().selected_count(), 1);
    assert!(session.selection().is_selected(StudentId(22)));
    assert!(!session.is_all_selected());
    assert!(!session.is_group_fully_selected(SEGUNDO_B));

    session.toggle_all(true);
    assert_eq!(session.selection().selected_count(), 7);
    assert!(session.is_group_fully_selected(SEGUNDO_B));
}

// ===========================================================================
// Group moves
// ===========================================================================

#[tokio::test]
async fn promote_group_moves_only_selected_students() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();
    assert!(!session.toggle_student(SEGUNDO_A, StudentId(12)).unwrap());

    let outcome = session.promote_group(SEGUNDO_A).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.students, 2);
    assert_eq!(outcome.summary(), "2 students promoted");

    let sent = promotions(&store);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].student_ids, ids(&[10, 11]));
    assert_eq!(sent[0].target_group_id, TERCERO_A);
    assert_eq!(sent[0].promotion_status, PromotionStatus::Active);

    // The refreshed roster reflects the store, and the selection is reset.
    let (group, moved) = session.roster().student(StudentId(10)).unwrap();
    assert_eq!(group.id(), TERCERO_A);
    assert_eq!(moved.promotion_status, Some(PromotionStatus::Active));
    assert_eq!(store.group_of(StudentId(12)), Some(SEGUNDO_A));
    assert!(session.selection().is_selected(StudentId(12)));
    assert!(!session.is_refresh_pending());
}

#[tokio::test]
async fn promote_all_merges_groups_sharing_a_target() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_B).unwrap();
    session.assign_target(SEGUNDO_B, TERCERO_B).unwrap();
    session.assign_target(TERCERO_A, TERCERO_B).unwrap();
    session.toggle_group(TERCERO_A, false).unwrap();

    let outcome = session.promote_all().await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.students, 5);

    let sent = promotions(&store);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].student_ids, ids(&[10, 11, 12, 20, 21]));
    assert_eq!(sent[0].target_group_id, TERCERO_B);
}

#[tokio::test]
async fn conflict_is_classified_and_other_requests_still_apply() {
    let store = seeded();
    store.reject_promotions_to(TERCERO_B, 409, "student 20 already assigned");
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();
    session.assign_target(SEGUNDO_B, TERCERO_B).unwrap();
    session.toggle_group(TERCERO_A, false).unwrap();
    session.assign_target(TERCERO_A, TERCERO_B).unwrap();

    let outcome = session.promote_all().await.unwrap();
    assert_eq!(outcome.attempted, 2);
    assert_eq!(outcome.applied_requests, 1);
    assert_eq!(outcome.students, 3);
    let error = outcome.error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::Conflict);
    assert_eq!(error.status, Some(409));
    assert!(error.message.contains("already assigned"));

    // No rollback: the accepted request stays applied.
    assert_eq!(store.group_of(StudentId(10)), Some(TERCERO_A));
    assert_eq!(store.group_of(StudentId(20)), Some(SEGUNDO_B));

    match outcome.into_result() {
        Err(PromotionError::Batch(failure)) => {
            assert_eq!(failure.applied, 1);
            assert_eq!(failure.attempted, 2);
        }
        other => panic!("expected batch failure, got {other:?}"),
    }
}

#[tokio::test]
async fn inactive_student_in_payload_is_ineligible_state() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.set_only_promotable(false);
    session.toggle_group(SEGUNDO_B, true).unwrap();
    session.assign_target(SEGUNDO_B, TERCERO_A).unwrap();

    let outcome = session.promote_group(SEGUNDO_B).await.unwrap();
    assert_eq!(outcome.error.as_ref().map(|e| e.kind), Some(ErrorKind::IneligibleState));
    assert_eq!(outcome.applied_requests, 0);
    assert!(outcome.summary().starts_with("no students promoted"));
    assert!(!session.is_refresh_pending());
    assert_eq!(store.group_of(StudentId(20)), Some(SEGUNDO_B));
}

#[tokio::test]
async fn targets_for_vanished_groups_are_pruned_on_refresh() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();
    session.assign_target(SEGUNDO_B, TERCERO_A).unwrap();

    // Segundo A empties out, so it disappears from the next roster.
    let outcome = session.promote_group(SEGUNDO_A).await.unwrap();
    assert!(outcome.is_success());

    assert!(session.roster().group(SEGUNDO_A).is_none());
    assert_eq!(session.targets().target_for(SEGUNDO_A), None);
    assert_eq!(session.targets().target_for(SEGUNDO_B), Some(TERCERO_A));
}

// ===========================================================================
// Status-only changes
// ===========================================================================

#[tokio::test]
async fn single_student_status_change_touches_only_that_student() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    store.clear_calls();

    let outcome = session
        .change_status(SelectionScope::Student(StudentId(11)), PromotionStatus::Repeating)
        .await
        .unwrap();
    assert_eq!(outcome.summary(), "1 student marked repeating");

    let mutations: Vec<StoreCall> = store
        .calls()
        .into_iter()
        .filter(StoreCall::is_mutation)
        .collect();
    assert_eq!(
        mutations,
        vec![StoreCall::UpdatePromotionStatus {
            student_id: StudentId(11),
            status: PromotionStatus::Repeating,
        }]
    );

    let roster = session.roster();
    assert_eq!(
        roster.student(StudentId(11)).unwrap().1.display_status(),
        DisplayStatus::Repeating
    );
    for other in [10, 12, 20, 21, 22, 30] {
        assert_eq!(roster.student(StudentId(other)).unwrap().1.promotion_status, None);
    }
}

#[tokio::test]
async fn group_status_change_uses_bulk_endpoint_for_selection() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.toggle_student(SEGUNDO_B, StudentId(21)).unwrap();

    let outcome = session
        .change_status(SelectionScope::Group(SEGUNDO_B), PromotionStatus::Pending)
        .await
        .unwrap();
    assert_eq!(outcome.students, 1);

    let bulk: Vec<Vec<PromotionStatusUpdate>> = store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::BulkUpdatePromotionStatus(updates) => Some(updates),
            _ => None,
        })
        .collect();
    assert_eq!(
        bulk,
        vec![vec![PromotionStatusUpdate {
            id: StudentId(20),
            promotion_status: PromotionStatus::Pending,
        }]]
    );
    assert_eq!(store.student(StudentId(21)).unwrap().promotion_status, None);
}

#[tokio::test]
async fn all_scope_status_change_sends_one_bulk_request() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.toggle_student(SEGUNDO_A, StudentId(12)).unwrap();
    session.toggle_student(TERCERO_A, StudentId(30)).unwrap();
    store.clear_calls();

    let outcome = session
        .change_status(SelectionScope::All, PromotionStatus::Pending)
        .await
        .unwrap();
    assert_eq!(outcome.attempted, 1);
    assert_eq!(outcome.summary(), "4 students marked pending");

    let mutations: Vec<StoreCall> = store
        .calls()
        .into_iter()
        .filter(StoreCall::is_mutation)
        .collect();
    let expected: Vec<PromotionStatusUpdate> = ids(&[10, 11, 20, 21])
        .into_iter()
        .map(|id| PromotionStatusUpdate {
            id,
            promotion_status: PromotionStatus::Pending,
        })
        .collect();
    assert_eq!(mutations, vec![StoreCall::BulkUpdatePromotionStatus(expected)]);

    for untouched in [12, 22, 30] {
        assert_eq!(store.student(StudentId(untouched)).unwrap().promotion_status, None);
    }
    assert_eq!(
        store.student(StudentId(20)).unwrap().promotion_status,
        Some(PromotionStatus::Pending)
    );
}

#[tokio::test]
async fn unknown_student_scope_fails_locally() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;

    let err = session
        .change_status(SelectionScope::Student(StudentId(99)), PromotionStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, PromotionError::UnknownStudent { .. }));
    assert_eq!(store.mutation_count(), 0);
}

// ===========================================================================
// Remote failures and the refresh debounce
// ===========================================================================

#[tokio::test]
async fn unreachable_store_is_classified_and_snapshot_kept() {
    let store = seeded();
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();
    store.set_unreachable(true);

    let outcome = session.promote_group(SEGUNDO_A).await.unwrap();
    let err = outcome.into_result().unwrap_err();
    assert!(!err.is_local());
    assert_eq!(err.transition_error().map(|e| e.kind), Some(ErrorKind::Unreachable));
    assert_eq!(session.roster().group(SEGUNDO_A).unwrap().students.len(), 3);
    assert!(!session.is_refresh_pending());
}

/// Delegates to the in-memory store, but fails every read once a mutation
/// has succeeded while `armed` is set.
struct FailingRefresh {
    inner: MemoryRosterStore,
    armed: AtomicBool,
    broken: AtomicBool,
}

impl FailingRefresh {
    fn check_reads(&self) -> StoreResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("connection reset".to_string()));
        }
        Ok(())
    }

    fn after_mutation(&self) {
        if self.armed.load(Ordering::SeqCst) {
            self.broken.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RosterStore for FailingRefresh {
    async fn students_by_group(&self) -> StoreResult<Vec<StudentGroupRow>> {
        self.check_reads()?;
        self.inner.students_by_group().await
    }

    async fn active_groups(&self) -> StoreResult<Vec<Group>> {
        self.check_reads()?;
        self.inner.active_groups().await
    }

    async fn update_promotion_status(
        &self,
        student_id: StudentId,
        status: PromotionStatus,
    ) -> StoreResult<()> {
        self.inner.update_promotion_status(student_id, status).await?;
        self.after_mutation();
        Ok(())
    }

    async fn bulk_update_promotion_status(
        &self,
        updates: &[PromotionStatusUpdate],
    ) -> StoreResult<()> {
        self.inner.bulk_update_promotion_status(updates).await?;
        self.after_mutation();
        Ok(())
    }

    async fn promote_students(&self, payload: &PromotionPayload) -> StoreResult<Vec<StudentId>> {
        let applied = self.inner.promote_students(payload).await?;
        self.after_mutation();
        Ok(applied)
    }
}

#[tokio::test]
async fn resubmission_is_rejected_until_refresh_succeeds() {
    let inner = Arc::try_unwrap(seeded()).unwrap();
    let store = Arc::new(FailingRefresh {
        inner,
        armed: AtomicBool::new(true),
        broken: AtomicBool::new(false),
    });
    let mut session = session_over(store.clone()).await;
    session.assign_target(SEGUNDO_A, TERCERO_A).unwrap();

    let outcome = session.promote_group(SEGUNDO_A).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        outcome.refresh_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Unreachable)
    );
    assert!(session.is_refresh_pending());
    // The optimistic patch is visible until the refresh lands.
    assert_eq!(session.roster().student(StudentId(10)).unwrap().0.id(), TERCERO_A);

    let err = session
        .change_status(SelectionScope::Student(StudentId(30)), PromotionStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, PromotionError::Busy));

    store.armed.store(false, Ordering::SeqCst);
    store.broken.store(false, Ordering::SeqCst);
    session.refresh().await.unwrap();
    assert!(!session.is_refresh_pending());
    let outcome = session
        .change_status(SelectionScope::Student(StudentId(30)), PromotionStatus::Pending)
        .await
        .unwrap();
    assert!(outcome.is_success());
}

// ===========================================================================
// Executor
// ===========================================================================

#[tokio::test]
async fn concurrent_plan_reports_outcomes_in_plan_order() {
    let store = seeded();
    store.reject_promotions_to(TERCERO_A, 400, "target full");
    let session = session_over(store.clone()).await;

    let mut targets = TargetAssignments::new();
    targets.assign(session.roster(), SEGUNDO_A, TERCERO_B).unwrap();
    targets.assign(session.roster(), SEGUNDO_B, TERCERO_A).unwrap();
    targets.assign(session.roster(), TERCERO_A, TERCERO_B).unwrap();

    let plan = TransitionPlanner::new(session.roster(), session.selection(), &targets)
        .plan(TransitionIntent::PromoteAll)
        .unwrap();
    assert!(plan.concurrent);
    assert_eq!(plan.requests.len(), 2);

    let config = ExecutorConfig { max_concurrent: 1 };
    let executor = TransitionExecutor::with_config(store.clone(), config);
    let report = executor.execute(&plan).await;

    let kinds: Vec<TransitionKind> = report.outcomes.iter().map(|o| o.request.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransitionKind::GroupMove { target: TERCERO_B },
            TransitionKind::GroupMove { target: TERCERO_A },
        ]
    );
    assert_eq!(report.outcomes[0].result.as_ref().unwrap(), &ids(&[10, 11, 12, 30]));
    assert_eq!(
        report.first_error().map(|e| e.kind),
        Some(ErrorKind::InvalidRequest)
    );
    assert_eq!(report.applied_students(), 4);
}
