//! Issuing a [`TransitionPlan`] against a [`RosterStore`].
//!
//! Requests of a concurrent plan are spawned together, bounded by a
//! semaphore; sequential plans are sent one at a time. Either way every
//! request is attempted: a failure does not cancel the others and nothing
//! already applied is rolled back. Outcomes are reported in plan order.

use std::sync::Arc;

use roster_state::{
    PromotionPayload, PromotionStatus, PromotionStatusUpdate, RosterStore, StudentId,
};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::classify::{ErrorKind, TransitionError};
use crate::metrics::METRICS;
use crate::obs;
use crate::planner::{TransitionKind, TransitionPlan, TransitionRequest};
use crate::roster::Roster;

/// Configuration for plan execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of requests in flight for a concurrent plan.
    pub max_concurrent: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// The resolution of one request.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub request: TransitionRequest,
    /// Ids the store applied, or the classified failure.
    pub result: Result<Vec<StudentId>, TransitionError>,
}

impl RequestOutcome {
    pub fn is_applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// A batch that failed part-way. Requests counted in `applied` stay applied.
#[derive(Debug, Clone, Error)]
#[error("{applied} of {attempted} requests applied before failure: {error}")]
pub struct BatchFailure {
    pub applied: usize,
    pub attempted: usize,
    /// First failure in plan order.
    pub error: TransitionError,
}

/// Every outcome of a plan, in plan order.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub batch_id: Uuid,
    pub outcomes: Vec<RequestOutcome>,
}

impl ExecutionReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn applied_requests(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    /// Number of students covered by accepted requests.
    pub fn applied_students(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(Vec::len)
            .sum()
    }

    pub fn first_error(&self) -> Option<&TransitionError> {
        self.outcomes.iter().find_map(|o| o.result.as_ref().err())
    }

    pub fn is_success(&self) -> bool {
        self.first_error().is_none()
    }

    /// `Ok(requests applied)` when every request succeeded.
    pub fn into_result(self) -> Result<usize, BatchFailure> {
        match self.first_error().cloned() {
            None => Ok(self.applied_requests()),
            Some(error) => Err(BatchFailure {
                applied: self.applied_requests(),
                attempted: self.attempted(),
                error,
            }),
        }
    }

    /// Mirror the accepted requests onto a local roster snapshot.
    pub fn apply_to(&self, roster: &mut Roster) {
        let _span = obs::BatchSpan::enter(self.batch_id);
        for outcome in &self.outcomes {
            let Ok(ids) = &outcome.result else {
                continue;
            };
            match outcome.request.kind {
                TransitionKind::StatusChange { status } => roster.apply_status(ids, status),
                TransitionKind::GroupMove { target } => {
                    roster.apply_group_move(ids, target, PromotionStatus::Active)
                }
            }
            debug!(students = ids.len(), "patched local roster");
        }
    }
}

/// Sends plans to a store.
#[derive(Clone)]
pub struct TransitionExecutor {
    store: Arc<dyn RosterStore>,
    config: ExecutorConfig,
}

impl TransitionExecutor {
    pub fn new(store: Arc<dyn RosterStore>) -> Self {
        Self::with_config(store, ExecutorConfig::default())
    }

    pub fn with_config(store: Arc<dyn RosterStore>, config: ExecutorConfig) -> Self {
        TransitionExecutor { store, config }
    }

    pub fn store(&self) -> &Arc<dyn RosterStore> {
        &self.store
    }

    /// Issue every request of `plan` and collect the outcomes.
    pub async fn execute(&self, plan: &TransitionPlan) -> ExecutionReport {
        let batch_id = plan.batch_id;
        let outcomes = if plan.concurrent {
            self.execute_concurrent(plan)
                .instrument(obs::batch_span(batch_id))
                .await
        } else {
            self.execute_sequential(plan)
                .instrument(obs::batch_span(batch_id))
                .await
        };
        let report = ExecutionReport { batch_id, outcomes };
        obs::emit_batch_finished(batch_id, report.applied_requests(), report.attempted());
        report
    }

    async fn execute_sequential(&self, plan: &TransitionPlan) -> Vec<RequestOutcome> {
        let mut outcomes = Vec::with_capacity(plan.requests.len());
        for request in &plan.requests {
            let result = send(self.store.as_ref(), plan.batch_id, request).await;
            outcomes.push(RequestOutcome {
                request: request.clone(),
                result,
            });
        }
        outcomes
    }

    async fn execute_concurrent(&self, plan: &TransitionPlan) -> Vec<RequestOutcome> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks: Vec<JoinHandle<Result<Vec<StudentId>, TransitionError>>> = Vec::new();

        for request in &plan.requests {
            let store = Arc::clone(&self.store);
            let sem = Arc::clone(&sem);
            let request = request.clone();
            let batch_id = plan.batch_id;

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await.ok();
                    send(store.as_ref(), batch_id, &request).await
                }
                .in_current_span(),
            );
            tasks.push(task);
        }

        // Awaiting in spawn order keeps outcomes in plan order.
        let mut outcomes = Vec::with_capacity(tasks.len());
        for (task, request) in tasks.into_iter().zip(&plan.requests) {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(TransitionError::new(
                    ErrorKind::Unknown,
                    None,
                    join_err.to_string(),
                )),
            };
            outcomes.push(RequestOutcome {
                request: request.clone(),
                result,
            });
        }
        outcomes
    }
}

/// Send one request through the endpoint matching its kind and scope.
async fn send(
    store: &dyn RosterStore,
    batch_id: Uuid,
    request: &TransitionRequest,
) -> Result<Vec<StudentId>, TransitionError> {
    obs::emit_transition_sent(batch_id, &request.kind, request.student_ids.len());
    METRICS.inc_requests_sent();

    let result = match request.kind {
        TransitionKind::StatusChange { status } => match request.student_ids.as_slice() {
            [id] if request.is_single_student() => store
                .update_promotion_status(*id, status)
                .await
                .map(|()| request.student_ids.clone()),
            ids => {
                let updates: Vec<PromotionStatusUpdate> = ids
                    .iter()
                    .map(|id| PromotionStatusUpdate {
                        id: *id,
                        promotion_status: status,
                    })
                    .collect();
                store
                    .bulk_update_promotion_status(&updates)
                    .await
                    .map(|()| request.student_ids.clone())
            }
        },
        TransitionKind::GroupMove { target } => {
            let payload = PromotionPayload {
                student_ids: request.student_ids.clone(),
                target_group_id: target,
                promotion_status: PromotionStatus::Active,
            };
            store.promote_students(&payload).await
        }
    };

    match result {
        Ok(ids) => {
            METRICS.add_students_transitioned(ids.len() as u64);
            Ok(ids)
        }
        Err(failure) => {
            let error = TransitionError::from(failure);
            METRICS.inc_requests_failed();
            obs::emit_transition_failed(batch_id, &request.kind, &error);
            Err(error)
        }
    }
}
