//! The `RosterStore` trait: the backend operations the promotion engine consumes.
//!
//! The trait is async and backend-agnostic. `HttpRosterStore` talks to the
//! academy REST API; `fakes::MemoryRosterStore` keeps everything in memory
//! for tests.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schema::{
    Group, PromotionPayload, PromotionStatus, PromotionStatusUpdate, StudentGroupRow, StudentId,
};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Remote roster store.
///
/// Guarantees expected of every implementation:
/// - Reads return the authoritative state at the time of the call.
/// - Each mutating call is atomic: the whole payload is applied or none of it.
/// - `promote_students` rejects with status 409 when a student already
///   belongs to the target group, 426 when a student is not active and 400
///   when the payload is incomplete.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Flat join of every active (group, student) membership.
    async fn students_by_group(&self) -> StoreResult<Vec<StudentGroupRow>>;

    /// All groups that may be used as promotion or status targets.
    async fn active_groups(&self) -> StoreResult<Vec<Group>>;

    /// Change the promotion status of one student.
    async fn update_promotion_status(
        &self,
        student_id: StudentId,
        status: PromotionStatus,
    ) -> StoreResult<()>;

    /// Change the promotion status of several students in one call.
    async fn bulk_update_promotion_status(
        &self,
        updates: &[PromotionStatusUpdate],
    ) -> StoreResult<()>;

    /// Move students into a target group. Returns the ids the backend applied.
    async fn promote_students(&self, payload: &PromotionPayload) -> StoreResult<Vec<StudentId>>;
}
