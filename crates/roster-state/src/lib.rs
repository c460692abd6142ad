//! Roster-State: remote roster store for student promotion
//!
//! This crate owns every byte that crosses the wire between the promotion
//! engine and the academy backend.
//!
//! ## Layer 0 - Data/Transport
//!
//! Focus: faithful wire types and a backend-agnostic store trait.
//!
//! ## Key Components
//!
//! - `RosterStore`: async trait over the five backend operations
//! - `HttpRosterStore`: `reqwest` implementation against the REST API
//! - `fakes::MemoryRosterStore`: in-memory store enforcing backend rejections

mod error;
pub mod fakes;
mod http;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use http::{ApiConfig, HttpRosterStore};
pub use schema::{
    EnrollmentStatus, Group, GroupId, Level, LevelId, PromotionPayload, PromotionStatus,
    PromotionStatusUpdate, Student, StudentGroupRow, StudentId,
};
pub use store::{RosterStore, StoreResult};
