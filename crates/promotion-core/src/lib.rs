//! Promotion Core: student promotion and academic-status engine
//!
//! ## Layer 1 - Domain
//!
//! Focus: deciding which groups a student may move to, tracking what is
//! selected, and turning a confirmation into store requests.
//!
//! ## Key Components
//!
//! - `ladder` / `eligibility`: ordered academic levels and eligible targets
//! - `selection`: selected students, with group/all flags derived on read
//! - `planner`: status changes and group moves behind one planning interface
//! - `executor`: sequential or bounded-concurrent issuing of a plan
//! - `classify`: closed taxonomy of remote failures
//! - `session`: plan, execute, patch, refresh

pub mod classify;
pub mod eligibility;
pub mod error;
pub mod executor;
pub mod ladder;
pub mod metrics;
pub mod obs;
pub mod planner;
pub mod roster;
pub mod selection;
pub mod session;
pub mod telemetry;

pub use classify::{classify, ErrorKind, TransitionError};
pub use eligibility::{eligible_targets, is_eligible_target};
pub use error::{PromotionError, Result};
pub use executor::{
    BatchFailure, ExecutionReport, ExecutorConfig, RequestOutcome, TransitionExecutor,
};
pub use ladder::{is_known_level, level_order, LEVEL_LADDER};
pub use metrics::METRICS;
pub use planner::{
    TargetAssignments, TransitionIntent, TransitionKind, TransitionPlan, TransitionPlanner,
    TransitionRequest,
};
pub use roster::{DisplayStatus, GroupRoster, Roster, RosterStudent};
pub use selection::{SelectionScope, SelectionState};
pub use session::{PromotionSession, SessionContext, TransitionOutcome};
pub use telemetry::init_tracing;
