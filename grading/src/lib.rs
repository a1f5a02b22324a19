//! # Grading Library
//!
//! Computes final course results from raw internal and external marks and manages
//! them after computation.
//!
//! ## Key Concepts
//! - **Rule sets**: grade bands, eligibility, passing and rounding rules, keyed by
//!   regulation and grade-system category.
//! - **Pipeline**: aggregate marks, check eligibility, apply passing rules, then
//!   resolve the grade. Pure and deterministic for a given context and rule set.
//! - **Lifecycle**: a result moves `Pending → Published → …` and can be locked once
//!   published. Moderation replaces marks and puts the result under review.
//! - **Batches**: [`ResultEngine::run_batch`] computes a whole selection concurrently
//!   and reports failures per record.

pub mod aggregator;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod grade_resolver;
pub mod lifecycle;
pub mod locks;
pub mod moderation;
pub mod orchestrator;
pub mod passing;
pub mod pipeline;
pub mod record;
pub mod retry;
pub mod rules;
pub mod stores;
pub mod traits;
pub mod types;

#[cfg(test)]
mod test_support;

pub use engine::{EngineOptions, ResultEngine};
pub use error::{BatchError, ErrorKind, GradingError};
pub use orchestrator::{BatchSummary, RecordFailure};
pub use record::{FinalMarkRecord, PassStatus, ResultStatus};
pub use traits::store::{BatchSelection, MarksStore, ResultStore, RuleStore};
pub use types::{RecordKey, StudentCourseContext};
