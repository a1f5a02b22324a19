//! Error types for the result engine.
//!
//! Errors are split by what the caller has to do about them: fix the rule
//! configuration, fix the submitted marks, respect the result lifecycle, or retry
//! against the stores. [`GradingError`] wraps all of them for per-record operations;
//! [`BatchError`] is reserved for failures that stop a batch from running at all.

use crate::record::ResultStatus;
use crate::types::{Component, GradeSystemCategory, RecordKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("no rule set configured for regulation {regulation_id} ({category})")]
    MissingRuleSet {
        regulation_id: String,
        category: GradeSystemCategory,
    },

    #[error("no active passing rule for regulation {regulation_id} ({category})")]
    MissingPassingRule {
        regulation_id: String,
        category: GradeSystemCategory,
    },

    #[error("grade table for regulation {regulation_id} ({category}) is empty")]
    EmptyGradeTable {
        regulation_id: String,
        category: GradeSystemCategory,
    },

    #[error("grade table must span 0-100, found {min}-{max}")]
    GradeTableBounds { min: f64, max: f64 },

    #[error("grade band {label} has min_mark {min} not below max_mark {max}")]
    InvalidBand { label: String, min: f64, max: f64 },

    #[error("grade table has a gap between {below} and {above}")]
    GradeTableGap { below: f64, above: f64 },

    #[error("grade bands {first} and {second} overlap")]
    GradeTableOverlap { first: String, second: String },

    #[error("grade entry {label} belongs to regulation {regulation_id} ({category})")]
    ForeignGradeEntry {
        label: String,
        regulation_id: String,
        category: GradeSystemCategory,
    },

    #[error("{component} maximum mark is zero")]
    ZeroMaximum { component: Component },

    #[error("invalid rule definition: {0}")]
    InvalidRule(String),

    #[error("no reappear grade configured for a non-passing result in band {label}")]
    MissingReappearGrade { label: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("{component} marks are required for this evaluation type")]
    MissingMarks { component: Component },

    #[error("{component} marks cannot be negative (got {value})")]
    NegativeMarks { component: Component, value: f64 },

    #[error("{component} marks must be a finite number")]
    NonFiniteMarks { component: Component },

    #[error("{field} must be within 0-100 (got {value})")]
    InvalidPercentage { field: &'static str, value: f64 },

    #[error("attendance percentage is required by eligibility rule {rule_code}")]
    MissingAttendance { rule_code: String },

    #[error("invalid internal calculation: {0}")]
    InvalidCalculation(String),

    #[error("grace marks are not permitted by passing rule {rule_code}")]
    GraceNotPermitted { rule_code: String },

    #[error("grace of {requested} marks exceeds the limit of {limit} marks")]
    GraceExceedsLimit { requested: f64, limit: f64 },

    #[error("grace marks cannot be negative (got {value})")]
    NegativeGrace { value: f64 },

    #[error("grace marks must be a finite number")]
    NonFiniteGrace,

    #[error("moderation must change internal or external marks")]
    EmptyModeration,

    #[error("no marks found for {key}")]
    MissingContext { key: RecordKey },

    #[error("{key} appears more than once in the selection")]
    DuplicateContext { key: RecordKey },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("record locked")]
    Locked { key: RecordKey },

    #[error("result {key} is cancelled")]
    Terminal { key: RecordKey },

    #[error("cannot move result from {from} to {to}")]
    InvalidTransition { from: ResultStatus, to: ResultStatus },

    #[error("only published results can be locked (status is {status})")]
    LockRequiresPublished { status: ResultStatus },

    #[error("result {key} is not locked")]
    NotLocked { key: RecordKey },

    #[error("result {key} has an incomplete computation")]
    IncompleteComputation { key: RecordKey },

    #[error("no result stored for {key}")]
    NotFound { key: RecordKey },

    #[error("result {key} is {status} and can no longer be recalculated")]
    AlreadyFinal { key: RecordKey, status: ResultStatus },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Connection-level failure; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected the request: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradingError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse classification surfaced in batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Input,
    State,
    Store,
    /// A worker task panicked or was aborted.
    Internal,
}

impl GradingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GradingError::Configuration(_) => ErrorKind::Configuration,
            GradingError::Input(_) => ErrorKind::Input,
            GradingError::State(_) => ErrorKind::State,
            GradingError::Store(_) => ErrorKind::Store,
        }
    }
}

/// A batch that could not run: the selection or its rules could not be loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    #[error("batch could not start: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, GradingError>;
