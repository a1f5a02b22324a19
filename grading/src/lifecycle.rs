//! # Result lifecycle
//!
//! | from          | to                                   |
//! |---------------|--------------------------------------|
//! | `Pending`     | `Published`, `Cancelled`             |
//! | `Published`   | `Withheld`, `Cancelled`, `UnderReview` |
//! | `UnderReview` | `Published`, `Withheld`, `Cancelled` |
//! | `Withheld`    | `UnderReview`, `Cancelled`           |
//!
//! `Cancelled` is terminal. The lock is orthogonal to the status: it can only be set
//! on a `Published` result, and while set every transition and moderation is refused.
//! Every function here returns a new record and leaves the input untouched.

use crate::error::StateError;
use crate::record::{FinalMarkRecord, ResultStatus};
use chrono::{DateTime, Utc};

use ResultStatus::*;

pub fn can_transition(from: ResultStatus, to: ResultStatus) -> bool {
    matches!(
        (from, to),
        (Pending, Published)
            | (Pending, Cancelled)
            | (Published, Withheld)
            | (Published, Cancelled)
            | (Published, UnderReview)
            | (UnderReview, Published)
            | (UnderReview, Withheld)
            | (UnderReview, Cancelled)
            | (Withheld, UnderReview)
            | (Withheld, Cancelled)
    )
}

fn ensure_mutable(record: &FinalMarkRecord) -> Result<(), StateError> {
    if record.is_locked {
        return Err(StateError::Locked {
            key: record.key.clone(),
        });
    }
    if record.result_status == Cancelled {
        return Err(StateError::Terminal {
            key: record.key.clone(),
        });
    }
    Ok(())
}

pub fn transition(
    record: &FinalMarkRecord,
    to: ResultStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<FinalMarkRecord, StateError> {
    ensure_mutable(record)?;
    let from = record.result_status;
    if !can_transition(from, to) {
        return Err(StateError::InvalidTransition { from, to });
    }
    if to == Published && !record.computation.is_complete() {
        return Err(StateError::IncompleteComputation {
            key: record.key.clone(),
        });
    }

    let mut next = record.clone().touched(actor, now);
    next.result_status = to;
    if to == Published {
        next.published_by = Some(actor.to_string());
        next.published_at = Some(now);
    }
    Ok(next)
}

/// Status a record moves to when its marks are moderated.
pub(crate) fn enter_review(record: &FinalMarkRecord) -> Result<ResultStatus, StateError> {
    ensure_mutable(record)?;
    Ok(UnderReview)
}

pub fn lock(record: &FinalMarkRecord, actor: &str, now: DateTime<Utc>) -> Result<FinalMarkRecord, StateError> {
    if record.is_locked {
        return Err(StateError::Locked {
            key: record.key.clone(),
        });
    }
    if record.result_status != Published {
        return Err(StateError::LockRequiresPublished {
            status: record.result_status,
        });
    }
    let mut next = record.clone().touched(actor, now);
    next.is_locked = true;
    next.locked_by = Some(actor.to_string());
    next.locked_at = Some(now);
    Ok(next)
}

/// Administrative override clearing the lock.
pub fn unlock(record: &FinalMarkRecord, actor: &str, now: DateTime<Utc>) -> Result<FinalMarkRecord, StateError> {
    if !record.is_locked {
        return Err(StateError::NotLocked {
            key: record.key.clone(),
        });
    }
    let mut next = record.clone().touched(actor, now);
    next.is_locked = false;
    next.locked_by = None;
    next.locked_at = None;
    Ok(next)
}
