//! # Moderation
//!
//! Post-calculation mark changes. A moderation replaces some raw marks, recomputes the
//! whole result and appends an audit event; earlier events are never touched.

use crate::aggregator::RoundingPolicy;
use crate::error::{InputError, Result};
use crate::lifecycle;
use crate::pipeline;
use crate::record::{FinalMarkRecord, ModerationEvent};
use crate::rules::ResolvedRules;
use crate::types::{InternalMarks, StudentCourseContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replacement raw marks; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeratedMarks {
    #[serde(default)]
    pub internal: Option<InternalMarks>,
    #[serde(default)]
    pub external: Option<f64>,
}

impl ModeratedMarks {
    pub fn is_empty(&self) -> bool {
        self.internal.is_none() && self.external.is_none()
    }

    pub fn apply_to(&self, ctx: &StudentCourseContext) -> StudentCourseContext {
        let mut next = ctx.clone();
        if let Some(internal) = &self.internal {
            next.internal = Some(internal.clone());
        }
        if let Some(external) = self.external {
            next.external = Some(external);
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModerationRequest {
    pub marks: ModeratedMarks,
    pub moderated_by: String,
    pub remarks: String,
    pub at: DateTime<Utc>,
}

/// `(record, request) -> record'`. Refuses locked and cancelled records; otherwise the
/// new record is `UnderReview` with the recomputed outcome and one more event.
pub fn moderate(
    record: &FinalMarkRecord,
    ctx: &StudentCourseContext,
    rules: &ResolvedRules,
    default_rounding: RoundingPolicy,
    request: &ModerationRequest,
) -> Result<FinalMarkRecord> {
    let status = lifecycle::enter_review(record)?;
    if request.marks.is_empty() {
        return Err(InputError::EmptyModeration.into());
    }
    if ctx.key != record.key {
        return Err(InputError::MissingContext {
            key: record.key.clone(),
        }
        .into());
    }

    let computation = pipeline::compute(&request.marks.apply_to(ctx), rules, default_rounding)?;

    let before = record.snapshot();
    let mut next = record.clone().touched(&request.moderated_by, request.at);
    next.computation = computation;
    next.result_status = status;
    next.is_moderated = true;
    let after = next.snapshot();
    next.moderation_events.push(ModerationEvent {
        sequence: record.moderation_events.len() as u32 + 1,
        before,
        after,
        moderated_by: request.moderated_by.clone(),
        moderation_date: request.at,
        remarks: request.remarks.clone(),
    });
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GradingError, StateError};
    use crate::record::{PassStatus, ResultStatus};
    use crate::test_support::{context, resolved_rules, ts};

    fn request(external: f64) -> ModerationRequest {
        ModerationRequest {
            marks: ModeratedMarks {
                internal: None,
                external: Some(external),
            },
            moderated_by: "moderator".into(),
            remarks: "re-totalled answer script".into(),
            at: ts(100),
        }
    }

    fn record_for(ctx: &StudentCourseContext) -> FinalMarkRecord {
        let computation = pipeline::compute(ctx, &resolved_rules(), RoundingPolicy::default()).unwrap();
        FinalMarkRecord::new(ctx, computation, "batch", ts(0))
    }

    #[test]
    fn moderation_round_trip() {
        let ctx = context("er-1", 20.0, 15.0);
        let record = record_for(&ctx);
        assert_eq!(record.computation.pass_status, PassStatus::Fail);

        let moderated = moderate(&record, &ctx, &resolved_rules(), RoundingPolicy::default(), &request(30.0)).unwrap();
        assert_eq!(moderated.computation.marks.external_obtained, 30.0);
        assert_eq!(moderated.computation.pass_status, PassStatus::Pass);
        assert_eq!(moderated.result_status, ResultStatus::UnderReview);
        assert!(moderated.is_moderated);
        assert_eq!(moderated.updated_by, "moderator");

        let event = &moderated.moderation_events[0];
        assert_eq!(event.sequence, 1);
        assert_eq!(event.before.external, 15.0);
        assert_eq!(event.before.total, 35.0);
        assert_eq!(event.after.total, 50.0);
        assert_eq!(event.remarks, "re-totalled answer script");
    }

    #[test]
    fn events_accumulate() {
        let ctx = context("er-1", 20.0, 15.0);
        let rules = resolved_rules();
        let first = moderate(&record_for(&ctx), &ctx, &rules, RoundingPolicy::default(), &request(30.0)).unwrap();
        let second = moderate(&first, &ctx, &rules, RoundingPolicy::default(), &request(32.0)).unwrap();
        assert_eq!(second.moderation_events.len(), 2);
        assert_eq!(second.moderation_events[0], first.moderation_events[0]);
        assert_eq!(second.moderation_events[1].before.external, 30.0);
    }

    #[test]
    fn locked_record_is_unchanged() {
        let ctx = context("er-1", 20.0, 15.0);
        let mut record = record_for(&ctx);
        record.result_status = ResultStatus::Published;
        record.is_locked = true;
        let before = record.clone();

        let err = moderate(&record, &ctx, &resolved_rules(), RoundingPolicy::default(), &request(30.0)).unwrap_err();
        assert!(matches!(err, GradingError::State(StateError::Locked { .. })));
        assert_eq!(err.to_string(), "record locked");
        assert_eq!(record, before);
    }

    #[test]
    fn cancelled_record_cannot_be_moderated() {
        let ctx = context("er-1", 20.0, 15.0);
        let mut record = record_for(&ctx);
        record.result_status = ResultStatus::Cancelled;
        assert!(matches!(
            moderate(&record, &ctx, &resolved_rules(), RoundingPolicy::default(), &request(30.0)),
            Err(GradingError::State(StateError::Terminal { .. }))
        ));
    }

    #[test]
    fn empty_moderation_is_rejected() {
        let ctx = context("er-1", 20.0, 15.0);
        let mut empty = request(0.0);
        empty.marks = ModeratedMarks::default();
        assert_eq!(
            moderate(&record_for(&ctx), &ctx, &resolved_rules(), RoundingPolicy::default(), &empty),
            Err(GradingError::Input(InputError::EmptyModeration))
        );
    }
}
