//! The persisted result of one student in one course, and its status enums.

use crate::aggregator::AggregatedMarks;
use crate::passing::FailReason;
use crate::types::{GradeSystemCategory, RecordKey, StudentCourseContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Academic outcome of the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Pass,
    Fail,
    Reappear,
    Absent,
    Withheld,
    Expelled,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Pass => "pass",
            PassStatus::Fail => "fail",
            PassStatus::Reappear => "reappear",
            PassStatus::Absent => "absent",
            PassStatus::Withheld => "withheld",
            PassStatus::Expelled => "expelled",
        }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(PassStatus::Pass),
            "fail" => Ok(PassStatus::Fail),
            "reappear" => Ok(PassStatus::Reappear),
            "absent" => Ok(PassStatus::Absent),
            "withheld" => Ok(PassStatus::Withheld),
            "expelled" => Ok(PassStatus::Expelled),
            other => Err(format!("unknown pass status '{other}'")),
        }
    }
}

/// Publication state of a result. See [`crate::lifecycle`] for the allowed moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    Published,
    Withheld,
    Cancelled,
    UnderReview,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Published => "published",
            ResultStatus::Withheld => "withheld",
            ResultStatus::Cancelled => "cancelled",
            ResultStatus::UnderReview => "under_review",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResultStatus::Pending),
            "published" => Ok(ResultStatus::Published),
            "withheld" => Ok(ResultStatus::Withheld),
            "cancelled" => Ok(ResultStatus::Cancelled),
            "under_review" => Ok(ResultStatus::UnderReview),
            other => Err(format!("unknown result status '{other}'")),
        }
    }
}

/// Deterministic outcome of the computation pipeline. Contains no timestamps, so two
/// runs over the same inputs compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkComputation {
    pub marks: AggregatedMarks,
    pub letter_grade: Option<String>,
    pub grade_points: f64,
    pub grade_description: Option<String>,
    pub counts_toward_gpa: bool,
    pub credits: f64,
    /// `grade_points × credits` for a pass, otherwise zero.
    pub credit_points: f64,
    pub is_pass: bool,
    pub is_distinction: bool,
    pub is_first_class: bool,
    pub pass_status: PassStatus,
    pub fail_reasons: Vec<FailReason>,
    /// Eligibility rule that withheld the result, if any.
    pub ineligibility_rule: Option<String>,
    /// Attendance shortfall forgiven through condonation, in percentage points.
    pub condonation_applied: Option<f64>,
    pub passing_rule: Option<String>,
}

impl MarkComputation {
    /// Published results must carry a consistent outcome: a pass has a grade, and
    /// `is_pass` agrees with `pass_status`.
    pub fn is_complete(&self) -> bool {
        let consistent = self.is_pass == (self.pass_status == PassStatus::Pass);
        consistent && (!self.is_pass || self.letter_grade.is_some())
    }
}

/// Marks as they stood on one side of a moderation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarksSnapshot {
    pub internal: f64,
    pub external: f64,
    pub grace: f64,
    pub total: f64,
    pub percentage: f64,
}

impl From<&AggregatedMarks> for MarksSnapshot {
    fn from(marks: &AggregatedMarks) -> Self {
        Self {
            internal: marks.internal_obtained,
            external: marks.external_obtained,
            grace: marks.grace_marks,
            total: marks.total_obtained,
            percentage: marks.total_percentage,
        }
    }
}

/// Append-only audit entry for a post-calculation mark change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationEvent {
    /// 1-based position in the record's moderation history.
    pub sequence: u32,
    pub before: MarksSnapshot,
    pub after: MarksSnapshot,
    pub moderated_by: String,
    pub moderation_date: DateTime<Utc>,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalMarkRecord {
    pub key: RecordKey,
    pub student_id: String,
    pub register_no: String,
    pub course_code: String,
    pub institution_id: String,
    pub program_id: String,
    pub examination_session_id: String,
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    pub computation: MarkComputation,
    pub result_status: ResultStatus,
    pub is_locked: bool,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub published_by: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_moderated: bool,
    pub moderation_events: Vec<ModerationEvent>,
    pub calculated_by: String,
    pub calculated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl FinalMarkRecord {
    /// A fresh, unlocked `Pending` result.
    pub fn new(
        ctx: &StudentCourseContext,
        computation: MarkComputation,
        calculated_by: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: ctx.key.clone(),
            student_id: ctx.student_id.clone(),
            register_no: ctx.register_no.clone(),
            course_code: ctx.course.course_code.clone(),
            institution_id: ctx.institution_id.clone(),
            program_id: ctx.program_id.clone(),
            examination_session_id: ctx.examination_session_id.clone(),
            regulation_id: ctx.regulation_id.clone(),
            category: ctx.category,
            computation,
            result_status: ResultStatus::Pending,
            is_locked: false,
            locked_by: None,
            locked_at: None,
            published_by: None,
            published_at: None,
            is_moderated: false,
            moderation_events: Vec::new(),
            calculated_by: calculated_by.to_string(),
            calculated_at: now,
            created_at: now,
            updated_at: now,
            updated_by: calculated_by.to_string(),
        }
    }

    /// Replaces the computation of an existing record, keeping its creation stamp.
    pub fn recalculated(&self, computation: MarkComputation, calculated_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            computation,
            calculated_by: calculated_by.to_string(),
            calculated_at: now,
            updated_at: now,
            updated_by: calculated_by.to_string(),
            ..self.clone()
        }
    }

    pub fn snapshot(&self) -> MarksSnapshot {
        MarksSnapshot::from(&self.computation.marks)
    }

    pub(crate) fn touched(mut self, actor: &str, now: DateTime<Utc>) -> Self {
        self.updated_by = actor.to_string();
        self.updated_at = now;
        self
    }
}
