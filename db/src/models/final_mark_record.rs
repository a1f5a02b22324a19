//! Stored final result of one student in one course offering.
//!
//! One row per `(exam_registration_id, course_offering_id)`. The moderation history
//! lives in [`super::moderation_event`].

use chrono::{DateTime, Utc};
use grading::record::{PassStatus as GradingPassStatus, ResultStatus as GradingResultStatus};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "final_mark_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub exam_registration_id: String,
    pub course_offering_id: String,

    pub student_id: String,
    pub register_no: String,
    pub course_code: String,
    pub institution_id: String,
    pub program_id: String,
    pub examination_session_id: String,
    pub regulation_id: String,
    /// `UG` or `PG`.
    pub category: String,

    pub internal_obtained: f64,
    pub internal_maximum: f64,
    pub internal_percentage: Option<f64>,
    pub external_obtained: f64,
    pub external_maximum: f64,
    pub external_percentage: Option<f64>,
    pub grace_marks: f64,
    pub total_obtained: f64,
    pub total_maximum: f64,
    pub total_percentage: f64,

    pub letter_grade: Option<String>,
    pub grade_points: f64,
    pub grade_description: Option<String>,
    pub counts_toward_gpa: bool,
    pub credits: f64,
    pub credit_points: f64,

    pub is_pass: bool,
    pub is_distinction: bool,
    pub is_first_class: bool,
    pub pass_status: PassStatus,
    /// Comma-separated, e.g. `overall,component_minimum:internal`.
    pub fail_reasons: String,
    pub ineligibility_rule: Option<String>,
    pub condonation_applied: Option<f64>,
    pub passing_rule: Option<String>,

    pub result_status: ResultStatus,
    pub is_locked: bool,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub published_by: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_moderated: bool,

    pub calculated_by: String,
    pub calculated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, strum::Display, strum::EnumString)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "snake_case")]
pub enum PassStatus {
    #[sea_orm(string_value = "pass")]
    Pass,
    #[sea_orm(string_value = "fail")]
    Fail,
    #[sea_orm(string_value = "reappear")]
    Reappear,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "withheld")]
    Withheld,
    #[sea_orm(string_value = "expelled")]
    Expelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, strum::Display, strum::EnumString)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "snake_case")]
pub enum ResultStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "withheld")]
    Withheld,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
}

impl From<GradingPassStatus> for PassStatus {
    fn from(status: GradingPassStatus) -> Self {
        match status {
            GradingPassStatus::Pass => PassStatus::Pass,
            GradingPassStatus::Fail => PassStatus::Fail,
            GradingPassStatus::Reappear => PassStatus::Reappear,
            GradingPassStatus::Absent => PassStatus::Absent,
            GradingPassStatus::Withheld => PassStatus::Withheld,
            GradingPassStatus::Expelled => PassStatus::Expelled,
        }
    }
}

impl From<PassStatus> for GradingPassStatus {
    fn from(status: PassStatus) -> Self {
        match status {
            PassStatus::Pass => GradingPassStatus::Pass,
            PassStatus::Fail => GradingPassStatus::Fail,
            PassStatus::Reappear => GradingPassStatus::Reappear,
            PassStatus::Absent => GradingPassStatus::Absent,
            PassStatus::Withheld => GradingPassStatus::Withheld,
            PassStatus::Expelled => GradingPassStatus::Expelled,
        }
    }
}

impl From<GradingResultStatus> for ResultStatus {
    fn from(status: GradingResultStatus) -> Self {
        match status {
            GradingResultStatus::Pending => ResultStatus::Pending,
            GradingResultStatus::Published => ResultStatus::Published,
            GradingResultStatus::Withheld => ResultStatus::Withheld,
            GradingResultStatus::Cancelled => ResultStatus::Cancelled,
            GradingResultStatus::UnderReview => ResultStatus::UnderReview,
        }
    }
}

impl From<ResultStatus> for GradingResultStatus {
    fn from(status: ResultStatus) -> Self {
        match status {
            ResultStatus::Pending => GradingResultStatus::Pending,
            ResultStatus::Published => GradingResultStatus::Published,
            ResultStatus::Withheld => GradingResultStatus::Withheld,
            ResultStatus::Cancelled => GradingResultStatus::Cancelled,
            ResultStatus::UnderReview => GradingResultStatus::UnderReview,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::moderation_event::Entity")]
    ModerationEvents,
}

impl Related<super::moderation_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModerationEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
