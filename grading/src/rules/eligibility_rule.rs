use crate::record::PassStatus;
use crate::types::GradeSystemCategory;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

fn default_true() -> bool {
    true
}

/// Outcome applied when a student fails an eligibility rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleStatus {
    #[default]
    Withheld,
    /// Used by attendance-specific rules that send the student back to the course.
    Reappear,
}

impl From<IneligibleStatus> for PassStatus {
    fn from(status: IneligibleStatus) -> Self {
        match status {
            IneligibleStatus::Withheld => PassStatus::Withheld,
            IneligibleStatus::Reappear => PassStatus::Reappear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_condonation"))]
pub struct EligibilityRule {
    #[validate(length(min = 1, message = "rule_code is required"))]
    pub rule_code: String,
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    #[serde(default)]
    pub priority_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "minimum_overall_percentage must be within 0-100"))]
    pub minimum_overall_percentage: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "minimum_attendance_percentage must be within 0-100"))]
    pub minimum_attendance_percentage: Option<f64>,
    #[serde(default)]
    pub mandatory_components_completion: bool,
    /// Defaults to 100 when completion is mandatory.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "minimum_components_completion_percentage must be within 0-100"))]
    pub minimum_components_completion_percentage: Option<f64>,
    #[serde(default)]
    pub condonation_allowed: bool,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "condonation_percentage_limit must be within 0-100"))]
    pub condonation_percentage_limit: Option<f64>,
    #[serde(default)]
    pub failure_status: IneligibleStatus,
}

fn validate_condonation(rule: &EligibilityRule) -> Result<(), ValidationError> {
    if rule.condonation_allowed && rule.condonation_percentage_limit.is_none() {
        return Err(ValidationError::new("condonation_limit")
            .with_message(Cow::Borrowed("condonation_percentage_limit is required when condonation is allowed")));
    }
    Ok(())
}
