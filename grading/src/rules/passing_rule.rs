use crate::types::GradeSystemCategory;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

fn default_true() -> bool {
    true
}

fn default_distinction() -> f64 {
    75.0
}

fn default_first_class() -> f64 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_passing_rule"))]
pub struct PassingRule {
    #[validate(length(min = 1, message = "rule_code is required"))]
    pub rule_code: String,
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    #[serde(default)]
    pub priority_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[validate(range(min = 0.0, max = 100.0, message = "minimum_pass_percentage must be within 0-100"))]
    pub minimum_pass_percentage: f64,
    #[serde(default)]
    pub component_wise_minimum_enabled: bool,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "component_wise_minimum_percentage must be within 0-100"))]
    pub component_wise_minimum_percentage: Option<f64>,
    #[serde(default)]
    pub grace_mark_enabled: bool,
    /// Percentage points of the total maximum that grace may add.
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0, message = "grace_mark_percentage_limit must be within 0-100"))]
    pub grace_mark_percentage_limit: Option<f64>,
    #[serde(default)]
    pub apply_rounding_before_pass_check: bool,
    #[serde(default = "default_distinction")]
    #[validate(range(min = 0.0, max = 100.0, message = "distinction_percentage must be within 0-100"))]
    pub distinction_percentage: f64,
    #[serde(default = "default_first_class")]
    #[validate(range(min = 0.0, max = 100.0, message = "first_class_percentage must be within 0-100"))]
    pub first_class_percentage: f64,
}

fn validate_passing_rule(rule: &PassingRule) -> Result<(), ValidationError> {
    if rule.component_wise_minimum_enabled && rule.component_wise_minimum_percentage.is_none() {
        return Err(ValidationError::new("component_minimum").with_message(Cow::Borrowed(
            "component_wise_minimum_percentage is required when component-wise minimum is enabled",
        )));
    }
    if rule.grace_mark_enabled && rule.grace_mark_percentage_limit.is_none() {
        return Err(ValidationError::new("grace_limit")
            .with_message(Cow::Borrowed("grace_mark_percentage_limit is required when grace marks are enabled")));
    }
    if rule.first_class_percentage > rule.distinction_percentage {
        return Err(ValidationError::new("classification")
            .with_message(Cow::Borrowed("first_class_percentage cannot exceed distinction_percentage")));
    }
    Ok(())
}
