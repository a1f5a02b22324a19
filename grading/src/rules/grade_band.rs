use crate::record::PassStatus;
use crate::types::GradeSystemCategory;
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_true() -> bool {
    true
}

/// One band of a regulation's grade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GradeTableEntry {
    #[validate(length(min = 1, message = "regulation_id is required"))]
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    #[validate(range(min = 0.0, max = 100.0, message = "min_mark must be within 0-100"))]
    pub min_mark: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "max_mark must be within 0-100"))]
    pub max_mark: f64,
    #[validate(length(min = 1, message = "grade_label is required"))]
    pub grade_label: String,
    #[validate(range(min = 0.0, message = "grade_points cannot be negative"))]
    pub grade_points: f64,
    pub qualifies_for_pass: bool,
    #[serde(default = "default_true")]
    pub counts_toward_gpa: bool,
    /// Pass status forced on a result that lands in a non-qualifying band.
    #[serde(default)]
    pub result_status_override: Option<PassStatus>,
    #[serde(default)]
    pub description: String,
}

/// A grade outside the percentage partition, e.g. `AAA` for absence or `U` for reappear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SpecialGrade {
    #[validate(length(min = 1, message = "regulation_id is required"))]
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    #[validate(length(min = 1, message = "grade_label is required"))]
    pub grade_label: String,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "grade_points cannot be negative"))]
    pub grade_points: f64,
    #[serde(default)]
    pub counts_toward_gpa: bool,
    #[serde(default)]
    pub description: String,
}
