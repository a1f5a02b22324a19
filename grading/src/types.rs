//! Input types describing one student's marks in one course.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a result: one exam registration sitting one course offering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub exam_registration_id: String,
    pub course_offering_id: String,
}

impl RecordKey {
    pub fn new(exam_registration_id: impl Into<String>, course_offering_id: impl Into<String>) -> Self {
        Self {
            exam_registration_id: exam_registration_id.into(),
            course_offering_id: course_offering_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exam_registration_id, self.course_offering_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GradeSystemCategory {
    UG,
    PG,
}

impl GradeSystemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeSystemCategory::UG => "UG",
            GradeSystemCategory::PG => "PG",
        }
    }
}

impl fmt::Display for GradeSystemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GradeSystemCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UG" => Ok(GradeSystemCategory::UG),
            "PG" => Ok(GradeSystemCategory::PG),
            other => Err(format!("unknown grade system category '{other}'")),
        }
    }
}

/// Which assessments a course is examined by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    /// Continuous internal assessment and end-semester exam.
    #[default]
    CiaAndEse,
    CiaOnly,
    EseOnly,
}

impl EvaluationType {
    pub fn evaluates_internal(&self) -> bool {
        matches!(self, EvaluationType::CiaAndEse | EvaluationType::CiaOnly)
    }

    pub fn evaluates_external(&self) -> bool {
        matches!(self, EvaluationType::CiaAndEse | EvaluationType::EseOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Internal,
    External,
    Total,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Component::Internal => "internal",
            Component::External => "external",
            Component::Total => "total",
        })
    }
}

/// Mark scheme of a course offering. Pass marks of `0` mean "not enforced".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMarkConfig {
    pub course_code: String,
    #[serde(default)]
    pub credits: f64,
    #[serde(default)]
    pub evaluation_type: EvaluationType,
    pub internal_max_mark: f64,
    #[serde(default)]
    pub internal_pass_mark: f64,
    /// Scale the internal mark is converted to before it is added to the total.
    #[serde(default)]
    pub internal_converted_mark: Option<f64>,
    pub external_max_mark: f64,
    #[serde(default)]
    pub external_pass_mark: f64,
    #[serde(default)]
    pub external_converted_mark: Option<f64>,
    pub total_max_mark: f64,
    #[serde(default)]
    pub total_pass_mark: f64,
}

/// One itemised internal assessment (test, assignment, seminar...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalComponent {
    pub name: String,
    /// `None` when the student did not attempt the component.
    pub obtained: Option<f64>,
    pub maximum: f64,
    #[serde(default)]
    pub mandatory: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    Sum,
    Average,
    BestOf(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InternalMarks {
    /// A single mark on the course's internal scale.
    Single { obtained: f64 },
    Itemized {
        components: Vec<InternalComponent>,
        method: CalculationMethod,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamAttendance {
    #[default]
    Present,
    Absent,
    Malpractice,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraceRequest {
    /// Exactly the marks needed to reach the pass threshold.
    Auto,
    Marks(f64),
}

/// Everything needed to compute one final mark. Never shared between records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentCourseContext {
    pub key: RecordKey,
    pub student_id: String,
    pub register_no: String,
    #[serde(default)]
    pub institution_id: String,
    #[serde(default)]
    pub program_id: String,
    #[serde(default)]
    pub examination_session_id: String,
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    pub course: CourseMarkConfig,
    #[serde(default)]
    pub internal: Option<InternalMarks>,
    #[serde(default)]
    pub external: Option<f64>,
    #[serde(default)]
    pub exam_attendance: ExamAttendance,
    #[serde(default)]
    pub attendance_percentage: Option<f64>,
    #[serde(default)]
    pub grace_request: Option<GraceRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_deserializes_with_defaults() {
        let json = r#"{
            "key": {"exam_registration_id": "er-1", "course_offering_id": "co-1"},
            "student_id": "s-1",
            "register_no": "21CS001",
            "regulation_id": "R2021",
            "category": "UG",
            "course": {
                "course_code": "CS101",
                "internal_max_mark": 40,
                "external_max_mark": 60,
                "total_max_mark": 100
            },
            "internal": {"type": "itemized", "method": {"best_of": 2}, "components": [
                {"name": "T1", "obtained": 18, "maximum": 20},
                {"name": "T2", "obtained": null, "maximum": 20, "mandatory": true}
            ]},
            "external": 51.5
        }"#;
        let ctx: StudentCourseContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.exam_attendance, ExamAttendance::Present);
        assert_eq!(ctx.course.evaluation_type, EvaluationType::CiaAndEse);
        assert!(ctx.grace_request.is_none());
        match ctx.internal {
            Some(InternalMarks::Itemized { method, ref components }) => {
                assert_eq!(method, CalculationMethod::BestOf(2));
                assert_eq!(components[1].obtained, None);
            }
            other => panic!("unexpected internal marks: {other:?}"),
        }
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("pg".parse::<GradeSystemCategory>(), Ok(GradeSystemCategory::PG));
        assert!("phd".parse::<GradeSystemCategory>().is_err());
    }
}
