//! Fixtures shared by unit and engine tests.

use crate::aggregator::RoundingPolicy;
use crate::pipeline;
use crate::record::FinalMarkRecord;
use crate::rules::{ResolvedRules, RuleCatalog};
use crate::types::{
    CourseMarkConfig, EvaluationType, ExamAttendance, GradeSystemCategory, InternalMarks, RecordKey,
    StudentCourseContext,
};
use chrono::{DateTime, Utc};

pub const RULES_JSON: &str = r#"[
    {"kind": "grade_band", "regulation_id": "R2021", "category": "UG", "min_mark": 0, "max_mark": 39.99,
     "grade_label": "RA", "grade_points": 0, "qualifies_for_pass": false, "counts_toward_gpa": false},
    {"kind": "grade_band", "regulation_id": "R2021", "category": "UG", "min_mark": 39.99, "max_mark": 60,
     "grade_label": "B", "grade_points": 6, "qualifies_for_pass": true},
    {"kind": "grade_band", "regulation_id": "R2021", "category": "UG", "min_mark": 60, "max_mark": 75,
     "grade_label": "A", "grade_points": 8, "qualifies_for_pass": true},
    {"kind": "grade_band", "regulation_id": "R2021", "category": "UG", "min_mark": 75, "max_mark": 90,
     "grade_label": "A+", "grade_points": 9, "qualifies_for_pass": true},
    {"kind": "grade_band", "regulation_id": "R2021", "category": "UG", "min_mark": 90, "max_mark": 100,
     "grade_label": "O", "grade_points": 10, "qualifies_for_pass": true},
    {"kind": "absent_grade", "regulation_id": "R2021", "category": "UG", "grade_label": "AAA"},
    {"kind": "reappear_grade", "regulation_id": "R2021", "category": "UG", "grade_label": "U"},
    {"kind": "passing", "regulation_id": "R2021", "category": "UG", "rule_code": "PASS-40",
     "minimum_pass_percentage": 40, "component_wise_minimum_enabled": true,
     "component_wise_minimum_percentage": 35, "grace_mark_enabled": true, "grace_mark_percentage_limit": 2},
    {"kind": "eligibility", "regulation_id": "R2021", "category": "UG", "rule_code": "ATT-60",
     "minimum_attendance_percentage": 60, "condonation_allowed": true, "condonation_percentage_limit": 10},

    {"kind": "grade_band", "regulation_id": "R-BROKEN", "category": "UG", "min_mark": 0, "max_mark": 40,
     "grade_label": "F", "grade_points": 0, "qualifies_for_pass": false},
    {"kind": "grade_band", "regulation_id": "R-BROKEN", "category": "UG", "min_mark": 45, "max_mark": 100,
     "grade_label": "P", "grade_points": 5, "qualifies_for_pass": true},
    {"kind": "passing", "regulation_id": "R-BROKEN", "category": "UG", "rule_code": "PASS",
     "minimum_pass_percentage": 40}
]"#;

pub fn catalog() -> RuleCatalog {
    RuleCatalog::from_json(RULES_JSON).unwrap()
}

pub fn resolved_rules() -> ResolvedRules {
    catalog().get("R2021", GradeSystemCategory::UG).unwrap().resolve().unwrap()
}

pub fn ts(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000 + seconds, 0).unwrap()
}

/// A 40 + 60 = 100 mark course under `R2021`, 85% attendance.
pub fn context(exam_registration_id: &str, internal: f64, external: f64) -> StudentCourseContext {
    StudentCourseContext {
        key: RecordKey::new(exam_registration_id, "co-cs101"),
        student_id: format!("stu-{exam_registration_id}"),
        register_no: format!("21CS{exam_registration_id}"),
        institution_id: "inst-1".into(),
        program_id: "btech-cse".into(),
        examination_session_id: "nov-2025".into(),
        regulation_id: "R2021".into(),
        category: GradeSystemCategory::UG,
        course: CourseMarkConfig {
            course_code: "CS101".into(),
            credits: 4.0,
            evaluation_type: EvaluationType::CiaAndEse,
            internal_max_mark: 40.0,
            internal_pass_mark: 0.0,
            internal_converted_mark: None,
            external_max_mark: 60.0,
            external_pass_mark: 0.0,
            external_converted_mark: None,
            total_max_mark: 100.0,
            total_pass_mark: 0.0,
        },
        internal: Some(InternalMarks::Single { obtained: internal }),
        external: Some(external),
        exam_attendance: ExamAttendance::Present,
        attendance_percentage: Some(85.0),
        grace_request: None,
    }
}

/// A computed, unpublished pass (38 + 55).
pub fn passing_record() -> FinalMarkRecord {
    let ctx = context("er-1", 38.0, 55.0);
    let computation = pipeline::compute(&ctx, &resolved_rules(), RoundingPolicy::default()).unwrap();
    FinalMarkRecord::new(&ctx, computation, "batch", ts(0))
}
