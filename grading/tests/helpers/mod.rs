#![allow(dead_code)]

use grading::retry::RetryPolicy;
use grading::rules::RuleCatalog;
use grading::stores::{InMemoryMarksStore, InMemoryResultStore, InMemoryRuleStore};
use grading::types::{
    CourseMarkConfig, EvaluationType, ExamAttendance, GradeSystemCategory, InternalMarks, RecordKey,
    StudentCourseContext,
};
use grading::{BatchSelection, EngineOptions, ResultEngine};
use std::sync::Arc;
use std::time::Duration;

pub const RULES_JSON: &str = include_str!("../fixtures/rules.json");

/// Engine over in-memory stores, with handles kept for assertions and fault injection.
pub struct Harness {
    pub engine: ResultEngine,
    pub marks: Arc<InMemoryMarksStore>,
    pub rules: Arc<InMemoryRuleStore>,
    pub results: Arc<InMemoryResultStore>,
}

pub fn options() -> EngineOptions {
    EngineOptions {
        concurrency: 4,
        retry: RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        },
        ..Default::default()
    }
}

pub fn harness(contexts: Vec<StudentCourseContext>) -> Harness {
    let marks = Arc::new(InMemoryMarksStore::new(contexts));
    let rules = Arc::new(InMemoryRuleStore::new(RuleCatalog::from_json(RULES_JSON).unwrap()));
    let results = Arc::new(InMemoryResultStore::new());
    let engine = ResultEngine::new(marks.clone(), rules.clone(), results.clone(), options());
    Harness {
        engine,
        marks,
        rules,
        results,
    }
}

pub fn selection() -> BatchSelection {
    BatchSelection {
        calculated_by: "coe-office".into(),
        ..Default::default()
    }
}

pub fn key(exam_registration_id: &str) -> RecordKey {
    RecordKey::new(exam_registration_id, "co-cs101")
}

/// A 40 + 60 = 100 mark course under `R2021` with 85% attendance.
pub fn context(exam_registration_id: &str, internal: f64, external: f64) -> StudentCourseContext {
    StudentCourseContext {
        key: key(exam_registration_id),
        student_id: format!("stu-{exam_registration_id}"),
        register_no: format!("21CS-{exam_registration_id}"),
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

pub fn under(regulation_id: &str, mut ctx: StudentCourseContext) -> StudentCourseContext {
    ctx.regulation_id = regulation_id.into();
    ctx
}
