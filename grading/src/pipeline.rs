//! # Final mark computation
//!
//! `aggregate → eligibility → passing rules → grade`, for one student and one course.
//! The result depends only on the context and the rules, so recomputing it is
//! always safe.

use crate::aggregator::{Aggregation, MarksAggregator, RoundingPolicy, round_half_up};
use crate::eligibility::{self, EligibilityInput, EligibilityVerdict};
use crate::error::{ConfigurationError, InputError, Result};
use crate::grade_resolver::ResolvedGrade;
use crate::passing::{FailReason, PassingRuleEngine};
use crate::record::{MarkComputation, PassStatus};
use crate::rules::ResolvedRules;
use crate::types::{Component, ExamAttendance, StudentCourseContext};
use tracing::debug;

/// Computes the outcome for `ctx`. `default_rounding` applies unless the rule set
/// carries its own rounding.
pub fn compute(ctx: &StudentCourseContext, rules: &ResolvedRules, default_rounding: RoundingPolicy) -> Result<MarkComputation> {
    if let Some(attendance) = ctx.attendance_percentage {
        if !(0.0..=100.0).contains(&attendance) {
            return Err(InputError::InvalidPercentage {
                field: "attendance_percentage",
                value: attendance,
            }
            .into());
        }
    }

    let aggregator = MarksAggregator::new(rules.rounding.unwrap_or(default_rounding));

    match ctx.exam_attendance {
        ExamAttendance::Absent => {
            let aggregation = aggregator.aggregate(&ctx.course, ctx.internal.as_ref(), ctx.external)?;
            debug!(key = %ctx.key, "absent from examination");
            let grade = rules.grade_table.absent_grade();
            Ok(assemble(ctx, aggregation, grade, Outcome::not_passed(PassStatus::Absent)))
        }
        ExamAttendance::Malpractice => {
            let aggregation = aggregator.aggregate(&ctx.course, ctx.internal.as_ref(), ctx.external)?;
            debug!(key = %ctx.key, "expelled for malpractice");
            Ok(assemble(ctx, aggregation, None, Outcome::not_passed(PassStatus::Expelled)))
        }
        ExamAttendance::Present => present(ctx, rules, &aggregator),
    }
}

fn present(ctx: &StudentCourseContext, rules: &ResolvedRules, aggregator: &MarksAggregator) -> Result<MarkComputation> {
    let evaluation = ctx.course.evaluation_type;
    if evaluation.evaluates_internal() && ctx.internal.is_none() {
        return Err(InputError::MissingMarks {
            component: Component::Internal,
        }
        .into());
    }
    if evaluation.evaluates_external() && ctx.external.is_none() {
        return Err(InputError::MissingMarks {
            component: Component::External,
        }
        .into());
    }

    let aggregation = aggregator.aggregate(&ctx.course, ctx.internal.as_ref(), ctx.external)?;
    let passing_rule = rules.passing_rule()?;

    let verdict = eligibility::evaluate(
        &rules.eligibility,
        &EligibilityInput {
            overall_percentage: aggregation.marks.total_percentage,
            attendance_percentage: ctx.attendance_percentage,
            component_completion: aggregation.component_completion,
        },
    )?;

    let (aggregation, mut outcome) = match verdict {
        EligibilityVerdict::Ineligible { rule_code, status, .. } => {
            let mut outcome = Outcome::not_passed(status);
            outcome.ineligibility_rule = Some(rule_code);
            outcome.passing_rule = Some(passing_rule.rule_code.clone());
            (aggregation, outcome)
        }
        EligibilityVerdict::Eligible { condonation } => {
            let passing = PassingRuleEngine::new(passing_rule, aggregator).evaluate(
                &ctx.course,
                aggregation,
                ctx.grace_request,
            )?;
            let outcome = Outcome {
                is_pass: passing.is_pass,
                is_distinction: passing.is_distinction,
                is_first_class: passing.is_first_class,
                pass_status: passing.pass_status,
                fail_reasons: passing.fail_reasons,
                ineligibility_rule: None,
                condonation_applied: condonation,
                passing_rule: Some(passing.rule_code),
            };
            (passing.aggregation, outcome)
        }
    };

    let band = rules.grade_table.resolve(aggregation.marks.total_percentage)?;
    if !band.qualifies_for_pass {
        if outcome.is_pass {
            outcome.is_pass = false;
            outcome.is_distinction = false;
            outcome.is_first_class = false;
            outcome.pass_status = PassStatus::Fail;
            outcome.fail_reasons.push(FailReason::GradeBand);
        }
        if outcome.pass_status == PassStatus::Fail {
            if let Some(status) = band.result_status_override {
                outcome.pass_status = status;
            }
        }
    }

    let grade = if outcome.is_pass || !band.qualifies_for_pass {
        band
    } else {
        rules
            .grade_table
            .reappear_grade()
            .ok_or(ConfigurationError::MissingReappearGrade {
                label: band.grade_label.clone(),
            })?
    };

    Ok(assemble(ctx, aggregation, Some(grade), outcome))
}

struct Outcome {
    is_pass: bool,
    is_distinction: bool,
    is_first_class: bool,
    pass_status: PassStatus,
    fail_reasons: Vec<FailReason>,
    ineligibility_rule: Option<String>,
    condonation_applied: Option<f64>,
    passing_rule: Option<String>,
}

impl Outcome {
    fn not_passed(status: PassStatus) -> Self {
        Self {
            is_pass: false,
            is_distinction: false,
            is_first_class: false,
            pass_status: status,
            fail_reasons: Vec::new(),
            ineligibility_rule: None,
            condonation_applied: None,
            passing_rule: None,
        }
    }
}

fn assemble(
    ctx: &StudentCourseContext,
    aggregation: Aggregation,
    grade: Option<ResolvedGrade>,
    outcome: Outcome,
) -> MarkComputation {
    let grade_points = grade.as_ref().map_or(0.0, |g| g.grade_points);
    let credits = ctx.course.credits;
    MarkComputation {
        marks: aggregation.marks,
        letter_grade: grade.as_ref().map(|g| g.grade_label.clone()),
        grade_points,
        grade_description: grade.as_ref().map(|g| g.description.clone()).filter(|d| !d.is_empty()),
        counts_toward_gpa: grade.as_ref().is_some_and(|g| g.counts_toward_gpa),
        credits,
        credit_points: if outcome.is_pass {
            round_half_up(grade_points * credits, 2)
        } else {
            0.0
        },
        is_pass: outcome.is_pass,
        is_distinction: outcome.is_distinction,
        is_first_class: outcome.is_first_class,
        pass_status: outcome.pass_status,
        fail_reasons: outcome.fail_reasons,
        ineligibility_rule: outcome.ineligibility_rule,
        condonation_applied: outcome.condonation_applied,
        passing_rule: outcome.passing_rule,
    }
}
