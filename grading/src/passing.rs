//! # Passing rules
//!
//! Compares aggregated marks against the passing rule in force and the course's own
//! pass marks, then applies grace marks at most once.

use crate::aggregator::{Aggregation, MarksAggregator, ceil_to, round_half_up};
use crate::error::{InputError, Result};
use crate::record::PassStatus;
use crate::rules::PassingRule;
use crate::types::{Component, CourseMarkConfig, GraceRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const EPSILON: f64 = 1e-9;

/// Why a result failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "reason", content = "component", rename_all = "snake_case")]
pub enum FailReason {
    /// Total percentage below the rule's minimum.
    Overall,
    /// A component percentage below the rule's component-wise minimum.
    ComponentMinimum(Component),
    /// Obtained marks below the course's absolute pass mark.
    CourseMinimum(Component),
    /// Percentage falls in a band that does not qualify for a pass.
    GradeBand,
}

impl FailReason {
    /// Failures grace marks can repair.
    fn is_total_shortfall(&self) -> bool {
        matches!(self, FailReason::Overall | FailReason::CourseMinimum(Component::Total))
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Overall => f.write_str("overall"),
            FailReason::ComponentMinimum(c) => write!(f, "component_minimum:{c}"),
            FailReason::CourseMinimum(c) => write!(f, "course_minimum:{c}"),
            FailReason::GradeBand => f.write_str("grade_band"),
        }
    }
}

impl FromStr for FailReason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let component = |name: &str| match name {
            "internal" => Ok(Component::Internal),
            "external" => Ok(Component::External),
            "total" => Ok(Component::Total),
            other => Err(format!("unknown component '{other}'")),
        };
        match s.split_once(':') {
            None if s == "overall" => Ok(FailReason::Overall),
            None if s == "grade_band" => Ok(FailReason::GradeBand),
            Some(("component_minimum", c)) => Ok(FailReason::ComponentMinimum(component(c)?)),
            Some(("course_minimum", c)) => Ok(FailReason::CourseMinimum(component(c)?)),
            _ => Err(format!("unknown fail reason '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassingOutcome {
    pub is_pass: bool,
    pub pass_status: PassStatus,
    pub fail_reasons: Vec<FailReason>,
    /// Final aggregation, including any grace marks that were kept.
    pub aggregation: Aggregation,
    pub is_distinction: bool,
    pub is_first_class: bool,
    pub rule_code: String,
}

pub struct PassingRuleEngine<'a> {
    rule: &'a PassingRule,
    aggregator: &'a MarksAggregator,
}

impl<'a> PassingRuleEngine<'a> {
    pub fn new(rule: &'a PassingRule, aggregator: &'a MarksAggregator) -> Self {
        Self { rule, aggregator }
    }

    pub fn evaluate(
        &self,
        course: &CourseMarkConfig,
        aggregation: Aggregation,
        grace: Option<GraceRequest>,
    ) -> Result<PassingOutcome> {
        let reasons = self.failures(course, &aggregation);
        if reasons.is_empty() {
            return Ok(self.outcome(aggregation, reasons));
        }

        let Some(request) = grace else {
            return Ok(self.outcome(aggregation, reasons));
        };
        if !reasons.iter().all(FailReason::is_total_shortfall) {
            debug!(rule = %self.rule.rule_code, ?reasons, "grace cannot repair component failures");
            return Ok(self.outcome(aggregation, reasons));
        }

        let grace_marks = self.grace_marks(course, &aggregation, request)?;
        let graced = self.aggregator.with_grace(&aggregation, grace_marks);
        let after = self.failures(course, &graced);
        if after.is_empty() {
            debug!(rule = %self.rule.rule_code, grace_marks, "grace marks applied");
            Ok(self.outcome(graced, after))
        } else {
            debug!(rule = %self.rule.rule_code, grace_marks, "grace marks insufficient, discarded");
            Ok(self.outcome(aggregation, reasons))
        }
    }

    /// Percentage used for threshold comparisons.
    fn gate(&self, raw: f64) -> f64 {
        if self.rule.apply_rounding_before_pass_check {
            round_half_up(raw, 0)
        } else {
            raw
        }
    }

    fn failures(&self, course: &CourseMarkConfig, aggregation: &Aggregation) -> Vec<FailReason> {
        let mut reasons = Vec::new();
        let marks = &aggregation.marks;

        if self.gate(aggregation.raw_total_percentage) + EPSILON < self.rule.minimum_pass_percentage {
            reasons.push(FailReason::Overall);
        }

        if self.rule.component_wise_minimum_enabled {
            let minimum = self.rule.component_wise_minimum_percentage.unwrap_or(0.0);
            for (component, raw) in [
                (Component::Internal, aggregation.raw_internal_percentage),
                (Component::External, aggregation.raw_external_percentage),
            ] {
                if let Some(raw) = raw {
                    if self.gate(raw) + EPSILON < minimum {
                        reasons.push(FailReason::ComponentMinimum(component));
                    }
                }
            }
        }

        let evaluation = course.evaluation_type;
        let absolute = [
            (
                Component::Internal,
                evaluation.evaluates_internal(),
                course.internal_pass_mark,
                marks.internal_obtained,
            ),
            (
                Component::External,
                evaluation.evaluates_external(),
                course.external_pass_mark,
                marks.external_obtained,
            ),
            (Component::Total, true, course.total_pass_mark, marks.total_obtained),
        ];
        for (component, evaluated, pass_mark, obtained) in absolute {
            if evaluated && pass_mark > 0.0 && obtained + EPSILON < pass_mark {
                reasons.push(FailReason::CourseMinimum(component));
            }
        }

        reasons
    }

    fn grace_marks(&self, course: &CourseMarkConfig, aggregation: &Aggregation, request: GraceRequest) -> Result<f64> {
        if !self.rule.grace_mark_enabled {
            return Err(InputError::GraceNotPermitted {
                rule_code: self.rule.rule_code.clone(),
            }
            .into());
        }

        let marks = &aggregation.marks;
        let limit = self.rule.grace_mark_percentage_limit.unwrap_or(0.0) / 100.0 * marks.total_maximum;
        let precision = self.aggregator.rounding().precision;

        let requested = match request {
            GraceRequest::Marks(value) if !value.is_finite() => return Err(InputError::NonFiniteGrace.into()),
            GraceRequest::Marks(value) if value < 0.0 => return Err(InputError::NegativeGrace { value }.into()),
            GraceRequest::Marks(value) => value,
            GraceRequest::Auto => {
                let by_percentage =
                    (self.rule.minimum_pass_percentage - aggregation.raw_total_percentage) / 100.0 * marks.total_maximum;
                let by_pass_mark = course.total_pass_mark - marks.total_obtained;
                ceil_to(by_percentage.max(by_pass_mark).max(0.0), precision)
            }
        };

        if requested > limit + EPSILON {
            return Err(InputError::GraceExceedsLimit { requested, limit }.into());
        }
        Ok(requested)
    }

    fn outcome(&self, aggregation: Aggregation, fail_reasons: Vec<FailReason>) -> PassingOutcome {
        let is_pass = fail_reasons.is_empty();
        let percentage = aggregation.marks.total_percentage;
        PassingOutcome {
            is_pass,
            pass_status: if is_pass { PassStatus::Pass } else { PassStatus::Fail },
            fail_reasons,
            is_distinction: is_pass && percentage + EPSILON >= self.rule.distinction_percentage,
            is_first_class: is_pass && percentage + EPSILON >= self.rule.first_class_percentage,
            aggregation,
            rule_code: self.rule.rule_code.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GradingError;
    use crate::types::{EvaluationType, GradeSystemCategory, InternalMarks};

    fn rule() -> PassingRule {
        PassingRule {
            rule_code: "PASS-40".into(),
            regulation_id: "R2021".into(),
            category: GradeSystemCategory::UG,
            priority_order: 0,
            is_active: true,
            minimum_pass_percentage: 40.0,
            component_wise_minimum_enabled: false,
            component_wise_minimum_percentage: None,
            grace_mark_enabled: false,
            grace_mark_percentage_limit: None,
            apply_rounding_before_pass_check: false,
            distinction_percentage: 75.0,
            first_class_percentage: 60.0,
        }
    }

    fn grace_rule() -> PassingRule {
        PassingRule {
            grace_mark_enabled: true,
            grace_mark_percentage_limit: Some(2.0),
            ..rule()
        }
    }

    fn course() -> CourseMarkConfig {
        CourseMarkConfig {
            course_code: "CS101".into(),
            credits: 3.0,
            evaluation_type: EvaluationType::CiaAndEse,
            internal_max_mark: 40.0,
            internal_pass_mark: 0.0,
            internal_converted_mark: None,
            external_max_mark: 60.0,
            external_pass_mark: 0.0,
            external_converted_mark: None,
            total_max_mark: 100.0,
            total_pass_mark: 0.0,
        }
    }

    fn aggregate(internal: f64, external: f64) -> Aggregation {
        MarksAggregator::default()
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: internal }), Some(external))
            .unwrap()
    }

    fn run(rule: &PassingRule, agg: Aggregation, grace: Option<GraceRequest>) -> Result<PassingOutcome> {
        let aggregator = MarksAggregator::default();
        PassingRuleEngine::new(rule, &aggregator).evaluate(&course(), agg, grace)
    }

    #[test]
    fn high_total_passes_with_distinction() {
        let outcome = run(&rule(), aggregate(38.0, 55.0), None).unwrap();
        assert!(outcome.is_pass);
        assert!(outcome.is_distinction);
        assert!(outcome.is_first_class);
        assert_eq!(outcome.pass_status, PassStatus::Pass);
    }

    /// 12/40 internal + 58/60 external is 70% overall but 30% internal.
    #[test]
    fn component_minimum_fails_despite_overall() {
        let rule = PassingRule {
            component_wise_minimum_enabled: true,
            component_wise_minimum_percentage: Some(40.0),
            ..rule()
        };
        let outcome = run(&rule, aggregate(12.0, 58.0), None).unwrap();
        assert!(!outcome.is_pass);
        assert_eq!(outcome.pass_status, PassStatus::Fail);
        assert_eq!(outcome.fail_reasons, vec![FailReason::ComponentMinimum(Component::Internal)]);
        assert_eq!(outcome.aggregation.marks.total_percentage, 70.0);
    }

    #[test]
    fn rounding_before_check_lifts_borderline_percentage() {
        let borderline = aggregate(15.5, 24.0); // 39.5%
        assert!(!run(&rule(), borderline.clone(), None).unwrap().is_pass);
        let rounding = PassingRule {
            apply_rounding_before_pass_check: true,
            ..rule()
        };
        assert!(run(&rounding, borderline, None).unwrap().is_pass);
    }

    /// Short by 1.5 points with a 2 point limit.
    #[test]
    fn auto_grace_within_limit_passes() {
        let outcome = run(&grace_rule(), aggregate(15.0, 23.5), Some(GraceRequest::Auto)).unwrap();
        assert!(outcome.is_pass);
        assert_eq!(outcome.aggregation.marks.grace_marks, 1.5);
        assert_eq!(outcome.aggregation.marks.total_obtained, 40.0);
        assert!(!outcome.is_first_class);
    }

    /// Short by 3 points with a 2 point limit.
    #[test]
    fn grace_beyond_limit_is_rejected() {
        let err = run(&grace_rule(), aggregate(15.0, 22.0), Some(GraceRequest::Auto)).unwrap_err();
        assert_eq!(
            err,
            GradingError::Input(InputError::GraceExceedsLimit {
                requested: 3.0,
                limit: 2.0
            })
        );
        let err = run(&grace_rule(), aggregate(15.0, 23.5), Some(GraceRequest::Marks(2.5))).unwrap_err();
        assert!(matches!(err, GradingError::Input(InputError::GraceExceedsLimit { .. })));
    }

    #[test]
    fn non_finite_grace_is_rejected() {
        for value in [f64::NAN, f64::INFINITY] {
            let err = run(&grace_rule(), aggregate(15.0, 23.5), Some(GraceRequest::Marks(value))).unwrap_err();
            assert_eq!(err, GradingError::Input(InputError::NonFiniteGrace));
        }
    }

    #[test]
    fn insufficient_explicit_grace_is_discarded() {
        let outcome = run(&grace_rule(), aggregate(15.0, 23.5), Some(GraceRequest::Marks(1.0))).unwrap();
        assert!(!outcome.is_pass);
        assert_eq!(outcome.aggregation.marks.grace_marks, 0.0);
        assert_eq!(outcome.fail_reasons, vec![FailReason::Overall]);
    }

    #[test]
    fn grace_requires_permission() {
        let err = run(&rule(), aggregate(15.0, 23.5), Some(GraceRequest::Auto)).unwrap_err();
        assert!(matches!(err, GradingError::Input(InputError::GraceNotPermitted { .. })));
    }

    #[test]
    fn passing_student_ignores_grace_request() {
        let outcome = run(&grace_rule(), aggregate(30.0, 30.0), Some(GraceRequest::Marks(5.0))).unwrap();
        assert!(outcome.is_pass);
        assert_eq!(outcome.aggregation.marks.grace_marks, 0.0);
    }

    #[test]
    fn course_pass_marks_are_enforced() {
        let mut strict = course();
        strict.external_pass_mark = 24.0;
        let aggregator = MarksAggregator::default();
        let agg = aggregator
            .aggregate(&strict, Some(&InternalMarks::Single { obtained: 40.0 }), Some(20.0))
            .unwrap();
        let outcome = PassingRuleEngine::new(&rule(), &aggregator)
            .evaluate(&strict, agg, None)
            .unwrap();
        assert_eq!(outcome.fail_reasons, vec![FailReason::CourseMinimum(Component::External)]);
    }

    #[test]
    fn fail_reason_text_round_trips() {
        for reason in [
            FailReason::Overall,
            FailReason::GradeBand,
            FailReason::ComponentMinimum(Component::Internal),
            FailReason::CourseMinimum(Component::Total),
        ] {
            assert_eq!(reason.to_string().parse::<FailReason>(), Ok(reason));
        }
    }
}
