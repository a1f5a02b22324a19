//! # Marks aggregation
//!
//! Turns raw internal and external marks into capped obtained marks and rounded
//! percentages. Everything here is a pure function of its inputs.
//!
//! Percentages are `obtained × 100 / maximum`. The same [`RoundingPolicy`] is applied
//! to the internal, external and total percentages; the unrounded total is kept
//! alongside so the passing rules can decide which one to compare.

use crate::error::{ConfigurationError, InputError, Result};
use crate::types::{CalculationMethod, Component, CourseMarkConfig, InternalComponent, InternalMarks};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Values closer than this to a rounding boundary are treated as sitting on it.
const SNAP_SCALE: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    Floor,
    #[default]
    HalfUp,
    None,
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "floor" => Ok(RoundingMode::Floor),
            "half_up" | "halfup" | "round" => Ok(RoundingMode::HalfUp),
            "none" => Ok(RoundingMode::None),
            other => Err(format!("unknown rounding mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingPolicy {
    pub mode: RoundingMode,
    pub precision: u32,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            mode: RoundingMode::HalfUp,
            precision: 2,
        }
    }
}

impl RoundingPolicy {
    pub fn new(mode: RoundingMode, precision: u32) -> Self {
        Self { mode, precision }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self.mode {
            RoundingMode::Floor => floor_to(value, self.precision),
            RoundingMode::HalfUp => round_half_up(value, self.precision),
            RoundingMode::None => value,
        }
    }
}

fn snapped(value: f64, precision: u32) -> (f64, f64) {
    let factor = 10f64.powi(precision as i32);
    let scaled = (value * factor * SNAP_SCALE).round() / SNAP_SCALE;
    (scaled, factor)
}

/// Rounds half away from zero, after snapping binary noise such as `92.49999999`.
pub fn round_half_up(value: f64, precision: u32) -> f64 {
    let (scaled, factor) = snapped(value, precision);
    (scaled.abs() + 0.5).floor().copysign(scaled) / factor
}

pub fn floor_to(value: f64, precision: u32) -> f64 {
    let (scaled, factor) = snapped(value, precision);
    scaled.floor() / factor
}

pub fn ceil_to(value: f64, precision: u32) -> f64 {
    let (scaled, factor) = snapped(value, precision);
    scaled.ceil() / factor
}

/// Capped marks and rounded percentages as stored on a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMarks {
    pub internal_obtained: f64,
    pub internal_maximum: f64,
    /// `None` when the course does not evaluate the component.
    pub internal_percentage: Option<f64>,
    pub external_obtained: f64,
    pub external_maximum: f64,
    pub external_percentage: Option<f64>,
    pub grace_marks: f64,
    pub total_obtained: f64,
    pub total_maximum: f64,
    pub total_percentage: f64,
}

/// Output of [`MarksAggregator::aggregate`]: stored marks plus the unrounded figures
/// used while deciding the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub marks: AggregatedMarks,
    pub raw_internal_percentage: Option<f64>,
    pub raw_external_percentage: Option<f64>,
    pub raw_total_percentage: f64,
    /// Share of mandatory internal components attempted, 0-100.
    pub component_completion: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarksAggregator {
    rounding: RoundingPolicy,
}

struct ComponentMarks {
    obtained: f64,
    maximum: f64,
    raw_percentage: Option<f64>,
}

impl MarksAggregator {
    pub fn new(rounding: RoundingPolicy) -> Self {
        Self { rounding }
    }

    pub fn rounding(&self) -> RoundingPolicy {
        self.rounding
    }

    /// Missing marks are treated as zero; callers decide beforehand whether a missing
    /// component is acceptable (it is for absent students).
    pub fn aggregate(
        &self,
        course: &CourseMarkConfig,
        internal: Option<&InternalMarks>,
        external: Option<f64>,
    ) -> Result<Aggregation> {
        let evaluation = course.evaluation_type;

        let (internal_marks, component_completion) = if evaluation.evaluates_internal() {
            let (raw, completion) = match internal {
                Some(marks) => internal_raw(course.internal_max_mark, marks)?,
                None => (0.0, 100.0),
            };
            let marks = self.component(
                Component::Internal,
                raw,
                course.internal_max_mark,
                course.internal_converted_mark,
            )?;
            (marks, completion)
        } else {
            (ComponentMarks::absent(), 100.0)
        };

        let external_marks = if evaluation.evaluates_external() {
            self.component(
                Component::External,
                external.unwrap_or(0.0),
                course.external_max_mark,
                course.external_converted_mark,
            )?
        } else {
            ComponentMarks::absent()
        };

        if course.total_max_mark <= 0.0 {
            return Err(ConfigurationError::ZeroMaximum {
                component: Component::Total,
            }
            .into());
        }

        let base = Aggregation {
            marks: AggregatedMarks {
                internal_obtained: internal_marks.obtained,
                internal_maximum: internal_marks.maximum,
                internal_percentage: internal_marks.raw_percentage.map(|p| self.rounding.apply(p)),
                external_obtained: external_marks.obtained,
                external_maximum: external_marks.maximum,
                external_percentage: external_marks.raw_percentage.map(|p| self.rounding.apply(p)),
                grace_marks: 0.0,
                total_obtained: 0.0,
                total_maximum: course.total_max_mark,
                total_percentage: 0.0,
            },
            raw_internal_percentage: internal_marks.raw_percentage,
            raw_external_percentage: external_marks.raw_percentage,
            raw_total_percentage: 0.0,
            component_completion,
        };

        Ok(self.with_grace(&base, 0.0))
    }

    /// Recomputes the total with `grace` marks added, still capped at the maximum.
    /// Only the grace that fits under the maximum is recorded.
    pub fn with_grace(&self, base: &Aggregation, grace: f64) -> Aggregation {
        let mut next = base.clone();
        let marks = &mut next.marks;
        let earned = marks.internal_obtained + marks.external_obtained;
        let applied = grace.min(marks.total_maximum - earned).max(0.0);
        marks.grace_marks = self.rounding.apply(applied);
        marks.total_obtained = self.rounding.apply((earned + applied).min(marks.total_maximum));
        next.raw_total_percentage = marks.total_obtained * 100.0 / marks.total_maximum;
        marks.total_percentage = self.rounding.apply(next.raw_total_percentage);
        next
    }

    fn component(
        &self,
        component: Component,
        raw: f64,
        max_mark: f64,
        converted: Option<f64>,
    ) -> Result<ComponentMarks> {
        if max_mark <= 0.0 {
            return Err(ConfigurationError::ZeroMaximum { component }.into());
        }
        if !raw.is_finite() {
            return Err(InputError::NonFiniteMarks { component }.into());
        }
        if raw < 0.0 {
            return Err(InputError::NegativeMarks { component, value: raw }.into());
        }
        if raw > max_mark {
            debug!(%component, raw, max_mark, "capping marks at maximum");
        }
        let capped = raw.min(max_mark);

        let (obtained, maximum) = match converted.filter(|c| *c > 0.0) {
            Some(scale) => (capped / max_mark * scale, scale),
            None => (capped, max_mark),
        };
        let obtained = self.rounding.apply(obtained).min(maximum);

        Ok(ComponentMarks {
            obtained,
            maximum,
            raw_percentage: Some(obtained * 100.0 / maximum),
        })
    }
}

impl ComponentMarks {
    fn absent() -> Self {
        Self {
            obtained: 0.0,
            maximum: 0.0,
            raw_percentage: None,
        }
    }
}

/// Raw internal mark on the course's internal scale, plus mandatory completion.
fn internal_raw(max_mark: f64, marks: &InternalMarks) -> Result<(f64, f64)> {
    match marks {
        InternalMarks::Single { obtained } => Ok((*obtained, 100.0)),
        InternalMarks::Itemized { components, method } => {
            if components.is_empty() {
                return Err(InputError::InvalidCalculation("no internal components".into()).into());
            }
            let ratios = component_ratios(components)?;
            let share = match method {
                CalculationMethod::Sum => {
                    let obtained: f64 = components.iter().map(|c| c.obtained.unwrap_or(0.0).min(c.maximum)).sum();
                    let maximum: f64 = components.iter().map(|c| c.maximum).sum();
                    obtained / maximum
                }
                CalculationMethod::Average => ratios.iter().sum::<f64>() / ratios.len() as f64,
                CalculationMethod::BestOf(count) => {
                    if *count == 0 || *count > ratios.len() {
                        return Err(InputError::InvalidCalculation(format!(
                            "best of {count} needs between 1 and {} components",
                            ratios.len()
                        ))
                        .into());
                    }
                    let mut sorted = ratios.clone();
                    sorted.sort_by(|a, b| b.total_cmp(a));
                    sorted.iter().take(*count).sum::<f64>() / *count as f64
                }
            };
            Ok((share * max_mark, completion(components)))
        }
    }
}

fn component_ratios(components: &[InternalComponent]) -> Result<Vec<f64>> {
    components
        .iter()
        .map(|c| {
            if !c.maximum.is_finite() {
                return Err(InputError::NonFiniteMarks {
                    component: Component::Internal,
                }
                .into());
            }
            if c.maximum <= 0.0 {
                return Err(ConfigurationError::ZeroMaximum {
                    component: Component::Internal,
                }
                .into());
            }
            match c.obtained {
                Some(v) if !v.is_finite() => Err(InputError::NonFiniteMarks {
                    component: Component::Internal,
                }
                .into()),
                Some(v) if v < 0.0 => Err(InputError::NegativeMarks {
                    component: Component::Internal,
                    value: v,
                }
                .into()),
                Some(v) => Ok(v.min(c.maximum) / c.maximum),
                None => Ok(0.0),
            }
        })
        .collect()
}

fn completion(components: &[InternalComponent]) -> f64 {
    let mandatory: Vec<_> = components.iter().filter(|c| c.mandatory).collect();
    if mandatory.is_empty() {
        return 100.0;
    }
    let attempted = mandatory.iter().filter(|c| c.obtained.is_some()).count();
    attempted as f64 * 100.0 / mandatory.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GradingError;
    use crate::types::EvaluationType;

    fn course() -> CourseMarkConfig {
        CourseMarkConfig {
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
        }
    }

    fn item(name: &str, obtained: Option<f64>, maximum: f64) -> InternalComponent {
        InternalComponent {
            name: name.into(),
            obtained,
            maximum,
            mandatory: true,
        }
    }

    #[test]
    fn half_up_rounds_away_from_binary_noise() {
        assert_eq!(round_half_up(92.445, 2), 92.45);
        assert_eq!(round_half_up(1.005, 2), 1.01);
        assert_eq!(round_half_up(39.5, 0), 40.0);
        assert_eq!(round_half_up(39.49, 0), 39.0);
        assert_eq!(floor_to(66.666, 2), 66.66);
        assert_eq!(ceil_to(1.501, 2), 1.51);
        assert_eq!(ceil_to(1.5, 2), 1.5);
    }

    #[test]
    fn rounding_mode_parses_aliases() {
        assert_eq!("ROUND".parse::<RoundingMode>(), Ok(RoundingMode::HalfUp));
        assert_eq!("floor".parse::<RoundingMode>(), Ok(RoundingMode::Floor));
        assert!("bankers".parse::<RoundingMode>().is_err());
    }

    /// 38/40 + 55/60 against a total of 100.
    #[test]
    fn sums_single_marks_into_percentages() {
        let agg = MarksAggregator::default()
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: 38.0 }), Some(55.0))
            .unwrap();
        assert_eq!(agg.marks.total_obtained, 93.0);
        assert_eq!(agg.marks.total_percentage, 93.0);
        assert_eq!(agg.marks.internal_percentage, Some(95.0));
        assert_eq!(agg.marks.external_percentage, Some(91.67));
        assert!((agg.raw_external_percentage.unwrap() - 91.666_666).abs() < 1e-3);
    }

    #[test]
    fn caps_marks_above_maximum() {
        let agg = MarksAggregator::default()
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: 45.0 }), Some(70.0))
            .unwrap();
        assert_eq!(agg.marks.internal_obtained, 40.0);
        assert_eq!(agg.marks.external_obtained, 60.0);
        assert_eq!(agg.marks.total_percentage, 100.0);
    }

    #[test]
    fn negative_marks_are_input_errors() {
        let err = MarksAggregator::default()
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: 10.0 }), Some(-1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            GradingError::Input(InputError::NegativeMarks {
                component: Component::External,
                ..
            })
        ));
    }

    #[test]
    fn non_finite_marks_are_input_errors() {
        let aggregator = MarksAggregator::default();
        let err = aggregator
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: 5.0 }), Some(f64::NAN))
            .unwrap_err();
        assert_eq!(
            err,
            GradingError::Input(InputError::NonFiniteMarks {
                component: Component::External
            })
        );

        let err = aggregator
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: f64::INFINITY }), Some(10.0))
            .unwrap_err();
        assert!(matches!(err, GradingError::Input(InputError::NonFiniteMarks { .. })));

        let itemized = InternalMarks::Itemized {
            components: vec![item("T1", Some(f64::NAN), 20.0)],
            method: CalculationMethod::Sum,
        };
        let err = aggregator.aggregate(&course(), Some(&itemized), Some(10.0)).unwrap_err();
        assert!(matches!(err, GradingError::Input(InputError::NonFiniteMarks { .. })));
    }

    #[test]
    fn grace_is_recorded_only_up_to_the_maximum() {
        let aggregator = MarksAggregator::default();
        let base = aggregator
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: 39.0 }), Some(60.0))
            .unwrap();
        let graced = aggregator.with_grace(&base, 2.0);
        assert_eq!(graced.marks.grace_marks, 1.0);
        assert_eq!(graced.marks.total_obtained, 100.0);

        let full = aggregator.with_grace(&aggregator.with_grace(&base, 1.0), 3.0);
        assert_eq!(full.marks.grace_marks, 1.0);
    }

    #[test]
    fn zero_maximum_is_a_configuration_error() {
        let mut c = course();
        c.total_max_mark = 0.0;
        let err = MarksAggregator::default()
            .aggregate(&c, Some(&InternalMarks::Single { obtained: 10.0 }), Some(10.0))
            .unwrap_err();
        assert_eq!(
            err,
            GradingError::Configuration(ConfigurationError::ZeroMaximum {
                component: Component::Total
            })
        );
    }

    #[test]
    fn converted_internal_is_rescaled() {
        let mut c = course();
        c.internal_max_mark = 50.0;
        c.internal_converted_mark = Some(25.0);
        c.external_max_mark = 75.0;
        let agg = MarksAggregator::default()
            .aggregate(&c, Some(&InternalMarks::Single { obtained: 41.0 }), Some(60.0))
            .unwrap();
        assert_eq!(agg.marks.internal_obtained, 20.5);
        assert_eq!(agg.marks.internal_maximum, 25.0);
        assert_eq!(agg.marks.total_obtained, 80.5);
    }

    #[test]
    fn itemized_methods_combine_components() {
        let components = vec![
            item("T1", Some(18.0), 20.0),
            item("T2", Some(10.0), 20.0),
            item("A1", Some(5.0), 10.0),
        ];
        let aggregator = MarksAggregator::default();
        let run = |method| {
            aggregator
                .aggregate(
                    &course(),
                    Some(&InternalMarks::Itemized {
                        components: components.clone(),
                        method,
                    }),
                    Some(0.0),
                )
                .unwrap()
                .marks
                .internal_obtained
        };
        // 33/50 of 40
        assert_eq!(run(CalculationMethod::Sum), 26.4);
        // mean(0.9, 0.5, 0.5) of 40
        assert_eq!(run(CalculationMethod::Average), 25.33);
        // mean(0.9, 0.5) of 40
        assert_eq!(run(CalculationMethod::BestOf(2)), 28.0);
    }

    #[test]
    fn best_of_more_than_available_is_rejected() {
        let err = MarksAggregator::default()
            .aggregate(
                &course(),
                Some(&InternalMarks::Itemized {
                    components: vec![item("T1", Some(10.0), 20.0)],
                    method: CalculationMethod::BestOf(2),
                }),
                Some(10.0),
            )
            .unwrap_err();
        assert!(matches!(err, GradingError::Input(InputError::InvalidCalculation(_))));
    }

    #[test]
    fn completion_counts_attempted_mandatory_components() {
        let mut optional = item("Quiz", None, 5.0);
        optional.mandatory = false;
        let agg = MarksAggregator::default()
            .aggregate(
                &course(),
                Some(&InternalMarks::Itemized {
                    components: vec![item("T1", Some(10.0), 20.0), item("T2", None, 20.0), optional],
                    method: CalculationMethod::Sum,
                }),
                Some(30.0),
            )
            .unwrap();
        assert_eq!(agg.component_completion, 50.0);
    }

    #[test]
    fn cia_only_course_ignores_external() {
        let mut c = course();
        c.evaluation_type = EvaluationType::CiaOnly;
        c.external_max_mark = 0.0;
        c.total_max_mark = 40.0;
        let agg = MarksAggregator::default()
            .aggregate(&c, Some(&InternalMarks::Single { obtained: 30.0 }), Some(50.0))
            .unwrap();
        assert_eq!(agg.marks.external_percentage, None);
        assert_eq!(agg.marks.total_obtained, 30.0);
        assert_eq!(agg.marks.total_percentage, 75.0);
    }

    #[test]
    fn grace_is_added_and_capped() {
        let aggregator = MarksAggregator::default();
        let base = aggregator
            .aggregate(&course(), Some(&InternalMarks::Single { obtained: 39.0 }), Some(60.0))
            .unwrap();
        let graced = aggregator.with_grace(&base, 2.0);
        assert_eq!(graced.marks.grace_marks, 2.0);
        assert_eq!(graced.marks.total_obtained, 100.0);
        assert!(graced.marks.total_obtained <= graced.marks.total_maximum);
    }
}
