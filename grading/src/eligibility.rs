//! # Eligibility
//!
//! Decides whether a student may receive a normal result at all. Rules are checked
//! in `priority_order`; the first rule a student fails decides the outcome and no
//! later rule is consulted.

use crate::error::InputError;
use crate::record::PassStatus;
use crate::rules::EligibilityRule;
use serde::{Deserialize, Serialize};
use tracing::debug;

const EPSILON: f64 = 1e-9;

/// Figures the eligibility rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EligibilityInput {
    pub overall_percentage: f64,
    pub attendance_percentage: Option<f64>,
    pub component_completion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum IneligibilityReason {
    OverallPercentage { required: f64, actual: f64 },
    Attendance { required: f64, actual: f64, condonable: f64 },
    ComponentCompletion { required: f64, actual: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EligibilityVerdict {
    Eligible {
        /// Largest attendance shortfall forgiven by condonation.
        condonation: Option<f64>,
    },
    Ineligible {
        rule_code: String,
        status: PassStatus,
        reason: IneligibilityReason,
    },
}

impl EligibilityVerdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityVerdict::Eligible { .. })
    }
}

/// `rules` must already be filtered to active rules in evaluation order.
pub fn evaluate(rules: &[EligibilityRule], input: &EligibilityInput) -> Result<EligibilityVerdict, InputError> {
    let mut condonation: Option<f64> = None;

    for rule in rules {
        match check_rule(rule, input)? {
            RuleCheck::Passed { condoned } => {
                if let Some(shortfall) = condoned {
                    debug!(rule = %rule.rule_code, shortfall, "attendance shortfall condoned");
                    condonation = Some(condonation.map_or(shortfall, |c: f64| c.max(shortfall)));
                }
            }
            RuleCheck::Failed(reason) => {
                debug!(rule = %rule.rule_code, ?reason, "eligibility rule failed");
                return Ok(EligibilityVerdict::Ineligible {
                    rule_code: rule.rule_code.clone(),
                    status: rule.failure_status.into(),
                    reason,
                });
            }
        }
    }

    Ok(EligibilityVerdict::Eligible { condonation })
}

enum RuleCheck {
    Passed { condoned: Option<f64> },
    Failed(IneligibilityReason),
}

fn check_rule(rule: &EligibilityRule, input: &EligibilityInput) -> Result<RuleCheck, InputError> {
    if let Some(required) = rule.minimum_overall_percentage {
        if input.overall_percentage + EPSILON < required {
            return Ok(RuleCheck::Failed(IneligibilityReason::OverallPercentage {
                required,
                actual: input.overall_percentage,
            }));
        }
    }

    let mut condoned = None;
    if let Some(required) = rule.minimum_attendance_percentage {
        let actual = input.attendance_percentage.ok_or_else(|| InputError::MissingAttendance {
            rule_code: rule.rule_code.clone(),
        })?;
        let shortfall = required - actual;
        if shortfall > EPSILON {
            let condonable = if rule.condonation_allowed {
                rule.condonation_percentage_limit.unwrap_or(0.0)
            } else {
                0.0
            };
            if shortfall > condonable + EPSILON {
                return Ok(RuleCheck::Failed(IneligibilityReason::Attendance {
                    required,
                    actual,
                    condonable,
                }));
            }
            condoned = Some(shortfall);
        }
    }

    if rule.mandatory_components_completion {
        let required = rule.minimum_components_completion_percentage.unwrap_or(100.0);
        if input.component_completion + EPSILON < required {
            return Ok(RuleCheck::Failed(IneligibilityReason::ComponentCompletion {
                required,
                actual: input.component_completion,
            }));
        }
    }

    Ok(RuleCheck::Passed { condoned })
}
