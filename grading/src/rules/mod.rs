//! # Rule configuration
//!
//! Rules arrive as a flat list of JSON definitions, each tagged with its `kind`.
//! They are validated once, when the catalogue is built, and grouped into one
//! [`RuleSet`] per `(regulation_id, category)`. Grade-table partition checks are
//! left to [`RuleSet::resolve`] so that one broken regulation only fails the
//! records that use it.

pub mod eligibility_rule;
pub mod grade_band;
pub mod passing_rule;

pub use eligibility_rule::{EligibilityRule, IneligibleStatus};
pub use grade_band::{GradeTableEntry, SpecialGrade};
pub use passing_rule::PassingRule;

use crate::aggregator::{RoundingMode, RoundingPolicy};
use crate::error::ConfigurationError;
use crate::grade_resolver::GradeTable;
use crate::types::GradeSystemCategory;
use common::format_validation_errors;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use validator::Validate;

/// Regulation-specific override of the engine's default rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RoundingDefinition {
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    pub mode: RoundingMode,
    #[validate(range(max = 6, message = "precision cannot exceed 6 decimals"))]
    pub precision: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDefinition {
    GradeBand(GradeTableEntry),
    AbsentGrade(SpecialGrade),
    ReappearGrade(SpecialGrade),
    Eligibility(EligibilityRule),
    Passing(PassingRule),
    Rounding(RoundingDefinition),
}

impl RuleDefinition {
    fn scope(&self) -> (String, GradeSystemCategory) {
        let (regulation_id, category) = match self {
            RuleDefinition::GradeBand(e) => (&e.regulation_id, e.category),
            RuleDefinition::AbsentGrade(g) | RuleDefinition::ReappearGrade(g) => (&g.regulation_id, g.category),
            RuleDefinition::Eligibility(r) => (&r.regulation_id, r.category),
            RuleDefinition::Passing(r) => (&r.regulation_id, r.category),
            RuleDefinition::Rounding(r) => (&r.regulation_id, r.category),
        };
        (regulation_id.clone(), category)
    }

    fn label(&self) -> String {
        match self {
            RuleDefinition::GradeBand(e) => format!("grade band {}", e.grade_label),
            RuleDefinition::AbsentGrade(g) => format!("absent grade {}", g.grade_label),
            RuleDefinition::ReappearGrade(g) => format!("reappear grade {}", g.grade_label),
            RuleDefinition::Eligibility(r) => format!("eligibility rule {}", r.rule_code),
            RuleDefinition::Passing(r) => format!("passing rule {}", r.rule_code),
            RuleDefinition::Rounding(r) => format!("rounding for {}", r.regulation_id),
        }
    }

    fn check(&self) -> Result<(), ConfigurationError> {
        let result = match self {
            RuleDefinition::GradeBand(e) => e.validate(),
            RuleDefinition::AbsentGrade(g) | RuleDefinition::ReappearGrade(g) => g.validate(),
            RuleDefinition::Eligibility(r) => r.validate(),
            RuleDefinition::Passing(r) => r.validate(),
            RuleDefinition::Rounding(r) => r.validate(),
        };
        result.map_err(|errors| {
            ConfigurationError::InvalidRule(format!("{}: {}", self.label(), format_validation_errors(&errors)))
        })
    }
}

/// All rules of one `(regulation_id, category)`, validated but not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    pub grade_entries: Vec<GradeTableEntry>,
    pub absent_grade: Option<SpecialGrade>,
    pub reappear_grade: Option<SpecialGrade>,
    pub eligibility: Vec<EligibilityRule>,
    pub passing: Vec<PassingRule>,
    pub rounding: Option<RoundingPolicy>,
}

impl RuleSet {
    pub fn new(regulation_id: impl Into<String>, category: GradeSystemCategory) -> Self {
        Self {
            regulation_id: regulation_id.into(),
            category,
            grade_entries: Vec::new(),
            absent_grade: None,
            reappear_grade: None,
            eligibility: Vec::new(),
            passing: Vec::new(),
            rounding: None,
        }
    }

    /// Builds the grade table (checking the partition) and orders active rules by
    /// `priority_order`, then `rule_code`.
    pub fn resolve(&self) -> Result<ResolvedRules, ConfigurationError> {
        let grade_table = GradeTable::new(&self.regulation_id, self.category, self.grade_entries.clone())?
            .with_special_grades(self.absent_grade.clone(), self.reappear_grade.clone());

        let mut eligibility: Vec<_> = self.eligibility.iter().filter(|r| r.is_active).cloned().collect();
        eligibility.sort_by(|a, b| (a.priority_order, &a.rule_code).cmp(&(b.priority_order, &b.rule_code)));

        let mut passing: Vec<_> = self.passing.iter().filter(|r| r.is_active).cloned().collect();
        passing.sort_by(|a, b| (a.priority_order, &a.rule_code).cmp(&(b.priority_order, &b.rule_code)));

        Ok(ResolvedRules {
            regulation_id: self.regulation_id.clone(),
            category: self.category,
            grade_table,
            eligibility,
            passing,
            rounding: self.rounding,
        })
    }

    fn insert(&mut self, definition: RuleDefinition) -> Result<(), ConfigurationError> {
        let duplicate = |what: &str| {
            ConfigurationError::InvalidRule(format!(
                "duplicate {what} for regulation {} ({})",
                self.regulation_id, self.category
            ))
        };
        match definition {
            RuleDefinition::GradeBand(entry) => self.grade_entries.push(entry),
            RuleDefinition::AbsentGrade(grade) => {
                if self.absent_grade.is_some() {
                    return Err(duplicate("absent grade"));
                }
                self.absent_grade = Some(grade);
            }
            RuleDefinition::ReappearGrade(grade) => {
                if self.reappear_grade.is_some() {
                    return Err(duplicate("reappear grade"));
                }
                self.reappear_grade = Some(grade);
            }
            RuleDefinition::Eligibility(rule) => {
                if self.eligibility.iter().any(|r| r.rule_code == rule.rule_code) {
                    return Err(duplicate(&format!("eligibility rule {}", rule.rule_code)));
                }
                self.eligibility.push(rule);
            }
            RuleDefinition::Passing(rule) => {
                if self.passing.iter().any(|r| r.rule_code == rule.rule_code) {
                    return Err(duplicate(&format!("passing rule {}", rule.rule_code)));
                }
                self.passing.push(rule);
            }
            RuleDefinition::Rounding(def) => {
                if self.rounding.is_some() {
                    return Err(duplicate("rounding"));
                }
                self.rounding = Some(RoundingPolicy::new(def.mode, def.precision));
            }
        }
        Ok(())
    }
}

/// Rules ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRules {
    pub regulation_id: String,
    pub category: GradeSystemCategory,
    pub grade_table: GradeTable,
    /// Active rules, in evaluation order.
    pub eligibility: Vec<EligibilityRule>,
    pub passing: Vec<PassingRule>,
    pub rounding: Option<RoundingPolicy>,
}

impl ResolvedRules {
    /// The passing rule in force: the first active one by priority.
    pub fn passing_rule(&self) -> Result<&PassingRule, ConfigurationError> {
        self.passing.first().ok_or_else(|| ConfigurationError::MissingPassingRule {
            regulation_id: self.regulation_id.clone(),
            category: self.category,
        })
    }
}

/// Every configured rule set, keyed by `(regulation_id, category)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCatalog {
    sets: BTreeMap<(String, GradeSystemCategory), RuleSet>,
}

impl RuleCatalog {
    pub fn from_definitions(definitions: Vec<RuleDefinition>) -> Result<Self, ConfigurationError> {
        let mut sets: BTreeMap<(String, GradeSystemCategory), RuleSet> = BTreeMap::new();
        for definition in definitions {
            definition.check()?;
            let (regulation_id, category) = definition.scope();
            sets.entry((regulation_id.clone(), category))
                .or_insert_with(|| RuleSet::new(regulation_id, category))
                .insert(definition)?;
        }
        Ok(Self { sets })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let definitions: Vec<RuleDefinition> =
            serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidRule(e.to_string()))?;
        Self::from_definitions(definitions)
    }

    pub fn get(&self, regulation_id: &str, category: GradeSystemCategory) -> Option<&RuleSet> {
        self.sets.get(&(regulation_id.to_string(), category))
    }

    pub fn regulations(&self) -> HashSet<(String, GradeSystemCategory)> {
        self.sets.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"[
        {"kind": "grade_band", "regulation_id": "R2021", "category": "UG", "min_mark": 0, "max_mark": 40,
         "grade_label": "RA", "grade_points": 0, "qualifies_for_pass": false, "counts_toward_gpa": false},
        {"kind": "grade_band", "regulation_id": "R2021", "category": "UG", "min_mark": 40, "max_mark": 100,
         "grade_label": "P", "grade_points": 5, "qualifies_for_pass": true},
        {"kind": "reappear_grade", "regulation_id": "R2021", "category": "UG", "grade_label": "U"},
        {"kind": "passing", "regulation_id": "R2021", "category": "UG", "rule_code": "PASS-LATE",
         "priority_order": 2, "minimum_pass_percentage": 50},
        {"kind": "passing", "regulation_id": "R2021", "category": "UG", "rule_code": "PASS-40",
         "priority_order": 1, "minimum_pass_percentage": 40},
        {"kind": "eligibility", "regulation_id": "R2021", "category": "UG", "rule_code": "ATT",
         "minimum_attendance_percentage": 75, "is_active": false},
        {"kind": "rounding", "regulation_id": "R2021", "category": "UG", "mode": "floor", "precision": 1}
    ]"#;

    #[test]
    fn groups_and_resolves_definitions() {
        let catalog = RuleCatalog::from_json(RULES).unwrap();
        let set = catalog.get("R2021", GradeSystemCategory::UG).unwrap();
        assert_eq!(set.grade_entries.len(), 2);
        assert!(set.grade_entries[1].counts_toward_gpa);
        assert_eq!(set.rounding, Some(RoundingPolicy::new(RoundingMode::Floor, 1)));

        let resolved = set.resolve().unwrap();
        assert_eq!(resolved.passing_rule().unwrap().rule_code, "PASS-40");
        assert!(resolved.eligibility.is_empty(), "inactive rules are dropped");
        assert!(catalog.get("R2021", GradeSystemCategory::PG).is_none());
    }

    #[test]
    fn out_of_range_percentage_is_rejected_at_load() {
        let json = r#"[{"kind": "passing", "regulation_id": "R", "category": "PG", "rule_code": "P",
                        "minimum_pass_percentage": 140}]"#;
        let err = RuleCatalog::from_json(json).unwrap_err();
        match err {
            ConfigurationError::InvalidRule(msg) => {
                assert!(msg.contains("passing rule P"));
                assert!(msg.contains("minimum_pass_percentage must be within 0-100"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn grace_without_limit_is_rejected() {
        let json = r#"[{"kind": "passing", "regulation_id": "R", "category": "UG", "rule_code": "G",
                        "minimum_pass_percentage": 40, "grace_mark_enabled": true}]"#;
        let err = RuleCatalog::from_json(json).unwrap_err();
        assert!(err.to_string().contains("grace_mark_percentage_limit is required"));
    }

    #[test]
    fn duplicate_rule_codes_are_rejected() {
        let json = r#"[
            {"kind": "eligibility", "regulation_id": "R", "category": "UG", "rule_code": "E"},
            {"kind": "eligibility", "regulation_id": "R", "category": "UG", "rule_code": "E"}
        ]"#;
        assert!(matches!(
            RuleCatalog::from_json(json),
            Err(ConfigurationError::InvalidRule(msg)) if msg.contains("duplicate eligibility rule E")
        ));
    }

    #[test]
    fn unknown_kind_is_a_configuration_error() {
        let json = r#"[{"kind": "bonus", "regulation_id": "R", "category": "UG"}]"#;
        assert!(matches!(RuleCatalog::from_json(json), Err(ConfigurationError::InvalidRule(_))));
    }

    #[test]
    fn missing_passing_rule_is_reported() {
        let json = r#"[{"kind": "grade_band", "regulation_id": "R", "category": "UG", "min_mark": 0,
                        "max_mark": 100, "grade_label": "P", "grade_points": 5, "qualifies_for_pass": true}]"#;
        let resolved = RuleCatalog::from_json(json)
            .unwrap()
            .get("R", GradeSystemCategory::UG)
            .unwrap()
            .resolve()
            .unwrap();
        assert!(matches!(
            resolved.passing_rule(),
            Err(ConfigurationError::MissingPassingRule { .. })
        ));
    }
}
