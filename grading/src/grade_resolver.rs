//! # Grade resolution
//!
//! A [`GradeTable`] holds the bands of one `(regulation_id, category)`. Bands must
//! cover `[0, 100]` exactly: `max_mark` is inclusive and the next band's `min_mark`
//! is exclusive, so adjacent bands share their boundary value. The first band also
//! contains its lower bound of `0`.

use crate::error::{ConfigurationError, GradingError, InputError};
use crate::record::PassStatus;
use crate::rules::{GradeTableEntry, SpecialGrade};
use crate::types::GradeSystemCategory;

const EPSILON: f64 = 1e-9;

/// What a percentage resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGrade {
    pub grade_label: String,
    pub grade_points: f64,
    pub qualifies_for_pass: bool,
    pub counts_toward_gpa: bool,
    pub description: String,
    pub result_status_override: Option<PassStatus>,
}

impl From<&GradeTableEntry> for ResolvedGrade {
    fn from(entry: &GradeTableEntry) -> Self {
        Self {
            grade_label: entry.grade_label.clone(),
            grade_points: entry.grade_points,
            qualifies_for_pass: entry.qualifies_for_pass,
            counts_toward_gpa: entry.counts_toward_gpa,
            description: entry.description.clone(),
            result_status_override: entry.result_status_override,
        }
    }
}

impl From<&SpecialGrade> for ResolvedGrade {
    fn from(grade: &SpecialGrade) -> Self {
        Self {
            grade_label: grade.grade_label.clone(),
            grade_points: grade.grade_points,
            qualifies_for_pass: false,
            counts_toward_gpa: grade.counts_toward_gpa,
            description: grade.description.clone(),
            result_status_override: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeTable {
    regulation_id: String,
    category: GradeSystemCategory,
    bands: Vec<GradeTableEntry>,
    absent: Option<SpecialGrade>,
    reappear: Option<SpecialGrade>,
}

impl GradeTable {
    /// Sorts the bands and rejects anything that is not an exact partition of `[0, 100]`.
    pub fn new(
        regulation_id: &str,
        category: GradeSystemCategory,
        mut bands: Vec<GradeTableEntry>,
    ) -> Result<Self, ConfigurationError> {
        if bands.is_empty() {
            return Err(ConfigurationError::EmptyGradeTable {
                regulation_id: regulation_id.to_string(),
                category,
            });
        }

        if let Some(foreign) = bands
            .iter()
            .find(|b| b.regulation_id != regulation_id || b.category != category)
        {
            return Err(ConfigurationError::ForeignGradeEntry {
                label: foreign.grade_label.clone(),
                regulation_id: foreign.regulation_id.clone(),
                category: foreign.category,
            });
        }

        if let Some(bad) = bands.iter().find(|b| b.min_mark >= b.max_mark) {
            return Err(ConfigurationError::InvalidBand {
                label: bad.grade_label.clone(),
                min: bad.min_mark,
                max: bad.max_mark,
            });
        }

        bands.sort_by(|a, b| a.min_mark.total_cmp(&b.min_mark));

        let (first, last) = (&bands[0], &bands[bands.len() - 1]);
        if first.min_mark.abs() > EPSILON || (last.max_mark - 100.0).abs() > EPSILON {
            return Err(ConfigurationError::GradeTableBounds {
                min: first.min_mark,
                max: last.max_mark,
            });
        }

        for pair in bands.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.min_mark > lower.max_mark + EPSILON {
                return Err(ConfigurationError::GradeTableGap {
                    below: lower.max_mark,
                    above: upper.min_mark,
                });
            }
            if upper.min_mark < lower.max_mark - EPSILON {
                return Err(ConfigurationError::GradeTableOverlap {
                    first: lower.grade_label.clone(),
                    second: upper.grade_label.clone(),
                });
            }
        }

        Ok(Self {
            regulation_id: regulation_id.to_string(),
            category,
            bands,
            absent: None,
            reappear: None,
        })
    }

    pub fn with_special_grades(mut self, absent: Option<SpecialGrade>, reappear: Option<SpecialGrade>) -> Self {
        self.absent = absent;
        self.reappear = reappear;
        self
    }

    pub fn regulation_id(&self) -> &str {
        &self.regulation_id
    }

    pub fn category(&self) -> GradeSystemCategory {
        self.category
    }

    pub fn bands(&self) -> &[GradeTableEntry] {
        &self.bands
    }

    /// Binary search for the band containing `percentage`.
    pub fn resolve(&self, percentage: f64) -> Result<ResolvedGrade, GradingError> {
        if !percentage.is_finite() || percentage < -EPSILON || percentage > 100.0 + EPSILON {
            return Err(InputError::InvalidPercentage {
                field: "percentage",
                value: percentage,
            }
            .into());
        }
        let index = self.bands.partition_point(|band| band.max_mark + EPSILON < percentage);
        self.bands
            .get(index)
            .map(ResolvedGrade::from)
            .ok_or_else(|| {
                ConfigurationError::GradeTableGap {
                    below: percentage,
                    above: percentage,
                }
                .into()
            })
    }

    pub fn absent_grade(&self) -> Option<ResolvedGrade> {
        self.absent.as_ref().map(ResolvedGrade::from)
    }

    pub fn reappear_grade(&self) -> Option<ResolvedGrade> {
        self.reappear.as_ref().map(ResolvedGrade::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(label: &str, min: f64, max: f64, points: f64) -> GradeTableEntry {
        GradeTableEntry {
            regulation_id: "R2021".into(),
            category: GradeSystemCategory::UG,
            min_mark: min,
            max_mark: max,
            grade_label: label.into(),
            grade_points: points,
            qualifies_for_pass: points > 0.0,
            counts_toward_gpa: true,
            result_status_override: None,
            description: String::new(),
        }
    }

    fn table() -> GradeTable {
        GradeTable::new(
            "R2021",
            GradeSystemCategory::UG,
            vec![
                band("O", 90.0, 100.0, 10.0),
                band("RA", 0.0, 39.5, 0.0),
                band("B", 39.5, 60.0, 6.0),
                band("A", 60.0, 75.0, 8.0),
                band("A+", 75.0, 90.0, 9.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn boundaries_belong_to_the_lower_band() {
        let t = table();
        assert_eq!(t.resolve(0.0).unwrap().grade_label, "RA");
        assert_eq!(t.resolve(39.5).unwrap().grade_label, "RA");
        assert_eq!(t.resolve(39.51).unwrap().grade_label, "B");
        assert_eq!(t.resolve(90.0).unwrap().grade_label, "A+");
        assert_eq!(t.resolve(93.0).unwrap().grade_label, "O");
        assert_eq!(t.resolve(100.0).unwrap().grade_points, 10.0);
    }

    /// Every integer and half point maps to exactly one band.
    #[test]
    fn table_partitions_zero_to_hundred() {
        let t = table();
        for step in 0..=200 {
            let value = step as f64 / 2.0;
            let resolved = t.resolve(value).unwrap();
            let containing: Vec<_> = t
                .bands()
                .iter()
                .enumerate()
                .filter(|(i, b)| value <= b.max_mark && (value > b.min_mark || (*i == 0 && value >= b.min_mark)))
                .collect();
            assert_eq!(containing.len(), 1, "value {value}");
            assert_eq!(containing[0].1.grade_label, resolved.grade_label);
        }
    }

    #[test]
    fn gap_is_rejected() {
        let err = GradeTable::new(
            "R2021",
            GradeSystemCategory::UG,
            vec![band("F", 0.0, 39.0, 0.0), band("P", 40.0, 100.0, 5.0)],
        )
        .unwrap_err();
        assert_eq!(err, ConfigurationError::GradeTableGap { below: 39.0, above: 40.0 });
    }

    #[test]
    fn overlap_is_rejected() {
        let err = GradeTable::new(
            "R2021",
            GradeSystemCategory::UG,
            vec![band("F", 0.0, 45.0, 0.0), band("P", 40.0, 100.0, 5.0)],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::GradeTableOverlap { .. }));
    }

    #[test]
    fn table_must_span_full_range() {
        let err = GradeTable::new("R2021", GradeSystemCategory::UG, vec![band("P", 10.0, 100.0, 5.0)]).unwrap_err();
        assert!(matches!(err, ConfigurationError::GradeTableBounds { .. }));
    }

    #[test]
    fn foreign_and_empty_tables_are_rejected() {
        let mut pg = band("P", 0.0, 100.0, 5.0);
        pg.category = GradeSystemCategory::PG;
        assert!(matches!(
            GradeTable::new("R2021", GradeSystemCategory::UG, vec![pg]),
            Err(ConfigurationError::ForeignGradeEntry { .. })
        ));
        assert!(matches!(
            GradeTable::new("R2021", GradeSystemCategory::UG, vec![]),
            Err(ConfigurationError::EmptyGradeTable { .. })
        ));
    }

    #[test]
    fn out_of_range_percentage_is_an_input_error() {
        assert!(matches!(table().resolve(100.5), Err(GradingError::Input(_))));
        assert!(matches!(table().resolve(f64::NAN), Err(GradingError::Input(_))));
    }
}
