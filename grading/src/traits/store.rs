use crate::error::StoreError;
use crate::moderation::ModeratedMarks;
use crate::record::FinalMarkRecord;
use crate::rules::RuleSet;
use crate::types::{GradeSystemCategory, RecordKey, StudentCourseContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which students and courses a batch covers. `None` / empty means "all".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSelection {
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub examination_session_id: Option<String>,
    #[serde(default)]
    pub course_codes: Vec<String>,
    pub calculated_by: String,
    /// `false` computes a preview without writing results.
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_persist() -> bool {
    true
}

impl Default for BatchSelection {
    fn default() -> Self {
        Self {
            institution_id: None,
            program_id: None,
            examination_session_id: None,
            course_codes: Vec::new(),
            calculated_by: String::new(),
            persist: default_persist(),
        }
    }
}

impl BatchSelection {
    pub fn matches(&self, ctx: &StudentCourseContext) -> bool {
        let matches_opt = |want: &Option<String>, have: &str| want.as_deref().is_none_or(|w| w == have);
        matches_opt(&self.institution_id, &ctx.institution_id)
            && matches_opt(&self.program_id, &ctx.program_id)
            && matches_opt(&self.examination_session_id, &ctx.examination_session_id)
            && (self.course_codes.is_empty() || self.course_codes.contains(&ctx.course.course_code))
    }
}

/// Source of raw marks. Only moderation writes back to it.
#[async_trait]
pub trait MarksStore: Send + Sync {
    async fn load_contexts(&self, selection: &BatchSelection) -> Result<Vec<StudentCourseContext>, StoreError>;

    async fn load_context(&self, key: &RecordKey) -> Result<Option<StudentCourseContext>, StoreError>;

    async fn update_marks(&self, key: &RecordKey, marks: &ModeratedMarks) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn rule_set(
        &self,
        regulation_id: &str,
        category: GradeSystemCategory,
    ) -> Result<Option<RuleSet>, StoreError>;
}

/// Persisted results. `upsert` must write the record and its moderation events
/// atomically, replacing any record with the same key.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn find(&self, key: &RecordKey) -> Result<Option<FinalMarkRecord>, StoreError>;

    async fn upsert(&self, record: &FinalMarkRecord) -> Result<(), StoreError>;
}
