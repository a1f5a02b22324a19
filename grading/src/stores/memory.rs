//! In-process store implementations, used by the `results` binary and by tests.
//!
//! Each store can be told to fail its next calls with [`StoreError::Unavailable`] to
//! exercise retry and batch-failure handling.

use crate::error::{ConfigurationError, StoreError};
use crate::moderation::ModeratedMarks;
use crate::record::FinalMarkRecord;
use crate::rules::{RuleCatalog, RuleSet};
use crate::traits::store::{BatchSelection, MarksStore, ResultStore, RuleStore};
use crate::types::{GradeSystemCategory, RecordKey, StudentCourseContext};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct FailureBudget(AtomicU32);

impl FailureBudget {
    fn set(&self, n: u32) {
        self.0.store(n, Ordering::SeqCst);
    }

    fn check(&self, what: &str) -> Result<(), StoreError> {
        let consumed = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            Err(StoreError::Unavailable(format!("{what}: simulated outage")))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMarksStore {
    contexts: RwLock<BTreeMap<RecordKey, StudentCourseContext>>,
    failures: FailureBudget,
}

impl InMemoryMarksStore {
    pub fn new(contexts: impl IntoIterator<Item = StudentCourseContext>) -> Self {
        Self {
            contexts: RwLock::new(contexts.into_iter().map(|c| (c.key.clone(), c)).collect()),
            failures: FailureBudget::default(),
        }
    }

    pub fn fail_next(&self, calls: u32) {
        self.failures.set(calls);
    }
}

#[async_trait]
impl MarksStore for InMemoryMarksStore {
    async fn load_contexts(&self, selection: &BatchSelection) -> Result<Vec<StudentCourseContext>, StoreError> {
        self.failures.check("load_contexts")?;
        let contexts = self.contexts.read().await;
        Ok(contexts.values().filter(|c| selection.matches(c)).cloned().collect())
    }

    async fn load_context(&self, key: &RecordKey) -> Result<Option<StudentCourseContext>, StoreError> {
        self.failures.check("load_context")?;
        Ok(self.contexts.read().await.get(key).cloned())
    }

    async fn update_marks(&self, key: &RecordKey, marks: &ModeratedMarks) -> Result<(), StoreError> {
        self.failures.check("update_marks")?;
        let mut contexts = self.contexts.write().await;
        let ctx = contexts
            .get_mut(key)
            .ok_or_else(|| StoreError::Rejected(format!("no marks for {key}")))?;
        *ctx = marks.apply_to(ctx);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    catalog: RuleCatalog,
    failures: FailureBudget,
}

impl InMemoryRuleStore {
    pub fn new(catalog: RuleCatalog) -> Self {
        Self {
            catalog,
            failures: FailureBudget::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(Self::new(RuleCatalog::from_json(json)?))
    }

    pub fn fail_next(&self, calls: u32) {
        self.failures.set(calls);
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn rule_set(
        &self,
        regulation_id: &str,
        category: GradeSystemCategory,
    ) -> Result<Option<RuleSet>, StoreError> {
        self.failures.check("rule_set")?;
        Ok(self.catalog.get(regulation_id, category).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    records: RwLock<HashMap<RecordKey, FinalMarkRecord>>,
    failures: FailureBudget,
    writes: AtomicUsize,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, calls: u32) {
        self.failures.set(calls);
    }

    /// Successful upserts so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored records ordered by key.
    pub async fn all(&self) -> Vec<FinalMarkRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn find(&self, key: &RecordKey) -> Result<Option<FinalMarkRecord>, StoreError> {
        self.failures.check("find")?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn upsert(&self, record: &FinalMarkRecord) -> Result<(), StoreError> {
        self.failures.check("upsert")?;
        self.records.write().await.insert(record.key.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
