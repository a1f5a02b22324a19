//! # Result engine
//!
//! Entry point tying the pure computation to the stores. Every write to a record
//! happens while holding that record's key lock, and every store call goes through
//! the configured [`RetryPolicy`].

use crate::aggregator::{RoundingMode, RoundingPolicy};
use crate::error::{ConfigurationError, InputError, Result, StateError};
use crate::lifecycle;
use crate::locks::KeyedLocks;
use crate::moderation::{self, ModeratedMarks, ModerationRequest};
use crate::pipeline;
use crate::record::{FinalMarkRecord, ResultStatus};
use crate::retry::RetryPolicy;
use crate::rules::ResolvedRules;
use crate::traits::store::{MarksStore, ResultStore, RuleStore};
use crate::types::{GradeSystemCategory, RecordKey, StudentCourseContext};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use util::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Records computed at the same time during a batch.
    pub concurrency: usize,
    /// Used unless a rule set defines its own rounding.
    pub rounding: RoundingPolicy,
    pub retry: RetryPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            rounding: RoundingPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_app_config() -> Self {
        let config = AppConfig::global();
        let mode = config.rounding_policy.parse::<RoundingMode>().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to half-up rounding");
            RoundingMode::HalfUp
        });
        Self {
            concurrency: config.batch_concurrency.max(1),
            rounding: RoundingPolicy::new(mode, config.percentage_precision),
            retry: RetryPolicy {
                max_attempts: config.store_retry_attempts.max(1),
                backoff: Duration::from_millis(config.store_retry_backoff_ms),
            },
        }
    }
}

pub struct ResultEngine {
    pub(crate) marks: Arc<dyn MarksStore>,
    pub(crate) rules: Arc<dyn RuleStore>,
    pub(crate) results: Arc<dyn ResultStore>,
    pub(crate) locks: Arc<KeyedLocks>,
    pub(crate) options: EngineOptions,
}

impl ResultEngine {
    pub fn new(
        marks: Arc<dyn MarksStore>,
        rules: Arc<dyn RuleStore>,
        results: Arc<dyn ResultStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            marks,
            rules,
            results,
            locks: Arc::new(KeyedLocks::new()),
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub(crate) async fn load_rules(&self, regulation_id: &str, category: GradeSystemCategory) -> Result<ResolvedRules> {
        let set = self
            .options
            .retry
            .run("rule_set", move || self.rules.rule_set(regulation_id, category))
            .await?
            .ok_or_else(|| ConfigurationError::MissingRuleSet {
                regulation_id: regulation_id.to_string(),
                category,
            })?;
        Ok(set.resolve()?)
    }

    /// Computes a fresh `Pending` record for `ctx` without persisting it.
    pub async fn compute_final_mark(&self, ctx: &StudentCourseContext, calculated_by: &str) -> Result<FinalMarkRecord> {
        let rules = self.load_rules(&ctx.regulation_id, ctx.category).await?;
        let computation = pipeline::compute(ctx, &rules, self.options.rounding)?;
        Ok(FinalMarkRecord::new(ctx, computation, calculated_by, Utc::now()))
    }

    pub async fn find(&self, key: &RecordKey) -> Result<Option<FinalMarkRecord>> {
        Ok(self.options.retry.run("find", move || self.results.find(key)).await?)
    }

    async fn existing(&self, key: &RecordKey) -> Result<FinalMarkRecord> {
        self.find(key)
            .await?
            .ok_or_else(|| StateError::NotFound { key: key.clone() }.into())
    }

    async fn save(&self, record: &FinalMarkRecord) -> Result<()> {
        Ok(self.options.retry.run("upsert", move || self.results.upsert(record)).await?)
    }

    /// Replaces raw marks, recomputes, and moves the result to `UnderReview`.
    pub async fn apply_moderation(
        &self,
        key: &RecordKey,
        marks: ModeratedMarks,
        approver: &str,
        reason: &str,
    ) -> Result<FinalMarkRecord> {
        let _guard = self.locks.acquire(key).await;
        let record = self.existing(key).await?;
        lifecycle::enter_review(&record)?;

        let ctx = self
            .options
            .retry
            .run("load_context", move || self.marks.load_context(key))
            .await?
            .ok_or_else(|| InputError::MissingContext { key: key.clone() })?;
        let rules = self.load_rules(&ctx.regulation_id, ctx.category).await?;

        let request = ModerationRequest {
            marks,
            moderated_by: approver.to_string(),
            remarks: reason.to_string(),
            at: Utc::now(),
        };
        let updated = moderation::moderate(&record, &ctx, &rules, self.options.rounding, &request)?;

        // Record first: if the marks write fails the record is already UnderReview.
        self.save(&updated).await?;
        let marks = &request.marks;
        self.options
            .retry
            .run("update_marks", move || self.marks.update_marks(key, marks))
            .await?;

        info!(
            key = %key,
            approver,
            before = record.computation.marks.total_obtained,
            after = updated.computation.marks.total_obtained,
            "result moderated"
        );
        Ok(updated)
    }

    pub async fn transition(&self, key: &RecordKey, to: ResultStatus, actor: &str) -> Result<FinalMarkRecord> {
        let updated = self
            .mutate(key, |record, now| lifecycle::transition(record, to, actor, now))
            .await?;
        info!(key = %key, status = %to, actor, "result status changed");
        Ok(updated)
    }

    pub async fn lock(&self, key: &RecordKey, actor: &str) -> Result<FinalMarkRecord> {
        let updated = self.mutate(key, |record, now| lifecycle::lock(record, actor, now)).await?;
        info!(key = %key, actor, "result locked");
        Ok(updated)
    }

    /// Administrative override; the only way to change a locked result again.
    pub async fn unlock(&self, key: &RecordKey, actor: &str) -> Result<FinalMarkRecord> {
        let updated = self.mutate(key, |record, now| lifecycle::unlock(record, actor, now)).await?;
        warn!(key = %key, actor, "result unlocked");
        Ok(updated)
    }

    async fn mutate<F>(&self, key: &RecordKey, change: F) -> Result<FinalMarkRecord>
    where
        F: FnOnce(&FinalMarkRecord, DateTime<Utc>) -> std::result::Result<FinalMarkRecord, StateError>,
    {
        let _guard = self.locks.acquire(key).await;
        let record = self.existing(key).await?;
        let next = change(&record, Utc::now())?;
        self.save(&next).await?;
        Ok(next)
    }
}
