//! # Batch calculation
//!
//! Computes every context in a selection on a bounded pool of tokio tasks. Each
//! record is independent: a failure is written into the summary and the batch
//! carries on. Only failing to load the selection or its rules aborts the batch.
//!
//! The summary is owned by the loop that collects task results, so counts never
//! depend on scheduling. Cancellation is checked before each record is started; a
//! record that has started always finishes its write. A key that appears twice in
//! the selection is computed once; the repeat is reported as an input error.

use crate::engine::{EngineOptions, ResultEngine};
use crate::error::{BatchError, ConfigurationError, ErrorKind, InputError, Result, StateError};
use crate::locks::KeyedLocks;
use crate::pipeline;
use crate::record::{FinalMarkRecord, MarkComputation, PassStatus, ResultStatus};
use crate::rules::ResolvedRules;
use crate::traits::store::{BatchSelection, ResultStore};
use crate::types::{GradeSystemCategory, RecordKey, StudentCourseContext};
use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One record the batch could not produce.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordFailure {
    pub student_id: String,
    pub course_code: String,
    pub key: RecordKey,
    pub register_no: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Contexts matched by the selection.
    pub total: usize,
    pub computed: usize,
    pub saved: usize,
    pub passed: usize,
    pub failed: usize,
    pub absent: usize,
    pub reappear: usize,
    pub withheld: usize,
    pub expelled: usize,
    pub distinction: usize,
    pub first_class: usize,
    /// Contexts never started because the batch was cancelled.
    pub skipped_cancelled: usize,
    pub cancelled: bool,
    /// Sorted by student, then course.
    pub errors: Vec<RecordFailure>,
}

impl BatchSummary {
    fn record(&mut self, outcome: &RecordOutcome) {
        self.computed += 1;
        if outcome.saved {
            self.saved += 1;
        }
        match outcome.pass_status {
            PassStatus::Pass => self.passed += 1,
            PassStatus::Fail => self.failed += 1,
            PassStatus::Absent => self.absent += 1,
            PassStatus::Reappear => self.reappear += 1,
            PassStatus::Withheld => self.withheld += 1,
            PassStatus::Expelled => self.expelled += 1,
        }
        if outcome.is_distinction {
            self.distinction += 1;
        }
        if outcome.is_first_class {
            self.first_class += 1;
        }
    }

    fn fail(&mut self, identity: RecordIdentity, kind: ErrorKind, message: String) {
        self.errors.push(RecordFailure {
            student_id: identity.student_id,
            course_code: identity.course_code,
            key: identity.key,
            register_no: identity.register_no,
            kind,
            message,
        });
    }
}

struct RecordIdentity {
    key: RecordKey,
    student_id: String,
    register_no: String,
    course_code: String,
}

impl RecordIdentity {
    fn of(ctx: &StudentCourseContext) -> Self {
        Self {
            key: ctx.key.clone(),
            student_id: ctx.student_id.clone(),
            register_no: ctx.register_no.clone(),
            course_code: ctx.course.course_code.clone(),
        }
    }
}

struct RecordOutcome {
    pass_status: PassStatus,
    is_distinction: bool,
    is_first_class: bool,
    saved: bool,
}

impl RecordOutcome {
    fn of(computation: &MarkComputation, saved: bool) -> Self {
        Self {
            pass_status: computation.pass_status,
            is_distinction: computation.is_distinction,
            is_first_class: computation.is_first_class,
            saved,
        }
    }
}

type RuleKey = (String, GradeSystemCategory);
type RuleCache = HashMap<RuleKey, std::result::Result<Arc<ResolvedRules>, ConfigurationError>>;

/// Everything one worker task needs; owns its data so it can be spawned.
struct RecordJob {
    ctx: StudentCourseContext,
    rules: std::result::Result<Arc<ResolvedRules>, ConfigurationError>,
    results: Arc<dyn ResultStore>,
    locks: Arc<KeyedLocks>,
    options: EngineOptions,
    calculated_by: String,
    persist: bool,
}

impl RecordJob {
    async fn run(self) -> Result<RecordOutcome> {
        let rules = self.rules?;
        let computation = pipeline::compute(&self.ctx, &rules, self.options.rounding)?;
        if !self.persist {
            return Ok(RecordOutcome::of(&computation, false));
        }

        let key = &self.ctx.key;
        let results = &self.results;
        let _guard = self.locks.acquire(key).await;

        let existing = self.options.retry.run("find", move || results.find(key)).await?;
        let now = Utc::now();
        let record = match existing {
            Some(current) if current.is_locked => {
                return Err(StateError::Locked { key: key.clone() }.into());
            }
            Some(current) if current.result_status != ResultStatus::Pending => {
                return Err(StateError::AlreadyFinal {
                    key: key.clone(),
                    status: current.result_status,
                }
                .into());
            }
            Some(current) => current.recalculated(computation, &self.calculated_by, now),
            None => FinalMarkRecord::new(&self.ctx, computation, &self.calculated_by, now),
        };

        let saved = &record;
        self.options.retry.run("upsert", move || results.upsert(saved)).await?;
        debug!(key = %key, status = %record.computation.pass_status, "result saved");
        Ok(RecordOutcome::of(&record.computation, true))
    }
}

impl ResultEngine {
    /// Computes (and unless `selection.persist` is false, saves) every result the
    /// selection covers.
    pub async fn run_batch(
        &self,
        selection: &BatchSelection,
        cancel: CancellationToken,
    ) -> std::result::Result<BatchSummary, BatchError> {
        let started = Instant::now();
        info!(
            calculated_by = %selection.calculated_by,
            persist = selection.persist,
            courses = ?selection.course_codes,
            "starting result batch"
        );

        let contexts = self
            .options
            .retry
            .run("load_contexts", move || self.marks.load_contexts(selection))
            .await?;
        let rules = self.rule_cache(&contexts).await?;

        let mut summary = BatchSummary {
            total: contexts.len(),
            ..Default::default()
        };
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = FuturesUnordered::new();
        let mut seen = HashSet::new();

        for ctx in contexts {
            if !seen.insert(ctx.key.clone()) {
                let err = InputError::DuplicateContext { key: ctx.key.clone() };
                warn!(key = %ctx.key, "duplicate context skipped");
                summary.fail(RecordIdentity::of(&ctx), ErrorKind::Input, err.to_string());
                continue;
            }
            if cancel.is_cancelled() {
                summary.skipped_cancelled += 1;
                continue;
            }
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.skipped_cancelled += 1;
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                summary.skipped_cancelled += 1;
                continue;
            };

            let identity = RecordIdentity::of(&ctx);
            let job = RecordJob {
                rules: rules
                    .get(&(ctx.regulation_id.clone(), ctx.category))
                    .cloned()
                    .unwrap_or_else(|| {
                        Err(ConfigurationError::MissingRuleSet {
                            regulation_id: ctx.regulation_id.clone(),
                            category: ctx.category,
                        })
                    }),
                ctx,
                results: self.results.clone(),
                locks: self.locks.clone(),
                options: self.options,
                calculated_by: selection.calculated_by.clone(),
                persist: selection.persist,
            };
            let handle = tokio::spawn(async move {
                let _permit = permit;
                job.run().await
            });
            tasks.push(async move { (identity, handle.await) });
        }

        while let Some((identity, joined)) = tasks.next().await {
            match joined {
                Ok(Ok(outcome)) => summary.record(&outcome),
                Ok(Err(err)) => {
                    warn!(key = %identity.key, error = %err, "result not produced");
                    summary.fail(identity, err.kind(), err.to_string());
                }
                Err(join_error) => {
                    error!(key = %identity.key, error = %join_error, "result task aborted");
                    summary.fail(identity, ErrorKind::Internal, join_error.to_string());
                }
            }
        }

        summary.cancelled = summary.skipped_cancelled > 0;
        summary.errors.sort();
        info!(
            total = summary.total,
            computed = summary.computed,
            saved = summary.saved,
            errors = summary.errors.len(),
            skipped = summary.skipped_cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "result batch finished"
        );
        Ok(summary)
    }

    /// Loads and resolves each distinct rule set once. A missing or malformed rule
    /// set only fails its own records; an unreachable rule store fails the batch.
    async fn rule_cache(&self, contexts: &[StudentCourseContext]) -> std::result::Result<RuleCache, BatchError> {
        let wanted: BTreeSet<RuleKey> = contexts
            .iter()
            .map(|c| (c.regulation_id.clone(), c.category))
            .collect();

        let mut cache = RuleCache::new();
        for (regulation_id, category) in wanted {
            let regulation = regulation_id.as_str();
            let set = self
                .options
                .retry
                .run("rule_set", move || self.rules.rule_set(regulation, category))
                .await?;
            let resolved = match set {
                Some(set) => set.resolve().map(Arc::new),
                None => Err(ConfigurationError::MissingRuleSet {
                    regulation_id: regulation_id.clone(),
                    category,
                }),
            };
            if let Err(e) = &resolved {
                warn!(regulation = %regulation_id, %category, error = %e, "rule set unusable");
            }
            cache.insert((regulation_id, category), resolved);
        }
        Ok(cache)
    }
}
