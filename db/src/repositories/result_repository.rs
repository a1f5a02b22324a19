//! SeaORM-backed [`ResultStore`].
//!
//! A record and its moderation events are written in one transaction. Events are
//! append-only: only sequences beyond the highest stored one are inserted.

use crate::models::{final_mark_record, moderation_event};
use async_trait::async_trait;
use grading::aggregator::AggregatedMarks;
use grading::error::StoreError;
use grading::passing::FailReason;
use grading::record::{FinalMarkRecord, MarkComputation, MarksSnapshot, ModerationEvent};
use grading::traits::store::ResultStore;
use grading::types::{GradeSystemCategory, RecordKey};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use tracing::debug;

#[derive(Clone)]
pub struct ResultRepository {
    db: DatabaseConnection,
}

impl ResultRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_record(&self, key: &RecordKey) -> Result<Option<FinalMarkRecord>, DbErr> {
        let Some(row) = find_row(&self.db, key).await? else {
            return Ok(None);
        };
        let events = events_of(&self.db, row.id).await?;
        to_record(row, events).map(Some)
    }

    /// Results of one examination session, optionally for a single course, ordered
    /// by course and register number.
    pub async fn list_by_session(
        &self,
        examination_session_id: &str,
        course_code: Option<&str>,
    ) -> Result<Vec<FinalMarkRecord>, DbErr> {
        let mut query = final_mark_record::Entity::find()
            .filter(final_mark_record::Column::ExaminationSessionId.eq(examination_session_id));
        if let Some(code) = course_code {
            query = query.filter(final_mark_record::Column::CourseCode.eq(code));
        }
        let rows = query
            .order_by_asc(final_mark_record::Column::CourseCode)
            .order_by_asc(final_mark_record::Column::RegisterNo)
            .find_with_related(moderation_event::Entity)
            .all(&self.db)
            .await?;

        rows.into_iter()
            .map(|(row, mut events)| {
                events.sort_by_key(|e| e.sequence);
                to_record(row, events)
            })
            .collect()
    }

    pub async fn save(&self, record: &FinalMarkRecord) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        let mut active = to_active(record);
        let record_id = match find_row(&txn, &record.key).await? {
            Some(row) => {
                active.id = Set(row.id);
                active.update(&txn).await?.id
            }
            None => active.insert(&txn).await?.id,
        };

        let stored = events_of(&txn, record_id).await?;
        let last = stored.last().map_or(0, |e| e.sequence);
        let mut appended = 0;
        for event in record.moderation_events.iter().filter(|e| e.sequence as i32 > last) {
            event_active(record_id, event).insert(&txn).await?;
            appended += 1;
        }

        txn.commit().await?;
        debug!(key = %record.key, record_id, appended, "final mark record stored");
        Ok(())
    }
}

#[async_trait]
impl ResultStore for ResultRepository {
    async fn find(&self, key: &RecordKey) -> Result<Option<FinalMarkRecord>, StoreError> {
        self.find_record(key).await.map_err(store_error)
    }

    async fn upsert(&self, record: &FinalMarkRecord) -> Result<(), StoreError> {
        self.save(record).await.map_err(store_error)
    }
}

/// Connection problems are worth retrying; everything else is final.
pub fn store_error(err: DbErr) -> StoreError {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Rejected(other.to_string()),
    }
}

async fn find_row<C: ConnectionTrait>(db: &C, key: &RecordKey) -> Result<Option<final_mark_record::Model>, DbErr> {
    final_mark_record::Entity::find()
        .filter(final_mark_record::Column::ExamRegistrationId.eq(key.exam_registration_id.as_str()))
        .filter(final_mark_record::Column::CourseOfferingId.eq(key.course_offering_id.as_str()))
        .one(db)
        .await
}

async fn events_of<C: ConnectionTrait>(db: &C, record_id: i64) -> Result<Vec<moderation_event::Model>, DbErr> {
    moderation_event::Entity::find()
        .filter(moderation_event::Column::RecordId.eq(record_id))
        .order_by_asc(moderation_event::Column::Sequence)
        .all(db)
        .await
}

fn to_active(record: &FinalMarkRecord) -> final_mark_record::ActiveModel {
    let c = &record.computation;
    let m = &c.marks;
    final_mark_record::ActiveModel {
        id: NotSet,
        exam_registration_id: Set(record.key.exam_registration_id.clone()),
        course_offering_id: Set(record.key.course_offering_id.clone()),
        student_id: Set(record.student_id.clone()),
        register_no: Set(record.register_no.clone()),
        course_code: Set(record.course_code.clone()),
        institution_id: Set(record.institution_id.clone()),
        program_id: Set(record.program_id.clone()),
        examination_session_id: Set(record.examination_session_id.clone()),
        regulation_id: Set(record.regulation_id.clone()),
        category: Set(record.category.as_str().to_string()),
        internal_obtained: Set(m.internal_obtained),
        internal_maximum: Set(m.internal_maximum),
        internal_percentage: Set(m.internal_percentage),
        external_obtained: Set(m.external_obtained),
        external_maximum: Set(m.external_maximum),
        external_percentage: Set(m.external_percentage),
        grace_marks: Set(m.grace_marks),
        total_obtained: Set(m.total_obtained),
        total_maximum: Set(m.total_maximum),
        total_percentage: Set(m.total_percentage),
        letter_grade: Set(c.letter_grade.clone()),
        grade_points: Set(c.grade_points),
        grade_description: Set(c.grade_description.clone()),
        counts_toward_gpa: Set(c.counts_toward_gpa),
        credits: Set(c.credits),
        credit_points: Set(c.credit_points),
        is_pass: Set(c.is_pass),
        is_distinction: Set(c.is_distinction),
        is_first_class: Set(c.is_first_class),
        pass_status: Set(c.pass_status.into()),
        fail_reasons: Set(c.fail_reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")),
        ineligibility_rule: Set(c.ineligibility_rule.clone()),
        condonation_applied: Set(c.condonation_applied),
        passing_rule: Set(c.passing_rule.clone()),
        result_status: Set(record.result_status.into()),
        is_locked: Set(record.is_locked),
        locked_by: Set(record.locked_by.clone()),
        locked_at: Set(record.locked_at),
        published_by: Set(record.published_by.clone()),
        published_at: Set(record.published_at),
        is_moderated: Set(record.is_moderated),
        calculated_by: Set(record.calculated_by.clone()),
        calculated_at: Set(record.calculated_at),
        created_at: Set(record.created_at),
        updated_at: Set(record.updated_at),
        updated_by: Set(record.updated_by.clone()),
    }
}

fn event_active(record_id: i64, event: &ModerationEvent) -> moderation_event::ActiveModel {
    moderation_event::ActiveModel {
        id: NotSet,
        record_id: Set(record_id),
        sequence: Set(event.sequence as i32),
        before_internal: Set(event.before.internal),
        before_external: Set(event.before.external),
        before_grace: Set(event.before.grace),
        before_total: Set(event.before.total),
        before_percentage: Set(event.before.percentage),
        after_internal: Set(event.after.internal),
        after_external: Set(event.after.external),
        after_grace: Set(event.after.grace),
        after_total: Set(event.after.total),
        after_percentage: Set(event.after.percentage),
        moderated_by: Set(event.moderated_by.clone()),
        moderation_date: Set(event.moderation_date),
        remarks: Set(event.remarks.clone()),
    }
}

fn corrupt(row: &final_mark_record::Model, detail: String) -> DbErr {
    DbErr::Custom(format!(
        "final mark record {}/{}: {detail}",
        row.exam_registration_id, row.course_offering_id
    ))
}

fn to_record(row: final_mark_record::Model, events: Vec<moderation_event::Model>) -> Result<FinalMarkRecord, DbErr> {
    let category = row
        .category
        .parse::<GradeSystemCategory>()
        .map_err(|e| corrupt(&row, e))?;
    let fail_reasons = row
        .fail_reasons
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::parse::<FailReason>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| corrupt(&row, e))?;

    let moderation_events = events
        .into_iter()
        .map(|e| ModerationEvent {
            sequence: e.sequence.max(0) as u32,
            before: MarksSnapshot {
                internal: e.before_internal,
                external: e.before_external,
                grace: e.before_grace,
                total: e.before_total,
                percentage: e.before_percentage,
            },
            after: MarksSnapshot {
                internal: e.after_internal,
                external: e.after_external,
                grace: e.after_grace,
                total: e.after_total,
                percentage: e.after_percentage,
            },
            moderated_by: e.moderated_by,
            moderation_date: e.moderation_date,
            remarks: e.remarks,
        })
        .collect();

    Ok(FinalMarkRecord {
        key: RecordKey::new(row.exam_registration_id, row.course_offering_id),
        student_id: row.student_id,
        register_no: row.register_no,
        course_code: row.course_code,
        institution_id: row.institution_id,
        program_id: row.program_id,
        examination_session_id: row.examination_session_id,
        regulation_id: row.regulation_id,
        category,
        computation: MarkComputation {
            marks: AggregatedMarks {
                internal_obtained: row.internal_obtained,
                internal_maximum: row.internal_maximum,
                internal_percentage: row.internal_percentage,
                external_obtained: row.external_obtained,
                external_maximum: row.external_maximum,
                external_percentage: row.external_percentage,
                grace_marks: row.grace_marks,
                total_obtained: row.total_obtained,
                total_maximum: row.total_maximum,
                total_percentage: row.total_percentage,
            },
            letter_grade: row.letter_grade,
            grade_points: row.grade_points,
            grade_description: row.grade_description,
            counts_toward_gpa: row.counts_toward_gpa,
            credits: row.credits,
            credit_points: row.credit_points,
            is_pass: row.is_pass,
            is_distinction: row.is_distinction,
            is_first_class: row.is_first_class,
            pass_status: row.pass_status.into(),
            fail_reasons,
            ineligibility_rule: row.ineligibility_rule,
            condonation_applied: row.condonation_applied,
            passing_rule: row.passing_rule,
        },
        result_status: row.result_status.into(),
        is_locked: row.is_locked,
        locked_by: row.locked_by,
        locked_at: row.locked_at,
        published_by: row.published_by,
        published_at: row.published_at,
        is_moderated: row.is_moderated,
        moderation_events,
        calculated_by: row.calculated_by,
        calculated_at: row.calculated_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
        updated_by: row.updated_by,
    })
}
