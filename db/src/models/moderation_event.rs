//! Append-only audit rows for post-calculation mark changes.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "moderation_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub record_id: i64,
    /// 1-based position within the record's history.
    pub sequence: i32,

    pub before_internal: f64,
    pub before_external: f64,
    pub before_grace: f64,
    pub before_total: f64,
    pub before_percentage: f64,
    pub after_internal: f64,
    pub after_external: f64,
    pub after_grace: f64,
    pub after_total: f64,
    pub after_percentage: f64,

    pub moderated_by: String,
    pub moderation_date: DateTime<Utc>,
    pub remarks: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::final_mark_record::Entity",
        from = "Column::RecordId",
        to = "super::final_mark_record::Column::Id",
        on_delete = "Cascade"
    )]
    Record,
}

impl Related<super::final_mark_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Record.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
