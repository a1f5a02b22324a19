use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202510160002_create_moderation_events"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("moderation_events"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id")).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Alias::new("record_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("sequence")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("before_internal")).double().not_null())
                    .col(ColumnDef::new(Alias::new("before_external")).double().not_null())
                    .col(ColumnDef::new(Alias::new("before_grace")).double().not_null())
                    .col(ColumnDef::new(Alias::new("before_total")).double().not_null())
                    .col(ColumnDef::new(Alias::new("before_percentage")).double().not_null())
                    .col(ColumnDef::new(Alias::new("after_internal")).double().not_null())
                    .col(ColumnDef::new(Alias::new("after_external")).double().not_null())
                    .col(ColumnDef::new(Alias::new("after_grace")).double().not_null())
                    .col(ColumnDef::new(Alias::new("after_total")).double().not_null())
                    .col(ColumnDef::new(Alias::new("after_percentage")).double().not_null())
                    .col(ColumnDef::new(Alias::new("moderated_by")).string().not_null())
                    .col(ColumnDef::new(Alias::new("moderation_date")).timestamp().not_null())
                    .col(ColumnDef::new(Alias::new("remarks")).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_moderation_events_record")
                            .from(Alias::new("moderation_events"), Alias::new("record_id"))
                            .to(Alias::new("final_mark_records"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_moderation_events_record_sequence")
                    .table(Alias::new("moderation_events"))
                    .col(Alias::new("record_id"))
                    .col(Alias::new("sequence"))
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("moderation_events")).to_owned())
            .await
    }
}
