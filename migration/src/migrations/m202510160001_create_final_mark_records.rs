use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202510160001_create_final_mark_records"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("final_mark_records"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id")).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Alias::new("exam_registration_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("course_offering_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("student_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("register_no")).string().not_null())
                    .col(ColumnDef::new(Alias::new("course_code")).string().not_null())
                    .col(ColumnDef::new(Alias::new("institution_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("program_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("examination_session_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("regulation_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("category")).string().not_null())
                    .col(ColumnDef::new(Alias::new("internal_obtained")).double().not_null())
                    .col(ColumnDef::new(Alias::new("internal_maximum")).double().not_null())
                    .col(ColumnDef::new(Alias::new("internal_percentage")).double())
                    .col(ColumnDef::new(Alias::new("external_obtained")).double().not_null())
                    .col(ColumnDef::new(Alias::new("external_maximum")).double().not_null())
                    .col(ColumnDef::new(Alias::new("external_percentage")).double())
                    .col(ColumnDef::new(Alias::new("grace_marks")).double().not_null().default(0.0))
                    .col(ColumnDef::new(Alias::new("total_obtained")).double().not_null())
                    .col(ColumnDef::new(Alias::new("total_maximum")).double().not_null())
                    .col(ColumnDef::new(Alias::new("total_percentage")).double().not_null())
                    .col(ColumnDef::new(Alias::new("letter_grade")).string())
                    .col(ColumnDef::new(Alias::new("grade_points")).double().not_null())
                    .col(ColumnDef::new(Alias::new("grade_description")).string())
                    .col(ColumnDef::new(Alias::new("counts_toward_gpa")).boolean().not_null())
                    .col(ColumnDef::new(Alias::new("credits")).double().not_null())
                    .col(ColumnDef::new(Alias::new("credit_points")).double().not_null())
                    .col(ColumnDef::new(Alias::new("is_pass")).boolean().not_null())
                    .col(ColumnDef::new(Alias::new("is_distinction")).boolean().not_null())
                    .col(ColumnDef::new(Alias::new("is_first_class")).boolean().not_null())
                    .col(ColumnDef::new(Alias::new("pass_status")).string().not_null())
                    .col(ColumnDef::new(Alias::new("fail_reasons")).string().not_null().default(""))
                    .col(ColumnDef::new(Alias::new("ineligibility_rule")).string())
                    .col(ColumnDef::new(Alias::new("condonation_applied")).double())
                    .col(ColumnDef::new(Alias::new("passing_rule")).string())
                    .col(ColumnDef::new(Alias::new("result_status")).string().not_null().default("pending"))
                    .col(ColumnDef::new(Alias::new("is_locked")).boolean().not_null().default(false))
                    .col(ColumnDef::new(Alias::new("locked_by")).string())
                    .col(ColumnDef::new(Alias::new("locked_at")).timestamp())
                    .col(ColumnDef::new(Alias::new("published_by")).string())
                    .col(ColumnDef::new(Alias::new("published_at")).timestamp())
                    .col(ColumnDef::new(Alias::new("is_moderated")).boolean().not_null().default(false))
                    .col(ColumnDef::new(Alias::new("calculated_by")).string().not_null())
                    .col(ColumnDef::new(Alias::new("calculated_at")).timestamp().not_null())
                    .col(ColumnDef::new(Alias::new("created_at")).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Alias::new("updated_at")).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Alias::new("updated_by")).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_final_mark_records_key")
                    .table(Alias::new("final_mark_records"))
                    .col(Alias::new("exam_registration_id"))
                    .col(Alias::new("course_offering_id"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_final_mark_records_session_course")
                    .table(Alias::new("final_mark_records"))
                    .col(Alias::new("examination_session_id"))
                    .col(Alias::new("course_code"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("final_mark_records")).to_owned())
            .await
    }
}
