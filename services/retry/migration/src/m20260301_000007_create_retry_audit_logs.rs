use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RetryAuditLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RetryAuditLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RetryAuditLogs::OrganisationId).uuid().not_null())
                    .col(ColumnDef::new(RetryAuditLogs::EntityType).string().not_null())
                    .col(ColumnDef::new(RetryAuditLogs::EntityId).uuid().not_null())
                    .col(ColumnDef::new(RetryAuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(RetryAuditLogs::Event).string().not_null())
                    .col(ColumnDef::new(RetryAuditLogs::OldValue).json_binary())
                    .col(ColumnDef::new(RetryAuditLogs::NewValue).json_binary())
                    .col(ColumnDef::new(RetryAuditLogs::ChangeSummary).text().not_null())
                    .col(ColumnDef::new(RetryAuditLogs::RetryScheduleId).uuid())
                    .col(ColumnDef::new(RetryAuditLogs::RetryAttemptId).uuid())
                    .col(ColumnDef::new(RetryAuditLogs::ReminderId).uuid())
                    .col(ColumnDef::new(RetryAuditLogs::PaymentId).uuid())
                    .col(ColumnDef::new(RetryAuditLogs::ActorType).string().not_null())
                    .col(ColumnDef::new(RetryAuditLogs::ActorId).uuid())
                    .col(
                        ColumnDef::new(RetryAuditLogs::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RetryAuditLogs::Metadata)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RetryAuditLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RetryAuditLogs {
    Table,
    Id,
    OrganisationId,
    EntityType,
    EntityId,
    Action,
    Event,
    OldValue,
    NewValue,
    ChangeSummary,
    RetryScheduleId,
    RetryAttemptId,
    ReminderId,
    PaymentId,
    ActorType,
    ActorId,
    Timestamp,
    Metadata,
}
