use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RetryAttempts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RetryAttempts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RetryAttempts::OrganisationId).uuid().not_null())
                    .col(ColumnDef::new(RetryAttempts::RetryScheduleId).uuid().not_null())
                    .col(ColumnDef::new(RetryAttempts::AttemptNumber).integer().not_null())
                    .col(
                        ColumnDef::new(RetryAttempts::PlannedDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RetryAttempts::ExecutedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(RetryAttempts::Status).string().not_null())
                    .col(ColumnDef::new(RetryAttempts::PspPaymentId).string())
                    .col(ColumnDef::new(RetryAttempts::PspResponse).json_binary())
                    .col(ColumnDef::new(RetryAttempts::ErrorCode).string())
                    .col(ColumnDef::new(RetryAttempts::ErrorMessage).text())
                    .col(ColumnDef::new(RetryAttempts::NewRejectionCode).string())
                    .col(ColumnDef::new(RetryAttempts::RetryJobId).uuid())
                    .col(
                        ColumnDef::new(RetryAttempts::IdempotencyKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(RetryAttempts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RetryAttempts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(RetryAttempts::Table, RetryAttempts::RetryScheduleId)
                            .to(RetrySchedules::Table, RetrySchedules::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .index(
                        Index::create()
                            .name("uq_retry_attempts_schedule_number")
                            .col(RetryAttempts::RetryScheduleId)
                            .col(RetryAttempts::AttemptNumber)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RetryAttempts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RetryAttempts {
    Table,
    Id,
    OrganisationId,
    RetryScheduleId,
    AttemptNumber,
    PlannedDate,
    ExecutedAt,
    Status,
    PspPaymentId,
    PspResponse,
    ErrorCode,
    ErrorMessage,
    NewRejectionCode,
    RetryJobId,
    IdempotencyKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum RetrySchedules {
    Table,
    Id,
}
