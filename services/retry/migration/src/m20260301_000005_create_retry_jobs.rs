use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RetryJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RetryJobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RetryJobs::OrganisationId).uuid().not_null())
                    .col(ColumnDef::new(RetryJobs::TargetDate).date().not_null())
                    .col(ColumnDef::new(RetryJobs::Timezone).string().not_null())
                    .col(ColumnDef::new(RetryJobs::CutoffTime).time().not_null())
                    .col(ColumnDef::new(RetryJobs::Status).string().not_null())
                    .col(ColumnDef::new(RetryJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(RetryJobs::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(RetryJobs::TotalAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RetryJobs::SuccessfulAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RetryJobs::FailedAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RetryJobs::SkippedAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RetryJobs::FailedScheduleIds)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(RetryJobs::TriggeredBy).string().not_null())
                    .col(
                        ColumnDef::new(RetryJobs::IsManual)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RetryJobs::DryRun)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RetryJobs::IdempotencyKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(RetryJobs::ErrorMessage).text())
                    .col(
                        ColumnDef::new(RetryJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RetryJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RetryJobs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RetryJobs {
    Table,
    Id,
    OrganisationId,
    TargetDate,
    Timezone,
    CutoffTime,
    Status,
    StartedAt,
    CompletedAt,
    TotalAttempts,
    SuccessfulAttempts,
    FailedAttempts,
    SkippedAttempts,
    FailedScheduleIds,
    TriggeredBy,
    IsManual,
    DryRun,
    IdempotencyKey,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}
