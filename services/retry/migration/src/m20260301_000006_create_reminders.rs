use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reminders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Reminders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Reminders::OrganisationId).uuid().not_null())
                    .col(ColumnDef::new(Reminders::SocieteId).uuid().not_null())
                    .col(ColumnDef::new(Reminders::RetryScheduleId).uuid().not_null())
                    .col(ColumnDef::new(Reminders::RetryAttemptId).uuid())
                    .col(ColumnDef::new(Reminders::ClientId).uuid().not_null())
                    .col(ColumnDef::new(Reminders::ReminderPolicyId).uuid().not_null())
                    .col(ColumnDef::new(Reminders::TriggerRuleId).uuid().not_null())
                    .col(ColumnDef::new(Reminders::Channel).string().not_null())
                    .col(ColumnDef::new(Reminders::TemplateId).string().not_null())
                    .col(
                        ColumnDef::new(Reminders::TemplateVariables)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(ColumnDef::new(Reminders::Trigger).string().not_null())
                    .col(
                        ColumnDef::new(Reminders::PlannedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reminders::SentAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Reminders::DeliveredAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Reminders::Status).string().not_null())
                    .col(ColumnDef::new(Reminders::ProviderName).string())
                    .col(ColumnDef::new(Reminders::ProviderMessageId).string())
                    .col(ColumnDef::new(Reminders::DeliveryStatusRaw).string())
                    .col(ColumnDef::new(Reminders::ErrorCode).string())
                    .col(ColumnDef::new(Reminders::ErrorMessage).text())
                    .col(
                        ColumnDef::new(Reminders::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Reminders::IdempotencyKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Reminders::Metadata)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Reminders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Reminders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Reminders::Table, Reminders::RetryScheduleId)
                            .to(RetrySchedules::Table, RetrySchedules::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reminders::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Reminders {
    Table,
    Id,
    OrganisationId,
    SocieteId,
    RetryScheduleId,
    RetryAttemptId,
    ClientId,
    ReminderPolicyId,
    TriggerRuleId,
    Channel,
    TemplateId,
    TemplateVariables,
    Trigger,
    PlannedAt,
    SentAt,
    DeliveredAt,
    Status,
    ProviderName,
    ProviderMessageId,
    DeliveryStatusRaw,
    ErrorCode,
    ErrorMessage,
    RetryCount,
    IdempotencyKey,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum RetrySchedules {
    Table,
    Id,
}
