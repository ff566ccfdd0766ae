use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .table(RetrySchedules::Table)
                    .col(RetrySchedules::OrganisationId)
                    .col(RetrySchedules::IsResolved)
                    .col(RetrySchedules::NextRetryDate)
                    .name("idx_retry_schedules_due")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(Reminders::Table)
                    .col(Reminders::Status)
                    .col(Reminders::PlannedAt)
                    .name("idx_reminders_status_planned_at")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(Reminders::Table)
                    .col(Reminders::ClientId)
                    .col(Reminders::PlannedAt)
                    .name("idx_reminders_client_planned_at")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(Reminders::Table)
                    .col(Reminders::ProviderMessageId)
                    .name("idx_reminders_provider_message_id")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(RetryAuditLogs::Table)
                    .col(RetryAuditLogs::EntityType)
                    .col(RetryAuditLogs::EntityId)
                    .name("idx_retry_audit_logs_entity")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_retry_audit_logs_entity",
            "idx_reminders_provider_message_id",
            "idx_reminders_client_planned_at",
            "idx_reminders_status_planned_at",
            "idx_retry_schedules_due",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(Iden)]
enum RetrySchedules {
    Table,
    OrganisationId,
    IsResolved,
    NextRetryDate,
}

#[derive(Iden)]
enum Reminders {
    Table,
    Status,
    PlannedAt,
    ClientId,
    ProviderMessageId,
}

#[derive(Iden)]
enum RetryAuditLogs {
    Table,
    EntityType,
    EntityId,
}
