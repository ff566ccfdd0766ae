use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RetrySchedules::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RetrySchedules::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RetrySchedules::OrganisationId).uuid().not_null())
                    .col(ColumnDef::new(RetrySchedules::SocieteId).uuid().not_null())
                    .col(ColumnDef::new(RetrySchedules::OriginalPaymentId).uuid().not_null())
                    .col(ColumnDef::new(RetrySchedules::ScheduleRef).string().not_null())
                    .col(ColumnDef::new(RetrySchedules::InvoiceId).uuid())
                    .col(ColumnDef::new(RetrySchedules::ContractId).uuid())
                    .col(ColumnDef::new(RetrySchedules::ClientId).uuid().not_null())
                    .col(ColumnDef::new(RetrySchedules::ProductId).uuid())
                    .col(ColumnDef::new(RetrySchedules::ChannelId).uuid())
                    .col(ColumnDef::new(RetrySchedules::RejectionCode).string().not_null())
                    .col(ColumnDef::new(RetrySchedules::RejectionRawCode).string().not_null())
                    .col(ColumnDef::new(RetrySchedules::RejectionMessage).text().not_null())
                    .col(
                        ColumnDef::new(RetrySchedules::RejectionDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RetrySchedules::LastRejectionCode).string().not_null())
                    .col(ColumnDef::new(RetrySchedules::RetryPolicyId).uuid().not_null())
                    .col(ColumnDef::new(RetrySchedules::PolicySnapshot).json_binary().not_null())
                    .col(ColumnDef::new(RetrySchedules::AmountCents).big_integer().not_null())
                    .col(ColumnDef::new(RetrySchedules::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(RetrySchedules::PspName).string().not_null())
                    .col(ColumnDef::new(RetrySchedules::PspPaymentId).string())
                    .col(ColumnDef::new(RetrySchedules::Eligibility).string().not_null())
                    .col(ColumnDef::new(RetrySchedules::EligibilityReason).string())
                    .col(
                        ColumnDef::new(RetrySchedules::CurrentAttempt)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(RetrySchedules::MaxAttempts).integer().not_null())
                    .col(ColumnDef::new(RetrySchedules::NextRetryDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(RetrySchedules::IsResolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(RetrySchedules::ResolutionReason).string())
                    .col(ColumnDef::new(RetrySchedules::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(RetrySchedules::EventId).string().not_null())
                    .col(
                        ColumnDef::new(RetrySchedules::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RetrySchedules::Metadata)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(RetrySchedules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RetrySchedules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .index(
                        Index::create()
                            .name("uq_retry_schedules_organisation_idempotency_key")
                            .col(RetrySchedules::OrganisationId)
                            .col(RetrySchedules::IdempotencyKey)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RetrySchedules::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RetrySchedules {
    Table,
    Id,
    OrganisationId,
    SocieteId,
    OriginalPaymentId,
    ScheduleRef,
    InvoiceId,
    ContractId,
    ClientId,
    ProductId,
    ChannelId,
    RejectionCode,
    RejectionRawCode,
    RejectionMessage,
    RejectionDate,
    LastRejectionCode,
    RetryPolicyId,
    PolicySnapshot,
    AmountCents,
    Currency,
    PspName,
    PspPaymentId,
    Eligibility,
    EligibilityReason,
    CurrentAttempt,
    MaxAttempts,
    NextRetryDate,
    IsResolved,
    ResolutionReason,
    ResolvedAt,
    EventId,
    IdempotencyKey,
    Metadata,
    CreatedAt,
    UpdatedAt,
}
