use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RetryPolicies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RetryPolicies::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(RetryPolicies::OrganisationId).uuid().not_null())
                    .col(ColumnDef::new(RetryPolicies::SocieteId).uuid())
                    .col(ColumnDef::new(RetryPolicies::ProductId).uuid())
                    .col(ColumnDef::new(RetryPolicies::ChannelId).uuid())
                    .col(ColumnDef::new(RetryPolicies::Name).string().not_null())
                    .col(ColumnDef::new(RetryPolicies::Description).text())
                    .col(ColumnDef::new(RetryPolicies::RetryDelaysDays).json_binary().not_null())
                    .col(ColumnDef::new(RetryPolicies::MaxAttempts).integer().not_null())
                    .col(ColumnDef::new(RetryPolicies::MaxTotalDays).integer().not_null())
                    .col(
                        ColumnDef::new(RetryPolicies::RetryOnAm04)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(RetryPolicies::RetryableCodes).json_binary().not_null())
                    .col(
                        ColumnDef::new(RetryPolicies::NonRetryableCodes)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::StopOnPaymentSettled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::StopOnContractCancelled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::StopOnMandateRevoked)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::BackoffStrategy)
                            .string()
                            .not_null()
                            .default("FIXED"),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(RetryPolicies::UpdatedAt)
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
            .drop_table(Table::drop().table(RetryPolicies::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RetryPolicies {
    Table,
    Id,
    OrganisationId,
    SocieteId,
    ProductId,
    ChannelId,
    Name,
    Description,
    RetryDelaysDays,
    MaxAttempts,
    MaxTotalDays,
    #[iden = "retry_on_am04"]
    RetryOnAm04,
    RetryableCodes,
    NonRetryableCodes,
    StopOnPaymentSettled,
    StopOnContractCancelled,
    StopOnMandateRevoked,
    BackoffStrategy,
    IsActive,
    IsDefault,
    Priority,
    CreatedAt,
    UpdatedAt,
}
