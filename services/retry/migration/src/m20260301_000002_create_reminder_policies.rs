use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReminderPolicies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ReminderPolicies::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ReminderPolicies::OrganisationId).uuid().not_null())
                    .col(ColumnDef::new(ReminderPolicies::SocieteId).uuid())
                    .col(ColumnDef::new(ReminderPolicies::ProductId).uuid())
                    .col(ColumnDef::new(ReminderPolicies::ChannelId).uuid())
                    .col(ColumnDef::new(ReminderPolicies::Name).string().not_null())
                    .col(ColumnDef::new(ReminderPolicies::Description).text())
                    .col(ColumnDef::new(ReminderPolicies::TriggerRules).json_binary().not_null())
                    .col(
                        ColumnDef::new(ReminderPolicies::CooldownHours)
                            .integer()
                            .not_null()
                            .default(24),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::MaxRemindersPerDay)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::MaxRemindersPerWeek)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::AllowedStartHour)
                            .integer()
                            .not_null()
                            .default(9),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::AllowedEndHour)
                            .integer()
                            .not_null()
                            .default(19),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::AllowedDaysOfWeek)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::RespectOptOut)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ReminderPolicies::UpdatedAt)
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
            .drop_table(Table::drop().table(ReminderPolicies::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReminderPolicies {
    Table,
    Id,
    OrganisationId,
    SocieteId,
    ProductId,
    ChannelId,
    Name,
    Description,
    TriggerRules,
    CooldownHours,
    MaxRemindersPerDay,
    MaxRemindersPerWeek,
    AllowedStartHour,
    AllowedEndHour,
    AllowedDaysOfWeek,
    RespectOptOut,
    IsActive,
    IsDefault,
    Priority,
    CreatedAt,
    UpdatedAt,
}
