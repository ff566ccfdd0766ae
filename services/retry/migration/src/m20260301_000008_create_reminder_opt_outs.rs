use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReminderOptOuts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ReminderOptOuts::ClientId).uuid().not_null())
                    .col(ColumnDef::new(ReminderOptOuts::Channel).string().not_null())
                    .col(ColumnDef::new(ReminderOptOuts::OrganisationId).uuid().not_null())
                    .col(
                        ColumnDef::new(ReminderOptOuts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(ReminderOptOuts::ClientId)
                            .col(ReminderOptOuts::Channel),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReminderOptOuts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReminderOptOuts {
    Table,
    ClientId,
    Channel,
    OrganisationId,
    CreatedAt,
}
