use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(dunning_retry_migration::Migrator).await;
}
