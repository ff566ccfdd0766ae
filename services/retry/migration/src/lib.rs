use sea_orm_migration::prelude::*;

mod m20260301_000001_create_retry_policies;
mod m20260301_000002_create_reminder_policies;
mod m20260301_000003_create_retry_schedules;
mod m20260301_000004_create_retry_attempts;
mod m20260301_000005_create_retry_jobs;
mod m20260301_000006_create_reminders;
mod m20260301_000007_create_retry_audit_logs;
mod m20260301_000008_create_reminder_opt_outs;
mod m20260301_000009_add_lookup_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_retry_policies::Migration),
            Box::new(m20260301_000002_create_reminder_policies::Migration),
            Box::new(m20260301_000003_create_retry_schedules::Migration),
            Box::new(m20260301_000004_create_retry_attempts::Migration),
            Box::new(m20260301_000005_create_retry_jobs::Migration),
            Box::new(m20260301_000006_create_reminders::Migration),
            Box::new(m20260301_000007_create_retry_audit_logs::Migration),
            Box::new(m20260301_000008_create_reminder_opt_outs::Migration),
            Box::new(m20260301_000009_add_lookup_indexes::Migration),
        ]
    }
}
