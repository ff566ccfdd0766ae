use sea_orm::entity::prelude::*;

/// One orchestration run over due schedules.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "retry_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub target_date: chrono::NaiveDate,
    pub timezone: String,
    pub cutoff_time: chrono::NaiveTime,
    pub status: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_attempts: i32,
    pub successful_attempts: i32,
    pub failed_attempts: i32,
    pub skipped_attempts: i32,
    pub failed_schedule_ids: Json,
    pub triggered_by: String,
    pub is_manual: bool,
    pub dry_run: bool,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
