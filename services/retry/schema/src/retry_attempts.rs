use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "retry_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub retry_schedule_id: Uuid,
    pub attempt_number: i32,
    pub planned_date: chrono::DateTime<chrono::Utc>,
    pub executed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: String,
    pub psp_payment_id: Option<String>,
    pub psp_response: Option<Json>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub new_rejection_code: Option<String>,
    pub retry_job_id: Option<Uuid>,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::retry_schedules::Entity",
        from = "Column::RetryScheduleId",
        to = "super::retry_schedules::Column::Id"
    )]
    RetrySchedule,
}

impl Related<super::retry_schedules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RetrySchedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
