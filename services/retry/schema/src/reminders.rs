use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reminders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Uuid,
    pub retry_schedule_id: Uuid,
    pub retry_attempt_id: Option<Uuid>,
    pub client_id: Uuid,
    pub reminder_policy_id: Uuid,
    pub trigger_rule_id: Uuid,
    pub channel: String,
    pub template_id: String,
    pub template_variables: Json,
    pub trigger: String,
    pub planned_at: chrono::DateTime<chrono::Utc>,
    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: String,
    pub provider_name: Option<String>,
    pub provider_message_id: Option<String>,
    pub delivery_status_raw: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub metadata: Json,
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
