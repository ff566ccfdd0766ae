use sea_orm::entity::prelude::*;

/// Append-only; rows are never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "retry_audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub event: String,
    pub old_value: Option<Json>,
    pub new_value: Option<Json>,
    pub change_summary: String,
    pub retry_schedule_id: Option<Uuid>,
    pub retry_attempt_id: Option<Uuid>,
    pub reminder_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub actor_type: String,
    pub actor_id: Option<Uuid>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metadata: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
