use sea_orm::entity::prelude::*;

/// Retry plan of one rejected payment.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "retry_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Uuid,
    pub original_payment_id: Uuid,
    pub schedule_ref: String,
    pub invoice_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub client_id: Uuid,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub rejection_code: String,
    pub rejection_raw_code: String,
    pub rejection_message: String,
    pub rejection_date: chrono::DateTime<chrono::Utc>,
    pub last_rejection_code: String,
    pub retry_policy_id: Uuid,
    /// Rules captured from the policy at creation.
    pub policy_snapshot: Json,
    pub amount_cents: i64,
    pub currency: String,
    pub psp_name: String,
    pub psp_payment_id: Option<String>,
    pub eligibility: String,
    pub eligibility_reason: Option<String>,
    pub current_attempt: i32,
    pub max_attempts: i32,
    pub next_retry_date: Option<chrono::DateTime<chrono::Utc>>,
    pub is_resolved: bool,
    pub resolution_reason: Option<String>,
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub event_id: String,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub metadata: Json,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::retry_attempts::Entity")]
    RetryAttempts,
    #[sea_orm(has_many = "super::reminders::Entity")]
    Reminders,
}

impl Related<super::retry_attempts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RetryAttempts.def()
    }
}

impl Related<super::reminders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reminders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
