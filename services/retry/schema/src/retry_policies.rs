use sea_orm::entity::prelude::*;

/// Retry rules of an organisation, optionally narrowed to a societe,
/// product or channel.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "retry_policies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub retry_delays_days: Json,
    pub max_attempts: i32,
    pub max_total_days: i32,
    pub retry_on_am04: bool,
    pub retryable_codes: Json,
    pub non_retryable_codes: Json,
    pub stop_on_payment_settled: bool,
    pub stop_on_contract_cancelled: bool,
    pub stop_on_mandate_revoked: bool,
    pub backoff_strategy: String,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
