use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reminder_policies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub trigger_rules: Json,
    pub cooldown_hours: i32,
    pub max_reminders_per_day: i32,
    pub max_reminders_per_week: i32,
    pub allowed_start_hour: i32,
    pub allowed_end_hour: i32,
    pub allowed_days_of_week: Json,
    pub respect_opt_out: bool,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
