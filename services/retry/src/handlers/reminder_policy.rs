use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::policy::{PolicyScope, ReminderPolicy, ThrottleRules, TriggerRule};
use crate::domain::reminder::{ReminderChannel, ReminderTrigger};
use crate::error::RetryServiceError;
use crate::handlers::page_request;
use crate::handlers::retry_policy::PolicyListQuery;
use crate::state::AppState;
use crate::usecase::reminder_policy::{
    CreateReminderPolicyInput, CreateReminderPolicyUseCase, DeleteReminderPolicyUseCase,
    GetReminderPolicyUseCase, ListReminderPoliciesUseCase, UpdateReminderPolicyInput,
    UpdateReminderPolicyUseCase,
};

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRuleBody {
    pub id: Option<Uuid>,
    pub trigger: ReminderTrigger,
    pub channel: ReminderChannel,
    #[serde(default)]
    pub delay_hours: u32,
    pub template_id: String,
    #[serde(default)]
    pub order: u32,
}

impl From<TriggerRuleBody> for TriggerRule {
    fn from(body: TriggerRuleBody) -> Self {
        Self {
            id: body.id.unwrap_or_else(Uuid::now_v7),
            trigger: body.trigger,
            channel: body.channel,
            delay_hours: body.delay_hours,
            template_id: body.template_id,
            order: body.order,
        }
    }
}

impl From<TriggerRule> for TriggerRuleBody {
    fn from(rule: TriggerRule) -> Self {
        Self {
            id: Some(rule.id),
            trigger: rule.trigger,
            channel: rule.channel,
            delay_hours: rule.delay_hours,
            template_id: rule.template_id,
            order: rule.order,
        }
    }
}

/// Throttle settings; omitted fields take the service defaults.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleBody {
    pub cooldown_hours: Option<u32>,
    pub max_reminders_per_day: Option<u32>,
    pub max_reminders_per_week: Option<u32>,
    pub allowed_start_hour: Option<u32>,
    pub allowed_end_hour: Option<u32>,
    pub allowed_days_of_week: Option<Vec<u32>>,
    pub respect_opt_out: Option<bool>,
}

impl From<ThrottleBody> for ThrottleRules {
    fn from(body: ThrottleBody) -> Self {
        let defaults = ThrottleRules::default();
        Self {
            cooldown_hours: body.cooldown_hours.unwrap_or(defaults.cooldown_hours),
            max_reminders_per_day: body
                .max_reminders_per_day
                .unwrap_or(defaults.max_reminders_per_day),
            max_reminders_per_week: body
                .max_reminders_per_week
                .unwrap_or(defaults.max_reminders_per_week),
            allowed_start_hour: body.allowed_start_hour.unwrap_or(defaults.allowed_start_hour),
            allowed_end_hour: body.allowed_end_hour.unwrap_or(defaults.allowed_end_hour),
            allowed_days_of_week: body
                .allowed_days_of_week
                .unwrap_or(defaults.allowed_days_of_week),
            respect_opt_out: body.respect_opt_out.unwrap_or(defaults.respect_opt_out),
        }
    }
}

impl From<ThrottleRules> for ThrottleBody {
    fn from(rules: ThrottleRules) -> Self {
        Self {
            cooldown_hours: Some(rules.cooldown_hours),
            max_reminders_per_day: Some(rules.max_reminders_per_day),
            max_reminders_per_week: Some(rules.max_reminders_per_week),
            allowed_start_hour: Some(rules.allowed_start_hour),
            allowed_end_hour: Some(rules.allowed_end_hour),
            allowed_days_of_week: Some(rules.allowed_days_of_week),
            respect_opt_out: Some(rules.respect_opt_out),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPolicyResponse {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub trigger_rules: Vec<TriggerRuleBody>,
    pub throttle: ThrottleBody,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<ReminderPolicy> for ReminderPolicyResponse {
    fn from(policy: ReminderPolicy) -> Self {
        Self {
            id: policy.id,
            organisation_id: policy.organisation_id,
            societe_id: policy.scope.societe_id,
            product_id: policy.scope.product_id,
            channel_id: policy.scope.channel_id,
            name: policy.name,
            description: policy.description,
            trigger_rules: policy.trigger_rules.into_iter().map(Into::into).collect(),
            throttle: policy.throttle.into(),
            is_active: policy.is_active,
            is_default: policy.is_default,
            priority: policy.priority,
            created_at: policy.created_at,
            updated_at: policy.updated_at,
        }
    }
}

// ── POST /reminder-policies ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderPolicyRequest {
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub trigger_rules: Vec<TriggerRuleBody>,
    #[serde(default)]
    pub throttle: ThrottleBody,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub priority: i32,
}

pub async fn create_reminder_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Json(body): Json<CreateReminderPolicyRequest>,
) -> Result<(StatusCode, Json<ReminderPolicyResponse>), RetryServiceError> {
    let usecase = CreateReminderPolicyUseCase {
        repo: state.reminder_policy_repo(),
        audit: state.audit_trail(),
    };
    let policy = usecase
        .execute(
            tenant.organisation_id,
            tenant.actor(),
            CreateReminderPolicyInput {
                scope: PolicyScope {
                    societe_id: body.societe_id,
                    product_id: body.product_id,
                    channel_id: body.channel_id,
                },
                name: body.name,
                description: body.description,
                trigger_rules: body.trigger_rules.into_iter().map(Into::into).collect(),
                throttle: body.throttle.into(),
                is_active: body.is_active.unwrap_or(true),
                is_default: body.is_default,
                priority: body.priority,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(policy.into())))
}

// ── GET /reminder-policies ───────────────────────────────────────────────────

pub async fn list_reminder_policies(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Query(query): Query<PolicyListQuery>,
) -> Result<Json<Vec<ReminderPolicyResponse>>, RetryServiceError> {
    let usecase = ListReminderPoliciesUseCase {
        repo: state.reminder_policy_repo(),
    };
    let policies = usecase
        .execute(
            tenant.organisation_id,
            page_request(query.per_page, query.page),
        )
        .await?;
    Ok(Json(policies.into_iter().map(Into::into).collect()))
}

// ── GET /reminder-policies/{id} ──────────────────────────────────────────────

pub async fn get_reminder_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReminderPolicyResponse>, RetryServiceError> {
    let usecase = GetReminderPolicyUseCase {
        repo: state.reminder_policy_repo(),
    };
    let policy = usecase.execute(tenant.organisation_id, id).await?;
    Ok(Json(policy.into()))
}

// ── PATCH /reminder-policies/{id} ────────────────────────────────────────────

/// `throttle`, when present, replaces the stored throttle settings.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReminderPolicyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger_rules: Option<Vec<TriggerRuleBody>>,
    pub throttle: Option<ThrottleBody>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
    pub priority: Option<i32>,
}

pub async fn update_reminder_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateReminderPolicyRequest>,
) -> Result<Json<ReminderPolicyResponse>, RetryServiceError> {
    let usecase = UpdateReminderPolicyUseCase {
        repo: state.reminder_policy_repo(),
        audit: state.audit_trail(),
    };
    let policy = usecase
        .execute(
            tenant.organisation_id,
            id,
            tenant.actor(),
            UpdateReminderPolicyInput {
                name: body.name,
                description: body.description,
                trigger_rules: body
                    .trigger_rules
                    .map(|rules| rules.into_iter().map(Into::into).collect()),
                throttle: body.throttle.map(Into::into),
                is_active: body.is_active,
                is_default: body.is_default,
                priority: body.priority,
            },
        )
        .await?;
    Ok(Json(policy.into()))
}

// ── DELETE /reminder-policies/{id} ───────────────────────────────────────────

pub async fn delete_reminder_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, RetryServiceError> {
    let usecase = DeleteReminderPolicyUseCase {
        repo: state.reminder_policy_repo(),
        audit: state.audit_trail(),
    };
    usecase
        .execute(tenant.organisation_id, id, tenant.actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
