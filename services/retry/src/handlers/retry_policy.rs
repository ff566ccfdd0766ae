use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::policy::{BackoffStrategy, PolicyScope, RetryPolicy, RetryRules};
use crate::error::RetryServiceError;
use crate::handlers::page_request;
use crate::state::AppState;
use crate::usecase::retry_policy::{
    CreateRetryPolicyInput, CreateRetryPolicyUseCase, DeleteRetryPolicyUseCase,
    GetRetryPolicyUseCase, ListRetryPoliciesUseCase, UpdateRetryPolicyInput,
    UpdateRetryPolicyUseCase,
};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicyResponse {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub retry_delays_days: Vec<u32>,
    pub max_attempts: u32,
    pub max_total_days: u32,
    pub retry_on_am04: bool,
    pub retryable_codes: Vec<String>,
    pub non_retryable_codes: Vec<String>,
    pub stop_on_payment_settled: bool,
    pub stop_on_contract_cancelled: bool,
    pub stop_on_mandate_revoked: bool,
    pub backoff_strategy: BackoffStrategy,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<RetryPolicy> for RetryPolicyResponse {
    fn from(policy: RetryPolicy) -> Self {
        let rules = policy.rules;
        Self {
            id: policy.id,
            organisation_id: policy.organisation_id,
            societe_id: policy.scope.societe_id,
            product_id: policy.scope.product_id,
            channel_id: policy.scope.channel_id,
            name: policy.name,
            description: policy.description,
            retry_delays_days: rules.retry_delays_days,
            max_attempts: rules.max_attempts,
            max_total_days: rules.max_total_days,
            retry_on_am04: rules.retry_on_am04,
            retryable_codes: rules.retryable_codes,
            non_retryable_codes: rules.non_retryable_codes,
            stop_on_payment_settled: rules.stop_on_payment_settled,
            stop_on_contract_cancelled: rules.stop_on_contract_cancelled,
            stop_on_mandate_revoked: rules.stop_on_mandate_revoked,
            backoff_strategy: rules.backoff,
            is_active: policy.is_active,
            is_default: policy.is_default,
            priority: policy.priority,
            created_at: policy.created_at,
            updated_at: policy.updated_at,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyListQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

// ── POST /retry-policies ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRetryPolicyRequest {
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub retry_delays_days: Option<Vec<u32>>,
    pub max_attempts: Option<u32>,
    pub max_total_days: Option<u32>,
    pub retry_on_am04: Option<bool>,
    #[serde(default)]
    pub retryable_codes: Vec<String>,
    #[serde(default)]
    pub non_retryable_codes: Vec<String>,
    pub stop_on_payment_settled: Option<bool>,
    pub stop_on_contract_cancelled: Option<bool>,
    pub stop_on_mandate_revoked: Option<bool>,
    pub backoff_strategy: Option<BackoffStrategy>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub priority: i32,
}

pub async fn create_retry_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Json(body): Json<CreateRetryPolicyRequest>,
) -> Result<(StatusCode, Json<RetryPolicyResponse>), RetryServiceError> {
    let defaults = RetryRules::default();
    let rules = RetryRules {
        retry_delays_days: body.retry_delays_days.unwrap_or(defaults.retry_delays_days),
        max_attempts: body.max_attempts.unwrap_or(defaults.max_attempts),
        max_total_days: body.max_total_days.unwrap_or(defaults.max_total_days),
        retry_on_am04: body.retry_on_am04.unwrap_or(defaults.retry_on_am04),
        retryable_codes: body.retryable_codes,
        non_retryable_codes: body.non_retryable_codes,
        stop_on_payment_settled: body
            .stop_on_payment_settled
            .unwrap_or(defaults.stop_on_payment_settled),
        stop_on_contract_cancelled: body
            .stop_on_contract_cancelled
            .unwrap_or(defaults.stop_on_contract_cancelled),
        stop_on_mandate_revoked: body
            .stop_on_mandate_revoked
            .unwrap_or(defaults.stop_on_mandate_revoked),
        backoff: body.backoff_strategy.unwrap_or(defaults.backoff),
    };
    let usecase = CreateRetryPolicyUseCase {
        repo: state.retry_policy_repo(),
        audit: state.audit_trail(),
    };
    let policy = usecase
        .execute(
            tenant.organisation_id,
            tenant.actor(),
            CreateRetryPolicyInput {
                scope: PolicyScope {
                    societe_id: body.societe_id,
                    product_id: body.product_id,
                    channel_id: body.channel_id,
                },
                name: body.name,
                description: body.description,
                rules,
                is_active: body.is_active.unwrap_or(true),
                is_default: body.is_default,
                priority: body.priority,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(policy.into())))
}

// ── GET /retry-policies ──────────────────────────────────────────────────────

pub async fn list_retry_policies(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Query(query): Query<PolicyListQuery>,
) -> Result<Json<Vec<RetryPolicyResponse>>, RetryServiceError> {
    let usecase = ListRetryPoliciesUseCase {
        repo: state.retry_policy_repo(),
    };
    let policies = usecase
        .execute(
            tenant.organisation_id,
            page_request(query.per_page, query.page),
        )
        .await?;
    Ok(Json(policies.into_iter().map(Into::into).collect()))
}

// ── GET /retry-policies/{id} ─────────────────────────────────────────────────

pub async fn get_retry_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryPolicyResponse>, RetryServiceError> {
    let usecase = GetRetryPolicyUseCase {
        repo: state.retry_policy_repo(),
    };
    let policy = usecase.execute(tenant.organisation_id, id).await?;
    Ok(Json(policy.into()))
}

// ── PATCH /retry-policies/{id} ───────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRetryPolicyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub retry_delays_days: Option<Vec<u32>>,
    pub max_attempts: Option<u32>,
    pub max_total_days: Option<u32>,
    pub retry_on_am04: Option<bool>,
    pub retryable_codes: Option<Vec<String>>,
    pub non_retryable_codes: Option<Vec<String>>,
    pub stop_on_payment_settled: Option<bool>,
    pub stop_on_contract_cancelled: Option<bool>,
    pub stop_on_mandate_revoked: Option<bool>,
    pub backoff_strategy: Option<BackoffStrategy>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
    pub priority: Option<i32>,
}

pub async fn update_retry_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRetryPolicyRequest>,
) -> Result<Json<RetryPolicyResponse>, RetryServiceError> {
    let usecase = UpdateRetryPolicyUseCase {
        repo: state.retry_policy_repo(),
        audit: state.audit_trail(),
    };
    let policy = usecase
        .execute(
            tenant.organisation_id,
            id,
            tenant.actor(),
            UpdateRetryPolicyInput {
                name: body.name,
                description: body.description,
                retry_delays_days: body.retry_delays_days,
                max_attempts: body.max_attempts,
                max_total_days: body.max_total_days,
                retry_on_am04: body.retry_on_am04,
                retryable_codes: body.retryable_codes,
                non_retryable_codes: body.non_retryable_codes,
                stop_on_payment_settled: body.stop_on_payment_settled,
                stop_on_contract_cancelled: body.stop_on_contract_cancelled,
                stop_on_mandate_revoked: body.stop_on_mandate_revoked,
                backoff: body.backoff_strategy,
                is_active: body.is_active,
                is_default: body.is_default,
                priority: body.priority,
            },
        )
        .await?;
    Ok(Json(policy.into()))
}

// ── DELETE /retry-policies/{id} ──────────────────────────────────────────────

pub async fn delete_retry_policy(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, RetryServiceError> {
    let usecase = DeleteRetryPolicyUseCase {
        repo: state.retry_policy_repo(),
        audit: state.audit_trail(),
    };
    usecase
        .execute(tenant.organisation_id, id, tenant.actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
