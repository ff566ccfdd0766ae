use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, RawQuery, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::attempt::{AttemptStatus, RetryAttempt};
use crate::domain::schedule::{Eligibility, RetrySchedule, ScheduleFilter, StopCondition};
use crate::error::RetryServiceError;
use crate::handlers::{page_request, parse_opt, parse_query, parse_timestamp};
use crate::state::AppState;
use crate::usecase::attempt::{GetAttemptUseCase, ListAttemptsUseCase};
use crate::usecase::schedule::{
    GetRetryMetricsUseCase, GetScheduleUseCase, ListSchedulesUseCase, ReplanScheduleUseCase,
    RetryMetrics,
};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryScheduleResponse {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Uuid,
    pub original_payment_id: Uuid,
    pub schedule_ref: String,
    pub invoice_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub client_id: Uuid,
    pub rejection_code: String,
    pub rejection_raw_code: String,
    pub rejection_message: String,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub rejection_date: DateTime<Utc>,
    pub last_rejection_code: String,
    pub retry_policy_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub psp_name: String,
    pub eligibility: Eligibility,
    pub eligibility_reason: Option<String>,
    pub current_attempt: u32,
    pub max_attempts: u32,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub next_retry_date: Option<DateTime<Utc>>,
    pub is_resolved: bool,
    pub resolution_reason: Option<String>,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<RetrySchedule> for RetryScheduleResponse {
    fn from(s: RetrySchedule) -> Self {
        Self {
            id: s.id,
            organisation_id: s.organisation_id,
            societe_id: s.societe_id,
            original_payment_id: s.original_payment_id,
            schedule_ref: s.schedule_ref,
            invoice_id: s.invoice_id,
            contract_id: s.contract_id,
            client_id: s.client_id,
            rejection_code: s.rejection_code,
            rejection_raw_code: s.rejection_raw_code,
            rejection_message: s.rejection_message,
            rejection_date: s.rejection_date,
            last_rejection_code: s.last_rejection_code,
            retry_policy_id: s.retry_policy_id,
            amount_cents: s.amount_cents,
            currency: s.currency.to_string(),
            psp_name: s.psp_name,
            eligibility: s.eligibility,
            eligibility_reason: s.eligibility_reason,
            current_attempt: s.current_attempt,
            max_attempts: s.max_attempts,
            next_retry_date: s.next_retry_date,
            is_resolved: s.is_resolved,
            resolution_reason: s.resolution_reason,
            resolved_at: s.resolved_at,
            metadata: s.metadata,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryAttemptResponse {
    pub id: Uuid,
    pub retry_schedule_id: Uuid,
    pub attempt_number: u32,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub planned_date: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub executed_at: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    pub psp_payment_id: Option<String>,
    pub psp_response: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub new_rejection_code: Option<String>,
    pub retry_job_id: Option<Uuid>,
    pub idempotency_key: String,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<RetryAttempt> for RetryAttemptResponse {
    fn from(a: RetryAttempt) -> Self {
        Self {
            id: a.id,
            retry_schedule_id: a.retry_schedule_id,
            attempt_number: a.attempt_number,
            planned_date: a.planned_date,
            executed_at: a.executed_at,
            status: a.status,
            psp_payment_id: a.psp_payment_id,
            psp_response: a.psp_response,
            error_code: a.error_code,
            error_message: a.error_message,
            new_rejection_code: a.new_rejection_code,
            retry_job_id: a.retry_job_id,
            idempotency_key: a.idempotency_key,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

// ── GET /retry-schedules ─────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleListQuery {
    pub eligibility: Option<String>,
    pub is_resolved: Option<bool>,
    pub client_id: Option<Uuid>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

pub async fn list_schedules(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<RetryScheduleResponse>>, RetryServiceError> {
    let query: ScheduleListQuery = parse_query(raw_query)?;
    let filter = ScheduleFilter {
        eligibility: parse_opt("eligibility", query.eligibility.as_deref())?,
        is_resolved: query.is_resolved,
        client_id: query.client_id,
    };
    let usecase = ListSchedulesUseCase {
        schedules: state.schedule_repo(),
    };
    let schedules = usecase
        .execute(
            tenant.organisation_id,
            filter,
            page_request(query.per_page, query.page),
        )
        .await?;
    Ok(Json(schedules.into_iter().map(Into::into).collect()))
}

// ── GET /retry-schedules/{id} ────────────────────────────────────────────────

pub async fn get_schedule(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryScheduleResponse>, RetryServiceError> {
    let usecase = GetScheduleUseCase {
        schedules: state.schedule_repo(),
    };
    let schedule = usecase.execute(tenant.organisation_id, id).await?;
    Ok(Json(schedule.into()))
}

// ── POST /retry-schedules/{id}/cancel ────────────────────────────────────────

#[derive(Deserialize)]
pub struct CancelScheduleRequest {
    pub reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelScheduleResponse {
    pub schedule: RetryScheduleResponse,
    pub cancelled_reminders: u64,
}

pub async fn cancel_schedule(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelScheduleRequest>,
) -> Result<Json<CancelScheduleResponse>, RetryServiceError> {
    let (schedule, cancelled_reminders) = state
        .cancel_retry_schedule()
        .execute(tenant.organisation_id, id, &body.reason, tenant.actor())
        .await?;
    Ok(Json(CancelScheduleResponse {
        schedule: schedule.into(),
        cancelled_reminders,
    }))
}

// ── POST /retry-schedules/{id}/replan ────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplanScheduleRequest {
    pub new_date: DateTime<Utc>,
    pub reason: String,
}

pub async fn replan_schedule(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReplanScheduleRequest>,
) -> Result<Json<RetryScheduleResponse>, RetryServiceError> {
    let usecase = ReplanScheduleUseCase {
        schedules: state.schedule_repo(),
        audit: state.audit_trail(),
    };
    let schedule = usecase
        .execute(
            tenant.organisation_id,
            id,
            body.new_date,
            &body.reason,
            tenant.actor(),
        )
        .await?;
    Ok(Json(schedule.into()))
}

// ── POST /retry-schedules/{id}/stop-conditions ───────────────────────────────

#[derive(Deserialize)]
pub struct StopConditionRequest {
    pub condition: StopCondition,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopConditionResponse {
    pub applied: bool,
    pub schedule: RetryScheduleResponse,
}

pub async fn apply_stop_condition(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StopConditionRequest>,
) -> Result<Json<StopConditionResponse>, RetryServiceError> {
    let (schedule, applied) = state
        .stop_schedule()
        .execute(tenant.organisation_id, id, body.condition, tenant.actor())
        .await?;
    Ok(Json(StopConditionResponse {
        applied,
        schedule: schedule.into(),
    }))
}

// ── GET /retry-schedules/{id}/attempts ───────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PageQuery {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

pub async fn list_attempts(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<RetryAttemptResponse>>, RetryServiceError> {
    let query: PageQuery = parse_query(raw_query)?;
    let usecase = ListAttemptsUseCase {
        schedules: state.schedule_repo(),
        attempts: state.attempt_repo(),
    };
    let attempts = usecase
        .execute(
            tenant.organisation_id,
            id,
            page_request(query.per_page, query.page),
        )
        .await?;
    Ok(Json(attempts.into_iter().map(Into::into).collect()))
}

// ── GET /retry-attempts/{id} ─────────────────────────────────────────────────

pub async fn get_attempt(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryAttemptResponse>, RetryServiceError> {
    let usecase = GetAttemptUseCase {
        repo: state.attempt_repo(),
    };
    let attempt = usecase.execute(tenant.organisation_id, id).await?;
    Ok(Json(attempt.into()))
}

// ── GET /metrics/retry ───────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct MetricsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryMetricsResponse {
    pub total_schedules: u64,
    pub eligible_schedules: u64,
    pub pending_schedules: u64,
    pub resolved_schedules: u64,
    pub succeeded_schedules: u64,
    pub success_rate: f64,
    pub avg_attempts_before_success: f64,
    pub schedules_by_eligibility: BTreeMap<String, u64>,
    pub attempts_by_status: BTreeMap<String, u64>,
}

impl From<RetryMetrics> for RetryMetricsResponse {
    fn from(metrics: RetryMetrics) -> Self {
        let stats = metrics.schedules;
        Self {
            total_schedules: stats.total,
            eligible_schedules: stats.eligible,
            pending_schedules: stats.pending,
            resolved_schedules: stats.resolved,
            succeeded_schedules: stats.succeeded,
            success_rate: metrics.success_rate,
            avg_attempts_before_success: stats.avg_attempts_before_success,
            schedules_by_eligibility: stats
                .by_eligibility
                .into_iter()
                .map(|(e, n)| (e.as_str().to_owned(), n))
                .collect(),
            attempts_by_status: metrics
                .attempts_by_status
                .into_iter()
                .map(|(s, n)| (s.as_str().to_owned(), n))
                .collect(),
        }
    }
}

pub async fn get_retry_metrics(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<RetryMetricsResponse>, RetryServiceError> {
    let query: MetricsQuery = parse_query(raw_query)?;
    let from = parse_timestamp("from", query.from.as_deref())?;
    let to = parse_timestamp("to", query.to.as_deref())?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(RetryServiceError::validation("from must not be after to"));
        }
    }
    let usecase = GetRetryMetricsUseCase {
        schedules: state.schedule_repo(),
        attempts: state.attempt_repo(),
    };
    let metrics = usecase.execute(tenant.organisation_id, from, to).await?;
    Ok(Json(metrics.into()))
}
