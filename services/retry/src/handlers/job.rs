use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::job::{JobStatus, RetryJob};
use crate::error::RetryServiceError;
use crate::handlers::schedule::PageQuery;
use crate::handlers::{page_request, parse_query};
use crate::state::AppState;
use crate::usecase::job::{GetJobUseCase, ListJobsUseCase};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryJobResponse {
    pub id: Uuid,
    pub target_date: NaiveDate,
    pub timezone: String,
    pub cutoff_time: NaiveTime,
    pub status: JobStatus,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_attempts: u32,
    pub successful_attempts: u32,
    pub failed_attempts: u32,
    pub skipped_attempts: u32,
    pub failed_schedule_ids: Vec<Uuid>,
    pub triggered_by: String,
    pub is_manual: bool,
    pub dry_run: bool,
    pub error_message: Option<String>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<RetryJob> for RetryJobResponse {
    fn from(job: RetryJob) -> Self {
        Self {
            id: job.id,
            target_date: job.target_date,
            timezone: job.timezone,
            cutoff_time: job.cutoff_time,
            status: job.status,
            started_at: job.started_at,
            completed_at: job.completed_at,
            total_attempts: job.total_attempts,
            successful_attempts: job.successful_attempts,
            failed_attempts: job.failed_attempts,
            skipped_attempts: job.skipped_attempts,
            failed_schedule_ids: job.failed_schedule_ids,
            triggered_by: job.triggered_by,
            is_manual: job.is_manual,
            dry_run: job.dry_run,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

// ── POST /retry-jobs/run-now ─────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunNowRequest {
    pub schedule_id: Option<Uuid>,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn run_now(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Json(body): Json<RunNowRequest>,
) -> Result<(StatusCode, Json<RetryJobResponse>), RetryServiceError> {
    let job = state
        .process_due_retries()
        .run_now(
            tenant.organisation_id,
            body.schedule_id,
            body.dry_run,
            tenant.actor(),
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(job.into())))
}

// ── GET /retry-jobs ──────────────────────────────────────────────────────────

pub async fn list_jobs(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<RetryJobResponse>>, RetryServiceError> {
    let query: PageQuery = parse_query(raw_query)?;
    let usecase = ListJobsUseCase {
        repo: state.job_repo(),
    };
    let jobs = usecase
        .execute(
            tenant.organisation_id,
            page_request(query.per_page, query.page),
        )
        .await?;
    Ok(Json(jobs.into_iter().map(Into::into).collect()))
}

// ── GET /retry-jobs/{id} ─────────────────────────────────────────────────────

pub async fn get_job(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryJobResponse>, RetryServiceError> {
    let usecase = GetJobUseCase {
        repo: state.job_repo(),
    };
    let job = usecase.execute(tenant.organisation_id, id).await?;
    Ok(Json(job.into()))
}
