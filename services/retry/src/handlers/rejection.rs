use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::policy::PolicyContext;
use crate::domain::schedule::{Eligibility, RejectionEvent};
use crate::error::RetryServiceError;
use crate::state::AppState;
use crate::usecase::orchestrator::RejectionResult;
use crate::usecase::schedule::EligibilityCheck;

// ── POST /rejections ─────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionResponse {
    pub processed: bool,
    pub retry_schedule_id: Option<Uuid>,
    pub eligibility: Eligibility,
    pub message: String,
    pub reminder_ids: Vec<Uuid>,
}

impl From<RejectionResult> for RejectionResponse {
    fn from(result: RejectionResult) -> Self {
        Self {
            processed: result.processed,
            retry_schedule_id: result.retry_schedule_id,
            eligibility: result.eligibility,
            message: result.message,
            reminder_ids: result.reminder_ids,
        }
    }
}

/// 201 for a newly ingested rejection, 200 for a replayed one.
pub async fn handle_rejection(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Json(event): Json<RejectionEvent>,
) -> Result<(StatusCode, Json<RejectionResponse>), RetryServiceError> {
    if event.organisation_id != tenant.organisation_id {
        return Err(RetryServiceError::validation(
            "organisationId does not match the tenant",
        ));
    }
    let result = state
        .handle_payment_rejected()
        .execute(event, Utc::now())
        .await?;
    let status = if result.processed {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result.into())))
}

// ── POST /eligibility-checks ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCheckRequest {
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub reason_code: String,
    /// Defaults to now.
    pub rejected_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCheckResponse {
    pub eligibility: Eligibility,
    pub is_eligible: bool,
    pub reason: String,
    pub retry_policy_id: Uuid,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub first_retry_date: Option<DateTime<Utc>>,
}

impl From<EligibilityCheck> for EligibilityCheckResponse {
    fn from(check: EligibilityCheck) -> Self {
        Self {
            eligibility: check.eligibility,
            is_eligible: check.eligibility.is_eligible(),
            reason: check.reason,
            retry_policy_id: check.retry_policy_id,
            first_retry_date: check.first_retry_date,
        }
    }
}

pub async fn check_eligibility(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Json(body): Json<EligibilityCheckRequest>,
) -> Result<Json<EligibilityCheckResponse>, RetryServiceError> {
    let ctx = PolicyContext {
        organisation_id: tenant.organisation_id,
        societe_id: body.societe_id,
        product_id: body.product_id,
        channel_id: body.channel_id,
    };
    let check = state
        .check_eligibility()
        .execute(&ctx, &body.reason_code, body.rejected_at.unwrap_or_else(Utc::now))
        .await?;
    Ok(Json(check.into()))
}
