use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::reminder::{
    Reminder, ReminderChannel, ReminderFilter, ReminderStatus, ReminderTrigger, ThrottleRejection,
};
use crate::error::RetryServiceError;
use crate::handlers::{page_request, parse_opt, parse_query};
use crate::state::AppState;
use crate::usecase::reminder::{
    CreateManualRemindersUseCase, DeliveryStatusUpdate, GetReminderUseCase,
    HandleDeliveryStatusUseCase, ListRemindersUseCase, ScheduledReminders,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResponse {
    pub id: Uuid,
    pub retry_schedule_id: Uuid,
    pub retry_attempt_id: Option<Uuid>,
    pub client_id: Uuid,
    pub reminder_policy_id: Uuid,
    pub trigger_rule_id: Uuid,
    pub channel: ReminderChannel,
    pub template_id: String,
    pub template_variables: serde_json::Value,
    pub trigger: ReminderTrigger,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub planned_at: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "dunning_core::serde::opt_to_rfc3339_ms")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub status: ReminderStatus,
    pub provider_name: Option<String>,
    pub provider_message_id: Option<String>,
    pub delivery_status_raw: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<Reminder> for ReminderResponse {
    fn from(r: Reminder) -> Self {
        Self {
            id: r.id,
            retry_schedule_id: r.retry_schedule_id,
            retry_attempt_id: r.retry_attempt_id,
            client_id: r.client_id,
            reminder_policy_id: r.reminder_policy_id,
            trigger_rule_id: r.trigger_rule_id,
            channel: r.channel,
            template_id: r.template_id,
            template_variables: r.template_variables,
            trigger: r.trigger,
            planned_at: r.planned_at,
            sent_at: r.sent_at,
            delivered_at: r.delivered_at,
            status: r.status,
            provider_name: r.provider_name,
            provider_message_id: r.provider_message_id,
            delivery_status_raw: r.delivery_status_raw,
            error_code: r.error_code,
            error_message: r.error_message,
            retry_count: r.retry_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// ── GET /reminders ───────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ReminderListQuery {
    pub status: Option<String>,
    pub channel: Option<String>,
    pub retry_schedule_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

pub async fn list_reminders(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<ReminderResponse>>, RetryServiceError> {
    let query: ReminderListQuery = parse_query(raw_query)?;
    let filter = ReminderFilter {
        status: parse_opt("status", query.status.as_deref())?,
        channel: parse_opt("channel", query.channel.as_deref())?,
        retry_schedule_id: query.retry_schedule_id,
        client_id: query.client_id,
    };
    let usecase = ListRemindersUseCase {
        repo: state.reminder_repo(),
    };
    let reminders = usecase
        .execute(
            tenant.organisation_id,
            filter,
            page_request(query.per_page, query.page),
        )
        .await?;
    Ok(Json(reminders.into_iter().map(Into::into).collect()))
}

// ── GET /reminders/{id} ──────────────────────────────────────────────────────

pub async fn get_reminder(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReminderResponse>, RetryServiceError> {
    let usecase = GetReminderUseCase {
        repo: state.reminder_repo(),
    };
    let reminder = usecase.execute(tenant.organisation_id, id).await?;
    Ok(Json(reminder.into()))
}

// ── POST /reminders ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRemindersRequest {
    pub retry_schedule_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRuleResponse {
    pub trigger_rule_id: Uuid,
    pub channel: ReminderChannel,
    pub reason: ThrottleRejection,
}

#[derive(Serialize)]
pub struct CreateRemindersResponse {
    pub reminders: Vec<ReminderResponse>,
    pub skipped: Vec<SkippedRuleResponse>,
}

impl From<ScheduledReminders> for CreateRemindersResponse {
    fn from(scheduled: ScheduledReminders) -> Self {
        Self {
            reminders: scheduled.reminders.into_iter().map(Into::into).collect(),
            skipped: scheduled
                .skipped
                .into_iter()
                .map(|s| SkippedRuleResponse {
                    trigger_rule_id: s.trigger_rule_id,
                    channel: s.channel,
                    reason: s.reason,
                })
                .collect(),
        }
    }
}

pub async fn create_reminders(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Json(body): Json<CreateRemindersRequest>,
) -> Result<(StatusCode, Json<CreateRemindersResponse>), RetryServiceError> {
    let usecase = CreateManualRemindersUseCase {
        schedules: state.schedule_repo(),
        reminders: state.schedule_reminders(),
    };
    let scheduled = usecase
        .execute(
            tenant.organisation_id,
            body.retry_schedule_id,
            tenant.actor(),
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(scheduled.into())))
}

// ── POST /reminders/{id}/send ────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct SendReminderRequest {
    #[serde(default)]
    pub force: bool,
}

pub async fn send_reminder(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<SendReminderRequest>>,
) -> Result<Json<ReminderResponse>, RetryServiceError> {
    let force = body.map(|Json(b)| b.force).unwrap_or(false);
    let reminder = state
        .send_reminder()
        .execute(tenant.organisation_id, id, force, tenant.actor(), Utc::now())
        .await?;
    Ok(Json(reminder.into()))
}

// ── POST /webhooks/delivery-status ───────────────────────────────────────────

/// 200 with the updated reminder, or 202 when the message id is unknown.
pub async fn delivery_status(
    State(state): State<AppState>,
    Json(update): Json<DeliveryStatusUpdate>,
) -> Result<Response, RetryServiceError> {
    if update.provider_message_id.trim().is_empty() {
        return Err(RetryServiceError::validation("providerMessageId is required"));
    }
    let usecase = HandleDeliveryStatusUseCase {
        reminders: state.reminder_repo(),
        audit: state.audit_trail(),
    };
    match usecase.execute(update, Utc::now()).await? {
        Some(reminder) => Ok(Json(ReminderResponse::from(reminder)).into_response()),
        None => Ok(StatusCode::ACCEPTED.into_response()),
    }
}
