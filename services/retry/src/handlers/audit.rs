use axum::{
    Json,
    extract::{Path, RawQuery, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_domain::actor::ActorType;
use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::audit::{AuditAction, AuditFilter, AuditLogEntry, EntityType};
use crate::error::RetryServiceError;
use crate::handlers::{page_request, parse_label, parse_opt, parse_query, parse_timestamp};
use crate::state::AppState;
use crate::usecase::audit::{GetAuditLogsUseCase, GetEntityHistoryUseCase};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub event: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub change_summary: String,
    pub retry_schedule_id: Option<Uuid>,
    pub retry_attempt_id: Option<Uuid>,
    pub reminder_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub actor_type: ActorType,
    pub actor_id: Option<Uuid>,
    #[serde(serialize_with = "dunning_core::serde::to_rfc3339_ms")]
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl From<AuditLogEntry> for AuditLogResponse {
    fn from(e: AuditLogEntry) -> Self {
        Self {
            id: e.id,
            entity_type: e.entity_type,
            entity_id: e.entity_id,
            action: e.action,
            event: e.event,
            old_value: e.old_value,
            new_value: e.new_value,
            change_summary: e.change_summary,
            retry_schedule_id: e.retry_schedule_id,
            retry_attempt_id: e.retry_attempt_id,
            reminder_id: e.reminder_id,
            payment_id: e.payment_id,
            actor_type: e.actor_type,
            actor_id: e.actor_id,
            timestamp: e.timestamp,
            metadata: e.metadata,
        }
    }
}

// ── GET /audit-logs ──────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct AuditLogQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub retry_schedule_id: Option<Uuid>,
    pub action: Option<String>,
    pub actor_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

pub async fn list_audit_logs(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<AuditLogResponse>>, RetryServiceError> {
    let query: AuditLogQuery = parse_query(raw_query)?;
    let filter = AuditFilter {
        entity_type: parse_opt("entity-type", query.entity_type.as_deref())?,
        entity_id: query.entity_id,
        retry_schedule_id: query.retry_schedule_id,
        action: parse_opt("action", query.action.as_deref())?,
        actor_type: parse_opt("actor-type", query.actor_type.as_deref())?,
        from: parse_timestamp("from", query.from.as_deref())?,
        to: parse_timestamp("to", query.to.as_deref())?,
    };
    let usecase = GetAuditLogsUseCase {
        repo: state.audit_repo(),
    };
    let entries = usecase
        .execute(
            tenant.organisation_id,
            filter,
            page_request(query.per_page, query.page),
        )
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

// ── GET /audit-logs/{entity_type}/{entity_id} ────────────────────────────────

pub async fn get_entity_history(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<AuditLogResponse>>, RetryServiceError> {
    let entity_type: EntityType = parse_label("entity type", &entity_type)?;
    let usecase = GetEntityHistoryUseCase {
        repo: state.audit_repo(),
    };
    let entries = usecase
        .execute(tenant.organisation_id, entity_type, entity_id)
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
