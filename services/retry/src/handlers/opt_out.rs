use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use dunning_tenant_types::identity::TenantHeaders;

use crate::domain::reminder::ReminderChannel;
use crate::error::RetryServiceError;
use crate::handlers::parse_label;
use crate::state::AppState;
use crate::usecase::opt_out::{OptInUseCase, OptOutUseCase};

// ── PUT /opt-outs/{client_id}/{channel} ──────────────────────────────────────

pub async fn opt_out(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path((client_id, channel)): Path<(Uuid, String)>,
) -> Result<StatusCode, RetryServiceError> {
    let channel: ReminderChannel = parse_label("channel", &channel)?;
    let usecase = OptOutUseCase {
        repo: state.opt_out_repo(),
    };
    usecase
        .execute(tenant.organisation_id, client_id, channel)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── DELETE /opt-outs/{client_id}/{channel} ───────────────────────────────────

/// 204 when an opt-out was removed, 404 when there was none.
pub async fn opt_in(
    tenant: TenantHeaders,
    State(state): State<AppState>,
    Path((client_id, channel)): Path<(Uuid, String)>,
) -> Result<StatusCode, RetryServiceError> {
    let channel: ReminderChannel = parse_label("channel", &channel)?;
    let usecase = OptInUseCase {
        repo: state.opt_out_repo(),
    };
    let removed = usecase
        .execute(tenant.organisation_id, client_id, channel)
        .await?;
    Ok(if removed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}
