use chrono::Utc;
use uuid::Uuid;

use dunning_domain::pagination::PageRequest;

use crate::domain::audit::{AuditFilter, AuditLogEntry, EntityType, NewAuditEntry};
use crate::domain::repository::AuditLogRepository;
use crate::error::RetryServiceError;

// ── AuditTrail ───────────────────────────────────────────────────────────────

/// Writes audit entries on behalf of every other use case.
#[derive(Clone)]
pub struct AuditTrail<A: AuditLogRepository> {
    pub repo: A,
}

impl<A: AuditLogRepository> AuditTrail<A> {
    /// Append one entry. Storage failures are returned to the caller.
    pub async fn log(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, RetryServiceError> {
        let entry = entry.into_entry(Uuid::now_v7(), Utc::now());
        self.repo.append(&entry).await?;
        Ok(entry)
    }

    /// Append after a business mutation has already been committed.
    /// A failed write is logged and never undoes that mutation.
    pub async fn record(&self, entry: NewAuditEntry) {
        let entity_type = entry.entity_type;
        let entity_id = entry.entity_id;
        let event = entry.event.clone();
        if let Err(e) = self.log(entry).await {
            tracing::error!(
                error = %e,
                entity_type = %entity_type,
                entity_id = %entity_id,
                event = %event,
                "audit write failed"
            );
        }
    }
}

// ── GetAuditLogs ─────────────────────────────────────────────────────────────

pub struct GetAuditLogsUseCase<A: AuditLogRepository> {
    pub repo: A,
}

impl<A: AuditLogRepository> GetAuditLogsUseCase<A> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        filter: AuditFilter,
        page: PageRequest,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(RetryServiceError::validation("`from` must not be after `to`"));
            }
        }
        self.repo.list(organisation_id, &filter, page).await
    }
}

// ── GetEntityHistory ─────────────────────────────────────────────────────────

pub struct GetEntityHistoryUseCase<A: AuditLogRepository> {
    pub repo: A,
}

impl<A: AuditLogRepository> GetEntityHistoryUseCase<A> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError> {
        self.repo
            .entity_history(organisation_id, entity_type, entity_id)
            .await
    }
}
