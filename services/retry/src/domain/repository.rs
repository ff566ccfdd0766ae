#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use dunning_domain::pagination::PageRequest;

use crate::domain::attempt::{AttemptStatus, RetryAttempt};
use crate::domain::audit::{AuditFilter, AuditLogEntry, EntityType};
use crate::domain::job::RetryJob;
use crate::domain::policy::{ReminderPolicy, RetryPolicy};
use crate::domain::reminder::{Reminder, ReminderChannel, ReminderFilter, ReminderStatus};
use crate::domain::schedule::{RetrySchedule, ScheduleFilter, ScheduleStatistics};
use crate::error::RetryServiceError;

/// Repository for retry policies.
pub trait RetryPolicyRepository: Send + Sync {
    async fn create(&self, policy: &RetryPolicy) -> Result<(), RetryServiceError>;
    async fn update(&self, policy: &RetryPolicy) -> Result<(), RetryServiceError>;
    /// Returns `true` if a row was deleted.
    async fn delete(&self, organisation_id: Uuid, id: Uuid) -> Result<bool, RetryServiceError>;
    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<RetryPolicy>, RetryServiceError>;
    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryPolicy>, RetryServiceError>;
    /// Active policies of the organisation, the candidate set for resolution.
    async fn list_active(&self, organisation_id: Uuid)
    -> Result<Vec<RetryPolicy>, RetryServiceError>;
}

/// Repository for reminder policies.
pub trait ReminderPolicyRepository: Send + Sync {
    async fn create(&self, policy: &ReminderPolicy) -> Result<(), RetryServiceError>;
    async fn update(&self, policy: &ReminderPolicy) -> Result<(), RetryServiceError>;
    async fn delete(&self, organisation_id: Uuid, id: Uuid) -> Result<bool, RetryServiceError>;
    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ReminderPolicy>, RetryServiceError>;
    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<ReminderPolicy>, RetryServiceError>;
    async fn list_active(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<ReminderPolicy>, RetryServiceError>;
}

/// Repository for retry schedules.
pub trait RetryScheduleRepository: Send + Sync {
    /// Insert unless the organisation already has a schedule with the same
    /// idempotency key. Returns the stored schedule and whether this call
    /// inserted it.
    async fn insert_if_absent(
        &self,
        schedule: &RetrySchedule,
    ) -> Result<(RetrySchedule, bool), RetryServiceError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<RetrySchedule>, RetryServiceError>;
    async fn find_by_idempotency_key(
        &self,
        organisation_id: Uuid,
        key: &str,
    ) -> Result<Option<RetrySchedule>, RetryServiceError>;
    async fn update(&self, schedule: &RetrySchedule) -> Result<(), RetryServiceError>;
    /// Unresolved, eligible schedules with `next_retry_date <= cutoff`,
    /// earliest first. Read-only.
    async fn find_due(
        &self,
        organisation_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError>;
    /// Organisations owning at least one schedule due at `cutoff`.
    async fn due_organisations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RetryServiceError>;
    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ScheduleFilter,
        page: PageRequest,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError>;
    async fn statistics(
        &self,
        organisation_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ScheduleStatistics, RetryServiceError>;
}

/// Repository for retry attempts.
pub trait RetryAttemptRepository: Send + Sync {
    /// Insert unless an attempt with the same idempotency key exists.
    async fn insert_if_absent(
        &self,
        attempt: &RetryAttempt,
    ) -> Result<(RetryAttempt, bool), RetryServiceError>;
    /// Persist `attempt` only if the stored status is still `expected`.
    /// Returns `false` when another writer moved it first.
    async fn compare_and_set(
        &self,
        attempt: &RetryAttempt,
        expected: AttemptStatus,
    ) -> Result<bool, RetryServiceError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<RetryAttempt>, RetryServiceError>;
    async fn list_by_schedule(
        &self,
        schedule_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryAttempt>, RetryServiceError>;
    async fn status_counts(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<(AttemptStatus, u64)>, RetryServiceError>;
}

/// Repository for orchestration runs.
pub trait RetryJobRepository: Send + Sync {
    async fn insert_if_absent(&self, job: &RetryJob) -> Result<(RetryJob, bool), RetryServiceError>;
    async fn update(&self, job: &RetryJob) -> Result<(), RetryServiceError>;
    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<RetryJob>, RetryServiceError>;
    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryJob>, RetryServiceError>;
}

/// Repository for reminders.
pub trait ReminderRepository: Send + Sync {
    async fn insert_if_absent(
        &self,
        reminder: &Reminder,
    ) -> Result<(Reminder, bool), RetryServiceError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reminder>, RetryServiceError>;
    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Reminder>, RetryServiceError>;
    async fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Reminder>, RetryServiceError>;
    /// `PENDING` reminders with `planned_at <= now`, earliest first.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Reminder>, RetryServiceError>;
    async fn pending_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Reminder>, RetryServiceError>;
    /// Persist `reminder` only if the stored status is still `expected`.
    async fn compare_and_set(
        &self,
        reminder: &Reminder,
        expected: ReminderStatus,
    ) -> Result<bool, RetryServiceError>;
    async fn update(&self, reminder: &Reminder) -> Result<(), RetryServiceError>;
    /// Live reminders for the client, on any channel, planned strictly
    /// between `from` and `to`.
    async fn count_planned_between(
        &self,
        client_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError>;
    /// Live reminders for the client planned in `[from, to)`.
    async fn count_planned_for_client(
        &self,
        client_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError>;
    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ReminderFilter,
        page: PageRequest,
    ) -> Result<Vec<Reminder>, RetryServiceError>;
}

/// Clients who declined reminders on a channel.
pub trait OptOutRepository: Send + Sync {
    async fn is_opted_out(
        &self,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<bool, RetryServiceError>;
    async fn opt_out(
        &self,
        organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<(), RetryServiceError>;
    /// Returns `true` if an opt-out was removed.
    async fn opt_in(
        &self,
        organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<bool, RetryServiceError>;
}

/// Append-only audit store.
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RetryServiceError>;
    /// Newest first.
    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError>;
    /// Oldest first.
    async fn entity_history(
        &self,
        organisation_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError>;
}
