use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use dunning_domain::pagination::PageRequest;
use dunning_retry::domain::attempt::{AttemptStatus, RetryAttempt};
use dunning_retry::domain::audit::{AuditFilter, AuditLogEntry, EntityType};
use dunning_retry::domain::calendar::{OpenCalendar, RunWindow};
use dunning_retry::domain::job::RetryJob;
use dunning_retry::domain::policy::{
    PolicyScope, ReminderPolicy, RetryPolicy, RetryRules, ThrottleRules, TriggerRule,
};
use dunning_retry::domain::port::{
    NotificationOutcome, Notifier, NotifierRegistry, PaymentGateway, PaymentOutcome,
    PaymentSubmission, ReminderDispatch,
};
use dunning_retry::domain::reminder::{
    Reminder, ReminderChannel, ReminderFilter, ReminderStatus, ReminderTrigger,
};
use dunning_retry::domain::repository::{
    AuditLogRepository, OptOutRepository, ReminderPolicyRepository, ReminderRepository,
    RetryAttemptRepository, RetryJobRepository, RetryPolicyRepository, RetryScheduleRepository,
};
use dunning_retry::domain::schedule::{
    RejectionEvent, RetrySchedule, ScheduleFilter, ScheduleStatistics,
};
use dunning_retry::error::RetryServiceError;
use dunning_retry::usecase::attempt::ExecuteRetryAttemptUseCase;
use dunning_retry::usecase::audit::AuditTrail;
use dunning_retry::usecase::orchestrator::{
    CancelRetryScheduleUseCase, HandlePaymentRejectedUseCase, ProcessDueRetriesUseCase,
};
use dunning_retry::usecase::reminder::{
    CancelRemindersForScheduleUseCase, ProcessPendingRemindersUseCase, ReminderEngine,
    ScheduleRemindersUseCase, SendReminderUseCase,
};
use dunning_retry::usecase::reminder_policy::ResolveReminderPolicyUseCase;
use dunning_retry::usecase::retry_policy::ResolveRetryPolicyUseCase;
use dunning_retry::usecase::schedule::{
    CancelScheduleUseCase, FindDueForRetryUseCase, HandleRejectionUseCase,
};

// ── MockRetryPolicyRepo ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockRetryPolicyRepo {
    pub policies: Arc<Mutex<Vec<RetryPolicy>>>,
}

impl RetryPolicyRepository for MockRetryPolicyRepo {
    async fn create(&self, policy: &RetryPolicy) -> Result<(), RetryServiceError> {
        self.policies.lock().unwrap().push(policy.clone());
        Ok(())
    }

    async fn update(&self, policy: &RetryPolicy) -> Result<(), RetryServiceError> {
        let mut policies = self.policies.lock().unwrap();
        if let Some(p) = policies.iter_mut().find(|p| p.id == policy.id) {
            *p = policy.clone();
        }
        Ok(())
    }

    async fn delete(&self, organisation_id: Uuid, id: Uuid) -> Result<bool, RetryServiceError> {
        let mut policies = self.policies.lock().unwrap();
        let before = policies.len();
        policies.retain(|p| !(p.id == id && p.organisation_id == organisation_id));
        Ok(policies.len() < before)
    }

    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<RetryPolicy>, RetryServiceError> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && p.organisation_id == organisation_id)
            .cloned())
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryPolicy>, RetryServiceError> {
        let owned: Vec<_> = self
            .policies
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.organisation_id == organisation_id)
            .cloned()
            .collect();
        Ok(page.slice(&owned))
    }

    async fn list_active(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<RetryPolicy>, RetryServiceError> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.organisation_id == organisation_id && p.is_active)
            .cloned()
            .collect())
    }
}

// ── MockReminderPolicyRepo ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockReminderPolicyRepo {
    pub policies: Arc<Mutex<Vec<ReminderPolicy>>>,
}

impl ReminderPolicyRepository for MockReminderPolicyRepo {
    async fn create(&self, policy: &ReminderPolicy) -> Result<(), RetryServiceError> {
        self.policies.lock().unwrap().push(policy.clone());
        Ok(())
    }

    async fn update(&self, policy: &ReminderPolicy) -> Result<(), RetryServiceError> {
        let mut policies = self.policies.lock().unwrap();
        if let Some(p) = policies.iter_mut().find(|p| p.id == policy.id) {
            *p = policy.clone();
        }
        Ok(())
    }

    async fn delete(&self, organisation_id: Uuid, id: Uuid) -> Result<bool, RetryServiceError> {
        let mut policies = self.policies.lock().unwrap();
        let before = policies.len();
        policies.retain(|p| !(p.id == id && p.organisation_id == organisation_id));
        Ok(policies.len() < before)
    }

    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ReminderPolicy>, RetryServiceError> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && p.organisation_id == organisation_id)
            .cloned())
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<ReminderPolicy>, RetryServiceError> {
        let owned: Vec<_> = self
            .policies
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.organisation_id == organisation_id)
            .cloned()
            .collect();
        Ok(page.slice(&owned))
    }

    async fn list_active(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<ReminderPolicy>, RetryServiceError> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.organisation_id == organisation_id && p.is_active)
            .cloned()
            .collect())
    }
}

// ── MockScheduleRepo ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockScheduleRepo {
    pub schedules: Arc<Mutex<Vec<RetrySchedule>>>,
    pub failing_updates: Arc<Mutex<u32>>,
}

impl MockScheduleRepo {
    /// Make the next `n` updates fail without touching the store.
    pub fn fail_next_updates(&self, n: u32) {
        *self.failing_updates.lock().unwrap() = n;
    }

    pub fn get(&self, id: Uuid) -> RetrySchedule {
        self.schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .expect("schedule stored")
    }

    pub fn count(&self) -> usize {
        self.schedules.lock().unwrap().len()
    }
}

impl RetryScheduleRepository for MockScheduleRepo {
    async fn insert_if_absent(
        &self,
        schedule: &RetrySchedule,
    ) -> Result<(RetrySchedule, bool), RetryServiceError> {
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(existing) = schedules.iter().find(|s| {
            s.organisation_id == schedule.organisation_id
                && s.idempotency_key == schedule.idempotency_key
        }) {
            return Ok((existing.clone(), false));
        }
        schedules.push(schedule.clone());
        Ok((schedule.clone(), true))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RetrySchedule>, RetryServiceError> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        organisation_id: Uuid,
        key: &str,
    ) -> Result<Option<RetrySchedule>, RetryServiceError> {
        let found = self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.organisation_id == organisation_id && s.idempotency_key == key)
            .cloned();
        // Let a concurrent caller run between lookup and insert.
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn update(&self, schedule: &RetrySchedule) -> Result<(), RetryServiceError> {
        {
            let mut failing = self.failing_updates.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(RetryServiceError::External(
                    "schedule store unavailable".to_owned(),
                ));
            }
        }
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(s) = schedules.iter_mut().find(|s| s.id == schedule.id) {
            *s = schedule.clone();
        }
        Ok(())
    }

    async fn find_due(
        &self,
        organisation_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError> {
        let mut due: Vec<_> = self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.organisation_id == organisation_id && s.is_due(cutoff))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_retry_date);
        Ok(due)
    }

    async fn due_organisations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RetryServiceError> {
        let mut orgs: Vec<Uuid> = self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_due(cutoff))
            .map(|s| s.organisation_id)
            .collect();
        orgs.sort();
        orgs.dedup();
        Ok(orgs)
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ScheduleFilter,
        page: PageRequest,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError> {
        let matching: Vec<_> = self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.organisation_id == organisation_id && filter.matches(s))
            .cloned()
            .collect();
        Ok(page.slice(&matching))
    }

    async fn statistics(
        &self,
        organisation_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ScheduleStatistics, RetryServiceError> {
        let mut stats = ScheduleStatistics::default();
        for s in self.schedules.lock().unwrap().iter() {
            if s.organisation_id != organisation_id
                || from.is_some_and(|f| s.created_at < f)
                || to.is_some_and(|t| s.created_at > t)
            {
                continue;
            }
            stats.add(
                s.eligibility,
                s.is_resolved,
                s.resolution_reason.as_deref(),
                1,
                u64::from(s.current_attempt),
            );
        }
        Ok(stats)
    }
}

// ── MockAttemptRepo ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockAttemptRepo {
    pub attempts: Arc<Mutex<Vec<RetryAttempt>>>,
}

impl MockAttemptRepo {
    pub fn for_schedule(&self, schedule_id: Uuid) -> Vec<RetryAttempt> {
        let mut attempts: Vec<_> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.retry_schedule_id == schedule_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        attempts
    }
}

impl RetryAttemptRepository for MockAttemptRepo {
    async fn insert_if_absent(
        &self,
        attempt: &RetryAttempt,
    ) -> Result<(RetryAttempt, bool), RetryServiceError> {
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(existing) = attempts
            .iter()
            .find(|a| a.idempotency_key == attempt.idempotency_key)
        {
            return Ok((existing.clone(), false));
        }
        attempts.push(attempt.clone());
        Ok((attempt.clone(), true))
    }

    async fn compare_and_set(
        &self,
        attempt: &RetryAttempt,
        expected: AttemptStatus,
    ) -> Result<bool, RetryServiceError> {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts
            .iter_mut()
            .find(|a| a.id == attempt.id && a.status == expected)
        {
            Some(stored) => {
                *stored = attempt.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RetryAttempt>, RetryServiceError> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn list_by_schedule(
        &self,
        schedule_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryAttempt>, RetryServiceError> {
        Ok(page.slice(&self.for_schedule(schedule_id)))
    }

    async fn status_counts(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<(AttemptStatus, u64)>, RetryServiceError> {
        let attempts = self.attempts.lock().unwrap();
        Ok(AttemptStatus::ALL
            .iter()
            .map(|status| {
                let n = attempts
                    .iter()
                    .filter(|a| a.organisation_id == organisation_id && a.status == *status)
                    .count() as u64;
                (*status, n)
            })
            .filter(|(_, n)| *n > 0)
            .collect())
    }
}

// ── MockJobRepo ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockJobRepo {
    pub jobs: Arc<Mutex<Vec<RetryJob>>>,
}

impl RetryJobRepository for MockJobRepo {
    async fn insert_if_absent(&self, job: &RetryJob) -> Result<(RetryJob, bool), RetryServiceError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(existing) = jobs.iter().find(|j| j.idempotency_key == job.idempotency_key) {
            return Ok((existing.clone(), false));
        }
        jobs.push(job.clone());
        Ok((job.clone(), true))
    }

    async fn update(&self, job: &RetryJob) -> Result<(), RetryServiceError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(j) = jobs.iter_mut().find(|j| j.id == job.id) {
            *j = job.clone();
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<RetryJob>, RetryServiceError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id && j.organisation_id == organisation_id)
            .cloned())
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryJob>, RetryServiceError> {
        let mut owned: Vec<_> = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.organisation_id == organisation_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.slice(&owned))
    }
}

// ── MockReminderRepo ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockReminderRepo {
    pub reminders: Arc<Mutex<Vec<Reminder>>>,
}

impl MockReminderRepo {
    pub fn all(&self) -> Vec<Reminder> {
        self.reminders.lock().unwrap().clone()
    }

    pub fn with_status(&self, status: ReminderStatus) -> usize {
        self.reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}

impl ReminderRepository for MockReminderRepo {
    async fn insert_if_absent(
        &self,
        reminder: &Reminder,
    ) -> Result<(Reminder, bool), RetryServiceError> {
        let mut reminders = self.reminders.lock().unwrap();
        if let Some(existing) = reminders
            .iter()
            .find(|r| r.idempotency_key == reminder.idempotency_key)
        {
            return Ok((existing.clone(), false));
        }
        reminders.push(reminder.clone());
        Ok((reminder.clone(), true))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reminder>, RetryServiceError> {
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Reminder>, RetryServiceError> {
        let found = self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.idempotency_key == key)
            .cloned();
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Reminder>, RetryServiceError> {
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.provider_message_id.as_deref() == Some(provider_message_id))
            .cloned())
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        let mut due: Vec<_> = self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == ReminderStatus::Pending && r.planned_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.planned_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn pending_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.retry_schedule_id == schedule_id && r.status == ReminderStatus::Pending)
            .cloned()
            .collect())
    }

    async fn compare_and_set(
        &self,
        reminder: &Reminder,
        expected: ReminderStatus,
    ) -> Result<bool, RetryServiceError> {
        let mut reminders = self.reminders.lock().unwrap();
        match reminders
            .iter_mut()
            .find(|r| r.id == reminder.id && r.status == expected)
        {
            Some(stored) => {
                *stored = reminder.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update(&self, reminder: &Reminder) -> Result<(), RetryServiceError> {
        let mut reminders = self.reminders.lock().unwrap();
        if let Some(r) = reminders.iter_mut().find(|r| r.id == reminder.id) {
            *r = reminder.clone();
        }
        Ok(())
    }

    async fn count_planned_between(
        &self,
        client_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError> {
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.client_id == client_id
                    && r.status != ReminderStatus::Cancelled
                    && r.planned_at > from
                    && r.planned_at < to
            })
            .count() as u64)
    }

    async fn count_planned_for_client(
        &self,
        client_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError> {
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.client_id == client_id
                    && r.status != ReminderStatus::Cancelled
                    && r.planned_at >= from
                    && r.planned_at < to
            })
            .count() as u64)
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ReminderFilter,
        page: PageRequest,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        let matching: Vec<_> = self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.organisation_id == organisation_id && filter.matches(r))
            .cloned()
            .collect();
        Ok(page.slice(&matching))
    }
}

// ── MockOptOutRepo ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockOptOutRepo {
    pub opt_outs: Arc<Mutex<HashSet<(Uuid, ReminderChannel)>>>,
}

impl OptOutRepository for MockOptOutRepo {
    async fn is_opted_out(
        &self,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<bool, RetryServiceError> {
        Ok(self.opt_outs.lock().unwrap().contains(&(client_id, channel)))
    }

    async fn opt_out(
        &self,
        _organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<(), RetryServiceError> {
        self.opt_outs.lock().unwrap().insert((client_id, channel));
        Ok(())
    }

    async fn opt_in(
        &self,
        _organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<bool, RetryServiceError> {
        Ok(self.opt_outs.lock().unwrap().remove(&(client_id, channel)))
    }
}

// ── MockAuditRepo ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockAuditRepo {
    pub entries: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl MockAuditRepo {
    pub fn events_for(&self, entity_id: Uuid) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .map(|e| e.event.clone())
            .collect()
    }
}

impl AuditLogRepository for MockAuditRepo {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RetryServiceError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError> {
        let mut matching: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.organisation_id == organisation_id && filter.matches(e))
            .cloned()
            .collect();
        matching.reverse();
        Ok(page.slice(&matching))
    }

    async fn entity_history(
        &self,
        organisation_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.organisation_id == organisation_id
                    && e.entity_type == entity_type
                    && e.entity_id == entity_id
            })
            .cloned()
            .collect())
    }
}

// ── MockGateway ──────────────────────────────────────────────────────────────

/// Answers submissions from a script; an exhausted script declines.
#[derive(Clone, Default)]
pub struct MockGateway {
    pub script: Arc<Mutex<Vec<PaymentOutcome>>>,
    pub submissions: Arc<Mutex<Vec<PaymentSubmission>>>,
}

impl MockGateway {
    pub fn scripted(outcomes: Vec<PaymentOutcome>) -> Self {
        let gateway = Self::default();
        gateway.script.lock().unwrap().extend(outcomes.into_iter().rev());
        gateway
    }

    pub fn submitted(&self) -> Vec<PaymentSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

impl PaymentGateway for MockGateway {
    async fn submit(
        &self,
        submission: &PaymentSubmission,
    ) -> Result<PaymentOutcome, RetryServiceError> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| declined("AM04")))
    }
}

pub fn accepted() -> PaymentOutcome {
    PaymentOutcome {
        success: true,
        provider_payment_id: Some(format!("pay-{}", Uuid::now_v7())),
        response_code: Some("00".to_owned()),
        ..Default::default()
    }
}

pub fn declined(code: &str) -> PaymentOutcome {
    PaymentOutcome {
        success: false,
        error_code: Some("DECLINED".to_owned()),
        error_message: Some("collection refused".to_owned()),
        new_rejection_code: Some(code.to_owned()),
        ..Default::default()
    }
}

// ── MockNotifier ─────────────────────────────────────────────────────────────

/// Accepts every dispatch except those for the reminders in `failing`.
#[derive(Default)]
pub struct MockNotifier {
    pub failing: Mutex<HashSet<Uuid>>,
    pub sent: Mutex<Vec<ReminderDispatch>>,
}

impl MockNotifier {
    pub fn failing_for(ids: impl IntoIterator<Item = Uuid>) -> Self {
        let notifier = Self::default();
        notifier.failing.lock().unwrap().extend(ids);
        notifier
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn send(
        &self,
        dispatch: &ReminderDispatch,
    ) -> Result<NotificationOutcome, RetryServiceError> {
        if self.failing.lock().unwrap().contains(&dispatch.reminder_id) {
            return Ok(NotificationOutcome {
                success: false,
                provider_message_id: None,
                error_code: Some("MAILBOX_FULL".to_owned()),
                error_message: Some("recipient rejected".to_owned()),
            });
        }
        self.sent.lock().unwrap().push(dispatch.clone());
        Ok(NotificationOutcome {
            success: true,
            provider_message_id: Some(format!("msg-{}", dispatch.reminder_id)),
            error_code: None,
            error_message: None,
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub type Rejections = HandlePaymentRejectedUseCase<
    MockRetryPolicyRepo,
    MockScheduleRepo,
    OpenCalendar,
    MockAuditRepo,
    MockReminderPolicyRepo,
    MockReminderRepo,
    MockOptOutRepo,
>;

pub type Executor = ExecuteRetryAttemptUseCase<
    MockScheduleRepo,
    MockAttemptRepo,
    MockGateway,
    OpenCalendar,
    MockAuditRepo,
>;

pub type DueRetries = ProcessDueRetriesUseCase<
    MockScheduleRepo,
    MockAttemptRepo,
    MockGateway,
    OpenCalendar,
    MockAuditRepo,
    MockJobRepo,
    MockReminderPolicyRepo,
    MockReminderRepo,
    MockOptOutRepo,
>;

pub type Cancel = CancelRetryScheduleUseCase<
    MockScheduleRepo,
    MockAuditRepo,
    MockReminderPolicyRepo,
    MockReminderRepo,
    MockOptOutRepo,
>;

pub type Sweep = ProcessPendingRemindersUseCase<MockReminderRepo, MockAuditRepo>;

/// Every store the engine touches, shared between the use cases built here.
#[derive(Clone, Default)]
pub struct Harness {
    pub retry_policies: MockRetryPolicyRepo,
    pub reminder_policies: MockReminderPolicyRepo,
    pub schedules: MockScheduleRepo,
    pub attempts: MockAttemptRepo,
    pub jobs: MockJobRepo,
    pub reminders: MockReminderRepo,
    pub opt_outs: MockOptOutRepo,
    pub audit: MockAuditRepo,
    pub gateway: MockGateway,
    pub notifiers: NotifierRegistry,
}

impl Harness {
    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        self.retry_policies.policies.lock().unwrap().push(policy);
        self
    }

    pub fn with_reminder_policy(self, policy: ReminderPolicy) -> Self {
        self.reminder_policies.policies.lock().unwrap().push(policy);
        self
    }

    pub fn with_gateway(mut self, gateway: MockGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_notifier(mut self, channel: ReminderChannel, notifier: Arc<MockNotifier>) -> Self {
        self.notifiers = self.notifiers.with(channel, notifier);
        self
    }

    fn trail(&self) -> AuditTrail<MockAuditRepo> {
        AuditTrail {
            repo: self.audit.clone(),
        }
    }

    fn reminder_engine(
        &self,
    ) -> ReminderEngine<MockReminderPolicyRepo, MockReminderRepo, MockOptOutRepo, MockAuditRepo>
    {
        ReminderEngine {
            schedule: self.schedule_reminders(),
            cancel: CancelRemindersForScheduleUseCase {
                reminders: self.reminders.clone(),
                audit: self.trail(),
            },
        }
    }

    pub fn schedule_reminders(
        &self,
    ) -> ScheduleRemindersUseCase<MockReminderPolicyRepo, MockReminderRepo, MockOptOutRepo, MockAuditRepo>
    {
        ScheduleRemindersUseCase {
            policies: ResolveReminderPolicyUseCase {
                repo: self.reminder_policies.clone(),
            },
            reminders: self.reminders.clone(),
            opt_outs: self.opt_outs.clone(),
            zone: window().zone,
            audit: self.trail(),
        }
    }

    pub fn rejections(&self) -> Rejections {
        HandlePaymentRejectedUseCase {
            rejection: HandleRejectionUseCase {
                policies: ResolveRetryPolicyUseCase {
                    repo: self.retry_policies.clone(),
                },
                schedules: self.schedules.clone(),
                calendar: OpenCalendar,
                window: window(),
                audit: self.trail(),
            },
            reminders: self.reminder_engine(),
        }
    }

    pub fn executor(&self) -> Executor {
        ExecuteRetryAttemptUseCase {
            schedules: self.schedules.clone(),
            attempts: self.attempts.clone(),
            gateway: self.gateway.clone(),
            calendar: OpenCalendar,
            window: window(),
            payment_timeout: Duration::from_secs(5),
            audit: self.trail(),
        }
    }

    pub fn due_retries(&self) -> DueRetries {
        ProcessDueRetriesUseCase {
            due: FindDueForRetryUseCase {
                schedules: self.schedules.clone(),
            },
            executor: self.executor(),
            reminders: self.reminder_engine(),
            jobs: self.jobs.clone(),
            window: window(),
            audit: self.trail(),
        }
    }

    pub fn cancel(&self) -> Cancel {
        CancelRetryScheduleUseCase {
            cancel: CancelScheduleUseCase {
                schedules: self.schedules.clone(),
                audit: self.trail(),
            },
            reminders: self.reminder_engine(),
        }
    }

    pub fn sweep(&self, batch_size: u64) -> Sweep {
        ProcessPendingRemindersUseCase {
            send: SendReminderUseCase {
                reminders: self.reminders.clone(),
                notifiers: self.notifiers.clone(),
                timeout: Duration::from_secs(5),
                audit: self.trail(),
            },
            batch_size,
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn window() -> RunWindow {
    RunWindow {
        zone: Tz::Europe__Paris,
        cutoff: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    }
}

/// Monday 2026-03-02, 09:00 UTC (10:00 in Paris).
pub fn rejected_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// Paris cutoff on 2026-03-`day`, before the spring DST change.
pub fn march_cutoff(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
}

pub fn test_retry_policy(organisation_id: Uuid, delays: Vec<u32>) -> RetryPolicy {
    let now = Utc::now();
    RetryPolicy {
        id: Uuid::now_v7(),
        organisation_id,
        scope: PolicyScope::default(),
        name: "standard".to_owned(),
        description: None,
        rules: RetryRules {
            max_attempts: delays.len() as u32,
            retry_delays_days: delays,
            max_total_days: 30,
            ..Default::default()
        },
        is_active: true,
        is_default: true,
        priority: 0,
        created_at: now,
        updated_at: now,
    }
}

/// One `REJECTION_RECEIVED` email rule, no throttling beyond opt-out.
pub fn test_reminder_policy(organisation_id: Uuid) -> ReminderPolicy {
    let now = Utc::now();
    ReminderPolicy {
        id: Uuid::now_v7(),
        organisation_id,
        scope: PolicyScope::default(),
        name: "notify".to_owned(),
        description: None,
        trigger_rules: vec![TriggerRule {
            id: Uuid::now_v7(),
            trigger: ReminderTrigger::RejectionReceived,
            channel: ReminderChannel::Email,
            delay_hours: 0,
            template_id: "rejection-notice".to_owned(),
            order: 0,
        }],
        throttle: ThrottleRules {
            cooldown_hours: 0,
            max_reminders_per_day: 100,
            max_reminders_per_week: 100,
            allowed_start_hour: 0,
            allowed_end_hour: 24,
            allowed_days_of_week: vec![1, 2, 3, 4, 5, 6, 7],
            respect_opt_out: true,
        },
        is_active: true,
        is_default: true,
        priority: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_event(organisation_id: Uuid, code: &str) -> RejectionEvent {
    let event_id = Uuid::now_v7().to_string();
    RejectionEvent {
        idempotency_key: format!("evt-{event_id}"),
        event_id,
        organisation_id,
        societe_id: Uuid::now_v7(),
        payment_id: Uuid::now_v7(),
        schedule_ref: "SCH-2026-03".to_owned(),
        invoice_id: None,
        contract_id: Some(Uuid::now_v7()),
        client_id: Uuid::now_v7(),
        product_id: None,
        channel_id: None,
        reason_code: code.to_owned(),
        reason_message: "rejected by debtor bank".to_owned(),
        amount_cents: 4_990,
        currency: "EUR".to_owned(),
        psp_name: "gocardless".to_owned(),
        psp_payment_id: Some("PM-0001".to_owned()),
        rejected_at: rejected_at(),
    }
}

/// A pending email reminder for `schedule`, due at `planned_at`.
pub fn pending_reminder(schedule: &RetrySchedule, planned_at: DateTime<Utc>) -> Reminder {
    let id = Uuid::now_v7();
    Reminder {
        id,
        organisation_id: schedule.organisation_id,
        societe_id: schedule.societe_id,
        retry_schedule_id: schedule.id,
        retry_attempt_id: None,
        client_id: schedule.client_id,
        reminder_policy_id: Uuid::now_v7(),
        trigger_rule_id: Uuid::now_v7(),
        channel: ReminderChannel::Email,
        template_id: "rejection-notice".to_owned(),
        template_variables: serde_json::json!({}),
        trigger: ReminderTrigger::Manual,
        planned_at,
        sent_at: None,
        delivered_at: None,
        status: ReminderStatus::Pending,
        provider_name: None,
        provider_message_id: None,
        delivery_status_raw: None,
        error_code: None,
        error_message: None,
        retry_count: 0,
        idempotency_key: format!("manual:{id}"),
        metadata: serde_json::json!({}),
        created_at: planned_at,
        updated_at: planned_at,
    }
}
