//! Composite operations that tie the schedule engine, the attempt executor
//! and the reminder engine together.
//!
//! Cross-component effects (cancelling reminders when a schedule resolves,
//! planning reminders after a failed attempt) happen here and nowhere else.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use dunning_domain::actor::Actor;

use crate::domain::audit::{AuditAction, EntityType, NewAuditEntry};
use crate::domain::calendar::{BusinessCalendar, RunWindow};
use crate::domain::job::{JobStatus, RetryJob, daily_job_key};
use crate::domain::port::PaymentGateway;
use crate::domain::repository::{
    AuditLogRepository, OptOutRepository, ReminderPolicyRepository, ReminderRepository,
    RetryAttemptRepository, RetryJobRepository, RetryPolicyRepository, RetryScheduleRepository,
};
use crate::domain::schedule::{Eligibility, RejectionEvent, RetrySchedule, StopCondition};
use crate::error::RetryServiceError;
use crate::usecase::attempt::{AttemptOutcome, AttemptReport, ExecuteRetryAttemptUseCase};
use crate::usecase::audit::AuditTrail;
use crate::usecase::reminder::ReminderEngine;
use crate::usecase::schedule::{
    ApplyStopConditionUseCase, CancelScheduleUseCase, FindDueForRetryUseCase,
    HandleRejectionUseCase,
};

// ── HandlePaymentRejected ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RejectionResult {
    pub processed: bool,
    pub retry_schedule_id: Option<Uuid>,
    pub eligibility: Eligibility,
    pub message: String,
    pub reminder_ids: Vec<Uuid>,
}

pub struct HandlePaymentRejectedUseCase<P, S, C, A, Q, R, O>
where
    P: RetryPolicyRepository,
    S: RetryScheduleRepository,
    C: BusinessCalendar,
    A: AuditLogRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    pub rejection: HandleRejectionUseCase<P, S, C, A>,
    pub reminders: ReminderEngine<Q, R, O, A>,
}

impl<P, S, C, A, Q, R, O> HandlePaymentRejectedUseCase<P, S, C, A, Q, R, O>
where
    P: RetryPolicyRepository,
    S: RetryScheduleRepository,
    C: BusinessCalendar,
    A: AuditLogRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    /// Ingest a rejection and plan its initial reminders. A replayed event
    /// reports the reminders already planned for the first delivery.
    pub async fn execute(
        &self,
        event: RejectionEvent,
        now: DateTime<Utc>,
    ) -> Result<RejectionResult, RetryServiceError> {
        let outcome = self.rejection.execute(event, Actor::webhook()).await?;
        let schedule = outcome.schedule;

        let reminder_ids = match self.reminders.on_rejection(&schedule, now).await {
            Ok(reminders) => reminders.into_iter().map(|r| r.id).collect(),
            Err(e) => {
                tracing::warn!(
                    schedule_id = %schedule.id,
                    error = %e,
                    "initial reminders not planned"
                );
                Vec::new()
            }
        };

        Ok(RejectionResult {
            processed: outcome.processed,
            retry_schedule_id: Some(schedule.id),
            eligibility: schedule.eligibility,
            message: outcome.message,
            reminder_ids,
        })
    }
}

// ── CancelRetrySchedule ──────────────────────────────────────────────────────

pub struct CancelRetryScheduleUseCase<S, A, Q, R, O>
where
    S: RetryScheduleRepository,
    A: AuditLogRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    pub cancel: CancelScheduleUseCase<S, A>,
    pub reminders: ReminderEngine<Q, R, O, A>,
}

impl<S, A, Q, R, O> CancelRetryScheduleUseCase<S, A, Q, R, O>
where
    S: RetryScheduleRepository,
    A: AuditLogRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    /// Returns the cancelled schedule and how many pending reminders were
    /// cancelled with it.
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        reason: &str,
        actor: Actor,
    ) -> Result<(RetrySchedule, u64), RetryServiceError> {
        let schedule = self
            .cancel
            .execute(organisation_id, id, reason, actor)
            .await?;
        let cancelled = self
            .reminders
            .on_resolved(&schedule, actor, Utc::now())
            .await?;
        Ok((schedule, cancelled))
    }
}

// ── ApplyStopCondition ───────────────────────────────────────────────────────

pub struct StopScheduleUseCase<S, A, Q, R, O>
where
    S: RetryScheduleRepository,
    A: AuditLogRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    pub stop: ApplyStopConditionUseCase<S, A>,
    pub reminders: ReminderEngine<Q, R, O, A>,
}

impl<S, A, Q, R, O> StopScheduleUseCase<S, A, Q, R, O>
where
    S: RetryScheduleRepository,
    A: AuditLogRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        condition: StopCondition,
        actor: Actor,
    ) -> Result<(RetrySchedule, bool), RetryServiceError> {
        let outcome = self
            .stop
            .execute(organisation_id, id, condition, actor)
            .await?;
        if outcome.applied {
            self.reminders
                .on_resolved(&outcome.schedule, actor, Utc::now())
                .await?;
        }
        Ok((outcome.schedule, outcome.applied))
    }
}

// ── ProcessDueRetries ────────────────────────────────────────────────────────

/// Which schedules a job covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobScope {
    /// Everything due at the cutoff.
    Due,
    /// One schedule, run regardless of its planned date.
    Schedule(Uuid),
}

struct JobRequest {
    organisation_id: Uuid,
    target_date: NaiveDate,
    cutoff: DateTime<Utc>,
    key: String,
    scope: JobScope,
    is_manual: bool,
    dry_run: bool,
    actor: Actor,
}

pub struct ProcessDueRetriesUseCase<S, T, G, C, A, J, Q, R, O>
where
    S: RetryScheduleRepository,
    T: RetryAttemptRepository,
    G: PaymentGateway,
    C: BusinessCalendar,
    A: AuditLogRepository,
    J: RetryJobRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    pub due: FindDueForRetryUseCase<S>,
    pub executor: ExecuteRetryAttemptUseCase<S, T, G, C, A>,
    pub reminders: ReminderEngine<Q, R, O, A>,
    pub jobs: J,
    pub window: RunWindow,
    pub audit: AuditTrail<A>,
}

impl<S, T, G, C, A, J, Q, R, O> ProcessDueRetriesUseCase<S, T, G, C, A, J, Q, R, O>
where
    S: RetryScheduleRepository,
    T: RetryAttemptRepository,
    G: PaymentGateway,
    C: BusinessCalendar,
    A: AuditLogRepository,
    J: RetryJobRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
{
    /// The daily run of one organisation for `target_date`.
    ///
    /// At most one non-dry job exists per organisation, date and cutoff: a
    /// finished one is returned unchanged, a running one is a conflict.
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        target_date: NaiveDate,
        dry_run: bool,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<RetryJob, RetryServiceError> {
        let mut key = daily_job_key(organisation_id, target_date, self.window.cutoff);
        if dry_run {
            key = format!("{key}:dry-run:{}", Uuid::now_v7());
        }
        self.run(
            JobRequest {
                organisation_id,
                target_date,
                cutoff: self.window.cutoff_on(target_date),
                key,
                scope: JobScope::Due,
                is_manual: false,
                dry_run,
                actor,
            },
            now,
        )
        .await
    }

    /// Daily run for every organisation with due schedules. One
    /// organisation's failure never stops the others.
    pub async fn run_daily(
        &self,
        target_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<RetryJob>, RetryServiceError> {
        let cutoff = self.window.cutoff_on(target_date);
        let organisations = self.executor.schedules.due_organisations(cutoff).await?;
        tracing::info!(
            %target_date,
            %cutoff,
            organisations = organisations.len(),
            "daily retry run started"
        );

        let mut jobs = Vec::with_capacity(organisations.len());
        for organisation_id in organisations {
            match self
                .execute(organisation_id, target_date, false, Actor::scheduler(), now)
                .await
            {
                Ok(job) => jobs.push(job),
                Err(e) => tracing::warn!(
                    %organisation_id,
                    error = %e,
                    "daily retry run failed for organisation"
                ),
            }
        }
        Ok(jobs)
    }

    /// Manual run, optionally limited to one schedule.
    pub async fn run_now(
        &self,
        organisation_id: Uuid,
        schedule_id: Option<Uuid>,
        dry_run: bool,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<RetryJob, RetryServiceError> {
        let scope = match schedule_id {
            Some(id) => {
                let schedule = self
                    .executor
                    .schedules
                    .find_by_id(id)
                    .await?
                    .filter(|s| s.organisation_id == organisation_id)
                    .ok_or(RetryServiceError::ScheduleNotFound)?;
                if schedule.is_resolved {
                    return Err(RetryServiceError::ScheduleAlreadyResolved);
                }
                if !schedule.eligibility.is_eligible() || schedule.next_retry_date.is_none() {
                    return Err(RetryServiceError::validation(
                        "schedule has no retry planned",
                    ));
                }
                JobScope::Schedule(id)
            }
            None => JobScope::Due,
        };
        let mut key = format!("{organisation_id}:manual:{}", Uuid::now_v7());
        if dry_run {
            key.push_str(":dry-run");
        }
        self.run(
            JobRequest {
                organisation_id,
                target_date: self.window.local_date(now),
                cutoff: now,
                key,
                scope,
                is_manual: true,
                dry_run,
                actor,
            },
            now,
        )
        .await
    }

    async fn run(&self, req: JobRequest, now: DateTime<Utc>) -> Result<RetryJob, RetryServiceError> {
        let fresh = RetryJob {
            id: Uuid::now_v7(),
            organisation_id: req.organisation_id,
            target_date: req.target_date,
            timezone: self.window.zone.name().to_owned(),
            cutoff_time: self.window.cutoff,
            status: JobStatus::Running,
            started_at: Some(now),
            completed_at: None,
            total_attempts: 0,
            successful_attempts: 0,
            failed_attempts: 0,
            skipped_attempts: 0,
            failed_schedule_ids: Vec::new(),
            triggered_by: req.actor.label(),
            is_manual: req.is_manual,
            dry_run: req.dry_run,
            idempotency_key: req.key,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        let scoped_schedule = match req.scope {
            JobScope::Due => None,
            JobScope::Schedule(id) => Some(id),
        };
        let (mut job, inserted) = self.jobs.insert_if_absent(&fresh).await?;
        if !inserted {
            if job.status.is_active() {
                return Err(RetryServiceError::JobAlreadyActive);
            }
            return Ok(job);
        }
        self.audit
            .record(
                NewAuditEntry::new(
                    job.organisation_id,
                    EntityType::RetryJob,
                    job.id,
                    AuditAction::Create,
                    "STARTED",
                    req.actor,
                )
                .after(&job)
                .metadata(serde_json::json!({
                    "cutoff": req.cutoff,
                    "scheduleId": scoped_schedule,
                })),
            )
            .await;

        let batch = match req.scope {
            JobScope::Schedule(id) => Ok(vec![id]),
            JobScope::Due => self
                .due
                .execute(req.organisation_id, req.cutoff)
                .await
                .map(|due| due.into_iter().map(|s| s.id).collect::<Vec<_>>()),
        };
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "could not load due schedules");
                job.status = JobStatus::Failed;
                job.error_message = Some(e.to_string());
                return self.finish(job, req.actor, now).await;
            }
        };
        job.total_attempts = batch.len() as u32;

        if req.dry_run {
            job.skipped_attempts = job.total_attempts;
            job.status = JobStatus::Completed;
            return self.finish(job, req.actor, now).await;
        }

        for schedule_id in batch {
            match self.executor.execute(schedule_id, Some(job.id), now).await {
                Ok(report) => {
                    match report.outcome {
                        AttemptOutcome::Succeeded => job.successful_attempts += 1,
                        AttemptOutcome::Failed => {
                            job.failed_attempts += 1;
                            job.failed_schedule_ids.push(schedule_id);
                        }
                        AttemptOutcome::Skipped(_) => job.skipped_attempts += 1,
                    }
                    self.follow_up(&report, now).await;
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job.id,
                        %schedule_id,
                        error = %e,
                        "retry attempt errored"
                    );
                    job.failed_attempts += 1;
                    job.failed_schedule_ids.push(schedule_id);
                }
            }
        }
        job.status = JobStatus::from_counts(job.successful_attempts, job.failed_attempts);
        self.finish(job, req.actor, now).await
    }

    /// Reminder effects of one attempt. Failures are logged only; the
    /// attempt itself already happened.
    async fn follow_up(&self, report: &AttemptReport, now: DateTime<Utc>) {
        let schedule = &report.schedule;
        let result = if report.resolved_schedule() {
            self.reminders
                .on_resolved(schedule, Actor::scheduler(), now)
                .await
                .map(|_| ())
        } else if let (AttemptOutcome::Failed, Some(attempt)) = (report.outcome, &report.attempt) {
            self.reminders
                .on_attempt_failed(schedule, attempt.id, now)
                .await
                .map(|_| ())
        } else {
            Ok(())
        };
        if let Err(e) = result {
            tracing::warn!(schedule_id = %schedule.id, error = %e, "reminder follow-up failed");
        }
    }

    async fn finish(
        &self,
        mut job: RetryJob,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<RetryJob, RetryServiceError> {
        job.completed_at = Some(now);
        job.updated_at = now;
        self.jobs.update(&job).await?;
        tracing::info!(
            job_id = %job.id,
            organisation_id = %job.organisation_id,
            status = %job.status,
            total = job.total_attempts,
            successful = job.successful_attempts,
            failed = job.failed_attempts,
            skipped = job.skipped_attempts,
            dry_run = job.dry_run,
            "retry job finished"
        );
        self.audit
            .record(
                NewAuditEntry::new(
                    job.organisation_id,
                    EntityType::RetryJob,
                    job.id,
                    AuditAction::Update,
                    job.status.as_str(),
                    actor,
                )
                .after(&job),
            )
            .await;
        Ok(job)
    }
}
