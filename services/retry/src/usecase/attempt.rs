use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dunning_domain::actor::Actor;
use dunning_domain::pagination::PageRequest;

use crate::domain::attempt::{
    AttemptStatus, EXCEPTION_ERROR, RetryAttempt, TIMEOUT_ERROR, attempt_idempotency_key,
};
use crate::domain::audit::{AuditAction, EntityType, NewAuditEntry};
use crate::domain::calendar::{BusinessCalendar, RunWindow};
use crate::domain::eligibility::{self, normalize_code};
use crate::domain::port::{PaymentGateway, PaymentOutcome, PaymentSubmission};
use crate::domain::repository::{AuditLogRepository, RetryAttemptRepository, RetryScheduleRepository};
use crate::domain::schedule::{
    Eligibility, MAX_ATTEMPTS_REACHED, MAX_DAYS_EXCEEDED, RETRY_SUCCEEDED, RetrySchedule,
};
use crate::error::RetryServiceError;
use crate::usecase::audit::AuditTrail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
    Skipped(&'static str),
}

pub const SKIP_RESOLVED: &str = "SCHEDULE_RESOLVED";
pub const SKIP_NOT_DUE: &str = "SCHEDULE_NOT_DUE";
pub const SKIP_EXHAUSTED: &str = "ATTEMPTS_EXHAUSTED";
pub const SKIP_ALREADY_PROCESSED: &str = "ATTEMPT_ALREADY_PROCESSED";
pub const SKIP_CLAIM_LOST: &str = "ATTEMPT_CLAIMED_ELSEWHERE";

/// Payment timeouts after which an in-flight attempt counts as abandoned.
const ABANDONED_AFTER_TIMEOUTS: u32 = 2;

/// What one execution did. `schedule` is the state after the run; the caller
/// reacts to `schedule.is_resolved` with reminder follow-ups.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub outcome: AttemptOutcome,
    pub schedule: RetrySchedule,
    pub attempt: Option<RetryAttempt>,
}

impl AttemptReport {
    fn skipped(reason: &'static str, schedule: RetrySchedule, attempt: Option<RetryAttempt>) -> Self {
        Self {
            outcome: AttemptOutcome::Skipped(reason),
            schedule,
            attempt,
        }
    }

    /// `true` when this run moved the schedule to a resolved state.
    pub fn resolved_schedule(&self) -> bool {
        self.schedule.is_resolved
            && !matches!(self.outcome, AttemptOutcome::Skipped(SKIP_RESOLVED))
    }
}

// ── ExecuteRetryAttempt ──────────────────────────────────────────────────────

pub struct ExecuteRetryAttemptUseCase<S, T, G, C, A>
where
    S: RetryScheduleRepository,
    T: RetryAttemptRepository,
    G: PaymentGateway,
    C: BusinessCalendar,
    A: AuditLogRepository,
{
    pub schedules: S,
    pub attempts: T,
    pub gateway: G,
    pub calendar: C,
    pub window: RunWindow,
    pub payment_timeout: Duration,
    pub audit: AuditTrail<A>,
}

impl<S, T, G, C, A> ExecuteRetryAttemptUseCase<S, T, G, C, A>
where
    S: RetryScheduleRepository,
    T: RetryAttemptRepository,
    G: PaymentGateway,
    C: BusinessCalendar,
    A: AuditLogRepository,
{
    /// Run the next attempt of `schedule_id`. Re-running for the same
    /// attempt number never produces a second attempt or a second submission.
    pub async fn execute(
        &self,
        schedule_id: Uuid,
        job_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<AttemptReport, RetryServiceError> {
        let schedule = self
            .schedules
            .find_by_id(schedule_id)
            .await?
            .ok_or(RetryServiceError::ScheduleNotFound)?;
        if schedule.is_resolved || !schedule.eligibility.is_eligible() {
            return Ok(AttemptReport::skipped(SKIP_RESOLVED, schedule, None));
        }
        let Some(planned_date) = schedule.next_retry_date else {
            return Ok(AttemptReport::skipped(SKIP_NOT_DUE, schedule, None));
        };

        let attempt_number = schedule.current_attempt + 1;
        if attempt_number > schedule.max_attempts {
            let before = schedule.clone();
            let mut schedule = schedule;
            schedule.resolve(Eligibility::NotEligibleMaxAttempts, MAX_ATTEMPTS_REACHED, now);
            self.save_schedule(&before, &schedule, None, job_id).await?;
            return Ok(AttemptReport::skipped(SKIP_EXHAUSTED, schedule, None));
        }

        let fresh = RetryAttempt {
            id: Uuid::now_v7(),
            organisation_id: schedule.organisation_id,
            retry_schedule_id: schedule.id,
            attempt_number,
            planned_date,
            executed_at: None,
            status: AttemptStatus::Scheduled,
            psp_payment_id: None,
            psp_response: None,
            error_code: None,
            error_message: None,
            new_rejection_code: None,
            retry_job_id: job_id,
            idempotency_key: attempt_idempotency_key(schedule.id, attempt_number),
            created_at: now,
            updated_at: now,
        };
        let (mut attempt, inserted) = self.attempts.insert_if_absent(&fresh).await?;
        if inserted {
            self.audit
                .record(
                    NewAuditEntry::new(
                        attempt.organisation_id,
                        EntityType::RetryAttempt,
                        attempt.id,
                        AuditAction::Create,
                        AttemptStatus::Scheduled.as_str(),
                        Actor::scheduler(),
                    )
                    .after(&attempt.status_snapshot())
                    .schedule(schedule.id)
                    .attempt(attempt.id)
                    .metadata(serde_json::json!({ "retryJobId": job_id })),
                )
                .await;
        }
        let claimed = match attempt.status {
            AttemptStatus::Scheduled => {
                self.transition(&mut attempt, AttemptStatus::InProgress, job_id, now)
                    .await?
            }
            AttemptStatus::Succeeded | AttemptStatus::Failed => {
                return self.reconcile(schedule, attempt, job_id, now).await;
            }
            AttemptStatus::InProgress | AttemptStatus::Submitted
                if self.is_abandoned(&attempt, now) =>
            {
                self.reclaim(&mut attempt, now).await?
            }
            _ => {
                return Ok(AttemptReport::skipped(
                    SKIP_ALREADY_PROCESSED,
                    schedule,
                    Some(attempt),
                ));
            }
        };
        if !claimed {
            return Ok(AttemptReport::skipped(SKIP_CLAIM_LOST, schedule, Some(attempt)));
        }

        let submission = PaymentSubmission {
            attempt_id: attempt.id,
            retry_schedule_id: schedule.id,
            organisation_id: schedule.organisation_id,
            original_payment_id: schedule.original_payment_id,
            client_id: schedule.client_id,
            attempt_number,
            amount_cents: schedule.amount_cents,
            currency: schedule.currency.to_string(),
            psp_name: schedule.psp_name.clone(),
            psp_payment_id: schedule.psp_payment_id.clone(),
            idempotency_key: attempt.idempotency_key.clone(),
        };
        attempt.executed_at = Some(now);

        let succeeded = match tokio::time::timeout(
            self.payment_timeout,
            self.gateway.submit(&submission),
        )
        .await
        {
            Ok(Ok(outcome)) => {
                self.record_submission(&mut attempt, &outcome);
                if attempt.status == AttemptStatus::InProgress {
                    self.require(
                        self.transition(&mut attempt, AttemptStatus::Submitted, job_id, now)
                            .await?,
                        &attempt,
                    )?;
                }
                let next = if outcome.success {
                    AttemptStatus::Succeeded
                } else {
                    AttemptStatus::Failed
                };
                self.require(self.transition(&mut attempt, next, job_id, now).await?, &attempt)?;
                outcome.success
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    attempt_id = %attempt.id,
                    schedule_id = %schedule.id,
                    error = %e,
                    "payment submission failed"
                );
                attempt.error_code = Some(EXCEPTION_ERROR.to_owned());
                attempt.error_message = Some(e.to_string());
                self.require(
                    self.transition(&mut attempt, AttemptStatus::Failed, job_id, now)
                        .await?,
                    &attempt,
                )?;
                false
            }
            Err(_) => {
                tracing::warn!(
                    attempt_id = %attempt.id,
                    schedule_id = %schedule.id,
                    timeout_secs = self.payment_timeout.as_secs(),
                    "payment submission timed out"
                );
                attempt.error_code = Some(TIMEOUT_ERROR.to_owned());
                attempt.error_message = Some(format!(
                    "no answer within {}s",
                    self.payment_timeout.as_secs()
                ));
                self.require(
                    self.transition(&mut attempt, AttemptStatus::Failed, job_id, now)
                        .await?,
                    &attempt,
                )?;
                false
            }
        };

        let before = schedule.clone();
        let schedule = self.advance(schedule, &attempt, succeeded, now);
        self.save_schedule(&before, &schedule, Some(attempt.id), job_id)
            .await?;

        Ok(AttemptReport {
            outcome: if succeeded {
                AttemptOutcome::Succeeded
            } else {
                AttemptOutcome::Failed
            },
            schedule,
            attempt: Some(attempt),
        })
    }

    /// Apply an attempt that finished while its schedule update was lost.
    async fn reconcile(
        &self,
        schedule: RetrySchedule,
        attempt: RetryAttempt,
        job_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<AttemptReport, RetryServiceError> {
        let succeeded = attempt.status == AttemptStatus::Succeeded;
        tracing::info!(
            attempt_id = %attempt.id,
            schedule_id = %schedule.id,
            status = %attempt.status,
            "reconciling schedule with finished attempt"
        );
        let before = schedule.clone();
        let schedule = self.advance(schedule, &attempt, succeeded, now);
        self.save_schedule(&before, &schedule, Some(attempt.id), job_id)
            .await?;
        Ok(AttemptReport {
            outcome: if succeeded {
                AttemptOutcome::Succeeded
            } else {
                AttemptOutcome::Failed
            },
            schedule,
            attempt: Some(attempt),
        })
    }

    /// An in-flight attempt untouched for longer than a few payment timeouts
    /// belongs to a run that died.
    fn is_abandoned(&self, attempt: &RetryAttempt, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.payment_timeout * ABANDONED_AFTER_TIMEOUTS)
            .is_ok_and(|limit| now - attempt.updated_at > limit)
    }

    /// Take over an abandoned attempt. It is resubmitted under the same
    /// idempotency key, which the gateway deduplicates.
    async fn reclaim(
        &self,
        attempt: &mut RetryAttempt,
        now: DateTime<Utc>,
    ) -> Result<bool, RetryServiceError> {
        let expected = attempt.status;
        tracing::warn!(
            attempt_id = %attempt.id,
            status = %expected,
            "reclaiming abandoned attempt"
        );
        let previous = attempt.updated_at;
        attempt.updated_at = now;
        let claimed = self.attempts.compare_and_set(attempt, expected).await?;
        if !claimed {
            attempt.updated_at = previous;
        }
        Ok(claimed)
    }

    fn record_submission(&self, attempt: &mut RetryAttempt, outcome: &PaymentOutcome) {
        attempt.psp_payment_id = outcome.provider_payment_id.clone();
        attempt.psp_response = serde_json::to_value(outcome).ok();
        if !outcome.success {
            attempt.error_code = outcome.error_code.clone();
            attempt.error_message = outcome.error_message.clone();
            attempt.new_rejection_code = outcome
                .new_rejection_code
                .as_deref()
                .map(normalize_code)
                .filter(|code| !code.is_empty());
        }
    }

    /// Schedule state after `attempt` finished.
    fn advance(
        &self,
        mut schedule: RetrySchedule,
        attempt: &RetryAttempt,
        succeeded: bool,
        now: DateTime<Utc>,
    ) -> RetrySchedule {
        schedule.current_attempt = attempt.attempt_number;
        if succeeded {
            schedule.resolve(Eligibility::Eligible, RETRY_SUCCEEDED, now);
            return schedule;
        }

        if let Some(code) = &attempt.new_rejection_code {
            schedule.last_rejection_code = code.clone();
        }
        let decision = eligibility::evaluate(&schedule.rules, &schedule.last_rejection_code);
        if !decision.eligibility.is_eligible() {
            schedule.resolve(decision.eligibility, decision.reason, now);
            return schedule;
        }
        if schedule.current_attempt >= schedule.max_attempts {
            schedule.resolve(Eligibility::NotEligibleMaxAttempts, MAX_ATTEMPTS_REACHED, now);
            return schedule;
        }
        let elapsed_days = eligibility::elapsed_days(schedule.rejection_date, now, &self.window);
        if elapsed_days >= i64::from(schedule.rules.max_total_days) {
            schedule.resolve(Eligibility::NotEligibleMaxDays, MAX_DAYS_EXCEEDED, now);
            return schedule;
        }

        let base = attempt.executed_at.unwrap_or(now);
        let next = eligibility::plan_retry_date(
            base,
            eligibility::delay_days(&schedule.rules, schedule.current_attempt),
            &self.window,
            &self.calendar,
        );
        if eligibility::past_deadline(
            &schedule.rules,
            schedule.rejection_date,
            next,
            &self.window,
        ) {
            schedule.resolve(Eligibility::NotEligibleMaxDays, MAX_DAYS_EXCEEDED, now);
        } else {
            schedule.plan_next(next, now);
        }
        schedule
    }

    /// Move `attempt` to `next` if the stored row is still in the current
    /// status. Returns `false` when another writer got there first.
    async fn transition(
        &self,
        attempt: &mut RetryAttempt,
        next: AttemptStatus,
        job_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool, RetryServiceError> {
        let expected = attempt.status;
        if !expected.can_transition_to(next) {
            return Err(anyhow!("illegal attempt transition {expected} -> {next}").into());
        }
        let before = attempt.status_snapshot();
        attempt.status = next;
        attempt.updated_at = now;
        if !self.attempts.compare_and_set(attempt, expected).await? {
            attempt.status = expected;
            return Ok(false);
        }
        self.audit
            .record(
                NewAuditEntry::new(
                    attempt.organisation_id,
                    EntityType::RetryAttempt,
                    attempt.id,
                    AuditAction::Update,
                    next.as_str(),
                    Actor::scheduler(),
                )
                .before(&before)
                .after(&attempt.status_snapshot())
                .schedule(attempt.retry_schedule_id)
                .attempt(attempt.id)
                .metadata(serde_json::json!({ "retryJobId": job_id })),
            )
            .await;
        Ok(true)
    }

    fn require(&self, moved: bool, attempt: &RetryAttempt) -> Result<(), RetryServiceError> {
        if moved {
            Ok(())
        } else {
            Err(anyhow!("attempt {} changed concurrently while in progress", attempt.id).into())
        }
    }

    async fn save_schedule(
        &self,
        before: &RetrySchedule,
        after: &RetrySchedule,
        attempt_id: Option<Uuid>,
        job_id: Option<Uuid>,
    ) -> Result<(), RetryServiceError> {
        self.schedules.update(after).await?;
        let event = if after.is_resolved {
            "RESOLVED"
        } else {
            "RETRY_PLANNED"
        };
        let mut entry = NewAuditEntry::new(
            after.organisation_id,
            EntityType::RetrySchedule,
            after.id,
            AuditAction::Update,
            event,
            Actor::scheduler(),
        )
        .before(before)
        .after(after)
        .schedule(after.id)
        .payment(after.original_payment_id)
        .metadata(serde_json::json!({ "retryJobId": job_id }));
        if let Some(id) = attempt_id {
            entry = entry.attempt(id);
        }
        self.audit.record(entry).await;
        Ok(())
    }
}

// ── GetAttempt ───────────────────────────────────────────────────────────────

pub struct GetAttemptUseCase<T: RetryAttemptRepository> {
    pub repo: T,
}

impl<T: RetryAttemptRepository> GetAttemptUseCase<T> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<RetryAttempt, RetryServiceError> {
        self.repo
            .find_by_id(id)
            .await?
            .filter(|a| a.organisation_id == organisation_id)
            .ok_or(RetryServiceError::AttemptNotFound)
    }
}

// ── ListAttempts ─────────────────────────────────────────────────────────────

pub struct ListAttemptsUseCase<S: RetryScheduleRepository, T: RetryAttemptRepository> {
    pub schedules: S,
    pub attempts: T,
}

impl<S: RetryScheduleRepository, T: RetryAttemptRepository> ListAttemptsUseCase<S, T> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        schedule_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryAttempt>, RetryServiceError> {
        self.schedules
            .find_by_id(schedule_id)
            .await?
            .filter(|s| s.organisation_id == organisation_id)
            .ok_or(RetryServiceError::ScheduleNotFound)?;
        self.attempts.list_by_schedule(schedule_id, page).await
    }
}
