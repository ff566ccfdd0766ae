use chrono::{DateTime, Utc};
use uuid::Uuid;

use dunning_domain::actor::Actor;
use dunning_domain::money::{Currency, ensure_positive_cents};
use dunning_domain::pagination::PageRequest;

use crate::domain::attempt::AttemptStatus;
use crate::domain::audit::{AuditAction, EntityType, NewAuditEntry};
use crate::domain::calendar::{BusinessCalendar, RunWindow};
use crate::domain::eligibility::{self, EligibilityDecision, normalize_code};
use crate::domain::policy::{PolicyContext, RetryPolicy, RetryRules};
use crate::domain::repository::{
    AuditLogRepository, RetryAttemptRepository, RetryPolicyRepository, RetryScheduleRepository,
};
use crate::domain::schedule::{
    Eligibility, MAX_DAYS_EXCEEDED, RejectionEvent, RetrySchedule, ScheduleFilter,
    ScheduleStatistics, StopCondition,
};
use crate::error::RetryServiceError;
use crate::usecase::audit::AuditTrail;
use crate::usecase::retry_policy::ResolveRetryPolicyUseCase;

pub const DUPLICATE_EVENT_MESSAGE: &str = "Duplicate event - already processed";

/// First retry date for a fresh rejection, or the resolution that applies
/// when the first delay already overshoots the policy's day budget.
fn first_retry(
    rules: &RetryRules,
    rejected_at: DateTime<Utc>,
    window: &RunWindow,
    calendar: &impl BusinessCalendar,
) -> Result<DateTime<Utc>, EligibilityDecision> {
    let next = eligibility::plan_retry_date(
        rejected_at,
        eligibility::delay_days(rules, 0),
        window,
        calendar,
    );
    if eligibility::past_deadline(rules, rejected_at, next, window) {
        Err(EligibilityDecision {
            eligibility: Eligibility::NotEligibleMaxDays,
            reason: MAX_DAYS_EXCEEDED,
        })
    } else {
        Ok(next)
    }
}

fn validate_code(code: &str) -> Result<String, RetryServiceError> {
    let normalized = normalize_code(code);
    if normalized.is_empty()
        || !normalized
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err(RetryServiceError::validation(format!(
            "malformed rejection code {code:?}"
        )));
    }
    Ok(normalized)
}

fn owned_by(schedule: RetrySchedule, organisation_id: Uuid) -> Result<RetrySchedule, RetryServiceError> {
    if schedule.organisation_id == organisation_id {
        Ok(schedule)
    } else {
        Err(RetryServiceError::ScheduleNotFound)
    }
}

// ── HandleRejection ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RejectionOutcome {
    pub processed: bool,
    pub schedule: RetrySchedule,
    pub message: String,
}

pub struct HandleRejectionUseCase<P, S, C, A>
where
    P: RetryPolicyRepository,
    S: RetryScheduleRepository,
    C: BusinessCalendar,
    A: AuditLogRepository,
{
    pub policies: ResolveRetryPolicyUseCase<P>,
    pub schedules: S,
    pub calendar: C,
    pub window: RunWindow,
    pub audit: AuditTrail<A>,
}

impl<P, S, C, A> HandleRejectionUseCase<P, S, C, A>
where
    P: RetryPolicyRepository,
    S: RetryScheduleRepository,
    C: BusinessCalendar,
    A: AuditLogRepository,
{
    /// Ingest one rejection. Replays of the same event return the stored
    /// schedule with `processed = false`.
    pub async fn execute(
        &self,
        event: RejectionEvent,
        actor: Actor,
    ) -> Result<RejectionOutcome, RetryServiceError> {
        let key = event.dedup_key().to_owned();
        if key.is_empty() {
            return Err(RetryServiceError::validation(
                "idempotency_key or event_id is required",
            ));
        }
        let code = validate_code(&event.reason_code)?;
        let amount_cents = ensure_positive_cents(event.amount_cents)
            .map_err(|e| RetryServiceError::validation(e.to_string()))?;
        let currency = event
            .currency
            .parse::<Currency>()
            .map_err(|e| RetryServiceError::validation(e.to_string()))?;

        if let Some(existing) = self
            .schedules
            .find_by_idempotency_key(event.organisation_id, &key)
            .await?
        {
            return Ok(RejectionOutcome {
                processed: false,
                schedule: existing,
                message: DUPLICATE_EVENT_MESSAGE.to_owned(),
            });
        }

        let policy: RetryPolicy = self.policies.execute(&event.policy_context()).await?;
        let rules = policy.rules.clone();
        let now = Utc::now();

        let mut schedule = RetrySchedule {
            id: Uuid::now_v7(),
            organisation_id: event.organisation_id,
            societe_id: event.societe_id,
            original_payment_id: event.payment_id,
            schedule_ref: event.schedule_ref.clone(),
            invoice_id: event.invoice_id,
            contract_id: event.contract_id,
            client_id: event.client_id,
            product_id: event.product_id,
            channel_id: event.channel_id,
            rejection_code: code.clone(),
            rejection_raw_code: event.reason_code.clone(),
            rejection_message: event.reason_message.clone(),
            rejection_date: event.rejected_at,
            last_rejection_code: code.clone(),
            retry_policy_id: policy.id,
            max_attempts: rules.max_attempts,
            rules,
            amount_cents,
            currency,
            psp_name: event.psp_name.clone(),
            psp_payment_id: event.psp_payment_id.clone(),
            eligibility: Eligibility::Eligible,
            eligibility_reason: None,
            current_attempt: 0,
            next_retry_date: None,
            is_resolved: false,
            resolution_reason: None,
            resolved_at: None,
            event_id: event.event_id.clone(),
            idempotency_key: key,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };

        let decision = eligibility::evaluate(&schedule.rules, &code);
        let decision = if decision.eligibility.is_eligible() {
            match first_retry(&schedule.rules, event.rejected_at, &self.window, &self.calendar) {
                Ok(next) => {
                    schedule.plan_next(next, now);
                    schedule.eligibility_reason = Some(decision.reason.to_owned());
                    decision
                }
                Err(overshoot) => overshoot,
            }
        } else {
            decision
        };
        if !decision.eligibility.is_eligible() {
            schedule.resolve(decision.eligibility, decision.reason, now);
        }

        let (stored, inserted) = self.schedules.insert_if_absent(&schedule).await?;
        if !inserted {
            return Ok(RejectionOutcome {
                processed: false,
                schedule: stored,
                message: DUPLICATE_EVENT_MESSAGE.to_owned(),
            });
        }

        self.audit
            .record(
                NewAuditEntry::new(
                    stored.organisation_id,
                    EntityType::RetrySchedule,
                    stored.id,
                    AuditAction::Create,
                    "CREATED",
                    actor,
                )
                .after(&stored)
                .schedule(stored.id)
                .payment(stored.original_payment_id)
                .metadata(serde_json::json!({
                    "eventId": event.event_id,
                    "rejectionCode": code,
                    "retryPolicyId": policy.id,
                })),
            )
            .await;

        let message = if stored.eligibility.is_eligible() {
            "Retry schedule created".to_owned()
        } else {
            format!("Payment not eligible for retry: {}", stored.eligibility)
        };
        Ok(RejectionOutcome {
            processed: true,
            schedule: stored,
            message,
        })
    }
}

// ── CheckEligibility ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityCheck {
    pub eligibility: Eligibility,
    pub reason: String,
    pub retry_policy_id: Uuid,
    pub first_retry_date: Option<DateTime<Utc>>,
}

pub struct CheckEligibilityUseCase<P: RetryPolicyRepository, C: BusinessCalendar> {
    pub policies: ResolveRetryPolicyUseCase<P>,
    pub calendar: C,
    pub window: RunWindow,
}

impl<P: RetryPolicyRepository, C: BusinessCalendar> CheckEligibilityUseCase<P, C> {
    /// Dry evaluation; nothing is persisted.
    pub async fn execute(
        &self,
        ctx: &PolicyContext,
        reason_code: &str,
        rejected_at: DateTime<Utc>,
    ) -> Result<EligibilityCheck, RetryServiceError> {
        let code = validate_code(reason_code)?;
        let policy = self.policies.execute(ctx).await?;
        let decision = eligibility::evaluate(&policy.rules, &code);
        if !decision.eligibility.is_eligible() {
            return Ok(EligibilityCheck {
                eligibility: decision.eligibility,
                reason: decision.reason.to_owned(),
                retry_policy_id: policy.id,
                first_retry_date: None,
            });
        }
        Ok(
            match first_retry(&policy.rules, rejected_at, &self.window, &self.calendar) {
                Ok(next) => EligibilityCheck {
                    eligibility: decision.eligibility,
                    reason: decision.reason.to_owned(),
                    retry_policy_id: policy.id,
                    first_retry_date: Some(next),
                },
                Err(overshoot) => EligibilityCheck {
                    eligibility: overshoot.eligibility,
                    reason: overshoot.reason.to_owned(),
                    retry_policy_id: policy.id,
                    first_retry_date: None,
                },
            },
        )
    }
}

// ── CancelSchedule ───────────────────────────────────────────────────────────

pub struct CancelScheduleUseCase<S: RetryScheduleRepository, A: AuditLogRepository> {
    pub schedules: S,
    pub audit: AuditTrail<A>,
}

impl<S: RetryScheduleRepository, A: AuditLogRepository> CancelScheduleUseCase<S, A> {
    /// Resolve as manually cancelled. Pending reminders are the caller's to
    /// cancel.
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        reason: &str,
        actor: Actor,
    ) -> Result<RetrySchedule, RetryServiceError> {
        let schedule = self
            .schedules
            .find_by_id(id)
            .await?
            .ok_or(RetryServiceError::ScheduleNotFound)?;
        let before = owned_by(schedule, organisation_id)?;
        if before.is_resolved {
            return Err(RetryServiceError::ScheduleAlreadyResolved);
        }

        let now = Utc::now();
        let mut schedule = before.clone();
        schedule.resolve(
            Eligibility::NotEligibleManualCancel,
            format!("Manually cancelled: {reason}"),
            now,
        );
        schedule.annotate("cancelledBy", serde_json::json!(actor.label()));
        schedule.annotate("cancelledAt", serde_json::json!(now));
        schedule.annotate("cancelReason", serde_json::json!(reason));
        self.schedules.update(&schedule).await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    organisation_id,
                    EntityType::RetrySchedule,
                    schedule.id,
                    AuditAction::Update,
                    "CANCELLED",
                    actor,
                )
                .before(&before)
                .after(&schedule)
                .schedule(schedule.id)
                .payment(schedule.original_payment_id),
            )
            .await;
        Ok(schedule)
    }
}

// ── ReplanSchedule ───────────────────────────────────────────────────────────

pub struct ReplanScheduleUseCase<S: RetryScheduleRepository, A: AuditLogRepository> {
    pub schedules: S,
    pub audit: AuditTrail<A>,
}

impl<S: RetryScheduleRepository, A: AuditLogRepository> ReplanScheduleUseCase<S, A> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        new_date: DateTime<Utc>,
        reason: &str,
        actor: Actor,
    ) -> Result<RetrySchedule, RetryServiceError> {
        let now = Utc::now();
        if new_date <= now {
            return Err(RetryServiceError::validation(
                "new retry date must be in the future",
            ));
        }
        let schedule = self
            .schedules
            .find_by_id(id)
            .await?
            .ok_or(RetryServiceError::ScheduleNotFound)?;
        let before = owned_by(schedule, organisation_id)?;
        if before.is_resolved {
            return Err(RetryServiceError::ScheduleAlreadyResolved);
        }

        let mut schedule = before.clone();
        schedule.plan_next(new_date, now);
        schedule.annotate("replannedBy", serde_json::json!(actor.label()));
        schedule.annotate("replanReason", serde_json::json!(reason));
        self.schedules.update(&schedule).await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    organisation_id,
                    EntityType::RetrySchedule,
                    schedule.id,
                    AuditAction::Update,
                    "REPLANNED",
                    actor,
                )
                .before(&before)
                .after(&schedule)
                .schedule(schedule.id)
                .metadata(serde_json::json!({
                    "oldDate": before.next_retry_date,
                    "newDate": new_date,
                    "reason": reason,
                })),
            )
            .await;
        Ok(schedule)
    }
}

// ── ApplyStopCondition ───────────────────────────────────────────────────────

pub struct StopConditionOutcome {
    pub applied: bool,
    pub schedule: RetrySchedule,
}

pub struct ApplyStopConditionUseCase<S: RetryScheduleRepository, A: AuditLogRepository> {
    pub schedules: S,
    pub audit: AuditTrail<A>,
}

impl<S: RetryScheduleRepository, A: AuditLogRepository> ApplyStopConditionUseCase<S, A> {
    /// Resolve the schedule when its captured rules stop on `condition`.
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        condition: StopCondition,
        actor: Actor,
    ) -> Result<StopConditionOutcome, RetryServiceError> {
        let schedule = self
            .schedules
            .find_by_id(id)
            .await?
            .ok_or(RetryServiceError::ScheduleNotFound)?;
        let before = owned_by(schedule, organisation_id)?;
        if before.is_resolved {
            return Err(RetryServiceError::ScheduleAlreadyResolved);
        }
        if !condition.enabled_in(&before.rules) {
            return Ok(StopConditionOutcome {
                applied: false,
                schedule: before,
            });
        }

        let mut schedule = before.clone();
        schedule.resolve(
            Eligibility::NotEligibleStopCondition,
            condition.as_str(),
            Utc::now(),
        );
        self.schedules.update(&schedule).await?;
        self.audit
            .record(
                NewAuditEntry::new(
                    organisation_id,
                    EntityType::RetrySchedule,
                    schedule.id,
                    AuditAction::Update,
                    "STOP_CONDITION",
                    actor,
                )
                .before(&before)
                .after(&schedule)
                .schedule(schedule.id),
            )
            .await;
        Ok(StopConditionOutcome {
            applied: true,
            schedule,
        })
    }
}

// ── FindDueForRetry ──────────────────────────────────────────────────────────

pub struct FindDueForRetryUseCase<S: RetryScheduleRepository> {
    pub schedules: S,
}

impl<S: RetryScheduleRepository> FindDueForRetryUseCase<S> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError> {
        self.schedules.find_due(organisation_id, cutoff).await
    }
}

// ── GetSchedule ──────────────────────────────────────────────────────────────

pub struct GetScheduleUseCase<S: RetryScheduleRepository> {
    pub schedules: S,
}

impl<S: RetryScheduleRepository> GetScheduleUseCase<S> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<RetrySchedule, RetryServiceError> {
        let schedule = self
            .schedules
            .find_by_id(id)
            .await?
            .ok_or(RetryServiceError::ScheduleNotFound)?;
        owned_by(schedule, organisation_id)
    }
}

// ── ListSchedules ────────────────────────────────────────────────────────────

pub struct ListSchedulesUseCase<S: RetryScheduleRepository> {
    pub schedules: S,
}

impl<S: RetryScheduleRepository> ListSchedulesUseCase<S> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        filter: ScheduleFilter,
        page: PageRequest,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError> {
        self.schedules.list(organisation_id, &filter, page).await
    }
}

// ── GetRetryMetrics ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RetryMetrics {
    pub schedules: ScheduleStatistics,
    pub attempts_by_status: Vec<(AttemptStatus, u64)>,
    /// Share of resolved schedules that ended in a successful retry.
    pub success_rate: f64,
}

pub struct GetRetryMetricsUseCase<S: RetryScheduleRepository, T: RetryAttemptRepository> {
    pub schedules: S,
    pub attempts: T,
}

impl<S: RetryScheduleRepository, T: RetryAttemptRepository> GetRetryMetricsUseCase<S, T> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<RetryMetrics, RetryServiceError> {
        let schedules = self.schedules.statistics(organisation_id, from, to).await?;
        let attempts_by_status = self.attempts.status_counts(organisation_id).await?;
        let success_rate = if schedules.resolved == 0 {
            0.0
        } else {
            schedules.succeeded as f64 / schedules.resolved as f64
        };
        Ok(RetryMetrics {
            schedules,
            attempts_by_status,
            success_rate,
        })
    }
}
