use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use uuid::Uuid;

use dunning_domain::actor::Actor;
use dunning_domain::money::format_minor_units;
use dunning_domain::pagination::PageRequest;

use crate::domain::attempt::{EXCEPTION_ERROR, TIMEOUT_ERROR};
use crate::domain::audit::{AuditAction, EntityType, NewAuditEntry};
use crate::domain::policy::{ThrottleRules, TriggerRule};
use crate::domain::port::{NotificationOutcome, NotifierRegistry, ReminderDispatch};
use crate::domain::reminder::{
    ClientReminderHistory, DeliveryStatus, Reminder, ReminderChannel, ReminderFilter,
    ReminderStatus, ReminderTrigger, ThrottleRejection, check_throttle, local_day_bounds,
    reminder_idempotency_key,
};
use crate::domain::repository::{
    AuditLogRepository, OptOutRepository, ReminderPolicyRepository, ReminderRepository,
    RetryScheduleRepository,
};
use crate::domain::schedule::RetrySchedule;
use crate::error::RetryServiceError;
use crate::usecase::audit::AuditTrail;
use crate::usecase::reminder_policy::ResolveReminderPolicyUseCase;

pub const CHANNEL_UNAVAILABLE: &str = "CHANNEL_UNAVAILABLE";
pub const SEND_FAILED: &str = "SEND_FAILED";
pub const DELIVERY_FAILED: &str = "DELIVERY_FAILED";

fn reminder_snapshot(reminder: &Reminder) -> serde_json::Value {
    serde_json::json!({
        "status": reminder.status,
        "sentAt": reminder.sent_at,
        "deliveredAt": reminder.delivered_at,
        "providerMessageId": reminder.provider_message_id,
        "errorCode": reminder.error_code,
        "errorMessage": reminder.error_message,
        "retryCount": reminder.retry_count,
    })
}

fn template_variables(schedule: &RetrySchedule) -> serde_json::Value {
    let mut vars = serde_json::json!({
        "clientId": schedule.client_id,
        "amount": format_minor_units(schedule.amount_cents),
        "currency": schedule.currency.as_str(),
        "rejectionCode": schedule.last_rejection_code,
    });
    if let (Some(date), Some(map)) = (schedule.next_retry_date, vars.as_object_mut()) {
        map.insert("nextRetryDate".to_owned(), serde_json::json!(date));
    }
    vars
}

// ── ScheduleReminders ────────────────────────────────────────────────────────

pub struct ScheduleRemindersInput<'a> {
    pub trigger: ReminderTrigger,
    pub schedule: &'a RetrySchedule,
    pub attempt_id: Option<Uuid>,
    pub actor: Actor,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRule {
    pub trigger_rule_id: Uuid,
    pub channel: ReminderChannel,
    pub reason: ThrottleRejection,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduledReminders {
    pub reminders: Vec<Reminder>,
    pub skipped: Vec<SkippedRule>,
}

pub struct ScheduleRemindersUseCase<Q, R, O, A>
where
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
    A: AuditLogRepository,
{
    pub policies: ResolveReminderPolicyUseCase<Q>,
    pub reminders: R,
    pub opt_outs: O,
    pub zone: Tz,
    pub audit: AuditTrail<A>,
}

impl<Q, R, O, A> ScheduleRemindersUseCase<Q, R, O, A>
where
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
    A: AuditLogRepository,
{
    /// Expand the policy's rules for `trigger` into pending reminders.
    ///
    /// A rule whose reminder already exists yields the existing record. A
    /// rule that fails throttling is reported in `skipped` and not stored.
    pub async fn execute(
        &self,
        input: ScheduleRemindersInput<'_>,
    ) -> Result<ScheduledReminders, RetryServiceError> {
        let schedule = input.schedule;
        let mut out = ScheduledReminders::default();
        if schedule.is_resolved {
            return Ok(out);
        }
        let Some(policy) = self.policies.execute(&schedule.policy_context()).await? else {
            tracing::warn!(
                organisation_id = %schedule.organisation_id,
                schedule_id = %schedule.id,
                "no reminder policy applies"
            );
            return Ok(out);
        };

        for rule in policy.rules_for(input.trigger) {
            let key =
                reminder_idempotency_key(schedule.id, input.trigger, rule.channel, input.attempt_id);
            if let Some(existing) = self.reminders.find_by_idempotency_key(&key).await? {
                out.reminders.push(existing);
                continue;
            }

            let planned_at = input.now + Duration::hours(i64::from(rule.delay_hours));
            let history = self
                .history(schedule.client_id, rule, planned_at, &policy.throttle)
                .await?;
            if let Err(reason) = check_throttle(&policy.throttle, planned_at, self.zone, &history) {
                // A concurrent delivery of the same event may have stored it meanwhile.
                if let Some(existing) = self.reminders.find_by_idempotency_key(&key).await? {
                    out.reminders.push(existing);
                    continue;
                }
                tracing::info!(
                    schedule_id = %schedule.id,
                    trigger_rule_id = %rule.id,
                    channel = %rule.channel,
                    reason = ?reason,
                    "reminder throttled"
                );
                out.skipped.push(SkippedRule {
                    trigger_rule_id: rule.id,
                    channel: rule.channel,
                    reason,
                });
                continue;
            }

            let reminder = Reminder {
                id: Uuid::now_v7(),
                organisation_id: schedule.organisation_id,
                societe_id: schedule.societe_id,
                retry_schedule_id: schedule.id,
                retry_attempt_id: input.attempt_id,
                client_id: schedule.client_id,
                reminder_policy_id: policy.id,
                trigger_rule_id: rule.id,
                channel: rule.channel,
                template_id: rule.template_id.clone(),
                template_variables: template_variables(schedule),
                trigger: input.trigger,
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
                idempotency_key: key,
                metadata: serde_json::json!({}),
                created_at: input.now,
                updated_at: input.now,
            };
            let (stored, inserted) = self.reminders.insert_if_absent(&reminder).await?;
            if inserted {
                self.audit
                    .record(
                        NewAuditEntry::new(
                            stored.organisation_id,
                            EntityType::Reminder,
                            stored.id,
                            AuditAction::Create,
                            "CREATED",
                            input.actor,
                        )
                        .after(&stored)
                        .schedule(schedule.id)
                        .reminder(stored.id),
                    )
                    .await;
            }
            out.reminders.push(stored);
        }
        Ok(out)
    }

    async fn history(
        &self,
        client_id: Uuid,
        rule: &TriggerRule,
        planned_at: DateTime<Utc>,
        throttle: &ThrottleRules,
    ) -> Result<ClientReminderHistory, RetryServiceError> {
        let opted_out = if throttle.respect_opt_out {
            self.opt_outs.is_opted_out(client_id, rule.channel).await?
        } else {
            false
        };
        let within_cooldown = if throttle.cooldown_hours > 0 {
            let cooldown = Duration::hours(i64::from(throttle.cooldown_hours));
            self.reminders
                .count_planned_between(client_id, planned_at - cooldown, planned_at + cooldown)
                .await?
        } else {
            0
        };
        let (day_start, day_end) = local_day_bounds(planned_at, self.zone);
        Ok(ClientReminderHistory {
            opted_out,
            within_cooldown,
            planned_same_day: self
                .reminders
                .count_planned_for_client(client_id, day_start, day_end)
                .await?,
            planned_last_week: self
                .reminders
                .count_planned_for_client(client_id, day_end - Duration::days(7), day_end)
                .await?,
        })
    }
}

// ── SendReminder ─────────────────────────────────────────────────────────────

pub struct SendReminderUseCase<R: ReminderRepository, A: AuditLogRepository> {
    pub reminders: R,
    pub notifiers: NotifierRegistry,
    pub timeout: StdDuration,
    pub audit: AuditTrail<A>,
}

impl<R: ReminderRepository, A: AuditLogRepository> SendReminderUseCase<R, A> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        force: bool,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Reminder, RetryServiceError> {
        let reminder = self
            .reminders
            .find_by_id(id)
            .await?
            .filter(|r| r.organisation_id == organisation_id)
            .ok_or(RetryServiceError::ReminderNotFound)?;
        self.dispatch(reminder, force, actor, now).await
    }

    /// Hand `reminder` to its channel's notifier and store the result.
    ///
    /// Only `PENDING` reminders are sent unless `force` is set; cancelled
    /// reminders are never sent.
    pub async fn dispatch(
        &self,
        mut reminder: Reminder,
        force: bool,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Reminder, RetryServiceError> {
        let expected = reminder.status;
        let sendable = expected == ReminderStatus::Pending
            || (force && expected != ReminderStatus::Cancelled);
        if !sendable {
            return Err(RetryServiceError::ReminderNotPending);
        }

        match self.notifiers.get(reminder.channel) {
            None => {
                reminder.status = ReminderStatus::Failed;
                reminder.error_code = Some(CHANNEL_UNAVAILABLE.to_owned());
                reminder.error_message =
                    Some(format!("no notifier registered for {}", reminder.channel));
                reminder.retry_count += 1;
            }
            Some(notifier) => {
                reminder.provider_name = Some(notifier.provider().to_owned());
                let dispatch = ReminderDispatch {
                    reminder_id: reminder.id,
                    organisation_id: reminder.organisation_id,
                    client_id: reminder.client_id,
                    channel: reminder.channel,
                    template_id: reminder.template_id.clone(),
                    variables: reminder.template_variables.clone(),
                    idempotency_key: reminder.idempotency_key.clone(),
                };
                let outcome = match tokio::time::timeout(self.timeout, notifier.send(&dispatch)).await
                {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => NotificationOutcome {
                        success: false,
                        provider_message_id: None,
                        error_code: Some(EXCEPTION_ERROR.to_owned()),
                        error_message: Some(e.to_string()),
                    },
                    Err(_) => NotificationOutcome {
                        success: false,
                        provider_message_id: None,
                        error_code: Some(TIMEOUT_ERROR.to_owned()),
                        error_message: Some(format!(
                            "no answer within {}s",
                            self.timeout.as_secs()
                        )),
                    },
                };
                if outcome.success {
                    reminder.status = ReminderStatus::Sent;
                    reminder.sent_at = Some(now);
                    reminder.provider_message_id = outcome.provider_message_id;
                    reminder.error_code = None;
                    reminder.error_message = None;
                } else {
                    reminder.status = ReminderStatus::Failed;
                    reminder.error_code =
                        Some(outcome.error_code.unwrap_or_else(|| SEND_FAILED.to_owned()));
                    reminder.error_message = Some(
                        outcome
                            .error_message
                            .unwrap_or_else(|| "failed to send reminder".to_owned()),
                    );
                    reminder.retry_count += 1;
                }
            }
        }
        reminder.updated_at = now;

        if !self.reminders.compare_and_set(&reminder, expected).await? {
            tracing::warn!(reminder_id = %reminder.id, "reminder changed while sending");
            return Err(RetryServiceError::ReminderNotPending);
        }

        let event = if reminder.status == ReminderStatus::Sent {
            "SENT"
        } else {
            "FAILED"
        };
        self.audit
            .record(
                NewAuditEntry::new(
                    reminder.organisation_id,
                    EntityType::Reminder,
                    reminder.id,
                    AuditAction::Update,
                    event,
                    actor,
                )
                .after(&reminder_snapshot(&reminder))
                .schedule(reminder.retry_schedule_id)
                .reminder(reminder.id)
                .metadata(serde_json::json!({ "forced": force })),
            )
            .await;
        Ok(reminder)
    }
}

// ── HandleDeliveryStatus ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatusUpdate {
    pub provider_message_id: String,
    pub status: DeliveryStatus,
    pub raw_status: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

pub struct HandleDeliveryStatusUseCase<R: ReminderRepository, A: AuditLogRepository> {
    pub reminders: R,
    pub audit: AuditTrail<A>,
}

impl<R: ReminderRepository, A: AuditLogRepository> HandleDeliveryStatusUseCase<R, A> {
    /// Apply a provider callback. Callbacks arrive unordered and are applied
    /// as received. Unknown message ids are dropped.
    pub async fn execute(
        &self,
        update: DeliveryStatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Reminder>, RetryServiceError> {
        let Some(mut reminder) = self
            .reminders
            .find_by_provider_message_id(&update.provider_message_id)
            .await?
        else {
            tracing::warn!(
                provider_message_id = %update.provider_message_id,
                status = ?update.status,
                "delivery status for unknown reminder dropped"
            );
            return Ok(None);
        };

        let before = reminder_snapshot(&reminder);
        reminder.status = update.status.reminder_status();
        match update.status {
            DeliveryStatus::Delivered => reminder.delivered_at = Some(now),
            DeliveryStatus::Failed => {
                reminder.error_code = Some(
                    update
                        .error_code
                        .clone()
                        .unwrap_or_else(|| DELIVERY_FAILED.to_owned()),
                );
                reminder.error_message = Some(
                    update
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "delivery failed".to_owned()),
                );
            }
            DeliveryStatus::Bounced | DeliveryStatus::Opened | DeliveryStatus::Clicked => {}
        }
        if let Some(raw) = update.raw_status.clone() {
            reminder.delivery_status_raw = Some(raw);
        }
        reminder.updated_at = now;
        self.reminders.update(&reminder).await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    reminder.organisation_id,
                    EntityType::Reminder,
                    reminder.id,
                    AuditAction::Update,
                    format!("DELIVERY_{}", reminder.status),
                    Actor::webhook(),
                )
                .before(&before)
                .after(&reminder_snapshot(&reminder))
                .schedule(reminder.retry_schedule_id)
                .reminder(reminder.id)
                .metadata(serde_json::json!({ "rawStatus": update.raw_status })),
            )
            .await;
        Ok(Some(reminder))
    }
}

// ── CancelRemindersForSchedule ───────────────────────────────────────────────

pub struct CancelRemindersForScheduleUseCase<R: ReminderRepository, A: AuditLogRepository> {
    pub reminders: R,
    pub audit: AuditTrail<A>,
}

impl<R: ReminderRepository, A: AuditLogRepository> CancelRemindersForScheduleUseCase<R, A> {
    /// Cancel every pending reminder of the schedule. Returns how many moved.
    pub async fn execute(
        &self,
        schedule_id: Uuid,
        reason: &str,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError> {
        let mut cancelled = 0;
        for mut reminder in self.reminders.pending_for_schedule(schedule_id).await? {
            reminder.status = ReminderStatus::Cancelled;
            reminder.error_message = Some(reason.to_owned());
            reminder.updated_at = now;
            if !self
                .reminders
                .compare_and_set(&reminder, ReminderStatus::Pending)
                .await?
            {
                continue;
            }
            cancelled += 1;
            self.audit
                .record(
                    NewAuditEntry::new(
                        reminder.organisation_id,
                        EntityType::Reminder,
                        reminder.id,
                        AuditAction::Update,
                        "CANCELLED",
                        actor,
                    )
                    .after(&reminder_snapshot(&reminder))
                    .schedule(schedule_id)
                    .reminder(reminder.id),
                )
                .await;
        }
        Ok(cancelled)
    }
}

// ── ProcessPendingReminders ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
    pub errors: u32,
}

pub struct ProcessPendingRemindersUseCase<R: ReminderRepository, A: AuditLogRepository> {
    pub send: SendReminderUseCase<R, A>,
    pub batch_size: u64,
}

impl<R: ReminderRepository, A: AuditLogRepository> ProcessPendingRemindersUseCase<R, A> {
    /// One sweep over due reminders. A failing reminder never stops the
    /// others.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<SweepReport, RetryServiceError> {
        let due = self.send.reminders.find_due(now, self.batch_size).await?;
        let mut report = SweepReport::default();
        for reminder in due {
            report.processed += 1;
            let id = reminder.id;
            match self
                .send
                .dispatch(reminder, false, Actor::scheduler(), now)
                .await
            {
                Ok(r) if r.status == ReminderStatus::Sent => report.sent += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    tracing::warn!(reminder_id = %id, error = %e, "reminder send failed");
                    report.errors += 1;
                }
            }
        }
        if report.processed > 0 {
            tracing::info!(
                processed = report.processed,
                sent = report.sent,
                failed = report.failed,
                errors = report.errors,
                "reminder sweep finished"
            );
        }
        Ok(report)
    }
}

// ── ReminderEngine ───────────────────────────────────────────────────────────

/// Reminder side effects of schedule lifecycle events.
pub struct ReminderEngine<Q, R, O, A>
where
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
    A: AuditLogRepository,
{
    pub schedule: ScheduleRemindersUseCase<Q, R, O, A>,
    pub cancel: CancelRemindersForScheduleUseCase<R, A>,
}

impl<Q, R, O, A> ReminderEngine<Q, R, O, A>
where
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
    A: AuditLogRepository,
{
    pub async fn on_rejection(
        &self,
        schedule: &RetrySchedule,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        let out = self
            .schedule
            .execute(ScheduleRemindersInput {
                trigger: ReminderTrigger::RejectionReceived,
                schedule,
                attempt_id: None,
                actor: Actor::scheduler(),
                now,
            })
            .await?;
        Ok(out.reminders)
    }

    /// Reminders after a failed attempt that left the schedule open.
    pub async fn on_attempt_failed(
        &self,
        schedule: &RetrySchedule,
        attempt_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        let mut reminders = Vec::new();
        for trigger in [ReminderTrigger::AfterRetryFailed, ReminderTrigger::BeforeRetry] {
            let out = self
                .schedule
                .execute(ScheduleRemindersInput {
                    trigger,
                    schedule,
                    attempt_id: Some(attempt_id),
                    actor: Actor::scheduler(),
                    now,
                })
                .await?;
            reminders.extend(out.reminders);
        }
        Ok(reminders)
    }

    pub async fn on_resolved(
        &self,
        schedule: &RetrySchedule,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError> {
        let reason = schedule
            .resolution_reason
            .clone()
            .unwrap_or_else(|| "SCHEDULE_RESOLVED".to_owned());
        self.cancel.execute(schedule.id, &reason, actor, now).await
    }
}

// ── CreateManualReminders ────────────────────────────────────────────────────

pub struct CreateManualRemindersUseCase<S, Q, R, O, A>
where
    S: RetryScheduleRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
    A: AuditLogRepository,
{
    pub schedules: S,
    pub reminders: ScheduleRemindersUseCase<Q, R, O, A>,
}

impl<S, Q, R, O, A> CreateManualRemindersUseCase<S, Q, R, O, A>
where
    S: RetryScheduleRepository,
    Q: ReminderPolicyRepository,
    R: ReminderRepository,
    O: OptOutRepository,
    A: AuditLogRepository,
{
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        schedule_id: Uuid,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReminders, RetryServiceError> {
        let schedule = self
            .schedules
            .find_by_id(schedule_id)
            .await?
            .filter(|s| s.organisation_id == organisation_id)
            .ok_or(RetryServiceError::ScheduleNotFound)?;
        if schedule.is_resolved {
            return Err(RetryServiceError::ScheduleAlreadyResolved);
        }
        self.reminders
            .execute(ScheduleRemindersInput {
                trigger: ReminderTrigger::Manual,
                schedule: &schedule,
                attempt_id: None,
                actor,
                now,
            })
            .await
    }
}

// ── GetReminder ──────────────────────────────────────────────────────────────

pub struct GetReminderUseCase<R: ReminderRepository> {
    pub repo: R,
}

impl<R: ReminderRepository> GetReminderUseCase<R> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Reminder, RetryServiceError> {
        self.repo
            .find_by_id(id)
            .await?
            .filter(|r| r.organisation_id == organisation_id)
            .ok_or(RetryServiceError::ReminderNotFound)
    }
}

// ── ListReminders ────────────────────────────────────────────────────────────

pub struct ListRemindersUseCase<R: ReminderRepository> {
    pub repo: R,
}

impl<R: ReminderRepository> ListRemindersUseCase<R> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        filter: ReminderFilter,
        page: PageRequest,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        self.repo.list(organisation_id, &filter, page).await
    }
}
