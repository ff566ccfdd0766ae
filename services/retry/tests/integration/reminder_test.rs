use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use dunning_domain::actor::Actor;
use dunning_retry::domain::reminder::{
    DeliveryStatus, ReminderChannel, ReminderStatus, ReminderTrigger,
};
use dunning_retry::domain::schedule::{Eligibility, RetrySchedule};
use dunning_retry::error::RetryServiceError;
use dunning_retry::usecase::audit::AuditTrail;
use dunning_retry::usecase::reminder::{
    CHANNEL_UNAVAILABLE, CreateManualRemindersUseCase, DeliveryStatusUpdate,
    HandleDeliveryStatusUseCase, SweepReport,
};

use crate::helpers::{
    Harness, MockNotifier, pending_reminder, rejected_at, test_event, test_reminder_policy,
    test_retry_policy,
};

async fn open_schedule(h: &Harness, org: Uuid) -> RetrySchedule {
    let id = h
        .rejections()
        .execute(test_event(org, "AM04"), rejected_at())
        .await
        .unwrap()
        .retry_schedule_id
        .unwrap();
    h.schedules.get(id)
}

// ── CancelRetrySchedule ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_cancel_schedule_and_pending_reminders() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_reminder_policy(test_reminder_policy(org));
    let schedule = open_schedule(&h, org).await;
    assert_eq!(h.reminders.with_status(ReminderStatus::Pending), 1);

    let (cancelled, reminders) = h
        .cancel()
        .execute(org, schedule.id, "customer paid by card", Actor::user(None))
        .await
        .unwrap();

    assert!(cancelled.is_resolved);
    assert_eq!(cancelled.eligibility, Eligibility::NotEligibleManualCancel);
    assert_eq!(cancelled.next_retry_date, None);
    assert_eq!(reminders, 1);
    assert_eq!(h.reminders.with_status(ReminderStatus::Cancelled), 1);
    assert_eq!(h.reminders.with_status(ReminderStatus::Pending), 0);
}

#[tokio::test]
async fn should_refuse_to_cancel_resolved_schedule() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    let id = h
        .rejections()
        .execute(test_event(org, "AC01"), rejected_at())
        .await
        .unwrap()
        .retry_schedule_id
        .unwrap();
    let before = h.schedules.get(id);

    let result = h
        .cancel()
        .execute(org, id, "too late", Actor::user(None))
        .await;

    assert!(
        matches!(result, Err(RetryServiceError::ScheduleAlreadyResolved)),
        "expected ScheduleAlreadyResolved, got {result:?}"
    );
    assert_eq!(h.schedules.get(id), before);
}

#[tokio::test]
async fn should_hide_schedule_of_other_organisation() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    let schedule = open_schedule(&h, org).await;

    let result = h
        .cancel()
        .execute(Uuid::now_v7(), schedule.id, "wrong tenant", Actor::user(None))
        .await;

    assert!(matches!(result, Err(RetryServiceError::ScheduleNotFound)));
}

// ── ProcessPendingReminders ──────────────────────────────────────────────────

#[tokio::test]
async fn should_isolate_failures_within_sweep() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    let schedule = open_schedule(&h, org).await;
    let reminders: Vec<_> = (0..50)
        .map(|i| pending_reminder(&schedule, rejected_at() + Duration::minutes(i)))
        .collect();
    let failing: Vec<Uuid> = reminders.iter().step_by(10).map(|r| r.id).collect();
    h.reminders.reminders.lock().unwrap().extend(reminders);
    let h = h.with_notifier(
        ReminderChannel::Email,
        Arc::new(MockNotifier::failing_for(failing.clone())),
    );

    let report = h
        .sweep(100)
        .execute(rejected_at() + Duration::hours(2))
        .await
        .unwrap();

    assert_eq!(
        report,
        SweepReport {
            processed: 50,
            sent: 45,
            failed: 5,
            errors: 0,
        }
    );
    assert_eq!(h.reminders.with_status(ReminderStatus::Sent), 45);
    assert_eq!(h.reminders.with_status(ReminderStatus::Failed), 5);
    for reminder in h.reminders.all() {
        if failing.contains(&reminder.id) {
            assert_eq!(reminder.error_code.as_deref(), Some("MAILBOX_FULL"));
            assert_eq!(reminder.retry_count, 1);
        } else {
            assert_eq!(reminder.provider_name.as_deref(), Some("mock"));
            assert!(reminder.sent_at.is_some());
        }
    }
}

#[tokio::test]
async fn should_only_sweep_due_reminders_up_to_batch_size() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    let schedule = open_schedule(&h, org).await;
    let now = rejected_at() + Duration::hours(1);
    h.reminders.reminders.lock().unwrap().extend([
        pending_reminder(&schedule, now - Duration::minutes(30)),
        pending_reminder(&schedule, now - Duration::minutes(20)),
        pending_reminder(&schedule, now - Duration::minutes(10)),
        pending_reminder(&schedule, now + Duration::hours(1)),
    ]);
    let h = h.with_notifier(ReminderChannel::Email, Arc::new(MockNotifier::default()));

    let report = h.sweep(2).execute(now).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.sent, 2);
    assert_eq!(h.reminders.with_status(ReminderStatus::Pending), 2);
}

#[tokio::test]
async fn should_fail_reminder_without_notifier() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    let schedule = open_schedule(&h, org).await;
    let mut reminder = pending_reminder(&schedule, rejected_at());
    reminder.channel = ReminderChannel::Sms;
    h.reminders.reminders.lock().unwrap().push(reminder);

    let report = h.sweep(10).execute(rejected_at()).await.unwrap();

    assert_eq!(report.failed, 1);
    let stored = &h.reminders.all()[0];
    assert_eq!(stored.status, ReminderStatus::Failed);
    assert_eq!(stored.error_code.as_deref(), Some(CHANNEL_UNAVAILABLE));
}

#[tokio::test]
async fn should_never_send_cancelled_reminders() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_reminder_policy(test_reminder_policy(org))
        .with_notifier(ReminderChannel::Email, Arc::new(MockNotifier::default()));
    let schedule = open_schedule(&h, org).await;
    h.cancel()
        .execute(org, schedule.id, "settled", Actor::user(None))
        .await
        .unwrap();

    let report = h
        .sweep(10)
        .execute(rejected_at() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(report.processed, 0);

    let id = h.reminders.all()[0].id;
    let forced = h
        .sweep(10)
        .send
        .execute(org, id, true, Actor::user(None), rejected_at())
        .await;
    assert!(matches!(forced, Err(RetryServiceError::ReminderNotPending)));
}

// ── HandleDeliveryStatus ─────────────────────────────────────────────────────

#[tokio::test]
async fn should_apply_delivery_callback_to_sent_reminder() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_reminder_policy(test_reminder_policy(org))
        .with_notifier(ReminderChannel::Email, Arc::new(MockNotifier::default()));
    open_schedule(&h, org).await;
    h.sweep(10).execute(rejected_at()).await.unwrap();
    let sent = h.reminders.all()[0].clone();
    let message_id = sent.provider_message_id.clone().unwrap();

    let usecase = HandleDeliveryStatusUseCase {
        reminders: h.reminders.clone(),
        audit: AuditTrail {
            repo: h.audit.clone(),
        },
    };
    let updated = usecase
        .execute(
            DeliveryStatusUpdate {
                provider_message_id: message_id,
                status: DeliveryStatus::Delivered,
                raw_status: Some("delivered".to_owned()),
                error_code: None,
                error_message: None,
            },
            rejected_at() + Duration::minutes(5),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.id, sent.id);
    assert_eq!(updated.status, ReminderStatus::Delivered);
    assert!(updated.delivered_at.is_some());
    assert_eq!(updated.delivery_status_raw.as_deref(), Some("delivered"));
    assert!(
        h.audit
            .events_for(sent.id)
            .contains(&"DELIVERY_DELIVERED".to_owned())
    );
}

#[tokio::test]
async fn should_drop_callback_for_unknown_message() {
    let h = Harness::default();
    let usecase = HandleDeliveryStatusUseCase {
        reminders: h.reminders.clone(),
        audit: AuditTrail {
            repo: h.audit.clone(),
        },
    };

    let result = usecase
        .execute(
            DeliveryStatusUpdate {
                provider_message_id: "msg-unknown".to_owned(),
                status: DeliveryStatus::Bounced,
                raw_status: None,
                error_code: None,
                error_message: None,
            },
            rejected_at(),
        )
        .await
        .unwrap();

    assert!(result.is_none());
}

// ── CreateManualReminders ────────────────────────────────────────────────────

#[tokio::test]
async fn should_report_skipped_rules_for_manual_trigger() {
    let org = Uuid::now_v7();
    let mut policy = test_reminder_policy(org);
    let mut manual = policy.trigger_rules[0].clone();
    manual.id = Uuid::now_v7();
    manual.trigger = ReminderTrigger::Manual;
    policy.trigger_rules.push(manual.clone());
    policy.throttle.cooldown_hours = 24;
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_reminder_policy(policy);
    let schedule = open_schedule(&h, org).await;

    let usecase = CreateManualRemindersUseCase {
        schedules: h.schedules.clone(),
        reminders: h.schedule_reminders(),
    };
    let out = usecase
        .execute(
            org,
            schedule.id,
            Actor::user(None),
            rejected_at() + Duration::hours(1),
        )
        .await
        .unwrap();

    assert!(out.reminders.is_empty());
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].trigger_rule_id, manual.id);
    assert_eq!(h.reminders.all().len(), 1);
}
