use uuid::Uuid;

use dunning_retry::domain::policy::TriggerRule;
use dunning_retry::domain::reminder::{ReminderChannel, ReminderStatus, ReminderTrigger};
use dunning_retry::domain::repository::OptOutRepository;
use dunning_retry::domain::schedule::{Eligibility, NON_RETRYABLE_CODE};
use dunning_retry::error::RetryServiceError;
use dunning_retry::usecase::attempt::{AttemptOutcome, SKIP_RESOLVED};

use crate::helpers::{
    Harness, march_cutoff, rejected_at, test_event, test_reminder_policy, test_retry_policy,
};

fn harness(org: Uuid) -> Harness {
    Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
}

// ── Ingestion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_create_schedule_with_first_retry_at_cutoff() {
    let org = Uuid::now_v7();
    let h = harness(org);

    let result = h
        .rejections()
        .execute(test_event(org, "AM04"), rejected_at())
        .await
        .unwrap();

    assert!(result.processed);
    assert_eq!(result.eligibility, Eligibility::Eligible);
    let schedule = h.schedules.get(result.retry_schedule_id.unwrap());
    assert!(!schedule.is_resolved);
    assert_eq!(schedule.current_attempt, 0);
    assert_eq!(schedule.max_attempts, 3);
    assert_eq!(schedule.next_retry_date, Some(march_cutoff(5)));
    assert_eq!(h.audit.events_for(schedule.id), vec!["CREATED"]);
}

#[tokio::test]
async fn should_return_same_schedule_when_event_replayed() {
    let org = Uuid::now_v7();
    let h = harness(org).with_reminder_policy(test_reminder_policy(org));
    let event = test_event(org, "AM04");

    let first = h
        .rejections()
        .execute(event.clone(), rejected_at())
        .await
        .unwrap();
    let second = h
        .rejections()
        .execute(event, rejected_at())
        .await
        .unwrap();

    assert!(first.processed);
    assert!(!second.processed);
    assert_eq!(first.retry_schedule_id, second.retry_schedule_id);
    assert_eq!(first.eligibility, second.eligibility);
    assert_eq!(first.reminder_ids, second.reminder_ids);
    assert_eq!(h.schedules.count(), 1);
    assert_eq!(h.reminders.all().len(), 1);
}

#[tokio::test]
async fn should_dedup_on_event_id_without_idempotency_key() {
    let org = Uuid::now_v7();
    let h = harness(org);
    let mut event = test_event(org, "MS03");
    event.idempotency_key = String::new();

    h.rejections()
        .execute(event.clone(), rejected_at())
        .await
        .unwrap();
    let replay = h
        .rejections()
        .execute(event, rejected_at())
        .await
        .unwrap();

    assert!(!replay.processed);
    assert_eq!(h.schedules.count(), 1);
}

#[tokio::test]
async fn should_create_one_schedule_for_concurrent_deliveries() {
    let org = Uuid::now_v7();
    let h = harness(org).with_reminder_policy(test_reminder_policy(org));
    let event = test_event(org, "AM04");
    let first = h.rejections();
    let second = h.rejections();

    let (a, b) = tokio::join!(
        first.execute(event.clone(), rejected_at()),
        second.execute(event, rejected_at()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(h.schedules.count(), 1);
    assert_eq!(a.retry_schedule_id, b.retry_schedule_id);
    assert_eq!(a.eligibility, b.eligibility);
    assert_eq!(a.reminder_ids, b.reminder_ids);
    assert!(a.processed != b.processed, "exactly one delivery creates the schedule");
    assert_eq!(h.reminders.all().len(), 1);
}

#[tokio::test]
async fn should_scope_idempotency_key_to_organisation() {
    let org_a = Uuid::now_v7();
    let org_b = Uuid::now_v7();
    let h = harness(org_a).with_retry_policy(test_retry_policy(org_b, vec![3, 7, 14]));
    let mut event_a = test_event(org_a, "AM04");
    event_a.idempotency_key = "evt-42".to_owned();
    let mut event_b = test_event(org_b, "AM04");
    event_b.idempotency_key = "evt-42".to_owned();

    let a = h.rejections().execute(event_a, rejected_at()).await.unwrap();
    let b = h.rejections().execute(event_b, rejected_at()).await.unwrap();

    assert!(a.processed);
    assert!(b.processed);
    assert_ne!(a.retry_schedule_id, b.retry_schedule_id);
    assert_eq!(h.schedules.count(), 2);
    let schedule_b = h.schedules.get(b.retry_schedule_id.unwrap());
    assert_eq!(schedule_b.organisation_id, org_b);
}

#[tokio::test]
async fn should_resolve_non_retryable_code_without_attempts() {
    let org = Uuid::now_v7();
    let h = harness(org);

    let result = h
        .rejections()
        .execute(test_event(org, "AC01"), rejected_at())
        .await
        .unwrap();

    assert!(result.processed);
    assert_eq!(result.eligibility, Eligibility::NotEligibleNonRetryableCode);
    let id = result.retry_schedule_id.unwrap();
    let schedule = h.schedules.get(id);
    assert!(schedule.is_resolved);
    assert_eq!(schedule.next_retry_date, None);
    assert_eq!(schedule.resolution_reason.as_deref(), Some(NON_RETRYABLE_CODE));

    let report = h.executor().execute(id, None, march_cutoff(5)).await.unwrap();
    assert_eq!(report.outcome, AttemptOutcome::Skipped(SKIP_RESOLVED));
    assert!(h.attempts.for_schedule(id).is_empty());
    assert!(h.gateway.submitted().is_empty());
}

#[tokio::test]
async fn should_respect_am04_switch() {
    let org = Uuid::now_v7();
    let mut policy = test_retry_policy(org, vec![3, 7, 14]);
    policy.rules.retry_on_am04 = false;
    let h = Harness::default().with_retry_policy(policy);

    let result = h
        .rejections()
        .execute(test_event(org, "AM04"), rejected_at())
        .await
        .unwrap();

    assert_eq!(result.eligibility, Eligibility::NotEligibleNonRetryableCode);
}

#[tokio::test]
async fn should_retry_builtin_retryable_code_under_default_policy() {
    let org = Uuid::now_v7();
    let h = harness(org);

    let result = h
        .rejections()
        .execute(test_event(org, "AC04"), rejected_at())
        .await
        .unwrap();

    assert_eq!(result.eligibility, Eligibility::Eligible);
}

#[tokio::test]
async fn should_retry_code_on_policy_allow_list() {
    let org = Uuid::now_v7();
    let mut policy = test_retry_policy(org, vec![3, 7, 14]);
    policy.rules.retryable_codes = vec!["AC01".to_owned()];
    let h = Harness::default().with_retry_policy(policy);

    let result = h
        .rejections()
        .execute(test_event(org, "AC01"), rejected_at())
        .await
        .unwrap();

    assert_eq!(result.eligibility, Eligibility::Eligible);
    let schedule = h.schedules.get(result.retry_schedule_id.unwrap());
    assert_eq!(schedule.next_retry_date, Some(march_cutoff(5)));
}

#[tokio::test]
async fn should_resolve_when_first_retry_exceeds_max_days() {
    let org = Uuid::now_v7();
    let mut policy = test_retry_policy(org, vec![10]);
    policy.rules.max_total_days = 5;
    let h = Harness::default().with_retry_policy(policy);

    let result = h
        .rejections()
        .execute(test_event(org, "MS03"), rejected_at())
        .await
        .unwrap();

    assert_eq!(result.eligibility, Eligibility::NotEligibleMaxDays);
}

#[tokio::test]
async fn should_fail_without_applicable_policy() {
    let org = Uuid::now_v7();
    let h = harness(Uuid::now_v7());

    let result = h
        .rejections()
        .execute(test_event(org, "AM04"), rejected_at())
        .await;

    assert!(
        matches!(result, Err(RetryServiceError::NoPolicyFound)),
        "expected NoPolicyFound, got {result:?}"
    );
    assert_eq!(h.schedules.count(), 0);
}

#[tokio::test]
async fn should_reject_non_positive_amount() {
    let org = Uuid::now_v7();
    let h = harness(org);
    let mut event = test_event(org, "AM04");
    event.amount_cents = 0;

    let result = h.rejections().execute(event, rejected_at()).await;

    assert!(matches!(result, Err(RetryServiceError::Validation(_))));
}

#[tokio::test]
async fn should_reject_event_without_any_key() {
    let org = Uuid::now_v7();
    let h = harness(org);
    let mut event = test_event(org, "AM04");
    event.idempotency_key = String::new();
    event.event_id = "  ".to_owned();

    let result = h.rejections().execute(event, rejected_at()).await;

    assert!(matches!(result, Err(RetryServiceError::Validation(_))));
}

// ── Initial reminders ────────────────────────────────────────────────────────

#[tokio::test]
async fn should_plan_rejection_reminder() {
    let org = Uuid::now_v7();
    let h = harness(org).with_reminder_policy(test_reminder_policy(org));

    let result = h
        .rejections()
        .execute(test_event(org, "AM04"), rejected_at())
        .await
        .unwrap();

    assert_eq!(result.reminder_ids.len(), 1);
    let reminder = &h.reminders.all()[0];
    assert_eq!(reminder.status, ReminderStatus::Pending);
    assert_eq!(reminder.channel, ReminderChannel::Email);
    assert_eq!(reminder.planned_at, rejected_at());
    assert_eq!(Some(reminder.retry_schedule_id), result.retry_schedule_id);
}

#[tokio::test]
async fn should_skip_reminder_for_opted_out_client() {
    let org = Uuid::now_v7();
    let h = harness(org).with_reminder_policy(test_reminder_policy(org));
    let event = test_event(org, "AM04");
    h.opt_outs
        .opt_out(org, event.client_id, ReminderChannel::Email)
        .await
        .unwrap();

    let result = h.rejections().execute(event, rejected_at()).await.unwrap();

    assert!(result.processed);
    assert!(result.reminder_ids.is_empty());
    assert!(h.reminders.all().is_empty());
}

#[tokio::test]
async fn should_apply_cooldown_across_channels() {
    let org = Uuid::now_v7();
    let mut policy = test_reminder_policy(org);
    policy.throttle.cooldown_hours = 24;
    policy.trigger_rules.push(TriggerRule {
        id: Uuid::now_v7(),
        trigger: ReminderTrigger::RejectionReceived,
        channel: ReminderChannel::Sms,
        delay_hours: 0,
        template_id: "rejection-sms".to_owned(),
        order: 1,
    });
    let h = harness(org).with_reminder_policy(policy);

    let result = h
        .rejections()
        .execute(test_event(org, "AM04"), rejected_at())
        .await
        .unwrap();

    assert_eq!(result.reminder_ids.len(), 1);
    let reminders = h.reminders.all();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].channel, ReminderChannel::Email);
}

#[tokio::test]
async fn should_not_plan_reminders_for_resolved_schedule() {
    let org = Uuid::now_v7();
    let h = harness(org).with_reminder_policy(test_reminder_policy(org));

    let result = h
        .rejections()
        .execute(test_event(org, "MD01"), rejected_at())
        .await
        .unwrap();

    assert_eq!(result.eligibility, Eligibility::NotEligibleNonRetryableCode);
    assert!(result.reminder_ids.is_empty());
}
