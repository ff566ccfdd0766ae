use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use dunning_domain::actor::Actor;
use dunning_retry::domain::attempt::{AttemptStatus, RetryAttempt, attempt_idempotency_key};
use dunning_retry::domain::job::JobStatus;
use dunning_retry::domain::repository::RetryScheduleRepository;
use dunning_retry::domain::schedule::{
    Eligibility, MAX_ATTEMPTS_REACHED, MAX_DAYS_EXCEEDED, RETRY_SUCCEEDED, RetrySchedule,
};
use dunning_retry::error::RetryServiceError;
use dunning_retry::usecase::attempt::{AttemptOutcome, SKIP_ALREADY_PROCESSED, SKIP_RESOLVED};

use crate::helpers::{
    Harness, MockGateway, accepted, declined, march_cutoff, rejected_at, test_event,
    test_retry_policy,
};

async fn ingest(h: &Harness, org: Uuid, code: &str) -> Uuid {
    h.rejections()
        .execute(test_event(org, code), rejected_at())
        .await
        .unwrap()
        .retry_schedule_id
        .unwrap()
}

// ── ExecuteRetryAttempt ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_follow_delay_ladder_until_success() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![
            declined("AM04"),
            declined("AM04"),
            accepted(),
        ]));
    let id = ingest(&h, org, "AM04").await;
    let executor = h.executor();

    let first = executor.execute(id, None, march_cutoff(5)).await.unwrap();
    assert_eq!(first.outcome, AttemptOutcome::Failed);
    assert_eq!(first.schedule.current_attempt, 1);
    assert_eq!(first.schedule.next_retry_date, Some(march_cutoff(12)));

    let second = executor.execute(id, None, march_cutoff(12)).await.unwrap();
    assert_eq!(second.outcome, AttemptOutcome::Failed);
    assert_eq!(second.schedule.current_attempt, 2);
    assert_eq!(second.schedule.next_retry_date, Some(march_cutoff(26)));

    let third = executor.execute(id, None, march_cutoff(26)).await.unwrap();
    assert_eq!(third.outcome, AttemptOutcome::Succeeded);

    let schedule = h.schedules.get(id);
    assert!(schedule.is_resolved);
    assert_eq!(schedule.eligibility, Eligibility::Eligible);
    assert_eq!(schedule.resolution_reason.as_deref(), Some(RETRY_SUCCEEDED));
    assert_eq!(schedule.current_attempt, 3);
    assert_eq!(schedule.next_retry_date, None);

    let attempts = h.attempts.for_schedule(id);
    let numbers: Vec<u32> = attempts.iter().map(|a| a.attempt_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let statuses: Vec<AttemptStatus> = attempts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![AttemptStatus::Failed, AttemptStatus::Failed, AttemptStatus::Succeeded]
    );
    assert!(attempts[2].psp_payment_id.is_some());

    let events = h.audit.events_for(id);
    assert_eq!(events.first().map(String::as_str), Some("CREATED"));
    assert_eq!(events.last().map(String::as_str), Some("RESOLVED"));
}

#[tokio::test]
async fn should_submit_each_attempt_once_with_its_own_key() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7]))
        .with_gateway(MockGateway::scripted(vec![declined("AM04"), accepted()]));
    let id = ingest(&h, org, "AM04").await;

    h.executor().execute(id, None, march_cutoff(5)).await.unwrap();
    h.executor().execute(id, None, march_cutoff(12)).await.unwrap();

    let submitted = h.gateway.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0].attempt_number, 1);
    assert_eq!(submitted[1].attempt_number, 2);
    assert_ne!(submitted[0].idempotency_key, submitted[1].idempotency_key);
    assert_eq!(submitted[0].amount_cents, 4_990);
    assert_eq!(submitted[0].currency, "EUR");
}

#[tokio::test]
async fn should_reconcile_replayed_attempt_without_resubmitting() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![declined("AM04")]));
    let id = ingest(&h, org, "AM04").await;
    let before = h.schedules.get(id);

    h.executor().execute(id, None, march_cutoff(5)).await.unwrap();
    // Lose the schedule write, as if the process died right after the attempt.
    h.schedules.update(&before).await.unwrap();
    let replay = h.executor().execute(id, None, march_cutoff(6)).await.unwrap();

    assert_eq!(replay.outcome, AttemptOutcome::Failed);
    assert_eq!(h.gateway.submitted().len(), 1);
    assert_eq!(h.attempts.for_schedule(id).len(), 1);
    let schedule = h.schedules.get(id);
    assert_eq!(schedule.current_attempt, 1);
    assert_eq!(schedule.next_retry_date, Some(march_cutoff(12)));
}

#[tokio::test]
async fn should_resolve_schedule_after_failed_success_write() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![accepted()]));
    let id = ingest(&h, org, "AM04").await;
    h.schedules.fail_next_updates(1);

    let first = h.executor().execute(id, None, march_cutoff(5)).await;
    assert!(matches!(first, Err(RetryServiceError::External(_))));
    assert!(!h.schedules.get(id).is_resolved);
    assert_eq!(h.attempts.for_schedule(id)[0].status, AttemptStatus::Succeeded);

    let next_day = h.executor().execute(id, None, march_cutoff(6)).await.unwrap();

    assert_eq!(next_day.outcome, AttemptOutcome::Succeeded);
    assert!(next_day.resolved_schedule());
    let schedule = h.schedules.get(id);
    assert!(schedule.is_resolved);
    assert_eq!(schedule.resolution_reason.as_deref(), Some(RETRY_SUCCEEDED));
    assert_eq!(schedule.current_attempt, 1);
    assert_eq!(h.gateway.submitted().len(), 1);
}

fn in_flight_attempt(schedule: &RetrySchedule, updated_at: DateTime<Utc>) -> RetryAttempt {
    RetryAttempt {
        id: Uuid::now_v7(),
        organisation_id: schedule.organisation_id,
        retry_schedule_id: schedule.id,
        attempt_number: 1,
        planned_date: march_cutoff(5),
        executed_at: Some(updated_at),
        status: AttemptStatus::InProgress,
        psp_payment_id: None,
        psp_response: None,
        error_code: None,
        error_message: None,
        new_rejection_code: None,
        retry_job_id: None,
        idempotency_key: attempt_idempotency_key(schedule.id, 1),
        created_at: updated_at,
        updated_at,
    }
}

#[tokio::test]
async fn should_resubmit_abandoned_attempt_under_same_key() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![accepted()]));
    let id = ingest(&h, org, "AM04").await;
    let stuck = in_flight_attempt(&h.schedules.get(id), march_cutoff(5) - Duration::hours(1));
    h.attempts.attempts.lock().unwrap().push(stuck.clone());

    let report = h.executor().execute(id, None, march_cutoff(5)).await.unwrap();

    assert_eq!(report.outcome, AttemptOutcome::Succeeded);
    let submitted = h.gateway.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].idempotency_key, stuck.idempotency_key);
    let attempts = h.attempts.for_schedule(id);
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].id, stuck.id);
    assert_eq!(attempts[0].status, AttemptStatus::Succeeded);
    assert!(h.schedules.get(id).is_resolved);
}

#[tokio::test]
async fn should_leave_attempt_in_flight_elsewhere_alone() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![accepted()]));
    let id = ingest(&h, org, "AM04").await;
    let running = in_flight_attempt(&h.schedules.get(id), march_cutoff(5));
    h.attempts.attempts.lock().unwrap().push(running);

    let report = h.executor().execute(id, None, march_cutoff(5)).await.unwrap();

    assert_eq!(report.outcome, AttemptOutcome::Skipped(SKIP_ALREADY_PROCESSED));
    assert!(h.gateway.submitted().is_empty());
    assert_eq!(h.schedules.get(id).current_attempt, 0);
}

#[tokio::test]
async fn should_stop_at_max_attempts() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![
            declined("AM04"),
            declined("AM04"),
            declined("AM04"),
        ]));
    let id = ingest(&h, org, "AM04").await;

    for day in [5, 12, 26] {
        h.executor().execute(id, None, march_cutoff(day)).await.unwrap();
    }
    let schedule = h.schedules.get(id);
    assert!(schedule.is_resolved);
    assert_eq!(schedule.eligibility, Eligibility::NotEligibleMaxAttempts);
    assert_eq!(schedule.resolution_reason.as_deref(), Some(MAX_ATTEMPTS_REACHED));
    assert_eq!(schedule.current_attempt, 3);

    let late = h.executor().execute(id, None, march_cutoff(30)).await.unwrap();
    assert_eq!(late.outcome, AttemptOutcome::Skipped(SKIP_RESOLVED));
    assert_eq!(h.attempts.for_schedule(id).len(), 3);
    assert_eq!(h.gateway.submitted().len(), 3);
}

#[tokio::test]
async fn should_resolve_on_non_retryable_new_code() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![declined("md01")]));
    let id = ingest(&h, org, "AM04").await;

    let report = h.executor().execute(id, None, march_cutoff(5)).await.unwrap();

    assert_eq!(report.outcome, AttemptOutcome::Failed);
    assert!(report.resolved_schedule());
    let schedule = h.schedules.get(id);
    assert_eq!(schedule.eligibility, Eligibility::NotEligibleNonRetryableCode);
    assert_eq!(schedule.last_rejection_code, "MD01");
    assert_eq!(schedule.rejection_code, "AM04");
    assert_eq!(
        h.attempts.for_schedule(id)[0].new_rejection_code.as_deref(),
        Some("MD01")
    );
}

#[tokio::test]
async fn should_resolve_when_next_retry_passes_deadline() {
    let org = Uuid::now_v7();
    let mut policy = test_retry_policy(org, vec![3, 14]);
    policy.rules.max_total_days = 12;
    let h = Harness::default()
        .with_retry_policy(policy)
        .with_gateway(MockGateway::scripted(vec![declined("AM04")]));
    let id = ingest(&h, org, "AM04").await;

    h.executor().execute(id, None, march_cutoff(5)).await.unwrap();

    let schedule = h.schedules.get(id);
    assert!(schedule.is_resolved);
    assert_eq!(schedule.eligibility, Eligibility::NotEligibleMaxDays);
    assert_eq!(schedule.resolution_reason.as_deref(), Some(MAX_DAYS_EXCEEDED));
}

#[tokio::test]
async fn should_fail_for_unknown_schedule() {
    let h = Harness::default();

    let result = h
        .executor()
        .execute(Uuid::now_v7(), None, march_cutoff(5))
        .await;

    assert!(matches!(result, Err(RetryServiceError::ScheduleNotFound)));
}

// ── ProcessDueRetries ────────────────────────────────────────────────────────

#[tokio::test]
async fn should_run_daily_job_once_per_date() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![accepted()]));
    let id = ingest(&h, org, "AM04").await;
    let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();

    let job = h
        .due_retries()
        .execute(org, date, false, Actor::scheduler(), march_cutoff(5))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_attempts, 1);
    assert_eq!(job.successful_attempts, 1);
    assert!(job.completed_at.is_some());

    let again = h
        .due_retries()
        .execute(org, date, false, Actor::scheduler(), march_cutoff(5))
        .await
        .unwrap();
    assert_eq!(again.id, job.id);
    assert_eq!(h.gateway.submitted().len(), 1);
    assert_eq!(h.attempts.for_schedule(id)[0].retry_job_id, Some(job.id));
}

#[tokio::test]
async fn should_leave_schedules_untouched_on_dry_run() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    let id = ingest(&h, org, "AM04").await;

    let job = h
        .due_retries()
        .run_now(org, None, true, Actor::user(None), march_cutoff(6))
        .await
        .unwrap();

    assert!(job.dry_run);
    assert!(job.is_manual);
    assert_eq!(job.total_attempts, 1);
    assert_eq!(job.skipped_attempts, 1);
    assert!(h.gateway.submitted().is_empty());
    assert_eq!(h.schedules.get(id).current_attempt, 0);
}

#[tokio::test]
async fn should_skip_schedules_not_yet_due() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    ingest(&h, org, "AM04").await;
    let date = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();

    let jobs = h.due_retries().run_daily(date, march_cutoff(4)).await.unwrap();

    assert!(jobs.is_empty());
    assert!(h.gateway.submitted().is_empty());
}

#[tokio::test]
async fn should_count_failures_in_partial_daily_run() {
    let org = Uuid::now_v7();
    let h = Harness::default()
        .with_retry_policy(test_retry_policy(org, vec![3, 7, 14]))
        .with_gateway(MockGateway::scripted(vec![accepted(), declined("AM04")]));
    ingest(&h, org, "AM04").await;
    let failing = ingest(&h, org, "MS03").await;
    let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();

    let jobs = h.due_retries().run_daily(date, march_cutoff(5)).await.unwrap();

    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.status, JobStatus::Partial);
    assert_eq!(job.successful_attempts, 1);
    assert_eq!(job.failed_attempts, 1);
    assert_eq!(job.failed_schedule_ids, vec![failing]);
}

#[tokio::test]
async fn should_refuse_manual_run_for_resolved_schedule() {
    let org = Uuid::now_v7();
    let h = Harness::default().with_retry_policy(test_retry_policy(org, vec![3, 7, 14]));
    let id = ingest(&h, org, "AC01").await;

    let result = h
        .due_retries()
        .run_now(org, Some(id), false, Actor::user(None), march_cutoff(5))
        .await;

    assert!(matches!(result, Err(RetryServiceError::ScheduleAlreadyResolved)));
}
