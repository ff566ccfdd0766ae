//! Periodic drivers: the daily retry run and the reminder sweep.
//!
//! Both loops log failures and keep going; the next tick retries.

use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{info, warn};

use crate::domain::calendar::RunWindow;
use crate::state::AppState;

/// Local date and UTC instant of the next daily run strictly after `now`.
pub fn next_daily_run(window: &RunWindow, now: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>) {
    let today = window.local_date(now);
    let cutoff = window.cutoff_on(today);
    if now < cutoff {
        return (today, cutoff);
    }
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    (tomorrow, window.cutoff_on(tomorrow))
}

async fn run_daily_once(state: &AppState, date: NaiveDate) {
    match state.process_due_retries().run_daily(date, Utc::now()).await {
        Ok(jobs) => info!(%date, jobs = jobs.len(), "daily retry run finished"),
        Err(e) => warn!(%date, error = %e, "daily retry run failed"),
    }
}

/// Runs the daily retry job at the configured wall-clock time. When started
/// after today's run time, today's run is caught up first; jobs are keyed per
/// date so a repeated run returns the existing job.
pub async fn daily_retry_driver(state: AppState) {
    let window = state.window;
    let now = Utc::now();
    let today = window.local_date(now);
    if now >= window.cutoff_on(today) {
        run_daily_once(&state, today).await;
    }

    loop {
        let (date, at) = next_daily_run(&window, Utc::now());
        let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        info!(%date, run_at = %at, "next daily retry run scheduled");
        sleep(wait).await;
        run_daily_once(&state, date).await;
    }
}

/// Sends due reminders every `period`.
pub async fn reminder_sweep_driver(state: AppState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if let Err(e) = state.process_pending_reminders().execute(Utc::now()).await {
            warn!(error = %e, "reminder sweep failed");
        }
    }
}
