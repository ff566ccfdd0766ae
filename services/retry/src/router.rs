use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use dunning_core::health::healthz;
use dunning_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    audit::{get_entity_history, list_audit_logs},
    health::readyz,
    job::{get_job, list_jobs, run_now},
    opt_out::{opt_in, opt_out},
    rejection::{check_eligibility, handle_rejection},
    reminder::{create_reminders, delivery_status, get_reminder, list_reminders, send_reminder},
    reminder_policy::{
        create_reminder_policy, delete_reminder_policy, get_reminder_policy,
        list_reminder_policies, update_reminder_policy,
    },
    retry_policy::{
        create_retry_policy, delete_retry_policy, get_retry_policy, list_retry_policies,
        update_retry_policy,
    },
    schedule::{
        apply_stop_condition, cancel_schedule, get_attempt, get_retry_metrics, get_schedule,
        list_attempts, list_schedules, replan_schedule,
    },
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Retry policies
        .route(
            "/retry-policies",
            post(create_retry_policy).get(list_retry_policies),
        )
        .route(
            "/retry-policies/{id}",
            get(get_retry_policy)
                .patch(update_retry_policy)
                .delete(delete_retry_policy),
        )
        // Reminder policies
        .route(
            "/reminder-policies",
            post(create_reminder_policy).get(list_reminder_policies),
        )
        .route(
            "/reminder-policies/{id}",
            get(get_reminder_policy)
                .patch(update_reminder_policy)
                .delete(delete_reminder_policy),
        )
        // Rejections
        .route("/rejections", post(handle_rejection))
        .route("/eligibility-checks", post(check_eligibility))
        // Schedules
        .route("/retry-schedules", get(list_schedules))
        .route("/retry-schedules/{id}", get(get_schedule))
        .route("/retry-schedules/{id}/cancel", post(cancel_schedule))
        .route("/retry-schedules/{id}/replan", post(replan_schedule))
        .route(
            "/retry-schedules/{id}/stop-conditions",
            post(apply_stop_condition),
        )
        .route("/retry-schedules/{id}/attempts", get(list_attempts))
        .route("/retry-attempts/{id}", get(get_attempt))
        // Jobs
        .route("/retry-jobs/run-now", post(run_now))
        .route("/retry-jobs", get(list_jobs))
        .route("/retry-jobs/{id}", get(get_job))
        // Reminders
        .route("/reminders", get(list_reminders).post(create_reminders))
        .route("/reminders/{id}", get(get_reminder))
        .route("/reminders/{id}/send", post(send_reminder))
        .route("/webhooks/delivery-status", post(delivery_status))
        // Audit
        .route("/audit-logs", get(list_audit_logs))
        .route(
            "/audit-logs/{entity_type}/{entity_id}",
            get(get_entity_history),
        )
        // Metrics
        .route("/metrics/retry", get(get_retry_metrics))
        // Opt-outs
        .route(
            "/opt-outs/{client_id}/{channel}",
            put(opt_out).delete(opt_in),
        )
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
