use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Retry service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum RetryServiceError {
    #[error("retry policy not found")]
    RetryPolicyNotFound,
    #[error("reminder policy not found")]
    ReminderPolicyNotFound,
    #[error("retry schedule not found")]
    ScheduleNotFound,
    #[error("retry attempt not found")]
    AttemptNotFound,
    #[error("reminder not found")]
    ReminderNotFound,
    #[error("retry job not found")]
    JobNotFound,
    #[error("retry schedule already resolved")]
    ScheduleAlreadyResolved,
    #[error("retry job already active")]
    JobAlreadyActive,
    #[error("reminder is not pending")]
    ReminderNotPending,
    #[error("no applicable retry policy")]
    NoPolicyFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("external capability failed: {0}")]
    External(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl RetryServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RetryPolicyNotFound => "RETRY_POLICY_NOT_FOUND",
            Self::ReminderPolicyNotFound => "REMINDER_POLICY_NOT_FOUND",
            Self::ScheduleNotFound => "SCHEDULE_NOT_FOUND",
            Self::AttemptNotFound => "ATTEMPT_NOT_FOUND",
            Self::ReminderNotFound => "REMINDER_NOT_FOUND",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::ScheduleAlreadyResolved => "SCHEDULE_ALREADY_RESOLVED",
            Self::JobAlreadyActive => "JOB_ALREADY_ACTIVE",
            Self::ReminderNotPending => "REMINDER_NOT_PENDING",
            Self::NoPolicyFound => "NO_POLICY_FOUND",
            Self::Validation(_) => "VALIDATION",
            Self::External(_) => "EXTERNAL_FAILURE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl IntoResponse for RetryServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::RetryPolicyNotFound
            | Self::ReminderPolicyNotFound
            | Self::ScheduleNotFound
            | Self::AttemptNotFound
            | Self::ReminderNotFound
            | Self::JobNotFound => StatusCode::NOT_FOUND,
            Self::ScheduleAlreadyResolved | Self::JobAlreadyActive | Self::ReminderNotPending => {
                StatusCode::CONFLICT
            }
            Self::NoPolicyFound => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
