use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Scheduled,
    InProgress,
    Submitted,
    Succeeded,
    Failed,
    Cancelled,
    Skipped,
}

text_enum!(AttemptStatus, "attempt status", {
    Scheduled => "SCHEDULED",
    InProgress => "IN_PROGRESS",
    Submitted => "SUBMITTED",
    Succeeded => "SUCCEEDED",
    Failed => "FAILED",
    Cancelled => "CANCELLED",
    Skipped => "SKIPPED",
});

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Skipped
        )
    }

    /// `IN_PROGRESS → FAILED` covers submissions the capability never
    /// accepted (transport errors, timeouts).
    pub fn can_transition_to(self, next: Self) -> bool {
        use AttemptStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (InProgress, Submitted)
                | (InProgress, Failed)
                | (Submitted, Succeeded)
                | (Submitted, Failed)
                | (Scheduled | InProgress, Cancelled)
                | (Scheduled | InProgress, Skipped)
        )
    }
}

pub const EXCEPTION_ERROR: &str = "EXCEPTION";
pub const TIMEOUT_ERROR: &str = "TIMEOUT";

/// `"{schedule}:{attempt_number}"`
pub fn attempt_idempotency_key(schedule_id: Uuid, attempt_number: u32) -> String {
    format!("{schedule_id}:{attempt_number}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryAttempt {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub retry_schedule_id: Uuid,
    pub attempt_number: u32,
    pub planned_date: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    pub psp_payment_id: Option<String>,
    pub psp_response: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub new_rejection_code: Option<String>,
    pub retry_job_id: Option<Uuid>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RetryAttempt {
    pub fn status_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "attemptNumber": self.attempt_number,
            "retryJobId": self.retry_job_id,
            "errorCode": self.error_code,
            "newRejectionCode": self.new_rejection_code,
        })
    }
}
