use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

text_enum!(JobStatus, "job status", {
    Pending => "PENDING",
    Running => "RUNNING",
    Completed => "COMPLETED",
    Failed => "FAILED",
    Partial => "PARTIAL",
});

impl JobStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Outcome of a finished run from its counters.
    pub fn from_counts(successful: u32, failed: u32) -> Self {
        match (successful, failed) {
            (_, 0) => Self::Completed,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryJob {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub target_date: NaiveDate,
    pub timezone: String,
    pub cutoff_time: NaiveTime,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_attempts: u32,
    pub successful_attempts: u32,
    pub failed_attempts: u32,
    pub skipped_attempts: u32,
    pub failed_schedule_ids: Vec<Uuid>,
    pub triggered_by: String,
    pub is_manual: bool,
    pub dry_run: bool,
    pub idempotency_key: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `"{org}:{date}:{cutoff}"` for the daily run of one organisation.
pub fn daily_job_key(organisation_id: Uuid, date: NaiveDate, cutoff: NaiveTime) -> String {
    format!("{organisation_id}:{date}:{}", cutoff.format("%H:%M:%S"))
}
