//! Reminder lifecycle, delivery-status mapping and creation-time throttling.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::policy::ThrottleRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderChannel {
    Email,
    Sms,
    PhoneCall,
    PushNotification,
    PostalMail,
}

text_enum!(ReminderChannel, "reminder channel", {
    Email => "EMAIL",
    Sms => "SMS",
    PhoneCall => "PHONE_CALL",
    PushNotification => "PUSH_NOTIFICATION",
    PostalMail => "POSTAL_MAIL",
});

/// Event on a schedule or attempt that may produce reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderTrigger {
    RejectionReceived,
    BeforeRetry,
    AfterRetryFailed,
    Manual,
}

text_enum!(ReminderTrigger, "reminder trigger", {
    RejectionReceived => "REJECTION_RECEIVED",
    BeforeRetry => "BEFORE_RETRY",
    AfterRetryFailed => "AFTER_RETRY_FAILED",
    Manual => "MANUAL",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Cancelled,
    Bounced,
    Opened,
    Clicked,
}

text_enum!(ReminderStatus, "reminder status", {
    Pending => "PENDING",
    Sent => "SENT",
    Delivered => "DELIVERED",
    Failed => "FAILED",
    Cancelled => "CANCELLED",
    Bounced => "BOUNCED",
    Opened => "OPENED",
    Clicked => "CLICKED",
});

/// Status vocabulary reported by delivery webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Bounced,
    Opened,
    Clicked,
    Failed,
}

impl DeliveryStatus {
    pub fn reminder_status(self) -> ReminderStatus {
        match self {
            Self::Delivered => ReminderStatus::Delivered,
            Self::Bounced => ReminderStatus::Bounced,
            Self::Opened => ReminderStatus::Opened,
            Self::Clicked => ReminderStatus::Clicked,
            Self::Failed => ReminderStatus::Failed,
        }
    }
}

pub const INITIAL_ATTEMPT_SEGMENT: &str = "initial";

/// `"{schedule}:{trigger}:{channel}:{attempt | initial}"`
pub fn reminder_idempotency_key(
    schedule_id: Uuid,
    trigger: ReminderTrigger,
    channel: ReminderChannel,
    attempt_id: Option<Uuid>,
) -> String {
    let attempt = attempt_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| INITIAL_ATTEMPT_SEGMENT.to_owned());
    format!("{schedule_id}:{trigger}:{channel}:{attempt}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Uuid,
    pub retry_schedule_id: Uuid,
    pub retry_attempt_id: Option<Uuid>,
    pub client_id: Uuid,
    pub reminder_policy_id: Uuid,
    pub trigger_rule_id: Uuid,
    pub channel: ReminderChannel,
    pub template_id: String,
    pub template_variables: serde_json::Value,
    pub trigger: ReminderTrigger,
    pub planned_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub status: ReminderStatus,
    pub provider_name: Option<String>,
    pub provider_message_id: Option<String>,
    pub delivery_status_raw: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub idempotency_key: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderFilter {
    pub status: Option<ReminderStatus>,
    pub channel: Option<ReminderChannel>,
    pub retry_schedule_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

impl ReminderFilter {
    pub fn matches(&self, reminder: &Reminder) -> bool {
        self.status.is_none_or(|s| reminder.status == s)
            && self.channel.is_none_or(|c| reminder.channel == c)
            && self
                .retry_schedule_id
                .is_none_or(|id| reminder.retry_schedule_id == id)
            && self.client_id.is_none_or(|id| reminder.client_id == id)
    }
}

// ── Throttling ───────────────────────────────────────────────────────────────

/// The client's reminder footprint, loaded before a rule is expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientReminderHistory {
    pub opted_out: bool,
    /// Live reminders on any channel inside the cooldown window.
    pub within_cooldown: u64,
    pub planned_same_day: u64,
    pub planned_last_week: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThrottleRejection {
    OptedOut,
    OutsideAllowedDays,
    OutsideAllowedHours,
    Cooldown,
    DailyCapReached,
    WeeklyCapReached,
}

/// Bounds of the calendar day containing `at`, in `zone`, as UTC instants.
pub fn local_day_bounds(at: DateTime<Utc>, zone: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let local = at.with_timezone(&zone);
    let start = local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(zone).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(at);
    (start, start + Duration::days(1))
}

/// Decide whether a reminder planned at `planned_at` may be created.
pub fn check_throttle(
    rules: &ThrottleRules,
    planned_at: DateTime<Utc>,
    zone: Tz,
    history: &ClientReminderHistory,
) -> Result<(), ThrottleRejection> {
    if rules.respect_opt_out && history.opted_out {
        return Err(ThrottleRejection::OptedOut);
    }

    let local = planned_at.with_timezone(&zone);
    if !rules
        .allowed_days_of_week
        .contains(&local.weekday().number_from_monday())
    {
        return Err(ThrottleRejection::OutsideAllowedDays);
    }
    let hour = local.hour();
    if hour < rules.allowed_start_hour || hour >= rules.allowed_end_hour {
        return Err(ThrottleRejection::OutsideAllowedHours);
    }

    if rules.cooldown_hours > 0 && history.within_cooldown > 0 {
        return Err(ThrottleRejection::Cooldown);
    }

    if history.planned_same_day >= u64::from(rules.max_reminders_per_day) {
        return Err(ThrottleRejection::DailyCapReached);
    }
    if history.planned_last_week >= u64::from(rules.max_reminders_per_week) {
        return Err(ThrottleRejection::WeeklyCapReached);
    }
    Ok(())
}
