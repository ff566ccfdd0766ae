use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_domain::money::Currency;

use crate::domain::policy::{PolicyContext, RetryRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Eligibility {
    Eligible,
    NotEligibleNonRetryableCode,
    NotEligibleMaxAttempts,
    NotEligibleMaxDays,
    NotEligibleStopCondition,
    NotEligibleManualCancel,
}

text_enum!(Eligibility, "eligibility", {
    Eligible => "ELIGIBLE",
    NotEligibleNonRetryableCode => "NOT_ELIGIBLE_NON_RETRYABLE_CODE",
    NotEligibleMaxAttempts => "NOT_ELIGIBLE_MAX_ATTEMPTS",
    NotEligibleMaxDays => "NOT_ELIGIBLE_MAX_DAYS",
    NotEligibleStopCondition => "NOT_ELIGIBLE_STOP_CONDITION",
    NotEligibleManualCancel => "NOT_ELIGIBLE_MANUAL_CANCEL",
});

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        self == Self::Eligible
    }
}

pub const RETRY_SUCCEEDED: &str = "RETRY_SUCCEEDED";
pub const MAX_ATTEMPTS_REACHED: &str = "MAX_ATTEMPTS_REACHED";
pub const MAX_DAYS_EXCEEDED: &str = "MAX_DAYS_EXCEEDED";
pub const NON_RETRYABLE_CODE: &str = "NON_RETRYABLE_CODE";

/// Upstream event that may arrive more than once.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionEvent {
    pub event_id: String,
    pub organisation_id: Uuid,
    pub societe_id: Uuid,
    pub payment_id: Uuid,
    pub schedule_ref: String,
    pub invoice_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub client_id: Uuid,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub reason_code: String,
    pub reason_message: String,
    pub amount_cents: i64,
    pub currency: String,
    pub psp_name: String,
    pub psp_payment_id: Option<String>,
    pub rejected_at: DateTime<Utc>,
    #[serde(default)]
    pub idempotency_key: String,
}

impl RejectionEvent {
    /// The de-duplication key: the explicit key, or the event id.
    pub fn dedup_key(&self) -> &str {
        if self.idempotency_key.trim().is_empty() {
            self.event_id.trim()
        } else {
            self.idempotency_key.trim()
        }
    }

    pub fn policy_context(&self) -> PolicyContext {
        PolicyContext {
            organisation_id: self.organisation_id,
            societe_id: Some(self.societe_id),
            product_id: self.product_id,
            channel_id: self.channel_id,
        }
    }
}

/// Upstream facts that end a retry plan when the policy says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopCondition {
    PaymentSettled,
    ContractCancelled,
    MandateRevoked,
}

text_enum!(StopCondition, "stop condition", {
    PaymentSettled => "PAYMENT_SETTLED",
    ContractCancelled => "CONTRACT_CANCELLED",
    MandateRevoked => "MANDATE_REVOKED",
});

impl StopCondition {
    pub fn enabled_in(self, rules: &RetryRules) -> bool {
        match self {
            Self::PaymentSettled => rules.stop_on_payment_settled,
            Self::ContractCancelled => rules.stop_on_contract_cancelled,
            Self::MandateRevoked => rules.stop_on_mandate_revoked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrySchedule {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub societe_id: Uuid,
    pub original_payment_id: Uuid,
    pub schedule_ref: String,
    pub invoice_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub client_id: Uuid,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub rejection_code: String,
    pub rejection_raw_code: String,
    pub rejection_message: String,
    pub rejection_date: DateTime<Utc>,
    pub last_rejection_code: String,
    pub retry_policy_id: Uuid,
    pub rules: RetryRules,
    pub amount_cents: i64,
    pub currency: Currency,
    pub psp_name: String,
    pub psp_payment_id: Option<String>,
    pub eligibility: Eligibility,
    pub eligibility_reason: Option<String>,
    pub current_attempt: u32,
    pub max_attempts: u32,
    pub next_retry_date: Option<DateTime<Utc>>,
    pub is_resolved: bool,
    pub resolution_reason: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub event_id: String,
    pub idempotency_key: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RetrySchedule {
    /// Terminal transition. Clears the next retry date.
    pub fn resolve(&mut self, eligibility: Eligibility, reason: impl Into<String>, at: DateTime<Utc>) {
        let reason = reason.into();
        self.eligibility = eligibility;
        self.eligibility_reason = Some(reason.clone());
        self.is_resolved = true;
        self.resolution_reason = Some(reason);
        self.resolved_at = Some(at);
        self.next_retry_date = None;
        self.updated_at = at;
    }

    /// Keep the schedule open with a new retry date.
    pub fn plan_next(&mut self, date: DateTime<Utc>, at: DateTime<Utc>) {
        debug_assert!(!self.is_resolved);
        self.eligibility = Eligibility::Eligible;
        self.next_retry_date = Some(date);
        self.updated_at = at;
    }

    /// Due for an attempt at `cutoff`.
    pub fn is_due(&self, cutoff: DateTime<Utc>) -> bool {
        !self.is_resolved
            && self.eligibility.is_eligible()
            && self.next_retry_date.is_some_and(|d| d <= cutoff)
    }

    pub fn policy_context(&self) -> PolicyContext {
        PolicyContext {
            organisation_id: self.organisation_id,
            societe_id: Some(self.societe_id),
            product_id: self.product_id,
            channel_id: self.channel_id,
        }
    }

    /// Store `value` under `key` in the free-form metadata object.
    pub fn annotate(&mut self, key: &str, value: serde_json::Value) {
        if !self.metadata.is_object() {
            self.metadata = serde_json::json!({});
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.to_owned(), value);
        }
    }
}

/// Aggregates served by the metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleStatistics {
    pub total: u64,
    pub eligible: u64,
    pub resolved: u64,
    pub pending: u64,
    pub succeeded: u64,
    pub by_eligibility: Vec<(Eligibility, u64)>,
    pub avg_attempts_before_success: f64,
}

impl ScheduleStatistics {
    /// Fold `count` schedules sharing one state into the aggregate.
    /// `attempts` is the sum of their `current_attempt`.
    pub fn add(
        &mut self,
        eligibility: Eligibility,
        is_resolved: bool,
        resolution_reason: Option<&str>,
        count: u64,
        attempts: u64,
    ) {
        if count == 0 {
            return;
        }
        self.total += count;
        if is_resolved {
            self.resolved += count;
        } else {
            self.pending += count;
            if eligibility.is_eligible() {
                self.eligible += count;
            }
        }
        if is_resolved && resolution_reason == Some(RETRY_SUCCEEDED) {
            let before = self.avg_attempts_before_success * self.succeeded as f64;
            self.succeeded += count;
            self.avg_attempts_before_success = (before + attempts as f64) / self.succeeded as f64;
        }
        match self.by_eligibility.iter_mut().find(|(e, _)| *e == eligibility) {
            Some((_, n)) => *n += count,
            None => self.by_eligibility.push((eligibility, count)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleFilter {
    pub eligibility: Option<Eligibility>,
    pub is_resolved: Option<bool>,
    pub client_id: Option<Uuid>,
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &RetrySchedule) -> bool {
        self.eligibility.is_none_or(|e| schedule.eligibility == e)
            && self.is_resolved.is_none_or(|r| schedule.is_resolved == r)
            && self.client_id.is_none_or(|c| schedule.client_id == c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> RetrySchedule {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        RetrySchedule {
            id: Uuid::now_v7(),
            organisation_id: Uuid::now_v7(),
            societe_id: Uuid::now_v7(),
            original_payment_id: Uuid::now_v7(),
            schedule_ref: "SCH-1".into(),
            invoice_id: None,
            contract_id: None,
            client_id: Uuid::now_v7(),
            product_id: None,
            channel_id: None,
            rejection_code: "AM04".into(),
            rejection_raw_code: "AM04".into(),
            rejection_message: "insufficient funds".into(),
            rejection_date: at,
            last_rejection_code: "AM04".into(),
            retry_policy_id: Uuid::now_v7(),
            rules: RetryRules::default(),
            amount_cents: 4_990,
            currency: Currency::eur(),
            psp_name: "acme".into(),
            psp_payment_id: None,
            eligibility: Eligibility::Eligible,
            eligibility_reason: None,
            current_attempt: 0,
            max_attempts: 3,
            next_retry_date: Some(at + chrono::Duration::days(5)),
            is_resolved: false,
            resolution_reason: None,
            resolved_at: None,
            event_id: "evt-1".into(),
            idempotency_key: "evt-1".into(),
            metadata: serde_json::json!({}),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn should_clear_next_date_when_resolved() {
        let mut s = schedule();
        let at = s.created_at;
        s.resolve(Eligibility::NotEligibleManualCancel, "Manually cancelled: x", at);
        assert!(s.is_resolved);
        assert_eq!(s.next_retry_date, None);
        assert_eq!(s.resolution_reason.as_deref(), Some("Manually cancelled: x"));
        assert!(!s.is_due(at + chrono::Duration::days(30)));
    }

    #[test]
    fn should_be_due_only_from_next_date() {
        let s = schedule();
        let next = s.next_retry_date.unwrap();
        assert!(!s.is_due(next - chrono::Duration::seconds(1)));
        assert!(s.is_due(next));
    }

    #[test]
    fn should_annotate_non_object_metadata() {
        let mut s = schedule();
        s.metadata = serde_json::Value::Null;
        s.annotate("cancelReason", serde_json::json!("client paid"));
        assert_eq!(s.metadata["cancelReason"], "client paid");
    }

    #[test]
    fn should_fall_back_to_event_id_for_dedup() {
        let raw = serde_json::json!({
            "eventId": " evt-9 ",
            "organisationId": Uuid::nil(),
            "societeId": Uuid::nil(),
            "paymentId": Uuid::nil(),
            "scheduleRef": "S",
            "clientId": Uuid::nil(),
            "reasonCode": "MS02",
            "reasonMessage": "",
            "amountCents": 100,
            "currency": "EUR",
            "pspName": "acme",
            "rejectedAt": "2026-03-02T09:00:00Z"
        });
        let event: RejectionEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.dedup_key(), "evt-9");
    }

    #[test]
    fn should_tally_statistics() {
        let mut stats = ScheduleStatistics::default();
        stats.add(Eligibility::Eligible, false, None, 4, 2);
        stats.add(Eligibility::Eligible, true, Some(RETRY_SUCCEEDED), 2, 4);
        stats.add(Eligibility::Eligible, true, Some(RETRY_SUCCEEDED), 1, 3);
        stats.add(Eligibility::NotEligibleNonRetryableCode, true, Some(NON_RETRYABLE_CODE), 3, 0);
        assert_eq!(stats.total, 10);
        assert_eq!(stats.pending, 4);
        assert_eq!(stats.eligible, 4);
        assert_eq!(stats.resolved, 6);
        assert_eq!(stats.succeeded, 3);
        assert!((stats.avg_attempts_before_success - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            stats.by_eligibility,
            vec![
                (Eligibility::Eligible, 7),
                (Eligibility::NotEligibleNonRetryableCode, 3)
            ]
        );
    }
}
