//! Pure retry-eligibility and retry-date rules.
//!
//! Everything here is deterministic in its inputs so the same policy and
//! rejection code always produce the same decision.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::calendar::{BusinessCalendar, RunWindow};
use crate::domain::policy::{BackoffStrategy, RetryRules};
use crate::domain::schedule::{Eligibility, NON_RETRYABLE_CODE};

/// SEPA reasons refused unless a policy allow-lists them (invalid IBAN,
/// wrong account type, whitelist refusals, duplicates, recalls).
pub const BUILTIN_NON_RETRYABLE: &[&str] = &["AC01", "AC13", "CNOR", "DNOR", "FF05", "FOCR"];

/// Reasons retried under every policy. A policy allow-list adds to these.
pub const BUILTIN_RETRYABLE: &[&str] = &["AC04", "AC06", "AG01", "MS02", "MS03"];

/// Insufficient-funds class, governed by the policy's own flag.
pub const AM04: &str = "AM04";

/// Upper-case, trimmed form of a reason code as received.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// ISO reason root of a code: `"am04_insufficient_funds"` → `"AM04"`.
pub fn reason_root(code: &str) -> String {
    let normalized = normalize_code(code);
    match normalized.split_once('_') {
        Some((root, _)) => root.to_owned(),
        None => normalized,
    }
}

fn listed(list: &[String], root: &str) -> bool {
    list.iter().any(|entry| reason_root(entry) == root)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityDecision {
    pub eligibility: Eligibility,
    pub reason: &'static str,
}

impl EligibilityDecision {
    fn eligible(reason: &'static str) -> Self {
        Self {
            eligibility: Eligibility::Eligible,
            reason,
        }
    }

    fn non_retryable(reason: &'static str) -> Self {
        Self {
            eligibility: Eligibility::NotEligibleNonRetryableCode,
            reason,
        }
    }
}

/// Decide whether `code` may be retried under `rules`.
///
/// Only the policy deny-list overrides the policy allow-list; the built-in
/// sets apply to codes the policy does not mention.
pub fn evaluate(rules: &RetryRules, code: &str) -> EligibilityDecision {
    let root = reason_root(code);

    if listed(&rules.non_retryable_codes, &root) {
        return EligibilityDecision::non_retryable(NON_RETRYABLE_CODE);
    }
    if root == AM04 {
        return if rules.retry_on_am04 {
            EligibilityDecision::eligible("AM04_RETRY_ENABLED")
        } else {
            EligibilityDecision::non_retryable("AM04_RETRY_DISABLED")
        };
    }
    if listed(&rules.retryable_codes, &root) {
        return EligibilityDecision::eligible("POLICY_RETRYABLE_CODE");
    }
    if BUILTIN_NON_RETRYABLE.contains(&root.as_str()) {
        return EligibilityDecision::non_retryable(NON_RETRYABLE_CODE);
    }
    if BUILTIN_RETRYABLE.contains(&root.as_str()) {
        EligibilityDecision::eligible("RETRYABLE_CODE")
    } else {
        EligibilityDecision::non_retryable(NON_RETRYABLE_CODE)
    }
}

/// Delay before the retry with zero-based index `attempt_index`.
///
/// `Fixed` walks the configured list and keeps using the last entry once the
/// list is exhausted. `Linear` and `Exponential` scale the first entry.
pub fn delay_days(rules: &RetryRules, attempt_index: u32) -> u32 {
    let first = rules.retry_delays_days.first().copied().unwrap_or(1);
    match rules.backoff {
        BackoffStrategy::Fixed => rules
            .retry_delays_days
            .get(attempt_index as usize)
            .or(rules.retry_delays_days.last())
            .copied()
            .unwrap_or(first),
        BackoffStrategy::Linear => first.saturating_mul(attempt_index.saturating_add(1)),
        BackoffStrategy::Exponential => {
            first.saturating_mul(2u32.saturating_pow(attempt_index))
        }
    }
}

/// Retry date `delay` days after `base`, rolled onto a business day and set
/// to the run window's cutoff.
pub fn plan_retry_date<C: BusinessCalendar + ?Sized>(
    base: DateTime<Utc>,
    delay: u32,
    window: &RunWindow,
    calendar: &C,
) -> DateTime<Utc> {
    let target = window.local_date(base) + Duration::days(i64::from(delay));
    window.cutoff_on(window.roll_forward(calendar, target))
}

/// Last local date a retry may still be planned for.
pub fn retry_deadline(
    rules: &RetryRules,
    rejection_date: DateTime<Utc>,
    window: &RunWindow,
) -> NaiveDate {
    window.local_date(rejection_date) + Duration::days(i64::from(rules.max_total_days))
}

/// Whether a retry planned at `next` falls after the day budget. Compared on
/// local dates so the hour the rejection arrived does not matter.
pub fn past_deadline(
    rules: &RetryRules,
    rejection_date: DateTime<Utc>,
    next: DateTime<Utc>,
    window: &RunWindow,
) -> bool {
    window.local_date(next) > retry_deadline(rules, rejection_date, window)
}

/// Whole local days between the rejection and `now`.
pub fn elapsed_days(rejection_date: DateTime<Utc>, now: DateTime<Utc>, window: &RunWindow) -> i64 {
    (window.local_date(now) - window.local_date(rejection_date)).num_days()
}
