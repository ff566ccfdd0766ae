//! Retry and reminder policies, and the scope-based resolution rule shared
//! by both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reminder::{ReminderChannel, ReminderTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackoffStrategy {
    #[default]
    Fixed,
    Linear,
    Exponential,
}

text_enum!(BackoffStrategy, "backoff strategy", {
    Fixed => "FIXED",
    Linear => "LINEAR",
    Exponential => "EXPONENTIAL",
});

/// Optional narrowing of a policy below the organisation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyScope {
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
}

impl PolicyScope {
    /// Number of scope fields that are set.
    pub fn specificity(&self) -> u8 {
        [self.societe_id, self.product_id, self.channel_id]
            .iter()
            .filter(|f| f.is_some())
            .count() as u8
    }

    /// A scope matches when every set field equals the context's field.
    pub fn matches(&self, ctx: &PolicyContext) -> bool {
        fn field(scope: Option<Uuid>, ctx: Option<Uuid>) -> bool {
            scope.is_none() || scope == ctx
        }
        field(self.societe_id, ctx.societe_id)
            && field(self.product_id, ctx.product_id)
            && field(self.channel_id, ctx.channel_id)
    }
}

/// What a policy is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyContext {
    pub organisation_id: Uuid,
    pub societe_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
}

/// Fields the resolution rule needs from either policy kind.
pub trait ScopedPolicy {
    fn organisation_id(&self) -> Uuid;
    fn scope(&self) -> &PolicyScope;
    fn priority(&self) -> i32;
    fn is_default(&self) -> bool;
    fn is_active(&self) -> bool;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Pick the single best policy for `ctx`.
///
/// Candidates are active policies of the organisation whose scope matches.
/// Among them: more set scope fields first, then higher priority, then the
/// default-flagged policy, then the oldest.
pub fn resolve<'a, P: ScopedPolicy>(candidates: &'a [P], ctx: &PolicyContext) -> Option<&'a P> {
    candidates
        .iter()
        .filter(|p| {
            p.is_active() && p.organisation_id() == ctx.organisation_id && p.scope().matches(ctx)
        })
        .min_by(|a, b| {
            b.scope()
                .specificity()
                .cmp(&a.scope().specificity())
                .then_with(|| b.priority().cmp(&a.priority()))
                .then_with(|| b.is_default().cmp(&a.is_default()))
                .then_with(|| a.created_at().cmp(&b.created_at()))
        })
}

// ── RetryPolicy ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryPolicy {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub scope: PolicyScope,
    pub name: String,
    pub description: Option<String>,
    pub rules: RetryRules,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The part of a retry policy a schedule freezes at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRules {
    pub retry_delays_days: Vec<u32>,
    pub max_attempts: u32,
    pub max_total_days: u32,
    pub retry_on_am04: bool,
    pub retryable_codes: Vec<String>,
    pub non_retryable_codes: Vec<String>,
    pub stop_on_payment_settled: bool,
    pub stop_on_contract_cancelled: bool,
    pub stop_on_mandate_revoked: bool,
    pub backoff: BackoffStrategy,
}

impl Default for RetryRules {
    fn default() -> Self {
        Self {
            retry_delays_days: vec![5, 10, 20],
            max_attempts: 3,
            max_total_days: 30,
            retry_on_am04: true,
            retryable_codes: Vec::new(),
            non_retryable_codes: Vec::new(),
            stop_on_payment_settled: true,
            stop_on_contract_cancelled: true,
            stop_on_mandate_revoked: true,
            backoff: BackoffStrategy::Fixed,
        }
    }
}

impl ScopedPolicy for RetryPolicy {
    fn organisation_id(&self) -> Uuid {
        self.organisation_id
    }
    fn scope(&self) -> &PolicyScope {
        &self.scope
    }
    fn priority(&self) -> i32 {
        self.priority
    }
    fn is_default(&self) -> bool {
        self.is_default
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ── ReminderPolicy ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub id: Uuid,
    pub trigger: ReminderTrigger,
    pub channel: ReminderChannel,
    pub delay_hours: u32,
    pub template_id: String,
    #[serde(default)]
    pub order: u32,
}

/// Throttling limits applied before a reminder is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleRules {
    pub cooldown_hours: u32,
    pub max_reminders_per_day: u32,
    pub max_reminders_per_week: u32,
    /// Inclusive start hour, local time.
    pub allowed_start_hour: u32,
    /// Exclusive end hour, local time.
    pub allowed_end_hour: u32,
    /// ISO weekdays, 1 = Monday .. 7 = Sunday.
    pub allowed_days_of_week: Vec<u32>,
    pub respect_opt_out: bool,
}

impl Default for ThrottleRules {
    fn default() -> Self {
        Self {
            cooldown_hours: 24,
            max_reminders_per_day: 3,
            max_reminders_per_week: 10,
            allowed_start_hour: 9,
            allowed_end_hour: 19,
            allowed_days_of_week: vec![1, 2, 3, 4, 5],
            respect_opt_out: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderPolicy {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub scope: PolicyScope,
    pub name: String,
    pub description: Option<String>,
    pub trigger_rules: Vec<TriggerRule>,
    pub throttle: ThrottleRules,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderPolicy {
    /// Rules for `trigger`, in their configured order.
    pub fn rules_for(&self, trigger: ReminderTrigger) -> Vec<&TriggerRule> {
        let mut rules: Vec<&TriggerRule> = self
            .trigger_rules
            .iter()
            .filter(|r| r.trigger == trigger)
            .collect();
        rules.sort_by_key(|r| r.order);
        rules
    }
}

impl ScopedPolicy for ReminderPolicy {
    fn organisation_id(&self) -> Uuid {
        self.organisation_id
    }
    fn scope(&self) -> &PolicyScope {
        &self.scope
    }
    fn priority(&self) -> i32 {
        self.priority
    }
    fn is_default(&self) -> bool {
        self.is_default
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
