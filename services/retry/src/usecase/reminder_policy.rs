use chrono::Utc;
use uuid::Uuid;

use dunning_domain::actor::Actor;
use dunning_domain::pagination::PageRequest;

use crate::domain::audit::{AuditAction, EntityType, NewAuditEntry};
use crate::domain::policy::{
    self, PolicyContext, PolicyScope, ReminderPolicy, ThrottleRules, TriggerRule,
};
use crate::domain::repository::{AuditLogRepository, ReminderPolicyRepository};
use crate::error::RetryServiceError;
use crate::usecase::audit::AuditTrail;

fn validate_throttle(rules: &ThrottleRules) -> Result<(), RetryServiceError> {
    if rules.allowed_start_hour >= rules.allowed_end_hour || rules.allowed_end_hour > 24 {
        return Err(RetryServiceError::validation(
            "allowed hours must satisfy start < end <= 24",
        ));
    }
    if rules.allowed_days_of_week.is_empty()
        || rules
            .allowed_days_of_week
            .iter()
            .any(|d| !(1..=7).contains(d))
    {
        return Err(RetryServiceError::validation(
            "allowed_days_of_week must list ISO weekdays 1..=7",
        ));
    }
    if rules.max_reminders_per_day == 0 || rules.max_reminders_per_week == 0 {
        return Err(RetryServiceError::validation(
            "reminder caps must be at least 1",
        ));
    }
    Ok(())
}

fn validate_trigger_rules(rules: &[TriggerRule]) -> Result<(), RetryServiceError> {
    if let Some(rule) = rules.iter().find(|r| r.template_id.trim().is_empty()) {
        return Err(RetryServiceError::validation(format!(
            "trigger rule {} has no template",
            rule.id
        )));
    }
    Ok(())
}

// ── ResolveReminderPolicy ────────────────────────────────────────────────────

pub struct ResolveReminderPolicyUseCase<Q: ReminderPolicyRepository> {
    pub repo: Q,
}

impl<Q: ReminderPolicyRepository> ResolveReminderPolicyUseCase<Q> {
    /// Reminders are best effort: no matching policy is `None`, not an error.
    pub async fn execute(
        &self,
        ctx: &PolicyContext,
    ) -> Result<Option<ReminderPolicy>, RetryServiceError> {
        let candidates = self.repo.list_active(ctx.organisation_id).await?;
        Ok(policy::resolve(&candidates, ctx).cloned())
    }
}

// ── CreateReminderPolicy ─────────────────────────────────────────────────────

pub struct CreateReminderPolicyInput {
    pub scope: PolicyScope,
    pub name: String,
    pub description: Option<String>,
    pub trigger_rules: Vec<TriggerRule>,
    pub throttle: ThrottleRules,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
}

pub struct CreateReminderPolicyUseCase<Q: ReminderPolicyRepository, A: AuditLogRepository> {
    pub repo: Q,
    pub audit: AuditTrail<A>,
}

impl<Q: ReminderPolicyRepository, A: AuditLogRepository> CreateReminderPolicyUseCase<Q, A> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        actor: Actor,
        input: CreateReminderPolicyInput,
    ) -> Result<ReminderPolicy, RetryServiceError> {
        if input.name.trim().is_empty() {
            return Err(RetryServiceError::validation("name must not be empty"));
        }
        validate_trigger_rules(&input.trigger_rules)?;
        validate_throttle(&input.throttle)?;

        let now = Utc::now();
        let policy = ReminderPolicy {
            id: Uuid::now_v7(),
            organisation_id,
            scope: input.scope,
            name: input.name.trim().to_owned(),
            description: input.description,
            trigger_rules: input.trigger_rules,
            throttle: input.throttle,
            is_active: input.is_active,
            is_default: input.is_default,
            priority: input.priority,
            created_at: now,
            updated_at: now,
        };
        self.repo.create(&policy).await?;
        self.audit
            .record(
                NewAuditEntry::new(
                    organisation_id,
                    EntityType::ReminderPolicy,
                    policy.id,
                    AuditAction::Create,
                    "CREATED",
                    actor,
                )
                .after(&policy),
            )
            .await;
        Ok(policy)
    }
}

// ── UpdateReminderPolicy ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct UpdateReminderPolicyInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger_rules: Option<Vec<TriggerRule>>,
    pub throttle: Option<ThrottleRules>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
    pub priority: Option<i32>,
}

pub struct UpdateReminderPolicyUseCase<Q: ReminderPolicyRepository, A: AuditLogRepository> {
    pub repo: Q,
    pub audit: AuditTrail<A>,
}

impl<Q: ReminderPolicyRepository, A: AuditLogRepository> UpdateReminderPolicyUseCase<Q, A> {
    /// Reminders already scheduled are not re-validated against new limits.
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        actor: Actor,
        input: UpdateReminderPolicyInput,
    ) -> Result<ReminderPolicy, RetryServiceError> {
        let before = self
            .repo
            .find_by_id(organisation_id, id)
            .await?
            .ok_or(RetryServiceError::ReminderPolicyNotFound)?;

        let mut policy = before.clone();
        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(RetryServiceError::validation("name must not be empty"));
            }
            policy.name = name.trim().to_owned();
        }
        if input.description.is_some() {
            policy.description = input.description;
        }
        if let Some(rules) = input.trigger_rules {
            validate_trigger_rules(&rules)?;
            policy.trigger_rules = rules;
        }
        if let Some(throttle) = input.throttle {
            validate_throttle(&throttle)?;
            policy.throttle = throttle;
        }
        if let Some(v) = input.is_active {
            policy.is_active = v;
        }
        if let Some(v) = input.is_default {
            policy.is_default = v;
        }
        if let Some(v) = input.priority {
            policy.priority = v;
        }
        policy.updated_at = Utc::now();

        self.repo.update(&policy).await?;
        self.audit
            .record(
                NewAuditEntry::new(
                    organisation_id,
                    EntityType::ReminderPolicy,
                    policy.id,
                    AuditAction::Update,
                    "UPDATED",
                    actor,
                )
                .before(&before)
                .after(&policy),
            )
            .await;
        Ok(policy)
    }
}

// ── DeleteReminderPolicy ─────────────────────────────────────────────────────

pub struct DeleteReminderPolicyUseCase<Q: ReminderPolicyRepository, A: AuditLogRepository> {
    pub repo: Q,
    pub audit: AuditTrail<A>,
}

impl<Q: ReminderPolicyRepository, A: AuditLogRepository> DeleteReminderPolicyUseCase<Q, A> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        actor: Actor,
    ) -> Result<(), RetryServiceError> {
        let before = self
            .repo
            .find_by_id(organisation_id, id)
            .await?
            .ok_or(RetryServiceError::ReminderPolicyNotFound)?;
        if !self.repo.delete(organisation_id, id).await? {
            return Err(RetryServiceError::ReminderPolicyNotFound);
        }
        self.audit
            .record(
                NewAuditEntry::new(
                    organisation_id,
                    EntityType::ReminderPolicy,
                    id,
                    AuditAction::Delete,
                    "DELETED",
                    actor,
                )
                .before(&before),
            )
            .await;
        Ok(())
    }
}

// ── GetReminderPolicy ────────────────────────────────────────────────────────

pub struct GetReminderPolicyUseCase<Q: ReminderPolicyRepository> {
    pub repo: Q,
}

impl<Q: ReminderPolicyRepository> GetReminderPolicyUseCase<Q> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<ReminderPolicy, RetryServiceError> {
        self.repo
            .find_by_id(organisation_id, id)
            .await?
            .ok_or(RetryServiceError::ReminderPolicyNotFound)
    }
}

// ── ListReminderPolicies ─────────────────────────────────────────────────────

pub struct ListReminderPoliciesUseCase<Q: ReminderPolicyRepository> {
    pub repo: Q,
}

impl<Q: ReminderPolicyRepository> ListReminderPoliciesUseCase<Q> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<ReminderPolicy>, RetryServiceError> {
        self.repo.list(organisation_id, page).await
    }
}
