use chrono::Utc;
use uuid::Uuid;

use dunning_domain::actor::Actor;
use dunning_domain::pagination::PageRequest;

use crate::domain::audit::{AuditAction, EntityType, NewAuditEntry};
use crate::domain::eligibility::normalize_code;
use crate::domain::policy::{self, BackoffStrategy, PolicyContext, PolicyScope, RetryPolicy, RetryRules};
use crate::domain::repository::{AuditLogRepository, RetryPolicyRepository};
use crate::error::RetryServiceError;
use crate::usecase::audit::AuditTrail;

fn validate_name(name: &str) -> Result<(), RetryServiceError> {
    if name.trim().is_empty() {
        return Err(RetryServiceError::validation("name must not be empty"));
    }
    Ok(())
}

fn normalize_codes(codes: &[String]) -> Result<Vec<String>, RetryServiceError> {
    codes
        .iter()
        .map(|code| {
            let normalized = normalize_code(code);
            if normalized.is_empty()
                || !normalized
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
            {
                Err(RetryServiceError::validation(format!(
                    "invalid rejection code {code:?}"
                )))
            } else {
                Ok(normalized)
            }
        })
        .collect()
}

/// Check and canonicalise retry rules before they are stored.
pub fn validate_rules(mut rules: RetryRules) -> Result<RetryRules, RetryServiceError> {
    if rules.retry_delays_days.is_empty() {
        return Err(RetryServiceError::validation(
            "retry_delays_days must not be empty",
        ));
    }
    if rules.retry_delays_days.contains(&0) {
        return Err(RetryServiceError::validation(
            "retry delays must be at least one day",
        ));
    }
    if rules.max_attempts == 0 {
        return Err(RetryServiceError::validation("max_attempts must be at least 1"));
    }
    if rules.max_total_days == 0 {
        return Err(RetryServiceError::validation(
            "max_total_days must be at least 1",
        ));
    }
    rules.retryable_codes = normalize_codes(&rules.retryable_codes)?;
    rules.non_retryable_codes = normalize_codes(&rules.non_retryable_codes)?;
    Ok(rules)
}

// ── ResolveRetryPolicy ───────────────────────────────────────────────────────

pub struct ResolveRetryPolicyUseCase<P: RetryPolicyRepository> {
    pub repo: P,
}

impl<P: RetryPolicyRepository> ResolveRetryPolicyUseCase<P> {
    /// The single best policy for `ctx`. No match is a configuration error;
    /// no fallback behaviour is invented.
    pub async fn execute(&self, ctx: &PolicyContext) -> Result<RetryPolicy, RetryServiceError> {
        let candidates = self.repo.list_active(ctx.organisation_id).await?;
        policy::resolve(&candidates, ctx)
            .cloned()
            .ok_or(RetryServiceError::NoPolicyFound)
    }
}

// ── CreateRetryPolicy ────────────────────────────────────────────────────────

pub struct CreateRetryPolicyInput {
    pub scope: PolicyScope,
    pub name: String,
    pub description: Option<String>,
    pub rules: RetryRules,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
}

pub struct CreateRetryPolicyUseCase<P: RetryPolicyRepository, A: AuditLogRepository> {
    pub repo: P,
    pub audit: AuditTrail<A>,
}

impl<P: RetryPolicyRepository, A: AuditLogRepository> CreateRetryPolicyUseCase<P, A> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        actor: Actor,
        input: CreateRetryPolicyInput,
    ) -> Result<RetryPolicy, RetryServiceError> {
        validate_name(&input.name)?;
        let rules = validate_rules(input.rules)?;
        let now = Utc::now();
        let policy = RetryPolicy {
            id: Uuid::now_v7(),
            organisation_id,
            scope: input.scope,
            name: input.name.trim().to_owned(),
            description: input.description,
            rules,
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
                    EntityType::RetryPolicy,
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

// ── UpdateRetryPolicy ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct UpdateRetryPolicyInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub retry_delays_days: Option<Vec<u32>>,
    pub max_attempts: Option<u32>,
    pub max_total_days: Option<u32>,
    pub retry_on_am04: Option<bool>,
    pub retryable_codes: Option<Vec<String>>,
    pub non_retryable_codes: Option<Vec<String>>,
    pub stop_on_payment_settled: Option<bool>,
    pub stop_on_contract_cancelled: Option<bool>,
    pub stop_on_mandate_revoked: Option<bool>,
    pub backoff: Option<BackoffStrategy>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
    pub priority: Option<i32>,
}

pub struct UpdateRetryPolicyUseCase<P: RetryPolicyRepository, A: AuditLogRepository> {
    pub repo: P,
    pub audit: AuditTrail<A>,
}

impl<P: RetryPolicyRepository, A: AuditLogRepository> UpdateRetryPolicyUseCase<P, A> {
    /// Schedules already created keep the rules they captured.
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
        actor: Actor,
        input: UpdateRetryPolicyInput,
    ) -> Result<RetryPolicy, RetryServiceError> {
        let before = self
            .repo
            .find_by_id(organisation_id, id)
            .await?
            .ok_or(RetryServiceError::RetryPolicyNotFound)?;

        let mut policy = before.clone();
        if let Some(name) = input.name {
            validate_name(&name)?;
            policy.name = name.trim().to_owned();
        }
        if input.description.is_some() {
            policy.description = input.description;
        }
        let rules = &mut policy.rules;
        if let Some(v) = input.retry_delays_days {
            rules.retry_delays_days = v;
        }
        if let Some(v) = input.max_attempts {
            rules.max_attempts = v;
        }
        if let Some(v) = input.max_total_days {
            rules.max_total_days = v;
        }
        if let Some(v) = input.retry_on_am04 {
            rules.retry_on_am04 = v;
        }
        if let Some(v) = input.retryable_codes {
            rules.retryable_codes = v;
        }
        if let Some(v) = input.non_retryable_codes {
            rules.non_retryable_codes = v;
        }
        if let Some(v) = input.stop_on_payment_settled {
            rules.stop_on_payment_settled = v;
        }
        if let Some(v) = input.stop_on_contract_cancelled {
            rules.stop_on_contract_cancelled = v;
        }
        if let Some(v) = input.stop_on_mandate_revoked {
            rules.stop_on_mandate_revoked = v;
        }
        if let Some(v) = input.backoff {
            rules.backoff = v;
        }
        policy.rules = validate_rules(policy.rules)?;
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
                    EntityType::RetryPolicy,
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

// ── DeleteRetryPolicy ────────────────────────────────────────────────────────

pub struct DeleteRetryPolicyUseCase<P: RetryPolicyRepository, A: AuditLogRepository> {
    pub repo: P,
    pub audit: AuditTrail<A>,
}

impl<P: RetryPolicyRepository, A: AuditLogRepository> DeleteRetryPolicyUseCase<P, A> {
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
            .ok_or(RetryServiceError::RetryPolicyNotFound)?;
        if !self.repo.delete(organisation_id, id).await? {
            return Err(RetryServiceError::RetryPolicyNotFound);
        }
        self.audit
            .record(
                NewAuditEntry::new(
                    organisation_id,
                    EntityType::RetryPolicy,
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

// ── GetRetryPolicy ───────────────────────────────────────────────────────────

pub struct GetRetryPolicyUseCase<P: RetryPolicyRepository> {
    pub repo: P,
}

impl<P: RetryPolicyRepository> GetRetryPolicyUseCase<P> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<RetryPolicy, RetryServiceError> {
        self.repo
            .find_by_id(organisation_id, id)
            .await?
            .ok_or(RetryServiceError::RetryPolicyNotFound)
    }
}

// ── ListRetryPolicies ────────────────────────────────────────────────────────

pub struct ListRetryPoliciesUseCase<P: RetryPolicyRepository> {
    pub repo: P,
}

impl<P: RetryPolicyRepository> ListRetryPoliciesUseCase<P> {
    pub async fn execute(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryPolicy>, RetryServiceError> {
        self.repo.list(organisation_id, page).await
    }
}
