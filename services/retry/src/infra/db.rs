use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, sea_query::OnConflict,
};
use uuid::Uuid;

use dunning_core::sea_ext::Paginate;
use dunning_domain::actor::ActorType;
use dunning_domain::pagination::PageRequest;
use dunning_retry_schema::{
    reminder_opt_outs, reminder_policies, reminders, retry_attempts, retry_audit_logs, retry_jobs,
    retry_policies, retry_schedules,
};

use crate::domain::attempt::{AttemptStatus, RetryAttempt};
use crate::domain::audit::{AuditAction, AuditFilter, AuditLogEntry, EntityType};
use crate::domain::job::{JobStatus, RetryJob};
use crate::domain::policy::{
    BackoffStrategy, PolicyScope, ReminderPolicy, RetryPolicy, RetryRules, ThrottleRules,
};
use crate::domain::reminder::{
    Reminder, ReminderChannel, ReminderFilter, ReminderStatus, ReminderTrigger,
};
use crate::domain::repository::{
    AuditLogRepository, OptOutRepository, ReminderPolicyRepository, ReminderRepository,
    RetryAttemptRepository, RetryJobRepository, RetryPolicyRepository, RetryScheduleRepository,
};
use crate::domain::schedule::{Eligibility, RetrySchedule, ScheduleFilter, ScheduleStatistics};
use crate::error::RetryServiceError;

fn to_json<T: serde::Serialize>(value: &T) -> anyhow::Result<serde_json::Value> {
    serde_json::to_value(value).context("serialize jsonb column")
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> anyhow::Result<T> {
    serde_json::from_value(value).context("deserialize jsonb column")
}

// ── Retry policy repository ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRetryPolicyRepository {
    pub db: DatabaseConnection,
}

impl RetryPolicyRepository for DbRetryPolicyRepository {
    async fn create(&self, policy: &RetryPolicy) -> Result<(), RetryServiceError> {
        retry_policy_to_active(policy)?
            .insert(&self.db)
            .await
            .context("create retry policy")?;
        Ok(())
    }

    async fn update(&self, policy: &RetryPolicy) -> Result<(), RetryServiceError> {
        retry_policy_to_active(policy)?
            .update(&self.db)
            .await
            .context("update retry policy")?;
        Ok(())
    }

    async fn delete(&self, organisation_id: Uuid, id: Uuid) -> Result<bool, RetryServiceError> {
        let result = retry_policies::Entity::delete_many()
            .filter(retry_policies::Column::Id.eq(id))
            .filter(retry_policies::Column::OrganisationId.eq(organisation_id))
            .exec(&self.db)
            .await
            .context("delete retry policy")?;
        Ok(result.rows_affected > 0)
    }

    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<RetryPolicy>, RetryServiceError> {
        let model = retry_policies::Entity::find_by_id(id)
            .filter(retry_policies::Column::OrganisationId.eq(organisation_id))
            .one(&self.db)
            .await
            .context("find retry policy by id")?;
        Ok(model.map(retry_policy_from_model).transpose()?)
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryPolicy>, RetryServiceError> {
        let models = retry_policies::Entity::find()
            .filter(retry_policies::Column::OrganisationId.eq(organisation_id))
            .order_by_desc(retry_policies::Column::CreatedAt)
            .paginate_by(page)
            .all(&self.db)
            .await
            .context("list retry policies")?;
        Ok(models
            .into_iter()
            .map(retry_policy_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn list_active(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<RetryPolicy>, RetryServiceError> {
        let models = retry_policies::Entity::find()
            .filter(retry_policies::Column::OrganisationId.eq(organisation_id))
            .filter(retry_policies::Column::IsActive.eq(true))
            .order_by_asc(retry_policies::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list active retry policies")?;
        Ok(models
            .into_iter()
            .map(retry_policy_from_model)
            .collect::<anyhow::Result<_>>()?)
    }
}

fn retry_policy_to_active(policy: &RetryPolicy) -> anyhow::Result<retry_policies::ActiveModel> {
    let rules = &policy.rules;
    Ok(retry_policies::ActiveModel {
        id: Set(policy.id),
        organisation_id: Set(policy.organisation_id),
        societe_id: Set(policy.scope.societe_id),
        product_id: Set(policy.scope.product_id),
        channel_id: Set(policy.scope.channel_id),
        name: Set(policy.name.clone()),
        description: Set(policy.description.clone()),
        retry_delays_days: Set(to_json(&rules.retry_delays_days)?),
        max_attempts: Set(rules.max_attempts as i32),
        max_total_days: Set(rules.max_total_days as i32),
        retry_on_am04: Set(rules.retry_on_am04),
        retryable_codes: Set(to_json(&rules.retryable_codes)?),
        non_retryable_codes: Set(to_json(&rules.non_retryable_codes)?),
        stop_on_payment_settled: Set(rules.stop_on_payment_settled),
        stop_on_contract_cancelled: Set(rules.stop_on_contract_cancelled),
        stop_on_mandate_revoked: Set(rules.stop_on_mandate_revoked),
        backoff_strategy: Set(rules.backoff.as_str().to_owned()),
        is_active: Set(policy.is_active),
        is_default: Set(policy.is_default),
        priority: Set(policy.priority),
        created_at: Set(policy.created_at),
        updated_at: Set(policy.updated_at),
    })
}

fn retry_policy_from_model(model: retry_policies::Model) -> anyhow::Result<RetryPolicy> {
    Ok(RetryPolicy {
        id: model.id,
        organisation_id: model.organisation_id,
        scope: PolicyScope {
            societe_id: model.societe_id,
            product_id: model.product_id,
            channel_id: model.channel_id,
        },
        name: model.name,
        description: model.description,
        rules: RetryRules {
            retry_delays_days: from_json(model.retry_delays_days)?,
            max_attempts: model.max_attempts.max(0) as u32,
            max_total_days: model.max_total_days.max(0) as u32,
            retry_on_am04: model.retry_on_am04,
            retryable_codes: from_json(model.retryable_codes)?,
            non_retryable_codes: from_json(model.non_retryable_codes)?,
            stop_on_payment_settled: model.stop_on_payment_settled,
            stop_on_contract_cancelled: model.stop_on_contract_cancelled,
            stop_on_mandate_revoked: model.stop_on_mandate_revoked,
            backoff: model.backoff_strategy.parse::<BackoffStrategy>()?,
        },
        is_active: model.is_active,
        is_default: model.is_default,
        priority: model.priority,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Reminder policy repository ───────────────────────────────────────────────

#[derive(Clone)]
pub struct DbReminderPolicyRepository {
    pub db: DatabaseConnection,
}

impl ReminderPolicyRepository for DbReminderPolicyRepository {
    async fn create(&self, policy: &ReminderPolicy) -> Result<(), RetryServiceError> {
        reminder_policy_to_active(policy)?
            .insert(&self.db)
            .await
            .context("create reminder policy")?;
        Ok(())
    }

    async fn update(&self, policy: &ReminderPolicy) -> Result<(), RetryServiceError> {
        reminder_policy_to_active(policy)?
            .update(&self.db)
            .await
            .context("update reminder policy")?;
        Ok(())
    }

    async fn delete(&self, organisation_id: Uuid, id: Uuid) -> Result<bool, RetryServiceError> {
        let result = reminder_policies::Entity::delete_many()
            .filter(reminder_policies::Column::Id.eq(id))
            .filter(reminder_policies::Column::OrganisationId.eq(organisation_id))
            .exec(&self.db)
            .await
            .context("delete reminder policy")?;
        Ok(result.rows_affected > 0)
    }

    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ReminderPolicy>, RetryServiceError> {
        let model = reminder_policies::Entity::find_by_id(id)
            .filter(reminder_policies::Column::OrganisationId.eq(organisation_id))
            .one(&self.db)
            .await
            .context("find reminder policy by id")?;
        Ok(model.map(reminder_policy_from_model).transpose()?)
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<ReminderPolicy>, RetryServiceError> {
        let models = reminder_policies::Entity::find()
            .filter(reminder_policies::Column::OrganisationId.eq(organisation_id))
            .order_by_desc(reminder_policies::Column::CreatedAt)
            .paginate_by(page)
            .all(&self.db)
            .await
            .context("list reminder policies")?;
        Ok(models
            .into_iter()
            .map(reminder_policy_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn list_active(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<ReminderPolicy>, RetryServiceError> {
        let models = reminder_policies::Entity::find()
            .filter(reminder_policies::Column::OrganisationId.eq(organisation_id))
            .filter(reminder_policies::Column::IsActive.eq(true))
            .order_by_asc(reminder_policies::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list active reminder policies")?;
        Ok(models
            .into_iter()
            .map(reminder_policy_from_model)
            .collect::<anyhow::Result<_>>()?)
    }
}

fn reminder_policy_to_active(
    policy: &ReminderPolicy,
) -> anyhow::Result<reminder_policies::ActiveModel> {
    let throttle = &policy.throttle;
    Ok(reminder_policies::ActiveModel {
        id: Set(policy.id),
        organisation_id: Set(policy.organisation_id),
        societe_id: Set(policy.scope.societe_id),
        product_id: Set(policy.scope.product_id),
        channel_id: Set(policy.scope.channel_id),
        name: Set(policy.name.clone()),
        description: Set(policy.description.clone()),
        trigger_rules: Set(to_json(&policy.trigger_rules)?),
        cooldown_hours: Set(throttle.cooldown_hours as i32),
        max_reminders_per_day: Set(throttle.max_reminders_per_day as i32),
        max_reminders_per_week: Set(throttle.max_reminders_per_week as i32),
        allowed_start_hour: Set(throttle.allowed_start_hour as i32),
        allowed_end_hour: Set(throttle.allowed_end_hour as i32),
        allowed_days_of_week: Set(to_json(&throttle.allowed_days_of_week)?),
        respect_opt_out: Set(throttle.respect_opt_out),
        is_active: Set(policy.is_active),
        is_default: Set(policy.is_default),
        priority: Set(policy.priority),
        created_at: Set(policy.created_at),
        updated_at: Set(policy.updated_at),
    })
}

fn reminder_policy_from_model(model: reminder_policies::Model) -> anyhow::Result<ReminderPolicy> {
    Ok(ReminderPolicy {
        id: model.id,
        organisation_id: model.organisation_id,
        scope: PolicyScope {
            societe_id: model.societe_id,
            product_id: model.product_id,
            channel_id: model.channel_id,
        },
        name: model.name,
        description: model.description,
        trigger_rules: from_json(model.trigger_rules)?,
        throttle: ThrottleRules {
            cooldown_hours: model.cooldown_hours.max(0) as u32,
            max_reminders_per_day: model.max_reminders_per_day.max(0) as u32,
            max_reminders_per_week: model.max_reminders_per_week.max(0) as u32,
            allowed_start_hour: model.allowed_start_hour.max(0) as u32,
            allowed_end_hour: model.allowed_end_hour.max(0) as u32,
            allowed_days_of_week: from_json(model.allowed_days_of_week)?,
            respect_opt_out: model.respect_opt_out,
        },
        is_active: model.is_active,
        is_default: model.is_default,
        priority: model.priority,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Retry schedule repository ────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRetryScheduleRepository {
    pub db: DatabaseConnection,
}

impl RetryScheduleRepository for DbRetryScheduleRepository {
    async fn insert_if_absent(
        &self,
        schedule: &RetrySchedule,
    ) -> Result<(RetrySchedule, bool), RetryServiceError> {
        let inserted = retry_schedules::Entity::insert(schedule_to_active(schedule)?)
            .on_conflict(
                OnConflict::columns([
                    retry_schedules::Column::OrganisationId,
                    retry_schedules::Column::IdempotencyKey,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert retry schedule")?;
        let stored = self
            .find_by_idempotency_key(schedule.organisation_id, &schedule.idempotency_key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("retry schedule vanished after insert"))?;
        Ok((stored, inserted > 0))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RetrySchedule>, RetryServiceError> {
        let model = retry_schedules::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find retry schedule by id")?;
        Ok(model.map(schedule_from_model).transpose()?)
    }

    async fn find_by_idempotency_key(
        &self,
        organisation_id: Uuid,
        key: &str,
    ) -> Result<Option<RetrySchedule>, RetryServiceError> {
        let model = retry_schedules::Entity::find()
            .filter(retry_schedules::Column::OrganisationId.eq(organisation_id))
            .filter(retry_schedules::Column::IdempotencyKey.eq(key))
            .one(&self.db)
            .await
            .context("find retry schedule by idempotency key")?;
        Ok(model.map(schedule_from_model).transpose()?)
    }

    async fn update(&self, schedule: &RetrySchedule) -> Result<(), RetryServiceError> {
        schedule_to_active(schedule)?
            .update(&self.db)
            .await
            .context("update retry schedule")?;
        Ok(())
    }

    async fn find_due(
        &self,
        organisation_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError> {
        let models = retry_schedules::Entity::find()
            .filter(retry_schedules::Column::OrganisationId.eq(organisation_id))
            .filter(retry_schedules::Column::IsResolved.eq(false))
            .filter(retry_schedules::Column::Eligibility.eq(Eligibility::Eligible.as_str()))
            .filter(retry_schedules::Column::NextRetryDate.lte(cutoff))
            .order_by_asc(retry_schedules::Column::NextRetryDate)
            .all(&self.db)
            .await
            .context("find due retry schedules")?;
        Ok(models
            .into_iter()
            .map(schedule_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn due_organisations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, RetryServiceError> {
        let ids = retry_schedules::Entity::find()
            .select_only()
            .column(retry_schedules::Column::OrganisationId)
            .distinct()
            .filter(retry_schedules::Column::IsResolved.eq(false))
            .filter(retry_schedules::Column::Eligibility.eq(Eligibility::Eligible.as_str()))
            .filter(retry_schedules::Column::NextRetryDate.lte(cutoff))
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
            .context("list organisations with due schedules")?;
        Ok(ids)
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ScheduleFilter,
        page: PageRequest,
    ) -> Result<Vec<RetrySchedule>, RetryServiceError> {
        let mut query = retry_schedules::Entity::find()
            .filter(retry_schedules::Column::OrganisationId.eq(organisation_id));
        if let Some(eligibility) = filter.eligibility {
            query = query.filter(retry_schedules::Column::Eligibility.eq(eligibility.as_str()));
        }
        if let Some(resolved) = filter.is_resolved {
            query = query.filter(retry_schedules::Column::IsResolved.eq(resolved));
        }
        if let Some(client_id) = filter.client_id {
            query = query.filter(retry_schedules::Column::ClientId.eq(client_id));
        }
        let models = query
            .order_by_desc(retry_schedules::Column::CreatedAt)
            .paginate_by(page)
            .all(&self.db)
            .await
            .context("list retry schedules")?;
        Ok(models
            .into_iter()
            .map(schedule_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn statistics(
        &self,
        organisation_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ScheduleStatistics, RetryServiceError> {
        use sea_orm::sea_query::Expr;

        let mut query = retry_schedules::Entity::find()
            .select_only()
            .column(retry_schedules::Column::Eligibility)
            .column(retry_schedules::Column::IsResolved)
            .column(retry_schedules::Column::ResolutionReason)
            .column_as(Expr::col(retry_schedules::Column::Id).count(), "count")
            .column_as(
                Expr::cust("COALESCE(SUM(current_attempt), 0)::bigint"),
                "attempts",
            )
            .filter(retry_schedules::Column::OrganisationId.eq(organisation_id))
            .group_by(retry_schedules::Column::Eligibility)
            .group_by(retry_schedules::Column::IsResolved)
            .group_by(retry_schedules::Column::ResolutionReason);
        if let Some(from) = from {
            query = query.filter(retry_schedules::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(retry_schedules::Column::CreatedAt.lte(to));
        }
        let rows = query
            .into_tuple::<(String, bool, Option<String>, i64, i64)>()
            .all(&self.db)
            .await
            .context("aggregate retry schedules")?;

        let mut stats = ScheduleStatistics::default();
        for (eligibility, resolved, reason, count, attempts) in rows {
            let eligibility = eligibility
                .parse::<Eligibility>()
                .map_err(anyhow::Error::from)?;
            stats.add(
                eligibility,
                resolved,
                reason.as_deref(),
                count.max(0) as u64,
                attempts.max(0) as u64,
            );
        }
        Ok(stats)
    }
}

fn schedule_to_active(schedule: &RetrySchedule) -> anyhow::Result<retry_schedules::ActiveModel> {
    Ok(retry_schedules::ActiveModel {
        id: Set(schedule.id),
        organisation_id: Set(schedule.organisation_id),
        societe_id: Set(schedule.societe_id),
        original_payment_id: Set(schedule.original_payment_id),
        schedule_ref: Set(schedule.schedule_ref.clone()),
        invoice_id: Set(schedule.invoice_id),
        contract_id: Set(schedule.contract_id),
        client_id: Set(schedule.client_id),
        product_id: Set(schedule.product_id),
        channel_id: Set(schedule.channel_id),
        rejection_code: Set(schedule.rejection_code.clone()),
        rejection_raw_code: Set(schedule.rejection_raw_code.clone()),
        rejection_message: Set(schedule.rejection_message.clone()),
        rejection_date: Set(schedule.rejection_date),
        last_rejection_code: Set(schedule.last_rejection_code.clone()),
        retry_policy_id: Set(schedule.retry_policy_id),
        policy_snapshot: Set(to_json(&schedule.rules)?),
        amount_cents: Set(schedule.amount_cents),
        currency: Set(schedule.currency.to_string()),
        psp_name: Set(schedule.psp_name.clone()),
        psp_payment_id: Set(schedule.psp_payment_id.clone()),
        eligibility: Set(schedule.eligibility.as_str().to_owned()),
        eligibility_reason: Set(schedule.eligibility_reason.clone()),
        current_attempt: Set(schedule.current_attempt as i32),
        max_attempts: Set(schedule.max_attempts as i32),
        next_retry_date: Set(schedule.next_retry_date),
        is_resolved: Set(schedule.is_resolved),
        resolution_reason: Set(schedule.resolution_reason.clone()),
        resolved_at: Set(schedule.resolved_at),
        event_id: Set(schedule.event_id.clone()),
        idempotency_key: Set(schedule.idempotency_key.clone()),
        metadata: Set(schedule.metadata.clone()),
        created_at: Set(schedule.created_at),
        updated_at: Set(schedule.updated_at),
    })
}

fn schedule_from_model(model: retry_schedules::Model) -> anyhow::Result<RetrySchedule> {
    Ok(RetrySchedule {
        id: model.id,
        organisation_id: model.organisation_id,
        societe_id: model.societe_id,
        original_payment_id: model.original_payment_id,
        schedule_ref: model.schedule_ref,
        invoice_id: model.invoice_id,
        contract_id: model.contract_id,
        client_id: model.client_id,
        product_id: model.product_id,
        channel_id: model.channel_id,
        rejection_code: model.rejection_code,
        rejection_raw_code: model.rejection_raw_code,
        rejection_message: model.rejection_message,
        rejection_date: model.rejection_date,
        last_rejection_code: model.last_rejection_code,
        retry_policy_id: model.retry_policy_id,
        rules: from_json(model.policy_snapshot)?,
        amount_cents: model.amount_cents,
        currency: model.currency.parse()?,
        psp_name: model.psp_name,
        psp_payment_id: model.psp_payment_id,
        eligibility: model.eligibility.parse()?,
        eligibility_reason: model.eligibility_reason,
        current_attempt: model.current_attempt.max(0) as u32,
        max_attempts: model.max_attempts.max(0) as u32,
        next_retry_date: model.next_retry_date,
        is_resolved: model.is_resolved,
        resolution_reason: model.resolution_reason,
        resolved_at: model.resolved_at,
        event_id: model.event_id,
        idempotency_key: model.idempotency_key,
        metadata: model.metadata,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Retry attempt repository ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRetryAttemptRepository {
    pub db: DatabaseConnection,
}

impl DbRetryAttemptRepository {
    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<RetryAttempt>, RetryServiceError> {
        let model = retry_attempts::Entity::find()
            .filter(retry_attempts::Column::IdempotencyKey.eq(key))
            .one(&self.db)
            .await
            .context("find retry attempt by idempotency key")?;
        Ok(model.map(attempt_from_model).transpose()?)
    }
}

impl RetryAttemptRepository for DbRetryAttemptRepository {
    async fn insert_if_absent(
        &self,
        attempt: &RetryAttempt,
    ) -> Result<(RetryAttempt, bool), RetryServiceError> {
        let inserted = retry_attempts::Entity::insert(attempt_to_active(attempt))
            .on_conflict(
                OnConflict::column(retry_attempts::Column::IdempotencyKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert retry attempt")?;
        let stored = self
            .find_by_idempotency_key(&attempt.idempotency_key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("retry attempt vanished after insert"))?;
        Ok((stored, inserted > 0))
    }

    async fn compare_and_set(
        &self,
        attempt: &RetryAttempt,
        expected: AttemptStatus,
    ) -> Result<bool, RetryServiceError> {
        let result = retry_attempts::Entity::update_many()
            .set(attempt_to_active(attempt))
            .filter(retry_attempts::Column::Id.eq(attempt.id))
            .filter(retry_attempts::Column::Status.eq(expected.as_str()))
            .exec(&self.db)
            .await
            .context("compare-and-set retry attempt")?;
        Ok(result.rows_affected == 1)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RetryAttempt>, RetryServiceError> {
        let model = retry_attempts::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find retry attempt by id")?;
        Ok(model.map(attempt_from_model).transpose()?)
    }

    async fn list_by_schedule(
        &self,
        schedule_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryAttempt>, RetryServiceError> {
        let models = retry_attempts::Entity::find()
            .filter(retry_attempts::Column::RetryScheduleId.eq(schedule_id))
            .order_by_asc(retry_attempts::Column::AttemptNumber)
            .paginate_by(page)
            .all(&self.db)
            .await
            .context("list retry attempts")?;
        Ok(models
            .into_iter()
            .map(attempt_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn status_counts(
        &self,
        organisation_id: Uuid,
    ) -> Result<Vec<(AttemptStatus, u64)>, RetryServiceError> {
        use sea_orm::sea_query::Expr;

        let rows = retry_attempts::Entity::find()
            .select_only()
            .column(retry_attempts::Column::Status)
            .column_as(Expr::col(retry_attempts::Column::Id).count(), "count")
            .filter(retry_attempts::Column::OrganisationId.eq(organisation_id))
            .group_by(retry_attempts::Column::Status)
            .into_tuple::<(String, i64)>()
            .all(&self.db)
            .await
            .context("count retry attempts by status")?;
        let mut counts = rows
            .into_iter()
            .map(|(status, count)| Ok((status.parse::<AttemptStatus>()?, count.max(0) as u64)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        counts.sort_by_key(|(status, _)| status.as_str());
        Ok(counts)
    }
}

fn attempt_to_active(attempt: &RetryAttempt) -> retry_attempts::ActiveModel {
    retry_attempts::ActiveModel {
        id: Set(attempt.id),
        organisation_id: Set(attempt.organisation_id),
        retry_schedule_id: Set(attempt.retry_schedule_id),
        attempt_number: Set(attempt.attempt_number as i32),
        planned_date: Set(attempt.planned_date),
        executed_at: Set(attempt.executed_at),
        status: Set(attempt.status.as_str().to_owned()),
        psp_payment_id: Set(attempt.psp_payment_id.clone()),
        psp_response: Set(attempt.psp_response.clone()),
        error_code: Set(attempt.error_code.clone()),
        error_message: Set(attempt.error_message.clone()),
        new_rejection_code: Set(attempt.new_rejection_code.clone()),
        retry_job_id: Set(attempt.retry_job_id),
        idempotency_key: Set(attempt.idempotency_key.clone()),
        created_at: Set(attempt.created_at),
        updated_at: Set(attempt.updated_at),
    }
}

fn attempt_from_model(model: retry_attempts::Model) -> anyhow::Result<RetryAttempt> {
    Ok(RetryAttempt {
        id: model.id,
        organisation_id: model.organisation_id,
        retry_schedule_id: model.retry_schedule_id,
        attempt_number: model.attempt_number.max(0) as u32,
        planned_date: model.planned_date,
        executed_at: model.executed_at,
        status: model.status.parse()?,
        psp_payment_id: model.psp_payment_id,
        psp_response: model.psp_response,
        error_code: model.error_code,
        error_message: model.error_message,
        new_rejection_code: model.new_rejection_code,
        retry_job_id: model.retry_job_id,
        idempotency_key: model.idempotency_key,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Retry job repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRetryJobRepository {
    pub db: DatabaseConnection,
}

impl RetryJobRepository for DbRetryJobRepository {
    async fn insert_if_absent(&self, job: &RetryJob) -> Result<(RetryJob, bool), RetryServiceError> {
        let inserted = retry_jobs::Entity::insert(job_to_active(job)?)
            .on_conflict(
                OnConflict::column(retry_jobs::Column::IdempotencyKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert retry job")?;
        let model = retry_jobs::Entity::find()
            .filter(retry_jobs::Column::IdempotencyKey.eq(job.idempotency_key.as_str()))
            .one(&self.db)
            .await
            .context("find retry job by idempotency key")?
            .ok_or_else(|| anyhow::anyhow!("retry job vanished after insert"))?;
        Ok((job_from_model(model)?, inserted > 0))
    }

    async fn update(&self, job: &RetryJob) -> Result<(), RetryServiceError> {
        job_to_active(job)?
            .update(&self.db)
            .await
            .context("update retry job")?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        organisation_id: Uuid,
        id: Uuid,
    ) -> Result<Option<RetryJob>, RetryServiceError> {
        let model = retry_jobs::Entity::find_by_id(id)
            .filter(retry_jobs::Column::OrganisationId.eq(organisation_id))
            .one(&self.db)
            .await
            .context("find retry job by id")?;
        Ok(model.map(job_from_model).transpose()?)
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<RetryJob>, RetryServiceError> {
        let models = retry_jobs::Entity::find()
            .filter(retry_jobs::Column::OrganisationId.eq(organisation_id))
            .order_by_desc(retry_jobs::Column::CreatedAt)
            .paginate_by(page)
            .all(&self.db)
            .await
            .context("list retry jobs")?;
        Ok(models
            .into_iter()
            .map(job_from_model)
            .collect::<anyhow::Result<_>>()?)
    }
}

fn job_to_active(job: &RetryJob) -> anyhow::Result<retry_jobs::ActiveModel> {
    Ok(retry_jobs::ActiveModel {
        id: Set(job.id),
        organisation_id: Set(job.organisation_id),
        target_date: Set(job.target_date),
        timezone: Set(job.timezone.clone()),
        cutoff_time: Set(job.cutoff_time),
        status: Set(job.status.as_str().to_owned()),
        started_at: Set(job.started_at),
        completed_at: Set(job.completed_at),
        total_attempts: Set(job.total_attempts as i32),
        successful_attempts: Set(job.successful_attempts as i32),
        failed_attempts: Set(job.failed_attempts as i32),
        skipped_attempts: Set(job.skipped_attempts as i32),
        failed_schedule_ids: Set(to_json(&job.failed_schedule_ids)?),
        triggered_by: Set(job.triggered_by.clone()),
        is_manual: Set(job.is_manual),
        dry_run: Set(job.dry_run),
        idempotency_key: Set(job.idempotency_key.clone()),
        error_message: Set(job.error_message.clone()),
        created_at: Set(job.created_at),
        updated_at: Set(job.updated_at),
    })
}

fn job_from_model(model: retry_jobs::Model) -> anyhow::Result<RetryJob> {
    Ok(RetryJob {
        id: model.id,
        organisation_id: model.organisation_id,
        target_date: model.target_date,
        timezone: model.timezone,
        cutoff_time: model.cutoff_time,
        status: model.status.parse::<JobStatus>()?,
        started_at: model.started_at,
        completed_at: model.completed_at,
        total_attempts: model.total_attempts.max(0) as u32,
        successful_attempts: model.successful_attempts.max(0) as u32,
        failed_attempts: model.failed_attempts.max(0) as u32,
        skipped_attempts: model.skipped_attempts.max(0) as u32,
        failed_schedule_ids: from_json(model.failed_schedule_ids)?,
        triggered_by: model.triggered_by,
        is_manual: model.is_manual,
        dry_run: model.dry_run,
        idempotency_key: model.idempotency_key,
        error_message: model.error_message,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Reminder repository ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbReminderRepository {
    pub db: DatabaseConnection,
}

impl ReminderRepository for DbReminderRepository {
    async fn insert_if_absent(
        &self,
        reminder: &Reminder,
    ) -> Result<(Reminder, bool), RetryServiceError> {
        let inserted = reminders::Entity::insert(reminder_to_active(reminder))
            .on_conflict(
                OnConflict::column(reminders::Column::IdempotencyKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert reminder")?;
        let stored = self
            .find_by_idempotency_key(&reminder.idempotency_key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("reminder vanished after insert"))?;
        Ok((stored, inserted > 0))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Reminder>, RetryServiceError> {
        let model = reminders::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find reminder by id")?;
        Ok(model.map(reminder_from_model).transpose()?)
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Reminder>, RetryServiceError> {
        let model = reminders::Entity::find()
            .filter(reminders::Column::IdempotencyKey.eq(key))
            .one(&self.db)
            .await
            .context("find reminder by idempotency key")?;
        Ok(model.map(reminder_from_model).transpose()?)
    }

    async fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> Result<Option<Reminder>, RetryServiceError> {
        let model = reminders::Entity::find()
            .filter(reminders::Column::ProviderMessageId.eq(provider_message_id))
            .one(&self.db)
            .await
            .context("find reminder by provider message id")?;
        Ok(model.map(reminder_from_model).transpose()?)
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        let models = reminders::Entity::find()
            .filter(reminders::Column::Status.eq(ReminderStatus::Pending.as_str()))
            .filter(reminders::Column::PlannedAt.lte(now))
            .order_by_asc(reminders::Column::PlannedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("find due reminders")?;
        Ok(models
            .into_iter()
            .map(reminder_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn pending_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        let models = reminders::Entity::find()
            .filter(reminders::Column::RetryScheduleId.eq(schedule_id))
            .filter(reminders::Column::Status.eq(ReminderStatus::Pending.as_str()))
            .order_by_asc(reminders::Column::PlannedAt)
            .all(&self.db)
            .await
            .context("find pending reminders of schedule")?;
        Ok(models
            .into_iter()
            .map(reminder_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn compare_and_set(
        &self,
        reminder: &Reminder,
        expected: ReminderStatus,
    ) -> Result<bool, RetryServiceError> {
        let result = reminders::Entity::update_many()
            .set(reminder_to_active(reminder))
            .filter(reminders::Column::Id.eq(reminder.id))
            .filter(reminders::Column::Status.eq(expected.as_str()))
            .exec(&self.db)
            .await
            .context("compare-and-set reminder")?;
        Ok(result.rows_affected == 1)
    }

    async fn update(&self, reminder: &Reminder) -> Result<(), RetryServiceError> {
        reminder_to_active(reminder)
            .update(&self.db)
            .await
            .context("update reminder")?;
        Ok(())
    }

    async fn count_planned_between(
        &self,
        client_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError> {
        let count = reminders::Entity::find()
            .filter(reminders::Column::ClientId.eq(client_id))
            .filter(reminders::Column::Status.ne(ReminderStatus::Cancelled.as_str()))
            .filter(reminders::Column::PlannedAt.gt(from))
            .filter(reminders::Column::PlannedAt.lt(to))
            .count(&self.db)
            .await
            .context("count client's reminders near planned time")?;
        Ok(count)
    }

    async fn count_planned_for_client(
        &self,
        client_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, RetryServiceError> {
        let count = reminders::Entity::find()
            .filter(reminders::Column::ClientId.eq(client_id))
            .filter(reminders::Column::Status.ne(ReminderStatus::Cancelled.as_str()))
            .filter(reminders::Column::PlannedAt.gte(from))
            .filter(reminders::Column::PlannedAt.lt(to))
            .count(&self.db)
            .await
            .context("count client's reminders")?;
        Ok(count)
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ReminderFilter,
        page: PageRequest,
    ) -> Result<Vec<Reminder>, RetryServiceError> {
        let mut query =
            reminders::Entity::find().filter(reminders::Column::OrganisationId.eq(organisation_id));
        if let Some(status) = filter.status {
            query = query.filter(reminders::Column::Status.eq(status.as_str()));
        }
        if let Some(channel) = filter.channel {
            query = query.filter(reminders::Column::Channel.eq(channel.as_str()));
        }
        if let Some(schedule_id) = filter.retry_schedule_id {
            query = query.filter(reminders::Column::RetryScheduleId.eq(schedule_id));
        }
        if let Some(client_id) = filter.client_id {
            query = query.filter(reminders::Column::ClientId.eq(client_id));
        }
        let models = query
            .order_by_desc(reminders::Column::PlannedAt)
            .paginate_by(page)
            .all(&self.db)
            .await
            .context("list reminders")?;
        Ok(models
            .into_iter()
            .map(reminder_from_model)
            .collect::<anyhow::Result<_>>()?)
    }
}

fn reminder_to_active(reminder: &Reminder) -> reminders::ActiveModel {
    reminders::ActiveModel {
        id: Set(reminder.id),
        organisation_id: Set(reminder.organisation_id),
        societe_id: Set(reminder.societe_id),
        retry_schedule_id: Set(reminder.retry_schedule_id),
        retry_attempt_id: Set(reminder.retry_attempt_id),
        client_id: Set(reminder.client_id),
        reminder_policy_id: Set(reminder.reminder_policy_id),
        trigger_rule_id: Set(reminder.trigger_rule_id),
        channel: Set(reminder.channel.as_str().to_owned()),
        template_id: Set(reminder.template_id.clone()),
        template_variables: Set(reminder.template_variables.clone()),
        trigger: Set(reminder.trigger.as_str().to_owned()),
        planned_at: Set(reminder.planned_at),
        sent_at: Set(reminder.sent_at),
        delivered_at: Set(reminder.delivered_at),
        status: Set(reminder.status.as_str().to_owned()),
        provider_name: Set(reminder.provider_name.clone()),
        provider_message_id: Set(reminder.provider_message_id.clone()),
        delivery_status_raw: Set(reminder.delivery_status_raw.clone()),
        error_code: Set(reminder.error_code.clone()),
        error_message: Set(reminder.error_message.clone()),
        retry_count: Set(reminder.retry_count as i32),
        idempotency_key: Set(reminder.idempotency_key.clone()),
        metadata: Set(reminder.metadata.clone()),
        created_at: Set(reminder.created_at),
        updated_at: Set(reminder.updated_at),
    }
}

fn reminder_from_model(model: reminders::Model) -> anyhow::Result<Reminder> {
    Ok(Reminder {
        id: model.id,
        organisation_id: model.organisation_id,
        societe_id: model.societe_id,
        retry_schedule_id: model.retry_schedule_id,
        retry_attempt_id: model.retry_attempt_id,
        client_id: model.client_id,
        reminder_policy_id: model.reminder_policy_id,
        trigger_rule_id: model.trigger_rule_id,
        channel: model.channel.parse::<ReminderChannel>()?,
        template_id: model.template_id,
        template_variables: model.template_variables,
        trigger: model.trigger.parse::<ReminderTrigger>()?,
        planned_at: model.planned_at,
        sent_at: model.sent_at,
        delivered_at: model.delivered_at,
        status: model.status.parse::<ReminderStatus>()?,
        provider_name: model.provider_name,
        provider_message_id: model.provider_message_id,
        delivery_status_raw: model.delivery_status_raw,
        error_code: model.error_code,
        error_message: model.error_message,
        retry_count: model.retry_count.max(0) as u32,
        idempotency_key: model.idempotency_key,
        metadata: model.metadata,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Opt-out repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOptOutRepository {
    pub db: DatabaseConnection,
}

impl OptOutRepository for DbOptOutRepository {
    async fn is_opted_out(
        &self,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<bool, RetryServiceError> {
        let model = reminder_opt_outs::Entity::find_by_id((client_id, channel.as_str().to_owned()))
            .one(&self.db)
            .await
            .context("find reminder opt-out")?;
        Ok(model.is_some())
    }

    async fn opt_out(
        &self,
        organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<(), RetryServiceError> {
        let opt_out = reminder_opt_outs::ActiveModel {
            client_id: Set(client_id),
            channel: Set(channel.as_str().to_owned()),
            organisation_id: Set(organisation_id),
            created_at: Set(Utc::now()),
        };
        reminder_opt_outs::Entity::insert(opt_out)
            .on_conflict(
                OnConflict::columns([
                    reminder_opt_outs::Column::ClientId,
                    reminder_opt_outs::Column::Channel,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert reminder opt-out")?;
        Ok(())
    }

    async fn opt_in(
        &self,
        organisation_id: Uuid,
        client_id: Uuid,
        channel: ReminderChannel,
    ) -> Result<bool, RetryServiceError> {
        let result = reminder_opt_outs::Entity::delete_many()
            .filter(reminder_opt_outs::Column::OrganisationId.eq(organisation_id))
            .filter(reminder_opt_outs::Column::ClientId.eq(client_id))
            .filter(reminder_opt_outs::Column::Channel.eq(channel.as_str()))
            .exec(&self.db)
            .await
            .context("delete reminder opt-out")?;
        Ok(result.rows_affected > 0)
    }
}

// ── Audit log repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAuditLogRepository {
    pub db: DatabaseConnection,
}

impl AuditLogRepository for DbAuditLogRepository {
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), RetryServiceError> {
        retry_audit_logs::ActiveModel {
            id: Set(entry.id),
            organisation_id: Set(entry.organisation_id),
            entity_type: Set(entry.entity_type.as_str().to_owned()),
            entity_id: Set(entry.entity_id),
            action: Set(entry.action.as_str().to_owned()),
            event: Set(entry.event.clone()),
            old_value: Set(entry.old_value.clone()),
            new_value: Set(entry.new_value.clone()),
            change_summary: Set(entry.change_summary.clone()),
            retry_schedule_id: Set(entry.retry_schedule_id),
            retry_attempt_id: Set(entry.retry_attempt_id),
            reminder_id: Set(entry.reminder_id),
            payment_id: Set(entry.payment_id),
            actor_type: Set(entry.actor_type.as_str().to_owned()),
            actor_id: Set(entry.actor_id),
            timestamp: Set(entry.timestamp),
            metadata: Set(entry.metadata.clone()),
        }
        .insert(&self.db)
        .await
        .context("append audit log entry")?;
        Ok(())
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError> {
        let mut query = retry_audit_logs::Entity::find()
            .filter(retry_audit_logs::Column::OrganisationId.eq(organisation_id));
        if let Some(entity_type) = filter.entity_type {
            query = query.filter(retry_audit_logs::Column::EntityType.eq(entity_type.as_str()));
        }
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(retry_audit_logs::Column::EntityId.eq(entity_id));
        }
        if let Some(schedule_id) = filter.retry_schedule_id {
            query = query.filter(retry_audit_logs::Column::RetryScheduleId.eq(schedule_id));
        }
        if let Some(action) = filter.action {
            query = query.filter(retry_audit_logs::Column::Action.eq(action.as_str()));
        }
        if let Some(actor_type) = filter.actor_type {
            query = query.filter(retry_audit_logs::Column::ActorType.eq(actor_type.as_str()));
        }
        if let Some(from) = filter.from {
            query = query.filter(retry_audit_logs::Column::Timestamp.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(retry_audit_logs::Column::Timestamp.lte(to));
        }
        let models = query
            .order_by_desc(retry_audit_logs::Column::Timestamp)
            .paginate_by(page)
            .all(&self.db)
            .await
            .context("list audit logs")?;
        Ok(models
            .into_iter()
            .map(audit_from_model)
            .collect::<anyhow::Result<_>>()?)
    }

    async fn entity_history(
        &self,
        organisation_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, RetryServiceError> {
        let models = retry_audit_logs::Entity::find()
            .filter(retry_audit_logs::Column::OrganisationId.eq(organisation_id))
            .filter(retry_audit_logs::Column::EntityType.eq(entity_type.as_str()))
            .filter(retry_audit_logs::Column::EntityId.eq(entity_id))
            .order_by_asc(retry_audit_logs::Column::Timestamp)
            .all(&self.db)
            .await
            .context("load entity audit history")?;
        Ok(models
            .into_iter()
            .map(audit_from_model)
            .collect::<anyhow::Result<_>>()?)
    }
}

fn audit_from_model(model: retry_audit_logs::Model) -> anyhow::Result<AuditLogEntry> {
    Ok(AuditLogEntry {
        id: model.id,
        organisation_id: model.organisation_id,
        entity_type: model.entity_type.parse::<EntityType>()?,
        entity_id: model.entity_id,
        action: model.action.parse::<AuditAction>()?,
        event: model.event,
        old_value: model.old_value,
        new_value: model.new_value,
        change_summary: model.change_summary,
        retry_schedule_id: model.retry_schedule_id,
        retry_attempt_id: model.retry_attempt_id,
        reminder_id: model.reminder_id,
        payment_id: model.payment_id,
        actor_type: model.actor_type.parse::<ActorType>()?,
        actor_id: model.actor_id,
        timestamp: model.timestamp,
        metadata: model.metadata,
    })
}
