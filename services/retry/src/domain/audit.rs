//! Append-only audit trail entries.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dunning_domain::actor::{Actor, ActorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Import,
}

text_enum!(AuditAction, "audit action", {
    Create => "CREATE",
    Update => "UPDATE",
    Delete => "DELETE",
    Import => "IMPORT",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    RetryPolicy,
    ReminderPolicy,
    RetrySchedule,
    RetryAttempt,
    RetryJob,
    Reminder,
}

text_enum!(EntityType, "entity type", {
    RetryPolicy => "RETRY_POLICY",
    ReminderPolicy => "REMINDER_POLICY",
    RetrySchedule => "RETRY_SCHEDULE",
    RetryAttempt => "RETRY_ATTEMPT",
    RetryJob => "RETRY_JOB",
    Reminder => "REMINDER",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    /// Domain label of the transition, e.g. `REPLANNED` or `DELIVERY_OPENED`.
    pub event: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub change_summary: String,
    pub retry_schedule_id: Option<Uuid>,
    pub retry_attempt_id: Option<Uuid>,
    pub reminder_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub actor_type: ActorType,
    pub actor_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// An entry before it is stamped with id, timestamp and summary.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub organisation_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub event: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub change_summary: Option<String>,
    pub retry_schedule_id: Option<Uuid>,
    pub retry_attempt_id: Option<Uuid>,
    pub reminder_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub actor: Actor,
    pub metadata: serde_json::Value,
}

impl NewAuditEntry {
    pub fn new(
        organisation_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        action: AuditAction,
        event: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            organisation_id,
            entity_type,
            entity_id,
            action,
            event: event.into(),
            old_value: None,
            new_value: None,
            change_summary: None,
            retry_schedule_id: None,
            retry_attempt_id: None,
            reminder_id: None,
            payment_id: None,
            actor,
            metadata: serde_json::json!({}),
        }
    }

    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.old_value = serde_json::to_value(value).ok();
        self
    }

    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.new_value = serde_json::to_value(value).ok();
        self
    }

    pub fn schedule(mut self, id: Uuid) -> Self {
        self.retry_schedule_id = Some(id);
        self
    }

    pub fn attempt(mut self, id: Uuid) -> Self {
        self.retry_attempt_id = Some(id);
        self
    }

    pub fn reminder(mut self, id: Uuid) -> Self {
        self.reminder_id = Some(id);
        self
    }

    pub fn payment(mut self, id: Uuid) -> Self {
        self.payment_id = Some(id);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.change_summary = Some(summary.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Stamp the entry, deriving the change summary when none was given.
    pub fn into_entry(self, id: Uuid, timestamp: DateTime<Utc>) -> AuditLogEntry {
        let change_summary = self.change_summary.unwrap_or_else(|| {
            change_summary(
                self.action,
                self.entity_type,
                self.old_value.as_ref(),
                self.new_value.as_ref(),
            )
        });
        AuditLogEntry {
            id,
            organisation_id: self.organisation_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            action: self.action,
            event: self.event,
            old_value: self.old_value,
            new_value: self.new_value,
            change_summary,
            retry_schedule_id: self.retry_schedule_id,
            retry_attempt_id: self.retry_attempt_id,
            reminder_id: self.reminder_id,
            payment_id: self.payment_id,
            actor_type: self.actor.kind,
            actor_id: self.actor.id,
            timestamp,
            metadata: self.metadata,
        }
    }
}

/// Human-readable description of what an entry changed.
///
/// Updates list the top-level fields whose values differ, sorted.
pub fn change_summary(
    action: AuditAction,
    entity_type: EntityType,
    before: Option<&serde_json::Value>,
    after: Option<&serde_json::Value>,
) -> String {
    match action {
        AuditAction::Create => format!("Created {entity_type}"),
        AuditAction::Delete => format!("Deleted {entity_type}"),
        AuditAction::Import => format!("Imported {entity_type}"),
        AuditAction::Update => {
            let empty = serde_json::Map::new();
            let before = before.and_then(|v| v.as_object()).unwrap_or(&empty);
            let after = after.and_then(|v| v.as_object()).unwrap_or(&empty);
            let changed: BTreeSet<&str> = before
                .keys()
                .chain(after.keys())
                .filter(|k| before.get(*k) != after.get(*k))
                .map(String::as_str)
                .collect();
            if changed.is_empty() {
                "No changes detected".to_owned()
            } else {
                changed.into_iter().collect::<Vec<_>>().join(", ")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub retry_schedule_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub actor_type: Option<ActorType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.entity_type.is_none_or(|t| entry.entity_type == t)
            && self.entity_id.is_none_or(|id| entry.entity_id == id)
            && self
                .retry_schedule_id
                .is_none_or(|id| entry.retry_schedule_id == Some(id))
            && self.action.is_none_or(|a| entry.action == a)
            && self.actor_type.is_none_or(|a| entry.actor_type == a)
            && self.from.is_none_or(|from| entry.timestamp >= from)
            && self.to.is_none_or(|to| entry.timestamp <= to)
    }
}
