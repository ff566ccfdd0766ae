//! Capabilities the engine calls out to. Implementations live in `infra/`.

#![allow(async_fn_in_trait)]

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reminder::ReminderChannel;
use crate::error::RetryServiceError;

// ── Payment capability ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    pub attempt_id: Uuid,
    pub retry_schedule_id: Uuid,
    pub organisation_id: Uuid,
    pub original_payment_id: Uuid,
    pub client_id: Uuid,
    pub attempt_number: u32,
    pub amount_cents: i64,
    pub currency: String,
    pub psp_name: String,
    pub psp_payment_id: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub success: bool,
    pub provider_payment_id: Option<String>,
    pub response_code: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub new_rejection_code: Option<String>,
}

/// Presents a collection again. `Err` means the submission never reached a
/// decision (transport failure); a declined collection is `Ok` with
/// `success = false`.
pub trait PaymentGateway: Send + Sync {
    async fn submit(
        &self,
        submission: &PaymentSubmission,
    ) -> Result<PaymentOutcome, RetryServiceError>;
}

// ── Notification capability ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDispatch {
    pub reminder_id: Uuid,
    pub organisation_id: Uuid,
    pub client_id: Uuid,
    pub channel: ReminderChannel,
    pub template_id: String,
    pub variables: serde_json::Value,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// One delivery integration per channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn provider(&self) -> &str;

    async fn send(
        &self,
        dispatch: &ReminderDispatch,
    ) -> Result<NotificationOutcome, RetryServiceError>;
}

/// Channel → notifier map, built at startup and shared read-only.
#[derive(Clone, Default)]
pub struct NotifierRegistry {
    notifiers: HashMap<ReminderChannel, Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: ReminderChannel, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.insert(channel, notifier);
        self
    }

    pub fn get(&self, channel: ReminderChannel) -> Option<&Arc<dyn Notifier>> {
        self.notifiers.get(&channel)
    }

    pub fn channels(&self) -> Vec<ReminderChannel> {
        let mut channels: Vec<_> = self.notifiers.keys().copied().collect();
        channels.sort_by_key(|c| c.as_str());
        channels
    }
}

impl std::fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierRegistry")
            .field("channels", &self.channels())
            .finish()
    }
}
