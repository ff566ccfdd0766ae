//! JSON request bodies shared by HTTP tests.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

/// A `POST /rejections` body for `organisation_id` with reason `code`.
pub fn rejection_payload(organisation_id: Uuid, code: &str, rejected_at: DateTime<Utc>) -> Value {
    let event_id = Uuid::new_v4();
    json!({
        "eventId": event_id.to_string(),
        "organisationId": organisation_id,
        "societeId": Uuid::new_v4(),
        "paymentId": Uuid::new_v4(),
        "scheduleRef": "SCH-0001",
        "invoiceId": null,
        "contractId": null,
        "clientId": Uuid::new_v4(),
        "productId": null,
        "channelId": null,
        "reasonCode": code,
        "reasonMessage": "Insufficient funds",
        "amountCents": 4990,
        "currency": "EUR",
        "pspName": "sepa",
        "pspPaymentId": "psp-1",
        "rejectedAt": rejected_at.to_rfc3339(),
        "idempotencyKey": format!("evt-{event_id}"),
    })
}

/// A minimal `POST /retry-policies` body.
pub fn retry_policy_payload(name: &str) -> Value {
    json!({
        "name": name,
        "retryDelaysDays": [3, 10, 24],
        "maxAttempts": 3,
        "maxTotalDays": 30,
        "isDefault": true,
    })
}
