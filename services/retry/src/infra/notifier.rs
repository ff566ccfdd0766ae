use std::time::Duration;

use anyhow::Context as _;
use reqwest::Client;

use crate::domain::port::{NotificationOutcome, Notifier, ReminderDispatch};
use crate::error::RetryServiceError;

/// Delivery integration reached by `POST {url}` with the dispatch as JSON.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    url: String,
    provider: String,
}

impl HttpNotifier {
    pub fn new(
        provider: impl Into<String>,
        url: &str,
        timeout: Duration,
    ) -> Result<Self, RetryServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build notifier client")?;
        Ok(Self {
            client,
            url: url.to_owned(),
            provider: provider.into(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for HttpNotifier {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn send(
        &self,
        dispatch: &ReminderDispatch,
    ) -> Result<NotificationOutcome, RetryServiceError> {
        let response = self
            .client
            .post(&self.url)
            .header("idempotency-key", &dispatch.idempotency_key)
            .json(dispatch)
            .send()
            .await
            .map_err(|e| {
                RetryServiceError::External(format!("{} send failed: {e}", self.provider))
            })?;

        let status = response.status();
        if status.is_client_error() {
            // The provider refused this message; report it as a failed send.
            let body = response.text().await.unwrap_or_default();
            return Ok(NotificationOutcome {
                success: false,
                provider_message_id: None,
                error_code: Some(format!("HTTP_{}", status.as_u16())),
                error_message: Some(body),
            });
        }
        if !status.is_success() {
            return Err(RetryServiceError::External(format!(
                "{} returned {status}",
                self.provider
            )));
        }

        response.json::<NotificationOutcome>().await.map_err(|e| {
            RetryServiceError::External(format!("invalid {} response: {e}", self.provider))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::domain::reminder::ReminderChannel;

    fn dispatch() -> ReminderDispatch {
        ReminderDispatch {
            reminder_id: Uuid::now_v7(),
            organisation_id: Uuid::now_v7(),
            client_id: Uuid::now_v7(),
            channel: ReminderChannel::Sms,
            template_id: "retry-failed".into(),
            variables: serde_json::json!({ "amount": "49.90" }),
            idempotency_key: "rem-1".into(),
        }
    }

    async fn notifier_answering(template: ResponseTemplate) -> (MockServer, HttpNotifier) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("idempotency-key", "rem-1"))
            .respond_with(template)
            .mount(&server)
            .await;
        let notifier = HttpNotifier::new("sms", &server.uri(), Duration::from_secs(5)).unwrap();
        (server, notifier)
    }

    #[tokio::test]
    async fn should_return_provider_message_id() {
        let (_server, notifier) = notifier_answering(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "providerMessageId": "sms-42",
            })),
        )
        .await;

        let outcome = notifier.send(&dispatch()).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.provider_message_id.as_deref(), Some("sms-42"));
        assert_eq!(notifier.provider(), "sms");
    }

    #[tokio::test]
    async fn should_report_refused_message_as_failed_send() {
        let (_server, notifier) =
            notifier_answering(ResponseTemplate::new(422).set_body_string("bad number")).await;

        let outcome = notifier.send(&dispatch()).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_code.as_deref(), Some("HTTP_422"));
        assert_eq!(outcome.error_message.as_deref(), Some("bad number"));
    }

    #[tokio::test]
    async fn should_fail_on_provider_outage() {
        let (_server, notifier) = notifier_answering(ResponseTemplate::new(500)).await;

        let result = notifier.send(&dispatch()).await;

        assert!(matches!(result, Err(RetryServiceError::External(_))));
    }
}
