use std::time::Duration;

use anyhow::Context as _;
use reqwest::Client;

use crate::domain::port::{PaymentGateway, PaymentOutcome, PaymentSubmission};
use crate::error::RetryServiceError;

/// `PaymentGateway` over the payment capability's HTTP API.
///
/// Submissions go to `POST {base}/submissions` with the attempt's idempotency
/// key in the `idempotency-key` header, so a resubmitted attempt is collected
/// at most once on the provider side.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RetryServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build payment gateway client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

impl PaymentGateway for HttpPaymentGateway {
    async fn submit(
        &self,
        submission: &PaymentSubmission,
    ) -> Result<PaymentOutcome, RetryServiceError> {
        let url = format!("{}/submissions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("idempotency-key", &submission.idempotency_key)
            .json(submission)
            .send()
            .await
            .map_err(|e| RetryServiceError::External(format!("payment submission failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetryServiceError::External(format!(
                "payment gateway returned {status}: {body}"
            )));
        }

        response.json::<PaymentOutcome>().await.map_err(|e| {
            RetryServiceError::External(format!("invalid payment gateway response: {e}"))
        })
    }
}
