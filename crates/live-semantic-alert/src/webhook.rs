use std::time::Duration;

use async_trait::async_trait;
use live_semantic_types::MatchEvent;
use reqwest::Client;

use crate::error::{AlertError, AlertResult};
use crate::payload::AlertPayload;
use crate::sink::AlertSink;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs an [`AlertPayload`] to a URL. Any non-2xx answer is a failure.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
    include_image: bool,
}

impl WebhookSink {
    pub fn new(
        url: impl Into<String>,
        include_image: bool,
        timeout: Option<Duration>,
    ) -> AlertResult<Self> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AlertError::configuration(format!(
                "webhook url '{url}' must start with http:// or https://"
            )));
        }
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|err| {
                AlertError::configuration(format!("failed to create HTTP client: {err}"))
            })?;
        Ok(Self {
            client,
            url,
            include_image,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn alert(&self, event: MatchEvent) -> AlertResult<()> {
        let payload = AlertPayload::from_event(&event, self.include_image);
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AlertError::delivery(format!("POST {} failed: {err}", self.url)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AlertError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}
