//! Webhook rendering target.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;

use crate::application::repos::{InvalidationError, RenderInvalidator};
use crate::cache::PageKey;

use super::error::InfraError;

const TARGET: &str = "webhook";

/// POSTs `{"pages": [...]}` to an external rendering layer.
#[derive(Debug, Clone)]
pub struct WebhookInvalidator {
    client: Client,
    url: Url,
}

#[derive(Debug, Serialize)]
struct InvalidationPayload {
    pages: Vec<String>,
}

impl WebhookInvalidator {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("tsuzuri/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl RenderInvalidator for WebhookInvalidator {
    fn name(&self) -> &'static str {
        TARGET
    }

    async fn invalidate(&self, pages: &[PageKey]) -> Result<(), InvalidationError> {
        let payload = InvalidationPayload {
            pages: pages.iter().map(PageKey::to_string).collect(),
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| InvalidationError::new(TARGET, err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(InvalidationError::new(
                TARGET,
                format!("webhook answered {status}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_page_wire_names() {
        let payload = InvalidationPayload {
            pages: PageKey::for_post("hello").iter().map(PageKey::to_string).collect(),
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"pages": ["root", "listing", "post:hello"]})
        );
    }
}
