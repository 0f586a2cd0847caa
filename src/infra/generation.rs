//! HTTP adapter for the text generator (messages-style endpoint).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::application::repos::{GenerationError, TextGenerator};

use super::error::InfraError;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct HttpTextGenerator {
    client: Client,
    config: HttpGeneratorConfig,
}

impl HttpTextGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("tsuzuri/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn collect_text(response: MessagesResponse) -> Result<String, GenerationError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        Err(GenerationError::Decode("response contained no text block".to_string()))
    } else {
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, instruction: &str) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: [Message {
                role: "user",
                content: instruction,
            }],
        };

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GenerationError::Timeout {
                        seconds: self.config.timeout.as_secs(),
                    }
                } else {
                    GenerationError::request(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Decode(err.to_string()))?;
        collect_text(parsed)
    }
}

/// Stand-in used when no generation credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTextGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredTextGenerator {
    async fn generate(&self, _instruction: &str) -> Result<String, GenerationError> {
        Err(GenerationError::request(
            "text generation is not configured (set generation.api_key)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_messages_shape() {
        let body = MessagesRequest {
            model: "model-x",
            max_tokens: 8000,
            messages: [Message {
                role: "user",
                content: "hello",
            }],
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["model"], "model-x");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
    }

    #[test]
    fn collect_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"a"},{"type":"tool_use"},{"type":"text","text":"b"}]}"#,
        )
        .expect("parse");
        assert_eq!(collect_text(response).expect("text"), "ab");
    }

    #[test]
    fn collect_text_rejects_empty_answers() {
        let response: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).expect("parse");
        assert!(matches!(
            collect_text(response),
            Err(GenerationError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_generator_always_fails() {
        let result = UnconfiguredTextGenerator.generate("topic").await;
        assert!(matches!(result, Err(GenerationError::Request(_))));
    }
}
