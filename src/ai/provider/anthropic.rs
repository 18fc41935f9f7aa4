//! Anthropic-compatible Provider
//!
//! Messages API client with SSE streaming of `content_block_delta` events.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CompletionRequest, ErrorClassifier, LlmError, LlmProvider, LlmResponse, ResponseMetadata,
    ResponseTiming, TokenUsage,
};
use crate::config::LlmConfig;
use crate::types::ErrorCategory;

const PROVIDER: &str = "anthropic";
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";

/// Anthropic-compatible provider
pub struct AnthropicProvider {
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig, api_key: SecretString) -> Result<Self, LlmError> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                LlmError::with_provider(
                    ErrorCategory::Unavailable,
                    format!("Failed to create HTTP client: {}", e),
                    PROVIDER,
                )
            })?;

        Ok(Self {
            api_key,
            api_base,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> MessagesRequest {
        // The messages API has no JSON mode; the instruction lives in the prompt
        let system = if request.json {
            format!(
                "{}\n\nRespond ONLY with a single JSON object, no explanation.",
                request.system
            )
        } else {
            request.system.clone()
        };

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
            system,
            messages: vec![Message {
                role: "user",
                content: request.user.clone(),
            }],
            stream,
        }
    }

    fn post(&self, body: &MessagesRequest) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(body)
    }

    fn response(&self, content: String, usage: TokenUsage, started: Instant) -> LlmResponse {
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Anthropic completion finished"
        );
        LlmResponse {
            content,
            usage,
            timing: ResponseTiming::from_duration(started.elapsed()),
            metadata: ResponseMetadata {
                model: self.model.clone(),
                provider: PROVIDER.to_string(),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        debug!("Completing with Anthropic (model: {})", self.model);
        let started = Instant::now();

        let response = self
            .post(&self.build_request(request, false))
            .send()
            .await
            .map_err(|e| LlmError::from(e).provider(PROVIDER))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status, &body, PROVIDER));
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            LlmError::parse(format!("Invalid Anthropic response: {}", e)).provider(PROVIDER)
        })?;

        let content: String = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        if content.trim().is_empty() {
            return Err(LlmError::parse("No text in Anthropic response").provider(PROVIDER));
        }

        let usage = body
            .usage
            .map(|u| TokenUsage::from_anthropic(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(self.response(content, usage, started))
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<LlmResponse, LlmError> {
        debug!("Streaming with Anthropic (model: {})", self.model);
        let started = Instant::now();

        let mut es = EventSource::new(self.post(&self.build_request(request, true))).map_err(|e| {
            LlmError::with_provider(ErrorCategory::BadRequest, e.to_string(), PROVIDER)
        })?;

        let mut content = String::new();
        let mut usage = TokenUsage::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("Anthropic stream opened"),
                Ok(Event::Message(msg)) => {
                    let data: StreamEvent = match serde_json::from_str(&msg.data) {
                        Ok(data) => data,
                        Err(e) => {
                            es.close();
                            return Err(LlmError::parse(format!("Invalid stream event: {}", e))
                                .provider(PROVIDER));
                        }
                    };
                    match data {
                        StreamEvent::MessageStart { message } => {
                            if let Some(u) = message.usage {
                                usage.input_tokens = u.input_tokens;
                            }
                        }
                        StreamEvent::ContentBlockDelta { delta } => {
                            if let Some(text) = delta.text
                                && !text.is_empty()
                            {
                                content.push_str(&text);
                                if chunk_tx.send(text).await.is_err() {
                                    debug!("Chunk receiver dropped, accumulating only");
                                }
                            }
                        }
                        StreamEvent::MessageDelta { usage: Some(u) } => {
                            usage.output_tokens = u.output_tokens;
                        }
                        StreamEvent::MessageStop => break,
                        StreamEvent::Error { error } => {
                            es.close();
                            return Err(ErrorClassifier::classify(&error.message, PROVIDER));
                        }
                        _ => {}
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    es.close();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ErrorClassifier::classify_http_status(
                        status.as_u16(),
                        &body,
                        PROVIDER,
                    ));
                }
                Err(e) => {
                    es.close();
                    return Err(ErrorClassifier::classify(&e.to_string(), PROVIDER));
                }
            }
        }
        es.close();

        Ok(self.response(content, usage, started))
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: StreamMessage,
    },
    ContentBlockDelta {
        delta: TextDelta,
    },
    MessageDelta {
        usage: Option<Usage>,
    },
    MessageStop,
    Error {
        error: StreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct TextDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(&LlmConfig::default(), SecretString::from("sk-ant-test")).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(
            provider().build_request(&CompletionRequest::new("sys", "hi").expect_json(), false),
        )
        .unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 1024);
        assert!(body["system"].as_str().unwrap().contains("JSON object"));
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_stream_event_parsing() {
        let delta: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
        )
        .unwrap();
        assert!(matches!(delta, StreamEvent::ContentBlockDelta { delta } if delta.text.as_deref() == Some("Hello")));

        let ping: StreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, StreamEvent::Other));

        let stop: StreamEvent = serde_json::from_str(r#"{"type":"message_stop"}"#).unwrap();
        assert!(matches!(stop, StreamEvent::MessageStop));
    }

    #[test]
    fn test_content_blocks_skip_non_text() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"a"},{"type":"tool_use","id":"x"}],"usage":{"input_tokens":1,"output_tokens":2}}"#,
        )
        .unwrap();
        assert_eq!(body.content.len(), 2);
        assert!(matches!(body.content[1], ContentBlock::Other));
    }

    #[test]
    fn test_debug_redacts_key() {
        assert!(!format!("{:?}", provider()).contains("sk-ant-test"));
    }
}
