//! OpenAI-compatible Provider
//!
//! Chat Completions API client. Any server speaking the same protocol
//! (Ollama, vLLM, LiteLLM) works through `llm.api_base`.

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

const PROVIDER: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely; absent for unauthenticated local servers
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig, api_key: Option<SecretString>) -> Result<Self, LlmError> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

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
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user.clone(),
                },
            ],
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: Some(request.max_tokens.unwrap_or(self.max_tokens)),
            response_format: request.json.then(|| ResponseFormat {
                format_type: "json_object",
            }),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn post(&self, body: &ChatCompletionRequest) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.api_base);
        let builder = self.client.post(url).json(body);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn response(&self, content: String, usage: TokenUsage, started: Instant) -> LlmResponse {
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "OpenAI completion finished"
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
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        debug!("Completing with OpenAI (model: {})", self.model);
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

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::parse(format!("Invalid OpenAI response: {}", e)).provider(PROVIDER))?;

        let usage = body
            .usage
            .map(|u| TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::parse("No content in OpenAI response").provider(PROVIDER))?;

        Ok(self.response(content, usage, started))
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<LlmResponse, LlmError> {
        debug!("Streaming with OpenAI (model: {})", self.model);
        let started = Instant::now();

        let mut es = EventSource::new(self.post(&self.build_request(request, true))).map_err(|e| {
            LlmError::with_provider(ErrorCategory::BadRequest, e.to_string(), PROVIDER)
        })?;

        let mut content = String::new();
        let mut usage = TokenUsage::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("OpenAI stream opened"),
                Ok(Event::Message(msg)) => {
                    if msg.data.trim() == "[DONE]" {
                        break;
                    }
                    let chunk: StreamChunk = match serde_json::from_str(&msg.data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            es.close();
                            return Err(LlmError::parse(format!("Invalid stream chunk: {}", e))
                                .provider(PROVIDER));
                        }
                    };
                    if let Some(u) = chunk.usage {
                        usage = TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens);
                    }
                    for choice in chunk.choices {
                        if let Some(text) = choice.delta.content
                            && !text.is_empty()
                        {
                            content.push_str(&text);
                            if chunk_tx.send(text).await.is_err() {
                                debug!("Chunk receiver dropped, accumulating only");
                            }
                        }
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
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(
            &LlmConfig {
                api_base: Some("http://localhost:8080/v1/".into()),
                ..Default::default()
            },
            Some(SecretString::from("sk-test")),
        )
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let provider = provider();
        let request = CompletionRequest::new("sys", "hello")
            .with_max_tokens(50)
            .expect_json();
        let body = serde_json::to_value(provider.build_request(&request, false)).unwrap();

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 50);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_stream_body_requests_usage() {
        let provider = provider();
        let body =
            serde_json::to_value(provider.build_request(&CompletionRequest::new("s", "u"), true))
                .unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_trailing_slash_trimmed_and_key_redacted() {
        let provider = provider();
        assert_eq!(provider.api_base, "http://localhost:8080/v1");
        let debug = format!("{:?}", provider);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-test"));
    }

    #[test]
    fn test_stream_chunk_parsing() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hi"));

        let usage_only: StreamChunk = serde_json::from_str(
            r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7}}"#,
        )
        .unwrap();
        assert_eq!(usage_only.usage.unwrap().completion_tokens, 7);
    }
}
