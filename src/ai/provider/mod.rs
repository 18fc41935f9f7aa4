//! LLM Provider Abstraction
//!
//! Defines the `LlmProvider` trait used for every language-model call.
//! Adapters return `Result<_, LlmError>`; callers match on the failure
//! category and substitute their local fallback.
//!
//! ## Modules
//!
//! - `openai`: OpenAI-compatible chat completions (also local servers via `api_base`)
//! - `anthropic`: Anthropic-compatible messages API
//! - `cache`: per-run memoization of non-streamed completions

mod anthropic;
mod cache;
mod openai;

pub use anthropic::AnthropicProvider;
pub use cache::{CachedProvider, CompletionCache};
pub use openai::OpenAiProvider;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{LlmConfig, ProviderKind};

// =============================================================================
// Requests
// =============================================================================

/// One system + user exchange sent to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Override of the configured completion size
    pub max_tokens: Option<usize>,
    /// Override of the configured temperature
    pub temperature: Option<f32>,
    /// Ask the backend for a JSON object reply
    pub json: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: None,
            temperature: None,
            json: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn expect_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Stable digest of the prompt pair, used as the cache key
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.system.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.user.as_bytes());
        hasher.update([self.json as u8]);
        format!("{:x}", hasher.finalize())
    }
}

// =============================================================================
// LLM Response with Usage Metrics
// =============================================================================

/// Complete backend response including text and usage metrics
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub content: String,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Response timing
    pub timing: ResponseTiming,
    /// Provider and model info
    pub metadata: ResponseMetadata,
}

impl LlmResponse {
    /// Create response with content only (usage unknown)
    pub fn content_only(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            timing: ResponseTiming::default(),
            metadata: ResponseMetadata::default(),
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Create from OpenAI-style usage response
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }

    /// Create from Anthropic-style usage response
    pub fn from_anthropic(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default)]
pub struct ResponseMetadata {
    /// Model used
    pub model: String,
    /// Provider name
    pub provider: String,
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// Language-model backend: one-shot and streamed text completion
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a request and return the full text
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError>;

    /// Complete a request, forwarding text chunks to `chunk_tx` as they arrive.
    ///
    /// The returned response carries the accumulated text. A dropped receiver
    /// does not abort the call. The default sends the whole reply as one chunk.
    async fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.complete(request).await?;
        if !response.content.is_empty() {
            let _ = chunk_tx.send(response.content.clone()).await;
        }
        Ok(response)
    }

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Shared provider handle injected into the discovery components
pub type SharedProvider = Arc<dyn LlmProvider>;

// =============================================================================
// Backend Selection
// =============================================================================

/// The configured backend, chosen once at startup
#[derive(Debug)]
pub enum Backend {
    OpenAiCompatible(OpenAiProvider),
    AnthropicCompatible(AnthropicProvider),
    /// No backend: every call reports `Unavailable`
    Local,
}

impl Backend {
    pub fn is_local(&self) -> bool {
        matches!(self, Backend::Local)
    }

    fn local_failure() -> LlmError {
        LlmError::unavailable("no language-model backend configured").provider("local")
    }
}

#[async_trait]
impl LlmProvider for Backend {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        match self {
            Backend::OpenAiCompatible(p) => p.complete(request).await,
            Backend::AnthropicCompatible(p) => p.complete(request).await,
            Backend::Local => Err(Self::local_failure()),
        }
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<LlmResponse, LlmError> {
        match self {
            Backend::OpenAiCompatible(p) => p.stream(request, chunk_tx).await,
            Backend::AnthropicCompatible(p) => p.stream(request, chunk_tx).await,
            Backend::Local => Err(Self::local_failure()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Backend::OpenAiCompatible(p) => p.name(),
            Backend::AnthropicCompatible(p) => p.name(),
            Backend::Local => "local",
        }
    }

    fn model(&self) -> &str {
        match self {
            Backend::OpenAiCompatible(p) => p.model(),
            Backend::AnthropicCompatible(p) => p.model(),
            Backend::Local => "none",
        }
    }
}

const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
const ANTHROPIC_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Build the backend described by `config`, reading credentials from the environment
pub fn create_backend(config: &LlmConfig) -> Backend {
    create_backend_with(config, |var| std::env::var(var).ok())
}

/// Backend construction with an injectable environment lookup
///
/// A provider whose credential is missing, or whose client cannot be built,
/// degrades to `Local` with a warning.
pub fn create_backend_with(config: &LlmConfig, env: impl Fn(&str) -> Option<String>) -> Backend {
    let present = |var: &str| env(var).filter(|v| !v.trim().is_empty());

    let kind = match config.provider {
        ProviderKind::Auto => {
            if config.api_key.is_some() || present(OPENAI_KEY_VAR).is_some() {
                ProviderKind::OpenAi
            } else if present(ANTHROPIC_KEY_VAR).is_some() {
                ProviderKind::Anthropic
            } else {
                info!("No language-model credentials found, running offline");
                return Backend::Local;
            }
        }
        other => other,
    };

    let backend = match kind {
        ProviderKind::OpenAi => {
            let key = config.api_key.clone().or_else(|| present(OPENAI_KEY_VAR));
            // Compatible local servers (Ollama, vLLM) accept unauthenticated requests
            if key.is_none() && config.api_base.is_none() {
                warn!("OpenAI provider selected but {} is not set; running offline", OPENAI_KEY_VAR);
                return Backend::Local;
            }
            OpenAiProvider::new(config, key.map(SecretString::from)).map(Backend::OpenAiCompatible)
        }
        ProviderKind::Anthropic => {
            let Some(key) = config.api_key.clone().or_else(|| present(ANTHROPIC_KEY_VAR)) else {
                warn!(
                    "Anthropic provider selected but {} is not set; running offline",
                    ANTHROPIC_KEY_VAR
                );
                return Backend::Local;
            };
            AnthropicProvider::new(config, SecretString::from(key))
                .map(Backend::AnthropicCompatible)
        }
        ProviderKind::Local | ProviderKind::Auto => return Backend::Local,
    };

    match backend {
        Ok(backend) => {
            info!(
                "Using {} backend (model: {})",
                backend.name(),
                backend.model()
            );
            backend
        }
        Err(e) => {
            warn!("Failed to initialise {} backend: {}; running offline", kind, e);
            Backend::Local
        }
    }
}
