//! AI Integration Layer
//!
//! Language-model backends, the optional relay, prompt construction and
//! response validation used by the discovery components.

pub mod prompt;
pub mod provider;
pub mod relay;
pub mod timeout;
pub mod validation;

pub use prompt::{PromptBuilder, PromptSection};
pub use provider::{
    AnthropicProvider, Backend, CachedProvider, CompletionCache, CompletionRequest, ErrorCategory,
    ErrorClassifier, LlmError, LlmProvider, LlmResponse, OpenAiProvider, ResponseMetadata,
    ResponseTiming, SharedProvider, TokenUsage, create_backend, create_backend_with,
};
pub use relay::{DisabledRelay, HttpRelay, QuestionRelay, RelayOutcome, SharedRelay, create_relay};
pub use timeout::with_timeout;
pub use validation::{JsonRepairer, clean_question, extract_json_object};
