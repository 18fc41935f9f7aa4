//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/docflow/) and project (.docflow/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{conversation, llm, relay, session};
use crate::types::{AgentDescriptor, DocflowError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Language-model backend settings
    pub llm: LlmConfig,

    /// Conversation loop settings
    pub discovery: DiscoveryConfig,

    /// Session persistence settings
    pub session: SessionConfig,

    /// Relay backend settings
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            discovery: DiscoveryConfig::default(),
            session: SessionConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `DocflowError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DocflowError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(DocflowError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.relay.timeout_secs == 0 {
            return Err(DocflowError::Config(
                "Relay timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.discovery.max_turns == 0 {
            return Err(DocflowError::Config(
                "Discovery max_turns must be greater than 0".to_string(),
            ));
        }

        if self.discovery.history_window == 0 {
            return Err(DocflowError::Config(
                "Discovery history_window must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Which backend family to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Pick from whichever credential is present in the environment
    #[default]
    Auto,
    /// OpenAI-compatible chat completions API
    OpenAi,
    /// Anthropic-compatible messages API
    Anthropic,
    /// No backend: static prompts and heuristic extraction only
    Local,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Auto => write!(f, "auto"),
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ProviderKind::Auto),
            "openai" | "openai-compatible" => Ok(ProviderKind::OpenAi),
            "anthropic" | "anthropic-compatible" => Ok(ProviderKind::Anthropic),
            "local" | "offline" | "none" => Ok(ProviderKind::Local),
            _ => Err(format!(
                "Unknown provider: {}. Valid values: auto, openai, anthropic, local",
                s
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider family
    pub provider: ProviderKind,

    /// Model name (provider default when unset)
    pub model: Option<String>,

    /// API base URL (for compatible servers and proxies)
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for generation (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: usize,

    /// API key; falls back to the provider's environment variable.
    /// Never serialized to output.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Auto,
            model: None,
            api_base: None,
            timeout_secs: llm::DEFAULT_TIMEOUT_SECS,
            temperature: llm::DEFAULT_TEMPERATURE,
            max_tokens: llm::DEFAULT_MAX_TOKENS,
            api_key: None,
        }
    }
}

// =============================================================================
// Discovery Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Maximum question/answer exchanges per run
    pub max_turns: usize,

    /// Recent turns sent to the backend as conversational context
    pub history_window: usize,

    /// Stream question text to the terminal as it is generated
    pub streaming: bool,

    /// Optional named agent attached to assistant turns
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub agent_role: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_turns: conversation::DEFAULT_MAX_TURNS,
            history_window: conversation::DEFAULT_HISTORY_WINDOW,
            streaming: true,
            agent_id: None,
            agent_name: None,
            agent_role: None,
        }
    }
}

impl DiscoveryConfig {
    /// Agent descriptor, when an agent id is configured
    pub fn agent(&self) -> Option<AgentDescriptor> {
        let id = self.agent_id.as_deref()?.trim();
        if id.is_empty() {
            return None;
        }
        Some(AgentDescriptor::new(
            id,
            self.agent_name.clone().unwrap_or_else(|| id.to_string()),
            self.agent_role
                .clone()
                .unwrap_or_else(|| "discovery interviewer".to_string()),
        ))
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    /// Remote when a URL is configured, otherwise local files
    #[default]
    Auto,
    File,
    Remote,
}

impl std::fmt::Display for SessionBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionBackendKind::Auto => write!(f, "auto"),
            SessionBackendKind::File => write!(f, "file"),
            SessionBackendKind::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Storage backend selection
    pub backend: SessionBackendKind,

    /// Directory for the local file store
    pub dir: PathBuf,

    /// Base URL of the remote session service
    pub remote_url: Option<String>,

    /// Bearer token for the remote session service. Never serialized.
    #[serde(default, skip_serializing)]
    pub remote_token: Option<String>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("backend", &self.backend)
            .field("dir", &self.dir)
            .field("remote_url", &self.remote_url)
            .field("remote_token", &self.remote_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackendKind::Auto,
            dir: PathBuf::from(session::DEFAULT_DIR),
            remote_url: None,
            remote_token: None,
        }
    }
}

// =============================================================================
// Relay Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// The relay is only contacted when explicitly enabled
    pub enabled: bool,

    /// Relay base URL
    pub url: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout_secs: relay::CALL_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.provider, ProviderKind::Auto);
        assert_eq!(config.discovery.max_turns, 12);
        assert_eq!(config.discovery.history_window, 8);
        assert_eq!(config.relay.timeout_secs, 30);
        assert!(!config.relay.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            "Anthropic".parse::<ProviderKind>().unwrap(),
            ProviderKind::Anthropic
        );
        assert_eq!("offline".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert!("gemini".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_validate_rejects_zero_turns() {
        let mut config = Config::default();
        config.discovery.max_turns = 0;
        assert!(matches!(config.validate(), Err(DocflowError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_temperature() {
        let mut config = Config::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".into());
        config.session.remote_token = Some("tok".into());
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("sk-secret"));
        assert!(!text.contains("tok\""));
        assert!(format!("{:?}", config).contains("[REDACTED]"));
    }

    #[test]
    fn test_agent_descriptor() {
        let mut discovery = DiscoveryConfig::default();
        assert!(discovery.agent().is_none());
        discovery.agent_id = Some("scout".into());
        let agent = discovery.agent().unwrap();
        assert_eq!(agent.id, "scout");
        assert_eq!(agent.name, "scout");
    }
}
