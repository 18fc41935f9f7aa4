//! CLI Common Utilities
//!
//! Shared configuration loading for command handlers.

use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigLoader, ProviderKind};
use crate::types::{DocflowError, Result};

/// Docflow project directory name
pub const DOCFLOW_DIR: &str = ".docflow";

/// Default location of the discovery hand-off document
pub const BRIEF_PATH: &str = "discovery.json";

/// Command execution context
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Resolved configuration (files, environment, then CLI overrides)
    pub config: Config,
    /// Project data directory (.docflow)
    pub docflow_dir: PathBuf,
}

impl CommandContext {
    /// Load configuration; `config_path` replaces the project config file
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(DocflowError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                ConfigLoader::load_with(path)?
            }
            None => ConfigLoader::load()?,
        };

        Ok(Self {
            config,
            docflow_dir: PathBuf::from(DOCFLOW_DIR),
        })
    }

    /// Apply command-line overrides, then re-validate
    pub fn apply(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        let config = &mut self.config;
        if let Some(max_turns) = overrides.max_turns {
            config.discovery.max_turns = max_turns;
        }
        if let Some(provider) = overrides.provider {
            config.llm.provider = provider;
        }
        if let Some(model) = &overrides.model {
            config.llm.model = Some(model.clone());
        }
        if overrides.offline {
            config.llm.provider = ProviderKind::Local;
            config.relay.enabled = false;
        }
        if overrides.no_stream {
            config.discovery.streaming = false;
        }
        config.validate()
    }

    /// Default path of the discovery brief
    pub fn brief_path(&self) -> PathBuf {
        self.docflow_dir.join(BRIEF_PATH)
    }
}

/// Highest-priority configuration layer
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_turns: Option<usize>,
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub offline: bool,
    pub no_stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CommandContext {
        CommandContext {
            config: Config::default(),
            docflow_dir: PathBuf::from(DOCFLOW_DIR),
        }
    }

    #[test]
    fn test_overrides_win() {
        let mut ctx = context();
        ctx.apply(&ConfigOverrides {
            max_turns: Some(4),
            provider: Some(ProviderKind::Anthropic),
            model: Some("small".into()),
            no_stream: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ctx.config.discovery.max_turns, 4);
        assert_eq!(ctx.config.llm.provider, ProviderKind::Anthropic);
        assert_eq!(ctx.config.llm.model.as_deref(), Some("small"));
        assert!(!ctx.config.discovery.streaming);
    }

    #[test]
    fn test_offline_beats_provider() {
        let mut ctx = context();
        ctx.config.relay.enabled = true;
        ctx.apply(&ConfigOverrides {
            provider: Some(ProviderKind::OpenAi),
            offline: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ctx.config.llm.provider, ProviderKind::Local);
        assert!(!ctx.config.relay.enabled);
    }

    #[test]
    fn test_zero_turns_rejected() {
        let mut ctx = context();
        let result = ctx.apply(&ConfigOverrides {
            max_turns: Some(0),
            ..Default::default()
        });
        assert!(matches!(result, Err(DocflowError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CommandContext::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(DocflowError::Config(_))));
    }

    #[test]
    fn test_brief_path() {
        assert_eq!(context().brief_path(), PathBuf::from(".docflow/discovery.json"));
    }
}
