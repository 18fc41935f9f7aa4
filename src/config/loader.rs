//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/docflow/config.toml)
//! 3. Project config (.docflow/config.toml)
//! 4. Environment variables (DOCFLOW_* prefix, `__` separates sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use directories::BaseDirs;
use tracing::{debug, info};

use super::types::Config;
use crate::types::{DocflowError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_layers(
            Self::global_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load with an explicit project file in place of `.docflow/config.toml`
    pub fn load_with(project_file: &Path) -> Result<Config> {
        Self::load_layers(Self::global_config_path().as_deref(), project_file)
    }

    fn load_layers(global: Option<&Path>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // DOCFLOW_LLM__MAX_TOKENS -> llm.max_tokens
        figment = figment.merge(Env::prefixed("DOCFLOW_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| DocflowError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| DocflowError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/docflow/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
            .map(|p| p.join("docflow"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".docflow")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path(config: &Config) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:   {} {}", exists, global.display());
        } else {
            println!("  Global:   (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project:  {} {}", exists, project.display());

        let sessions = &config.session.dir;
        let exists = if sessions.exists() { "✓" } else { "✗" };
        println!("  Sessions: {} {}", exists, sessions.display());
    }

    /// Show current effective configuration
    pub fn show_config(config: &Config, as_json: bool) -> Result<()> {
        if as_json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| DocflowError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    /// Edit config file with default editor
    pub fn edit_config(global: bool) -> Result<()> {
        let path = if global {
            Self::global_config_path().ok_or_else(|| {
                DocflowError::Config("Cannot determine global config path".to_string())
            })?
        } else {
            Self::project_config_path()
        };

        if !path.exists() {
            println!("Config file does not exist: {}", path.display());
            println!(
                "Run: docflow config init {}",
                if global { "--global" } else { "" }
            );
            return Ok(());
        }

        let editor = env::var("EDITOR").unwrap_or_else(|_| {
            if cfg!(target_os = "windows") {
                "notepad".to_string()
            } else {
                "vi".to_string()
            }
        });

        let status = Command::new(&editor).arg(&path).status().map_err(|e| {
            DocflowError::Config(format!("Failed to launch editor {}: {}", editor, e))
        })?;

        if !status.success() {
            return Err(DocflowError::Config("Editor exited with error".to_string()));
        }

        println!("Config saved: {}", path.display());
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            DocflowError::Config("Cannot determine global config directory".to_string())
        })?;
        let config_path = global_dir.join("config.toml");
        Self::write_template(&config_path, &Self::default_global_config(), force)?;
        Ok(config_path)
    }

    /// Initialize project configuration under `root/.docflow/`
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());
        fs::create_dir_all(project_dir.join("sessions"))?;

        let config_path = project_dir.join("config.toml");
        Self::write_template(&config_path, &Self::default_project_config(), force)?;
        Ok(config_path)
    }

    fn write_template(path: &Path, content: &str, force: bool) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() || force {
            fs::write(path, content)?;
            info!("Created config: {}", path.display());
        } else {
            info!("Config exists: {}", path.display());
        }
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Generate default global config content (TOML)
    fn default_global_config() -> String {
        r#"# Docflow Global Configuration
# User-wide defaults. Project settings in .docflow/config.toml override these.

version = "1.0"

# Language-model backend
# provider: auto | openai | anthropic | local
# API keys are read from OPENAI_API_KEY / ANTHROPIC_API_KEY
[llm]
provider = "auto"
timeout_secs = 120
temperature = 0.4
max_tokens = 1024
"#
        .to_string()
    }

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# Docflow Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[discovery]
max_turns = 12
history_window = 8
streaming = true

# backend: auto | file | remote
[session]
backend = "auto"
dir = ".docflow/sessions"

[relay]
enabled = false
timeout_secs = 30
"#
        .to_string()
    }
}
