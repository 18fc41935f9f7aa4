//! Config Command
//!
//! Manage Docflow configuration.
//!
//! Usage:
//!   docflow config show [-g] [-f text|json|yaml]
//!   docflow config path
//!   docflow config edit [-g]
//!   docflow config init [-g] [--force]

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::config::ConfigLoader;
use crate::types::{DocflowError, Result};

/// Show configuration
pub fn show(config_path: Option<&Path>, global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(global_path) if global_path.exists() => {
                let content = std::fs::read_to_string(&global_path)?;
                if format == "text" {
                    println!("# Global Config: {}\n", global_path.display());
                }
                println!("{}", content);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'docflow config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
        return Ok(());
    }

    // Merged effective config
    let ctx = CommandContext::load(config_path)?;
    match format {
        "yaml" => {
            let yaml = serde_yaml::to_string(&ctx.config)
                .map_err(|e| DocflowError::Config(e.to_string()))?;
            print!("{}", yaml);
            Ok(())
        }
        "json" => ConfigLoader::show_config(&ctx.config, true),
        _ => ConfigLoader::show_config(&ctx.config, false),
    }
}

/// Show configuration paths
pub fn path(config_path: Option<&Path>) -> Result<()> {
    let ctx = CommandContext::load(config_path)?;
    ConfigLoader::show_path(&ctx.config);
    Ok(())
}

/// Edit configuration file
pub fn edit(global: bool) -> Result<()> {
    ConfigLoader::edit_config(global)
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let path = ConfigLoader::init_global(force)?;
    Output::new().success("Initialized global configuration");
    println!("  Config:    {}", path.display());
    Ok(())
}

/// Initialize project configuration
pub fn init_project(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let path = ConfigLoader::init_project(&root, force)?;
    Output::new().success("Initialized project configuration");
    println!("  Directory: {}", root.join(ConfigLoader::project_dir()).display());
    println!("  Config:    {}", path.display());
    Ok(())
}
