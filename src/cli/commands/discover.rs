//! Discover Command
//!
//! Run an interactive discovery conversation and write the project brief.
//!
//! Usage:
//!   docflow discover "a booking app for clinics"
//!   docflow discover --session clinic --resume
//!   docflow discover --offline --max-turns 5 -o brief.json

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::ui::{Output, TerminalUi};
use crate::cli::util::{CommandContext, ConfigOverrides};
use crate::discovery::{DiscoveryEngine, DiscoveryRequest, DiscoveryResult, StopReason};
use crate::types::{DocflowError, ProjectBrief, Result, SessionId};

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub idea: Option<String>,
    pub session: Option<String>,
    pub resume: bool,
    pub output: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

pub async fn run(config_path: Option<&Path>, options: DiscoverOptions) -> Result<()> {
    let mut ctx = CommandContext::load(config_path)?;
    ctx.apply(&options.overrides)?;
    let output_path = options.output.clone().unwrap_or_else(|| ctx.brief_path());

    let engine = DiscoveryEngine::from_config(ctx.config)?;
    let session_id = options
        .session
        .map(SessionId::new)
        .unwrap_or_else(SessionId::generate);

    let out = Output::new();
    out.header("Docflow discovery");
    out.field("Session", session_id.as_str());
    out.field("Storage", engine.sessions().store_name());

    let ui = TerminalUi::new();
    let request = DiscoveryRequest {
        session_id: Some(session_id.clone()),
        resume: options.resume,
        seed: options.idea,
    };

    let result = match engine.run(request, &ui).await {
        Ok(result) => result,
        Err(DocflowError::Cancelled) => {
            out.warning("Discovery interrupted; answers so far are saved");
            out.info(&format!("Continue with: docflow discover --session {} --resume", session_id));
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    write_brief(&output_path, &result.brief)?;
    info!("Wrote project brief to {}", output_path.display());
    report(&out, &result, &output_path);
    Ok(())
}

/// Write the brief as pretty JSON, creating parent directories
pub fn write_brief(path: &Path, brief: &ProjectBrief) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(brief)?)?;
    Ok(())
}

fn report(out: &Output, result: &DiscoveryResult, output_path: &Path) {
    out.brief(&result.brief);

    out.section("Conversation");
    if result.resumed {
        out.field("Resumed", "yes");
    }
    if result.replaced {
        out.field("Replaced", "earlier session with this id");
    }
    out.field("Exchanges", &result.exchanges.to_string());
    out.field("Finished", stop_message(result.stop_reason));
    out.field("Session", result.session_id.as_str());
    println!();

    if !result.persisted {
        out.warning("Final session state could not be saved");
    }
    if result.stop_reason == StopReason::TurnBudgetExhausted {
        out.info(&format!(
            "Some details are still open; continue with: docflow discover --session {} --resume",
            result.session_id
        ));
    }
    out.success(&format!("Brief written to {}", output_path.display()));
}

fn stop_message(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Complete => "all requirements answered",
        StopReason::EnoughForDocs => "enough detail to draft documents",
        StopReason::TurnBudgetExhausted => "turn budget reached",
    }
}
