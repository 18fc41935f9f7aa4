//! Session Command
//!
//! Inspect and remove stored discovery sessions.
//!
//! Usage:
//!   docflow session show <ID> [-f text|json|yaml]
//!   docflow session delete <ID>

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::session::{SessionManager, SessionRecord};
use crate::types::{DocflowError, ProjectBrief, Result, SessionId};

pub async fn show(config_path: Option<&Path>, id: &str, format: &str) -> Result<()> {
    let ctx = CommandContext::load(config_path)?;
    let sessions = SessionManager::from_config(&ctx.config.session)?;
    let id = SessionId::new(id);

    let record = sessions
        .load(&id)
        .await?
        .ok_or_else(|| DocflowError::Session(format!("Session '{}' not found", id)))?;

    if format == "text" {
        print_text(&record);
    } else {
        print!("{}", render(&record, format)?);
    }
    Ok(())
}

pub async fn delete(config_path: Option<&Path>, id: &str) -> Result<()> {
    let ctx = CommandContext::load(config_path)?;
    let sessions = SessionManager::from_config(&ctx.config.session)?;
    let out = Output::new();

    if sessions.delete(&SessionId::new(id)).await? {
        out.success(&format!("Deleted session {}", id));
    } else {
        out.warning(&format!("Session {} not found", id));
    }
    Ok(())
}

fn render(record: &SessionRecord, format: &str) -> Result<String> {
    match format {
        "json" => Ok(format!("{}\n", serde_json::to_string_pretty(record)?)),
        "yaml" => serde_yaml::to_string(record)
            .map_err(|e| DocflowError::Session(format!("Failed to render session: {}", e))),
        other => Err(DocflowError::Config(format!(
            "Invalid format '{}'. Valid values: text, json, yaml",
            other
        ))),
    }
}

fn print_text(record: &SessionRecord) {
    let out = Output::new();
    out.header(&format!("Session {}", record.state.session_id));
    out.field("Phase", &record.state.phase.to_string());
    out.field("Turns", &record.state.turns.len().to_string());

    out.section("Transcript");
    out.transcript(&record.state.turns);

    out.brief(&ProjectBrief::from_summary(&record.summary, None));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ConversationState;
    use crate::types::{DiscoverySummary, Turn};

    fn record() -> SessionRecord {
        let mut state = ConversationState::new(SessionId::new("s1"));
        state.turns.push(Turn::user("A chess trainer"));
        SessionRecord {
            state,
            summary: DiscoverySummary {
                description: Some("A chess trainer".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_render_json() {
        let json = render(&record(), "json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["summary"]["description"], "A chess trainer");
    }

    #[test]
    fn test_render_yaml() {
        let yaml = render(&record(), "yaml").unwrap();
        assert!(yaml.contains("sessionId: s1"));
        assert!(yaml.contains("phase: discovery"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(matches!(
            render(&record(), "xml"),
            Err(DocflowError::Config(_))
        ));
    }
}
