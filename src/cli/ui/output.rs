use console::style;

use crate::types::{ProjectBrief, Turn};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// `label: value` line with a dimmed label
    pub fn field(&self, label: &str, value: &str) {
        println!("  {:<14} {}", style(format!("{}:", label)).dim(), value);
    }

    /// Bulleted list under a label; `(none)` when empty
    pub fn list(&self, label: &str, items: &[String]) {
        if items.is_empty() {
            self.field(label, &style("(none)").dim().to_string());
            return;
        }
        println!("  {}", style(format!("{}:", label)).dim());
        for item in items {
            println!("    • {}", item);
        }
    }

    pub fn brief(&self, brief: &ProjectBrief) {
        self.section("Project brief");
        self.field("Name", &brief.name);
        self.field("Description", &brief.description);
        self.list("Objectives", &brief.objectives);
        self.list("Target users", &brief.target_users);
        self.list("Features", &brief.features);
        self.list("Constraints", &brief.constraints);
        if let Some(stack) = &brief.stack_suggestion {
            self.field("Stack", stack);
        }
        for (key, value) in &brief.extras {
            self.field(key, &value.to_string());
        }
    }

    pub fn transcript(&self, turns: &[Turn]) {
        for turn in turns {
            let speaker = match &turn.agent_id {
                Some(agent) => format!("{} ({})", turn.role, agent),
                None => turn.role.to_string(),
            };
            println!("  {} {}", style(format!("{}:", speaker)).cyan(), turn.content);
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
