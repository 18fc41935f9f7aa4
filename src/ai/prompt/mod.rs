//! Prompt Builder
//!
//! Standardized prompt construction for backend calls:
//!
//! 1. **Role**: who the model is acting as
//! 2. **Objectives**: numbered goals
//! 3. **Context**: ordered key/value facts
//! 4. **Sections**: headed text and fenced data blocks
//! 5. **Focus**: the one thing to address and what to avoid
//! 6. **Rules**: hard output constraints

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Ordered key/value pairs
    Context(Vec<(String, String)>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Fenced block with language tag
    Code { language: String, content: String },
    /// Focus enforcement with restrictions
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
    /// Output rules
    Rules(Vec<String>),
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role definition section
    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    /// Add objectives section
    pub fn objectives(mut self, objectives: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Add a context item, extending the first context section if one exists
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        let entry = (key.to_string(), value.to_string());
        match self.sections.iter_mut().find_map(|s| match s {
            PromptSection::Context(ctx) => Some(ctx),
            _ => None,
        }) {
            Some(ctx) => ctx.push(entry),
            None => self.sections.push(PromptSection::Context(vec![entry])),
        }
        self
    }

    /// Add text section
    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    /// Add text section with header
    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    /// Add fenced block
    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Add focus enforcement section
    pub fn focus(mut self, target: &str, restrictions: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.into_iter().map(String::from).collect(),
        });
        self
    }

    /// Add output rules section
    pub fn rules(mut self, rules: Vec<&str>) -> Self {
        self.sections
            .push(PromptSection::Rules(rules.into_iter().map(String::from).collect()));
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!("You are {} {}.\n", expertise, task));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(ctx) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in ctx {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
                PromptSection::Rules(rules) => {
                    prompt.push_str("<RULES>\n");
                    for rule in rules {
                        prompt.push_str(&format!("- {}\n", rule));
                    }
                    prompt.push_str("</RULES>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptBuilder::new()
            .role("a technical discovery interviewer", "for new software projects")
            .objectives(vec!["Find gaps", "Ask one question"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("technical discovery interviewer"));
        assert!(prompt.contains("1. Find gaps"));
        assert!(prompt.contains("2. Ask one question"));
    }

    #[test]
    fn test_context_items_keep_order() {
        let prompt = PromptBuilder::new()
            .context_item("Seed idea", "habit tracker")
            .text("between")
            .context_item("Focus", "targetUsers")
            .build();

        let seed = prompt.find("**Seed idea**").unwrap();
        let focus = prompt.find("**Focus**").unwrap();
        assert!(seed < focus);
        assert_eq!(prompt.matches("# Context").count(), 1);
    }

    #[test]
    fn test_focus_and_rules() {
        let prompt = PromptBuilder::new()
            .focus("deployment", vec!["Do NOT ask about anything else"])
            .rules(vec!["Respond with JSON only"])
            .code("json", "{}")
            .build();

        assert!(prompt.contains("<FOCUS>"));
        assert!(prompt.contains("Focus EXCLUSIVELY on: deployment"));
        assert!(prompt.contains("- Respond with JSON only"));
        assert!(prompt.contains("```json\n{}\n```"));
    }
}
