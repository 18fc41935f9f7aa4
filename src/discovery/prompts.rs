//! Prompt construction for the discovery backend calls

use super::gaps::DocumentGap;
use crate::ai::{CompletionRequest, PromptBuilder};
use crate::constants::llm::QUESTION_MAX_TOKENS;
use crate::types::turn::{last_user_message, recent_turns, render_transcript};
use crate::types::{AgentDescriptor, DiscoverySummary, Turn};

/// JSON shape every structured reply must follow
const SUMMARY_SCHEMA: &str = r#"{
  "name": "string",
  "description": "string",
  "objectives": ["string"],
  "targetUsers": ["string"],
  "features": ["string"],
  "constraints": ["string"],
  "stackSuggestion": "string",
  "extras": { "key": "string | number | boolean" }
}"#;

fn summary_json(summary: &DiscoverySummary) -> String {
    serde_json::to_string_pretty(&summary.normalized()).unwrap_or_else(|_| "{}".to_string())
}

fn ranked_gaps(gaps: &[DocumentGap]) -> String {
    if gaps.is_empty() {
        return "(none)".to_string();
    }
    gaps.iter()
        .enumerate()
        .map(|(i, gap)| format!("{}. {}", i + 1, gap))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Request for the next interview question
pub fn question_request(
    focus: &DocumentGap,
    gaps: &[DocumentGap],
    history: &[Turn],
    summary: &DiscoverySummary,
    history_window: usize,
    agent: Option<&AgentDescriptor>,
) -> CompletionRequest {
    let mut system = PromptBuilder::new()
        .role(
            "a technical discovery interviewer",
            "helping someone turn a rough product idea into a project plan",
        )
        .objectives(vec![
            "Compose exactly one clear, conversational question",
            "Fill the focus gap first; use the ranked list to judge what else matters",
            "Build on what the user already said instead of repeating it",
        ])
        .rules(vec![
            "Return only the question text",
            "No lists, numbering, headings or preamble",
            "Keep it under 40 words",
        ]);
    if let Some(agent) = agent {
        system = system.context_item("Persona", &format!("{} ({})", agent.name, agent.role));
    }

    let transcript = render_transcript(recent_turns(history, history_window));
    let user = PromptBuilder::new()
        .section("Known summary", "")
        .code("json", &summary_json(summary))
        .section("Ranked gaps", &ranked_gaps(gaps))
        .section(
            "Recent conversation",
            if transcript.is_empty() {
                "(conversation has not started)"
            } else {
                transcript.as_str()
            },
        )
        .focus(
            &format!("{} ({})", focus.label(), focus.key()),
            vec!["Do not ask about anything already present in the summary"],
        )
        .build();

    CompletionRequest::new(system.build(), user).with_max_tokens(QUESTION_MAX_TOKENS)
}

/// Request for the update fragment implied by the latest answer
pub fn extraction_request(
    history: &[Turn],
    summary: &DiscoverySummary,
    gaps: &[DocumentGap],
) -> CompletionRequest {
    let system = PromptBuilder::new()
        .role(
            "a precise requirements analyst",
            "extracting structured project facts from interview answers",
        )
        .objectives(vec![
            "Return only the fields the latest answer adds or improves",
            "Prefer the more specific value when it refines something already known",
        ])
        .rules(vec![
            "Respond with a single JSON object and nothing else",
            "Never invent values the user did not state or clearly imply",
            "Omit fields you have nothing for; do not emit empty strings or lists",
            "Put architecture details (platforms, deployment, dataStorage, authStrategy, testingApproach, ciCd) under extras",
        ])
        .section("Schema", "")
        .code("json", SUMMARY_SCHEMA)
        .build();

    let user = PromptBuilder::new()
        .context_item(
            "Latest answer",
            last_user_message(history).unwrap_or("(no answer)"),
        )
        .section("Outstanding gaps", &ranked_gaps(gaps))
        .section("Known summary", "")
        .code("json", &summary_json(summary))
        .build();

    CompletionRequest::new(system, user).expect_json().with_temperature(0.0)
}

/// Request for the cleaned final summary
pub fn summarizer_request(seed: Option<&str>, partial: &DiscoverySummary) -> CompletionRequest {
    let system = PromptBuilder::new()
        .role(
            "a product analyst",
            "finalizing a discovery summary before document generation",
        )
        .objectives(vec![
            "Deduplicate and tidy list items",
            "Tighten the description into one or two sentences",
            "Suggest a short kebab-case project name if none is set",
        ])
        .rules(vec![
            "Respond with a single JSON object using the same fields",
            "Keep every fact that is present; do not add new facts",
        ])
        .section("Schema", "")
        .code("json", SUMMARY_SCHEMA)
        .build();

    let user = PromptBuilder::new()
        .context_item("Seed idea", seed.unwrap_or("(none)"))
        .section("Summary", "")
        .code("json", &summary_json(partial))
        .build();

    CompletionRequest::new(system, user).expect_json().with_temperature(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::gaps::compute_gaps;

    #[test]
    fn test_question_request_carries_full_gap_list_and_window() {
        let summary = DiscoverySummary {
            description: Some("Pet sitter marketplace".into()),
            ..Default::default()
        };
        let history: Vec<Turn> = (0..10)
            .map(|i| Turn::user(format!("message-{:02}", i)))
            .collect();
        let gaps = compute_gaps(&summary, &history);

        let request = question_request(&gaps[0], &gaps, &history, &summary, 3, None);
        assert!(request.user.contains("Pet sitter marketplace"));
        for gap in &gaps {
            assert!(request.user.contains(gap.label()));
        }
        assert!(request.user.contains("message-09"));
        assert!(request.user.contains("message-07"));
        assert!(!request.user.contains("message-06"));
        assert!(request.user.contains("Focus EXCLUSIVELY on: Objectives"));
        assert_eq!(request.max_tokens, Some(QUESTION_MAX_TOKENS));
        assert!(!request.json);
    }

    #[test]
    fn test_question_request_persona() {
        let gaps = compute_gaps(&DiscoverySummary::default(), &[]);
        let agent = AgentDescriptor::new("disc", "Ada", "discovery interviewer");
        let request = question_request(&gaps[0], &gaps, &[], &DiscoverySummary::default(), 8, Some(&agent));
        assert!(request.system.contains("Ada (discovery interviewer)"));
        assert!(request.user.contains("conversation has not started"));
    }

    #[test]
    fn test_extraction_request_is_json() {
        let history = vec![Turn::assistant("Who uses it?"), Turn::user("dog owners")];
        let request = extraction_request(&history, &DiscoverySummary::default(), &[]);
        assert!(request.json);
        assert!(request.user.contains("dog owners"));
        assert!(request.system.contains("targetUsers"));
    }

    #[test]
    fn test_summarizer_request_includes_seed() {
        let request = summarizer_request(Some("tiny CRM"), &DiscoverySummary::default());
        assert!(request.user.contains("tiny CRM"));
        assert!(request.json);
    }
}
