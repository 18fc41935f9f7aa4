//! Question generation
//!
//! Phrases the next interview question for a gap. The relay is tried first,
//! then the primary backend; if neither produces text the gap's static prompt
//! is used. Failures never leave this component.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::gaps::DocumentGap;
use super::interface::UserInterface;
use super::prompts::question_request;
use crate::ai::{
    CompletionRequest, LlmError, RelayOutcome, SharedProvider, SharedRelay, clean_question,
};
use crate::constants::llm::STREAM_CHANNEL_CAPACITY;
use crate::types::{AgentDescriptor, DiscoverySummary, Turn};

/// Header shown above assistant output when no named agent is active
pub const DEFAULT_HEADER: &str = "Docflow";

pub struct QuestionGenerator {
    provider: SharedProvider,
    relay: SharedRelay,
    history_window: usize,
    agent: Option<AgentDescriptor>,
}

impl QuestionGenerator {
    pub fn new(
        provider: SharedProvider,
        relay: SharedRelay,
        history_window: usize,
        agent: Option<AgentDescriptor>,
    ) -> Self {
        Self {
            provider,
            relay,
            history_window,
            agent,
        }
    }

    pub fn agent(&self) -> Option<&AgentDescriptor> {
        self.agent.as_ref()
    }

    pub fn header(&self) -> String {
        self.agent
            .as_ref()
            .map(AgentDescriptor::header)
            .unwrap_or_else(|| DEFAULT_HEADER.to_string())
    }

    fn request(
        &self,
        focus: &DocumentGap,
        gaps: &[DocumentGap],
        history: &[Turn],
        summary: &DiscoverySummary,
    ) -> CompletionRequest {
        question_request(
            focus,
            gaps,
            history,
            summary,
            self.history_window,
            self.agent.as_ref(),
        )
    }

    /// Next question, without display. Never empty.
    pub async fn ask(
        &self,
        focus: &DocumentGap,
        gaps: &[DocumentGap],
        history: &[Turn],
        summary: &DiscoverySummary,
        session_id: Option<&str>,
    ) -> String {
        let request = self.request(focus, gaps, history, summary);

        // Nothing is displayed; a closed receiver makes chunk sends return immediately
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        drop(rx);
        match self.relay.stream(&request, session_id, tx).await {
            RelayOutcome::Completed(text) => {
                if let Some(question) = clean_question(&text) {
                    return question;
                }
            }
            RelayOutcome::Unavailable(reason) => debug!("Relay unavailable: {}", reason),
        }

        match self.provider.complete(&request).await {
            Ok(response) => match clean_question(&response.content) {
                Some(question) => question,
                None => {
                    warn!("Backend returned an empty question, using fallback");
                    focus.fallback_prompt().to_string()
                }
            },
            Err(e) => {
                log_failure(&e);
                focus.fallback_prompt().to_string()
            }
        }
    }

    /// Next question, streamed to `ui` as it is produced. Never empty.
    ///
    /// The caller still gets the full question only once generation is done.
    pub async fn ask_streaming(
        &self,
        focus: &DocumentGap,
        gaps: &[DocumentGap],
        history: &[Turn],
        summary: &DiscoverySummary,
        session_id: Option<&str>,
        ui: &dyn UserInterface,
    ) -> String {
        let request = self.request(focus, gaps, history, summary);
        ui.begin_assistant(&self.header());

        // Relay first
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let (outcome, relayed) = tokio::join!(
            self.relay.stream(&request, session_id, tx),
            forward(rx, ui)
        );
        match outcome {
            RelayOutcome::Completed(text) => {
                if let Some(question) = clean_question(&text) {
                    ui.end_assistant();
                    return question;
                }
            }
            RelayOutcome::Unavailable(reason) => debug!("Relay unavailable: {}", reason),
        }
        if !relayed.is_empty() {
            // Whatever comes next starts on its own line
            ui.assistant_chunk("\n");
        }

        // Primary backend
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let (result, streamed) = tokio::join!(self.provider.stream(&request, tx), forward(rx, ui));
        let primary_streamed = !streamed.trim().is_empty();
        let shown = !streamed.is_empty();

        let question = match result {
            Ok(_) if primary_streamed => clean_question(&streamed),
            Ok(response) => {
                // Answered without streaming; show it now
                let question = clean_question(&response.content);
                if let Some(question) = &question {
                    ui.assistant_chunk(question);
                }
                question
            }
            Err(e) => {
                log_failure(&e);
                None
            }
        };

        let question = question.unwrap_or_else(|| {
            let fallback = focus.fallback_prompt();
            if shown {
                ui.assistant_chunk("\n");
            }
            ui.assistant_chunk(fallback);
            fallback.to_string()
        });

        ui.end_assistant();
        question
    }
}

fn log_failure(e: &LlmError) {
    if e.is_unavailable() {
        debug!("No backend for question generation, using fallback: {}", e);
    } else {
        warn!("Question generation failed, using fallback: {}", e);
    }
}

/// Show chunks as they arrive and accumulate them
async fn forward(mut rx: mpsc::Receiver<String>, ui: &dyn UserInterface) -> String {
    let mut text = String::new();
    while let Some(chunk) = rx.recv().await {
        ui.assistant_chunk(&chunk);
        text.push_str(&chunk);
    }
    text
}
