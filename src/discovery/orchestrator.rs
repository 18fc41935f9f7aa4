//! Conversation orchestrator
//!
//! The `collecting -> done` loop: rank gaps, ask, read the answer, extract,
//! merge, repeat until the summary is complete or the exchange budget runs out.
//! Strictly sequential; the only error that escapes is user cancellation (and
//! whatever else the interface itself fails with).

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::extractor::AnswerExtractor;
use super::gaps::{DocumentGap, TargetDocument, compute_gaps};
use super::heuristics::heuristic_extract;
use super::interface::UserInterface;
use super::merge::merge;
use super::question::QuestionGenerator;
use super::requirements::{is_complete, is_enough_for_docs, missing_required};
use crate::types::{DiscoverySummary, ProjectBrief, Result, SessionId, Turn};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// No required requirement is missing
    Complete,
    /// Description, objectives, target users and features are known
    EnoughForDocs,
    /// Exchange budget spent before completeness
    TurnBudgetExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::EnoughForDocs => write!(f, "enough for documents"),
            Self::TurnBudgetExhausted => write!(f, "turn budget exhausted"),
        }
    }
}

/// Per-turn persistence callbacks
#[async_trait]
pub trait TurnHook: Send + Sync {
    /// Called after every appended turn
    async fn on_turn(&self, turn: &Turn);

    /// Called after every merge
    async fn on_summary(&self, turns: &[Turn], summary: &DiscoverySummary);
}

/// Hook that does nothing
pub struct NoopHook;

#[async_trait]
impl TurnHook for NoopHook {
    async fn on_turn(&self, _turn: &Turn) {}

    async fn on_summary(&self, _turns: &[Turn], _summary: &DiscoverySummary) {}
}

/// Loop input: prior turns and summary, possibly from a resumed session
#[derive(Debug, Clone)]
pub struct Conversation {
    pub session_id: Option<SessionId>,
    pub seed: Option<String>,
    pub turns: Vec<Turn>,
    pub summary: DiscoverySummary,
}

impl Conversation {
    /// Fresh conversation seeded with the user's idea
    pub fn seeded(session_id: Option<SessionId>, seed: Option<&str>) -> Self {
        Self {
            session_id,
            seed: seed.map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            turns: Vec::new(),
            summary: DiscoverySummary::seeded(seed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    /// Prior turns followed by the ones appended in this run
    pub turns: Vec<Turn>,
    pub summary: DiscoverySummary,
    /// Hand-off record with required fields defaulted
    pub brief: ProjectBrief,
    /// Question/answer exchanges completed in this run
    pub exchanges: usize,
    pub stop_reason: StopReason,
}

pub struct ConversationOrchestrator {
    questions: QuestionGenerator,
    extractor: AnswerExtractor,
    max_turns: usize,
    streaming: bool,
}

impl ConversationOrchestrator {
    pub fn new(
        questions: QuestionGenerator,
        extractor: AnswerExtractor,
        max_turns: usize,
        streaming: bool,
    ) -> Self {
        Self {
            questions,
            extractor,
            max_turns,
            streaming,
        }
    }

    #[instrument(skip_all, fields(session = ?conversation.session_id.as_ref().map(SessionId::as_str)))]
    pub async fn run(
        &self,
        conversation: Conversation,
        ui: &dyn UserInterface,
        hook: &dyn TurnHook,
    ) -> Result<ConversationOutcome> {
        let Conversation {
            session_id,
            seed,
            mut turns,
            mut summary,
        } = conversation;
        let session = session_id.as_ref().map(SessionId::as_str);
        let agent_id = self.questions.agent().map(|a| a.id.clone());
        let mut exchanges = 0;

        let stop_reason = loop {
            if is_complete(&summary) {
                break if missing_required(&summary).is_empty() {
                    StopReason::Complete
                } else {
                    StopReason::EnoughForDocs
                };
            }
            if exchanges >= self.max_turns {
                info!(exchanges, "Turn budget exhausted before completeness");
                break StopReason::TurnBudgetExhausted;
            }

            let gaps = compute_gaps(&summary, &turns);
            let Some(focus) = focus_gap(&gaps, &summary) else {
                break StopReason::Complete;
            };
            debug!(focus = %focus, gaps = gaps.len(), "Asking about top gap");

            let question = if self.streaming {
                self.questions
                    .ask_streaming(&focus, &gaps, &turns, &summary, session, ui)
                    .await
            } else {
                let question = self
                    .questions
                    .ask(&focus, &gaps, &turns, &summary, session)
                    .await;
                ui.show_assistant_text(&self.questions.header(), &question);
                question
            };

            let turn = Turn::assistant(question).with_agent(agent_id.as_deref());
            hook.on_turn(&turn).await;
            turns.push(turn);

            let answer = ui.prompt_text(focus.label()).await?;
            let turn = Turn::user(answer.trim());
            hook.on_turn(&turn).await;
            turns.push(turn);
            exchanges += 1;

            let mut fragment = self.extractor.extract(&turns, &summary, &gaps).await;
            if fragment.is_empty() {
                debug!("Backend extraction empty, using heuristics");
                fragment = heuristic_extract(&answer, &summary, Some(&focus));
            }
            summary = merge(&summary, &fragment);
            hook.on_summary(&turns, &summary).await;

            if is_enough_for_docs(&summary) {
                break StopReason::EnoughForDocs;
            }
        };

        info!(exchanges, reason = %stop_reason, "Discovery conversation finished");
        let brief = ProjectBrief::from_summary(&summary, seed.as_deref());
        Ok(ConversationOutcome {
            turns,
            summary,
            brief,
            exchanges,
            stop_reason,
        })
    }
}

/// Highest-weight gap, or the first missing required requirement
fn focus_gap(gaps: &[DocumentGap], summary: &DiscoverySummary) -> Option<DocumentGap> {
    if let Some(gap) = gaps.first() {
        return Some(*gap);
    }
    warn!("Gap list empty while incomplete; using first missing requirement");
    missing_required(summary)
        .first()
        .map(|requirement| DocumentGap {
            requirement: *requirement,
            target: TargetDocument::Specs,
            weight: requirement.specs_weight(),
        })
}
