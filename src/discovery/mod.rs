//! Discovery conversation
//!
//! Turns a rough project idea into a structured [`DiscoverySummary`] through a
//! bounded question/answer loop:
//!
//! 1. rank what is still unknown ([`gaps`]) against the document requirements
//! 2. ask about the top gap ([`question`]), streamed when possible
//! 3. read the answer into a summary fragment ([`extractor`], [`heuristics`])
//! 4. fold it in ([`merge`]) and stop once enough is known
//!
//! Every backend call has a deterministic fallback, so a run without any
//! language-model backend still completes.
//!
//! [`DiscoverySummary`]: crate::types::DiscoverySummary

pub mod engine;
pub mod extractor;
pub mod gaps;
pub mod heuristics;
pub mod interface;
pub mod merge;
pub mod orchestrator;
pub mod prompts;
pub mod question;
pub mod requirements;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{DiscoveryEngine, DiscoveryRequest, DiscoveryResult};
pub use extractor::AnswerExtractor;
pub use gaps::{DocumentGap, TargetDocument, compute_gaps};
pub use heuristics::heuristic_extract;
pub use interface::UserInterface;
pub use merge::merge;
pub use orchestrator::{
    Conversation, ConversationOrchestrator, ConversationOutcome, NoopHook, StopReason, TurnHook,
};
pub use question::QuestionGenerator;
pub use requirements::{
    DocumentRequirement, RequirementScope, ValueType, is_complete, is_enough_for_docs,
    missing_required, requirements_for,
};
pub use summarizer::DiscoverySummarizer;
