//! Docflow - Conversational Project Discovery
//!
//! Interviews a user about a rough project idea and turns the answers into a
//! structured project brief, ready for the document-generation phase.
//!
//! ## Core Features
//!
//! - **Gap-driven interview**: every question targets the highest-weight missing detail
//! - **Streaming questions**: relay, primary backend, then a static fallback
//! - **Offline mode**: heuristic extraction keeps the loop useful without any backend
//! - **Resumable sessions**: local JSON files or a remote session service
//!
//! ## Quick Start
//!
//! ```ignore
//! use docflow::{Config, DiscoveryEngine, DiscoveryRequest};
//! use docflow::cli::TerminalUi;
//!
//! let engine = DiscoveryEngine::from_config(Config::default())?;
//! let result = engine
//!     .run(
//!         DiscoveryRequest {
//!             seed: Some("A booking app for small clinics".into()),
//!             ..Default::default()
//!         },
//!         &TerminalUi::new(),
//!     )
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&result.brief)?);
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: language-model backends, relay, prompt building, JSON repair
//! - [`discovery`]: gap analysis, question generation, extraction, the conversation loop
//! - [`session`]: session stores and the typed session manager
//! - [`config`]: hierarchical configuration
//! - [`cli`]: terminal interface and command handlers

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod session;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{DocflowError, ErrorCategory, LlmError, Result, ResultExt};

// Domain Types
pub use types::{DiscoverySummary, ProjectBrief, SessionId, Turn};

// =============================================================================
// Discovery Re-exports
// =============================================================================

pub use discovery::{
    ConversationOrchestrator, DiscoveryEngine, DiscoveryRequest, DiscoveryResult, StopReason,
    UserInterface,
};

// =============================================================================
// Backend Re-exports
// =============================================================================

pub use ai::{
    Backend, CompletionCache, LlmProvider, LlmResponse, QuestionRelay, SharedProvider, create_backend,
};

// Sessions
pub use session::{SessionManager, SessionStore};
