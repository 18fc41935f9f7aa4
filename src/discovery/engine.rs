//! Discovery engine
//!
//! Wires configuration, backends, the relay and session storage around the
//! conversation loop for one run: resume or start fresh, persist every turn and
//! every merge, mirror streamed question text, summarize, persist the final
//! state in the `design` phase.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::extractor::AnswerExtractor;
use super::interface::UserInterface;
use super::merge::merge;
use super::orchestrator::{Conversation, ConversationOrchestrator, StopReason, TurnHook};
use super::question::QuestionGenerator;
use super::summarizer::DiscoverySummarizer;
use crate::ai::{
    CachedProvider, CompletionCache, SharedProvider, SharedRelay, create_backend, create_relay,
};
use crate::config::Config;
use crate::session::{ConversationState, Phase, SessionManager};
use crate::types::{DiscoverySummary, ProjectBrief, Result, SessionId, Turn};

/// What to run
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    /// Session to use; generated when absent
    pub session_id: Option<SessionId>,
    /// Continue the stored session instead of overwriting it
    pub resume: bool,
    /// The user's initial idea
    pub seed: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub session_id: SessionId,
    pub turns: Vec<Turn>,
    pub summary: DiscoverySummary,
    pub brief: ProjectBrief,
    pub exchanges: usize,
    pub stop_reason: StopReason,
    /// Whether a stored session was continued
    pub resumed: bool,
    /// Whether a stored session with this id was started over
    pub replaced: bool,
    /// Whether the final state reached the session store
    pub persisted: bool,
}

pub struct DiscoveryEngine {
    config: Config,
    provider: SharedProvider,
    relay: SharedRelay,
    sessions: SessionManager,
}

impl DiscoveryEngine {
    pub fn new(
        config: Config,
        provider: SharedProvider,
        relay: SharedRelay,
        sessions: SessionManager,
    ) -> Self {
        Self {
            config,
            provider,
            relay,
            sessions,
        }
    }

    /// Build from configuration. Fails only on session storage misconfiguration.
    pub fn from_config(config: Config) -> Result<Self> {
        let sessions = SessionManager::from_config(&config.session)?;
        let backend = create_backend(&config.llm);
        if backend.is_local() {
            info!("No language-model backend; running on static prompts and heuristics");
        }
        let relay = create_relay(&config.relay);
        Ok(Self::new(config, Arc::new(backend), relay, sessions))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn run(
        &self,
        request: DiscoveryRequest,
        ui: &dyn UserInterface,
    ) -> Result<DiscoveryResult> {
        let session_id = request.session_id.unwrap_or_else(SessionId::generate);
        let seed = request
            .seed
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let (conversation, opened) = self
            .open(&session_id, request.resume, seed.as_deref())
            .await?;

        let initial = ConversationState {
            session_id: session_id.clone(),
            phase: Phase::Discovery,
            turns: conversation.turns.clone(),
        };
        if let Err(e) = self
            .sessions
            .create_or_update(&initial, &conversation.summary)
            .await
        {
            warn!("Failed to persist session {}: {}", session_id, e);
        }

        // One cache per run
        let cache = Arc::new(CompletionCache::new());
        let provider: SharedProvider = Arc::new(CachedProvider::new(self.provider.clone(), cache));

        let discovery = &self.config.discovery;
        let agent = discovery.agent();
        let agent_id = agent.as_ref().map(|a| a.id.clone());
        let orchestrator = ConversationOrchestrator::new(
            QuestionGenerator::new(
                provider.clone(),
                self.relay.clone(),
                discovery.history_window,
                agent,
            ),
            AnswerExtractor::new(provider.clone()),
            discovery.max_turns,
            discovery.streaming,
        );

        let mirror = self.sessions.supports_mirroring().then(|| {
            ChunkMirror::spawn(self.sessions.clone(), session_id.clone(), agent_id)
        });
        let hook = PersistenceHook {
            sessions: self.sessions.clone(),
            session_id: session_id.clone(),
            mirror: mirror.as_ref().map(|(m, _)| m.clone()),
        };

        let outcome = match &mirror {
            Some((chunks, _)) => {
                let mirrored = MirroredInterface {
                    inner: ui,
                    chunks: chunks.clone(),
                };
                orchestrator.run(conversation, &mirrored, &hook).await
            }
            None => orchestrator.run(conversation, ui, &hook).await,
        };
        // The mirror task ends once every sender is gone
        drop(hook);
        if let Some((chunks, task)) = mirror {
            drop(chunks);
            if let Err(e) = task.await {
                warn!("Chunk mirroring task failed: {}", e);
            }
        }
        let outcome = outcome?;

        let summary = DiscoverySummarizer::new(provider)
            .finalize(seed.as_deref(), &outcome.summary)
            .await;
        let brief = ProjectBrief::from_summary(&summary, seed.as_deref());

        let final_state = ConversationState {
            session_id: session_id.clone(),
            phase: Phase::Design,
            turns: outcome.turns.clone(),
        };
        let persisted = match self.sessions.create_or_update(&final_state, &summary).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist final session state: {}", e);
                false
            }
        };

        Ok(DiscoveryResult {
            session_id,
            turns: outcome.turns,
            summary,
            brief,
            exchanges: outcome.exchanges,
            stop_reason: outcome.stop_reason,
            resumed: opened == Opened::Resumed,
            replaced: opened == Opened::Replaced,
            persisted,
        })
    }

    /// Load the stored session when resuming; a missing session starts fresh
    async fn open(
        &self,
        session_id: &SessionId,
        resume: bool,
        seed: Option<&str>,
    ) -> Result<(Conversation, Opened)> {
        if resume {
            match self.sessions.load(session_id).await? {
                Some(record) => {
                    info!(
                        turns = record.state.turns.len(),
                        "Resuming session {}", session_id
                    );
                    let summary = merge(&DiscoverySummary::seeded(seed), &record.summary);
                    return Ok((
                        Conversation {
                            session_id: Some(session_id.clone()),
                            seed: seed.map(String::from),
                            turns: record.state.turns,
                            summary,
                        },
                        Opened::Resumed,
                    ));
                }
                None => info!("Session {} not found, starting fresh", session_id),
            }
            return Ok((
                Conversation::seeded(Some(session_id.clone()), seed),
                Opened::Fresh,
            ));
        }

        // An unreadable record is overwritten the same way as a readable one
        let opened = match self.sessions.load(session_id).await {
            Ok(Some(record)) => {
                warn!(
                    turns = record.state.turns.len(),
                    "Session {} already exists and will be started over; use --resume to continue it",
                    session_id
                );
                Opened::Replaced
            }
            Ok(None) => Opened::Fresh,
            Err(e) => {
                warn!("Session {} is unreadable and will be started over: {}", session_id, e);
                Opened::Replaced
            }
        };
        Ok((Conversation::seeded(Some(session_id.clone()), seed), opened))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opened {
    Fresh,
    Resumed,
    Replaced,
}

/// Writes every turn and every merged summary through to the session store
struct PersistenceHook {
    sessions: SessionManager,
    session_id: SessionId,
    mirror: Option<ChunkMirror>,
}

#[async_trait]
impl TurnHook for PersistenceHook {
    async fn on_turn(&self, turn: &Turn) {
        // Streamed chunks of this turn reach the chat log before the turn itself
        if let Some(mirror) = &self.mirror {
            mirror.flush().await;
        }
        if let Err(e) = self.sessions.append_turn(&self.session_id, turn).await {
            warn!("Failed to persist turn: {}", e);
        }
    }

    async fn on_summary(&self, turns: &[Turn], summary: &DiscoverySummary) {
        let state = ConversationState {
            session_id: self.session_id.clone(),
            phase: Phase::Discovery,
            turns: turns.to_vec(),
        };
        if let Err(e) = self.sessions.create_or_update(&state, summary).await {
            warn!("Failed to persist summary: {}", e);
        }
    }
}

enum MirrorMessage {
    Chunk(String),
    Flush(oneshot::Sender<()>),
}

/// Queue of streamed chunks mirrored in order by a background task, so
/// display never waits on the session store.
#[derive(Clone)]
struct ChunkMirror {
    tx: mpsc::UnboundedSender<MirrorMessage>,
}

impl ChunkMirror {
    fn spawn(
        sessions: SessionManager,
        session_id: SessionId,
        agent_id: Option<String>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<MirrorMessage>();
        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    MirrorMessage::Chunk(chunk) => {
                        if let Err(e) = sessions
                            .append_assistant_chunk(&session_id, &chunk, agent_id.as_deref())
                            .await
                        {
                            debug!("Failed to mirror chunk: {}", e);
                        }
                    }
                    MirrorMessage::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
        (Self { tx }, task)
    }

    fn push(&self, chunk: &str) {
        let _ = self.tx.send(MirrorMessage::Chunk(chunk.to_string()));
    }

    /// Wait until every chunk queued so far has been mirrored
    async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(MirrorMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

/// Passes everything to `inner` and queues streamed chunks for mirroring
struct MirroredInterface<'a> {
    inner: &'a dyn UserInterface,
    chunks: ChunkMirror,
}

#[async_trait]
impl<'a> UserInterface for MirroredInterface<'a> {
    async fn prompt_text(&self, label: &str) -> Result<String> {
        self.inner.prompt_text(label).await
    }

    fn begin_assistant(&self, header: &str) {
        self.inner.begin_assistant(header);
    }

    fn assistant_chunk(&self, chunk: &str) {
        self.inner.assistant_chunk(chunk);
        self.chunks.push(chunk);
    }

    fn end_assistant(&self) {
        self.inner.end_assistant();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::DisabledRelay;
    use crate::discovery::testing::{ScriptedProvider, ScriptedUi};
    use crate::session::{MemorySessionStore, MirrorKind, SessionStore};
    use crate::types::{DocflowError, Role};
    use serde_json::Value;

    fn engine(store: Arc<dyn SessionStore>, provider: ScriptedProvider, max_turns: usize) -> DiscoveryEngine {
        let mut config = Config::default();
        config.discovery.max_turns = max_turns;
        DiscoveryEngine::new(
            config,
            Arc::new(provider),
            Arc::new(DisabledRelay),
            SessionManager::new(store),
        )
    }

    fn answers() -> ScriptedUi {
        ScriptedUi::new(["save time, less paper", "small clinics", "booking, reminders"])
    }

    #[tokio::test]
    async fn test_offline_run_persists_design_phase() {
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(store.clone(), ScriptedProvider::failing(), 12);

        let result = engine
            .run(
                DiscoveryRequest {
                    session_id: Some(SessionId::new("clinic")),
                    resume: false,
                    seed: Some("Appointment booking for clinics".into()),
                },
                &answers(),
            )
            .await
            .unwrap();

        assert_eq!(result.stop_reason, StopReason::EnoughForDocs);
        assert_eq!(result.exchanges, 3);
        assert!(result.persisted);
        assert!(!result.resumed);
        assert!(!result.replaced);
        assert_eq!(result.brief.description, "Appointment booking for clinics");
        assert_eq!(result.brief.name, "appointment-booking-for-clinics");

        let record = engine
            .sessions()
            .load(&SessionId::new("clinic"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.state.phase, Phase::Design);
        assert_eq!(record.state.turns, result.turns);
        assert_eq!(record.summary, result.summary);

        let mirrored = store.mirrored("clinic");
        let turns = mirrored.iter().filter(|m| m.kind == MirrorKind::Turn).count();
        let chunks = mirrored.iter().filter(|m| m.kind == MirrorKind::Chunk).count();
        assert_eq!(turns, 6);
        assert!(chunks >= 3);
    }

    #[tokio::test]
    async fn test_question_chunks_are_mirrored_before_the_turn() {
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(store.clone(), ScriptedProvider::failing(), 12);
        engine
            .run(
                DiscoveryRequest {
                    session_id: Some(SessionId::new("ordered")),
                    resume: false,
                    seed: Some("Appointment booking for clinics".into()),
                },
                &answers(),
            )
            .await
            .unwrap();

        let mirrored = store.mirrored("ordered");
        assert_eq!(mirrored[0].kind, MirrorKind::Chunk);
        for (i, entry) in mirrored.iter().enumerate() {
            if entry.kind == MirrorKind::Turn && entry.role == Role::Assistant {
                assert_eq!(mirrored[i - 1].kind, MirrorKind::Chunk, "entry {}", i);
            }
        }
        // Each question's chunks spell out the question turn that follows them
        let mut pending = String::new();
        for entry in &mirrored {
            match (entry.kind, entry.role) {
                (MirrorKind::Chunk, _) => pending.push_str(&entry.content),
                (MirrorKind::Turn, Role::Assistant) => {
                    assert_eq!(pending.trim(), entry.content.trim());
                    pending.clear();
                }
                (MirrorKind::Turn, _) => assert!(pending.is_empty()),
            }
        }
    }

    #[tokio::test]
    async fn test_resume_continues_stored_session() {
        let store = Arc::new(MemorySessionStore::new());
        let id = SessionId::new("resume-me");
        let sessions = SessionManager::new(store.clone());
        let mut state = ConversationState::new(id.clone());
        state.turns.push(Turn::assistant("What are you building?"));
        state.turns.push(Turn::user("A recipe box"));
        sessions
            .create_or_update(
                &state,
                &DiscoverySummary {
                    description: Some("A recipe box".into()),
                    objectives: Some(vec!["cook more".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let engine = engine(store, ScriptedProvider::failing(), 12);
        let ui = ScriptedUi::new(["home cooks", "search, shopping list"]);
        let result = engine
            .run(
                DiscoveryRequest {
                    session_id: Some(id.clone()),
                    resume: true,
                    seed: None,
                },
                &ui,
            )
            .await
            .unwrap();

        assert!(result.resumed);
        assert_eq!(result.exchanges, 2);
        assert_eq!(result.turns.len(), 6);
        assert_eq!(result.turns[1].content, "A recipe box");
        assert_eq!(result.summary.objectives, Some(vec!["cook more".into()]));
        assert_eq!(result.summary.target_users, Some(vec!["home cooks".into()]));
        // Already-known fields are not asked about again
        assert_eq!(
            ui.prompts.lock().unwrap().clone(),
            vec!["Target users".to_string(), "Core features".to_string()]
        );
    }

    #[tokio::test]
    async fn test_resume_of_unknown_session_starts_fresh() {
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(store, ScriptedProvider::failing(), 1);
        let result = engine
            .run(
                DiscoveryRequest {
                    session_id: Some(SessionId::new("nope")),
                    resume: true,
                    seed: None,
                },
                &ScriptedUi::new(["A kanban board"]),
            )
            .await
            .unwrap();

        assert!(!result.resumed);
        assert_eq!(result.stop_reason, StopReason::TurnBudgetExhausted);
        assert_eq!(result.turns.len(), 2);
        assert_eq!(result.turns[0].role, Role::Assistant);
        assert_eq!(result.brief.description, "A kanban board");
    }

    #[tokio::test]
    async fn test_cancellation_keeps_turns_already_persisted() {
        let store = Arc::new(MemorySessionStore::new());
        let engine = engine(store.clone(), ScriptedProvider::failing(), 12);
        let err = engine
            .run(
                DiscoveryRequest {
                    session_id: Some(SessionId::new("cancel")),
                    resume: false,
                    seed: Some("Habit tracker".into()),
                },
                &ScriptedUi::new(["stay consistent"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocflowError::Cancelled));

        let record = engine
            .sessions()
            .load(&SessionId::new("cancel"))
            .await
            .unwrap()
            .unwrap();
        // question, answer, second question
        assert_eq!(record.state.turns.len(), 3);
        assert_eq!(record.state.phase, Phase::Discovery);
        assert_eq!(record.summary.objectives, Some(vec!["stay consistent".into()]));
    }

    #[tokio::test]
    async fn test_existing_session_without_resume_is_replaced() {
        let store = Arc::new(MemorySessionStore::new());
        let id = SessionId::new("taken");
        let mut state = ConversationState::new(id.clone());
        state.turns.push(Turn::user("An old idea"));
        SessionManager::new(store.clone())
            .create_or_update(&state, &DiscoverySummary::default())
            .await
            .unwrap();

        let engine = engine(store, ScriptedProvider::failing(), 1);
        let result = engine
            .run(
                DiscoveryRequest {
                    session_id: Some(id.clone()),
                    resume: false,
                    seed: None,
                },
                &ScriptedUi::new(["A kanban board"]),
            )
            .await
            .unwrap();

        assert!(result.replaced);
        assert!(!result.resumed);
        let record = engine.sessions().load(&id).await.unwrap().unwrap();
        assert_eq!(record.state.turns.len(), 2);
        assert!(record.state.turns.iter().all(|t| t.content != "An old idea"));
    }

    /// Store that rejects every write
    struct ReadOnlyStore;

    #[async_trait]
    impl SessionStore for ReadOnlyStore {
        async fn get(&self, _id: &str) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn set(&self, _id: &str, _value: Value) -> Result<()> {
            Err(DocflowError::Storage("read-only".into()))
        }

        async fn update(&self, _id: &str, _patch: Value) -> Result<()> {
            Err(DocflowError::Storage("read-only".into()))
        }

        async fn delete(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &'static str {
            "read-only"
        }
    }

    #[tokio::test]
    async fn test_storage_failures_do_not_stop_the_conversation() {
        let engine = engine(Arc::new(ReadOnlyStore), ScriptedProvider::failing(), 12);
        let result = engine
            .run(
                DiscoveryRequest {
                    session_id: None,
                    resume: false,
                    seed: Some("Clinic booking".into()),
                },
                &answers(),
            )
            .await
            .unwrap();
        assert!(!result.persisted);
        assert_eq!(result.stop_reason, StopReason::EnoughForDocs);
        assert!(!result.session_id.as_str().is_empty());
    }
}
