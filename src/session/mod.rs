//! Session persistence
//!
//! A session is one persisted document per id:
//!
//! ```json
//! { "sessionId": "...", "phase": "discovery", "turns": [...], "summary": {...} }
//! ```
//!
//! [`SessionStore`] is the raw key/value contract; [`SessionManager`] layers the
//! typed operations on top. Two stores are interchangeable:
//!
//! - `file`: one JSON file per session under `session.dir`
//! - `remote`: HTTP session service, which also keeps a chat-log of mirrored messages
//!
//! [`MemorySessionStore`] keeps everything in process.

mod file_store;
mod memory;
mod remote_store;

pub use file_store::FileSessionStore;
pub use memory::MemorySessionStore;
pub use remote_store::RemoteSessionStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::config::{SessionBackendKind, SessionConfig};
use crate::constants::session::MIRROR_MARKER;
use crate::types::turn::now_iso8601;
use crate::types::{DiscoverySummary, DocflowError, Result, Role, SessionId, Turn};

// =============================================================================
// Store contract
// =============================================================================

/// Key/value session storage keyed by opaque session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Value>>;

    async fn set(&self, id: &str, value: Value) -> Result<()>;

    /// Shallow-merge `patch` into the stored object, creating it if absent.
    ///
    /// A `_mirror` entry in the patch is never persisted; stores that keep a
    /// chat-log mirror it there instead.
    async fn update(&self, id: &str, patch: Value) -> Result<()>;

    /// Returns whether something was deleted
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Whether mirrored chat-log entries are kept anywhere
    fn supports_mirroring(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

pub type SharedSessionStore = Arc<dyn SessionStore>;

/// Split a patch into its persisted fields and the transient mirror entry
pub(crate) fn take_mirror(patch: Value) -> (Map<String, Value>, Option<MirrorEntry>) {
    let mut fields = match patch {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mirror = fields
        .remove(MIRROR_MARKER)
        .and_then(|v| serde_json::from_value(v).ok());
    (fields, mirror)
}

/// Shallow merge of `fields` into `target`, replacing non-objects
pub(crate) fn shallow_merge(target: Option<Value>, fields: Map<String, Value>) -> Value {
    let mut merged = match target {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    merged.extend(fields);
    Value::Object(merged)
}

// =============================================================================
// Persisted records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Discovery,
    Design,
    Generation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Discovery => write!(f, "discovery"),
            Phase::Design => write!(f, "design"),
            Phase::Generation => write!(f, "generation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub session_id: SessionId,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            phase: Phase::Discovery,
            turns: Vec::new(),
        }
    }
}

/// The persisted document: state fields flattened next to the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(flatten)]
    pub state: ConversationState,
    #[serde(default)]
    pub summary: DiscoverySummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorKind {
    /// A complete turn
    Turn,
    /// A streamed partial chunk of assistant output
    Chunk,
}

/// Chat-log entry mirrored by stores that keep one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub kind: MirrorKind,
    pub timestamp: String,
}

impl MirrorEntry {
    pub fn turn(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            agent_id: turn.agent_id.clone(),
            kind: MirrorKind::Turn,
            timestamp: turn.timestamp.clone(),
        }
    }

    pub fn chunk(content: &str, agent_id: Option<&str>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            agent_id: agent_id.map(String::from),
            kind: MirrorKind::Chunk,
            timestamp: now_iso8601(),
        }
    }
}

// =============================================================================
// Session manager
// =============================================================================

/// Typed session operations over a [`SessionStore`].
///
/// Persisted state trails in-memory state: turns are written as they happen
/// and the summary after each merge, neither transactionally with the backend
/// call that produced it. A crash between `append_turn` and the following
/// `create_or_update` leaves the stored summary behind the stored turn log.
/// Resuming from such a session simply asks about the stale gap again.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedSessionStore,
}

impl SessionManager {
    pub fn new(store: SharedSessionStore) -> Self {
        Self { store }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Ok(Self::new(create_session_store(config)?))
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn supports_mirroring(&self) -> bool {
        self.store.supports_mirroring()
    }

    /// Upsert the full persisted document; the summary is stored as given
    #[instrument(skip_all, fields(session = %state.session_id))]
    pub async fn create_or_update(
        &self,
        state: &ConversationState,
        summary: &DiscoverySummary,
    ) -> Result<()> {
        let record = SessionRecord {
            state: state.clone(),
            summary: summary.clone(),
        };
        self.store
            .set(state.session_id.as_str(), serde_json::to_value(&record)?)
            .await
    }

    /// Append one turn to the stored log and mirror it
    #[instrument(skip_all, fields(session = %session_id))]
    pub async fn append_turn(&self, session_id: &SessionId, turn: &Turn) -> Result<()> {
        let id = session_id.as_str();
        let mut turns: Vec<Turn> = match self.store.get(id).await? {
            Some(value) => match value.get("turns") {
                Some(turns) => serde_json::from_value(turns.clone())?,
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        turns.push(turn.clone());

        let mut patch = Map::new();
        patch.insert("sessionId".to_string(), Value::String(id.to_string()));
        patch.insert("turns".to_string(), serde_json::to_value(&turns)?);
        patch.insert(
            MIRROR_MARKER.to_string(),
            serde_json::to_value(MirrorEntry::turn(turn))?,
        );
        self.store.update(id, Value::Object(patch)).await
    }

    /// Mirror a streamed assistant chunk; nothing is persisted in the session itself
    pub async fn append_assistant_chunk(
        &self,
        session_id: &SessionId,
        content: &str,
        agent_id: Option<&str>,
    ) -> Result<()> {
        if !self.store.supports_mirroring() {
            return Ok(());
        }
        let mut patch = Map::new();
        patch.insert(
            MIRROR_MARKER.to_string(),
            serde_json::to_value(MirrorEntry::chunk(content, agent_id))?,
        );
        self.store
            .update(session_id.as_str(), Value::Object(patch))
            .await
    }

    #[instrument(skip_all, fields(session = %session_id))]
    pub async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>> {
        match self.store.get(session_id.as_str()).await? {
            Some(value) => {
                let record: SessionRecord = serde_json::from_value(value).map_err(|e| {
                    DocflowError::Session(format!("Corrupt session '{}': {}", session_id, e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip_all, fields(session = %session_id))]
    pub async fn delete(&self, session_id: &SessionId) -> Result<bool> {
        self.store.delete(session_id.as_str()).await
    }
}

/// Build the configured store. A remote store without a URL fails here, not on first use.
pub fn create_session_store(config: &SessionConfig) -> Result<SharedSessionStore> {
    let remote_url = config
        .remote_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let store: SharedSessionStore = match (config.backend, remote_url) {
        (SessionBackendKind::Remote, None) => {
            return Err(DocflowError::Config(
                "session.backend = \"remote\" requires session.remote_url".to_string(),
            ));
        }
        (SessionBackendKind::Remote | SessionBackendKind::Auto, Some(url)) => Arc::new(
            RemoteSessionStore::new(url, config.remote_token.clone())?,
        ),
        (SessionBackendKind::File | SessionBackendKind::Auto, _) => {
            Arc::new(FileSessionStore::new(&config.dir))
        }
    };

    if config.backend == SessionBackendKind::File && remote_url.is_some() {
        debug!("session.remote_url ignored with the file backend");
    }
    info!("Session store: {}", store.name());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtraValue;

    fn manager() -> (SessionManager, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (SessionManager::new(store.clone()), store)
    }

    fn sample() -> (ConversationState, DiscoverySummary) {
        let mut state = ConversationState::new(SessionId::new("round-trip"));
        state.turns.push(Turn::assistant("What are you building?").with_agent(Some("disc")));
        state.turns.push(Turn::user("A recipe box"));
        let mut summary = DiscoverySummary {
            description: Some("A recipe box".into()),
            features: Some(vec!["search".into()]),
            ..Default::default()
        };
        summary.set_extra("platforms", ExtraValue::text("Web"));
        (state, summary)
    }

    #[tokio::test]
    async fn test_create_load_delete_round_trip() {
        let (manager, _) = manager();
        let (state, summary) = sample();

        manager.create_or_update(&state, &summary).await.unwrap();
        let loaded = manager.load(&state.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, state);
        assert_eq!(loaded.summary, summary);

        assert!(manager.delete(&state.session_id).await.unwrap());
        assert!(manager.load(&state.session_id).await.unwrap().is_none());
        assert!(!manager.delete(&state.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_layout() {
        let (state, summary) = sample();
        let value = serde_json::to_value(SessionRecord { state, summary }).unwrap();
        assert_eq!(value["sessionId"], "round-trip");
        assert_eq!(value["phase"], "discovery");
        assert_eq!(value["turns"][0]["agentId"], "disc");
        assert_eq!(value["summary"]["description"], "A recipe box");
    }

    #[tokio::test]
    async fn test_append_turn_appends_and_mirrors() {
        let (manager, store) = manager();
        let (state, summary) = sample();
        manager.create_or_update(&state, &summary).await.unwrap();

        let turn = Turn::assistant("Who is it for?");
        manager.append_turn(&state.session_id, &turn).await.unwrap();

        let loaded = manager.load(&state.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.state.turns.len(), 3);
        assert_eq!(loaded.state.turns[2], turn);
        assert_eq!(loaded.summary, summary);

        let raw = store.get("round-trip").await.unwrap().unwrap();
        assert!(raw.get(MIRROR_MARKER).is_none());

        let mirrored = store.mirrored("round-trip");
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].kind, MirrorKind::Turn);
        assert_eq!(mirrored[0].content, "Who is it for?");
    }

    #[tokio::test]
    async fn test_padded_values_round_trip_unchanged() {
        let (manager, _) = manager();
        let (state, _) = sample();
        let summary = DiscoverySummary {
            description: Some("A recipe box ".into()),
            features: Some(vec![" search".into(), "shopping list".into()]),
            stack_suggestion: Some("  Rails".into()),
            ..Default::default()
        };
        manager.create_or_update(&state, &summary).await.unwrap();

        let loaded = manager.load(&state.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.summary, summary);
        assert_eq!(loaded.state, state);
    }

    #[tokio::test]
    async fn test_append_turn_creates_missing_session() {
        let (manager, _) = manager();
        let id = SessionId::new("fresh");
        manager.append_turn(&id, &Turn::user("hi")).await.unwrap();

        let loaded = manager.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.state.turns.len(), 1);
        assert_eq!(loaded.state.phase, Phase::Discovery);
        assert!(loaded.summary.is_empty());
    }

    #[tokio::test]
    async fn test_chunks_are_mirrored_not_persisted() {
        let (manager, store) = manager();
        let id = SessionId::new("chunks");
        manager
            .append_assistant_chunk(&id, "Who ", Some("disc"))
            .await
            .unwrap();
        manager
            .append_assistant_chunk(&id, "is it for?", Some("disc"))
            .await
            .unwrap();

        assert!(manager.load(&id).await.unwrap().is_none());
        let mirrored = store.mirrored("chunks");
        assert_eq!(mirrored.len(), 2);
        assert!(mirrored.iter().all(|m| m.kind == MirrorKind::Chunk));
        assert_eq!(mirrored[1].agent_id.as_deref(), Some("disc"));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_session_error() {
        let (manager, store) = manager();
        store
            .set("bad", serde_json::json!({"sessionId": "bad", "phase": "sideways"}))
            .await
            .unwrap();
        let err = manager.load(&SessionId::new("bad")).await.unwrap_err();
        assert!(matches!(err, DocflowError::Session(_)));
    }

    #[test]
    fn test_remote_without_url_fails_at_construction() {
        let config = SessionConfig {
            backend: SessionBackendKind::Remote,
            ..Default::default()
        };
        assert!(matches!(
            create_session_store(&config),
            Err(DocflowError::Config(_))
        ));
    }

    #[test]
    fn test_auto_selects_by_url_presence() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SessionConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert_eq!(create_session_store(&config).unwrap().name(), "file");

        config.remote_url = Some("http://127.0.0.1:9/api".into());
        assert_eq!(create_session_store(&config).unwrap().name(), "remote");

        config.backend = SessionBackendKind::File;
        assert_eq!(create_session_store(&config).unwrap().name(), "file");
    }

    #[test]
    fn test_take_mirror_strips_marker() {
        let entry = MirrorEntry::chunk("hi", None);
        let patch = serde_json::json!({"turns": [], "_mirror": entry});
        let (fields, mirror) = take_mirror(patch);
        assert!(!fields.contains_key(MIRROR_MARKER));
        assert!(fields.contains_key("turns"));
        assert_eq!(mirror.unwrap().content, "hi");
    }
}
