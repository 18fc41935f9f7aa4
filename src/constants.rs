//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Conversation loop constants
pub mod conversation {
    /// Default maximum question/answer exchanges per run
    pub const DEFAULT_MAX_TURNS: usize = 12;

    /// Default number of recent turns sent to the backend as context
    pub const DEFAULT_HISTORY_WINDOW: usize = 8;
}

/// Gap priority weights
pub mod weights {
    /// Missing required specs requirement
    pub const REQUIRED: u8 = 10;

    /// Missing optional specs requirement
    pub const OPTIONAL: u8 = 5;

    /// Architecture gap without a topical mention
    pub const ARCHITECTURE_BASE: u8 = 4;

    /// "What does minimal mean" clarification
    pub const MINIMAL_CLARIFICATION: u8 = 9;

    /// Stack selection
    pub const STACK_SELECTION: u8 = 7;

    /// Feature prioritisation
    pub const FEATURE_PRIORITIES: u8 = 6;
}

/// Language-model request constants
pub mod llm {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.4;

    /// Default completion size
    pub const DEFAULT_MAX_TOKENS: usize = 1024;

    /// Completion size for a single interview question
    pub const QUESTION_MAX_TOKENS: usize = 200;

    /// Buffer size of the streaming chunk channel
    pub const STREAM_CHANNEL_CAPACITY: usize = 64;
}

/// Relay (secondary backend) constants
pub mod relay {
    /// Per-call timeout for relayed backend calls (seconds)
    pub const CALL_TIMEOUT_SECS: u64 = 30;
}

/// Session storage constants
pub mod session {
    /// Default directory for the local session store
    pub const DEFAULT_DIR: &str = ".docflow/sessions";

    /// Transient marker key asking a store to mirror a chat-log entry
    pub const MIRROR_MARKER: &str = "_mirror";

    /// Maximum retries for remote store requests
    pub const REMOTE_MAX_RETRIES: usize = 3;

    /// Remote request timeout (seconds)
    pub const REMOTE_TIMEOUT_SECS: u64 = 15;
}
