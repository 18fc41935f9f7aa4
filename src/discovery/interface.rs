//! User interface sink
//!
//! What the conversation needs from whoever sits at the other end: a blocking
//! text prompt and a place to show assistant output as it streams in.

use async_trait::async_trait;

use crate::types::Result;

#[async_trait]
pub trait UserInterface: Send + Sync {
    /// Read one answer. Fails with `DocflowError::Cancelled` when the user aborts.
    async fn prompt_text(&self, label: &str) -> Result<String>;

    /// Start an assistant message under `header`
    fn begin_assistant(&self, header: &str);

    /// Show a streamed chunk immediately
    fn assistant_chunk(&self, chunk: &str);

    /// End-of-message marker
    fn end_assistant(&self);

    /// Show a complete assistant message
    fn show_assistant_text(&self, header: &str, text: &str) {
        self.begin_assistant(header);
        self.assistant_chunk(text);
        self.end_assistant();
    }
}
