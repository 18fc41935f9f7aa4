//! Scripted test doubles shared by the discovery tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::interface::UserInterface;
use crate::ai::{CompletionRequest, LlmError, LlmProvider, LlmResponse};
use crate::types::{DocflowError, Result};

/// Interface answering from a fixed script; cancels once the script runs out
#[derive(Default)]
pub struct ScriptedUi {
    answers: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub output: Mutex<String>,
    pub messages: Mutex<usize>,
}

impl ScriptedUi {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn output(&self) -> String {
        self.output.lock().unwrap().clone()
    }

    pub fn message_count(&self) -> usize {
        *self.messages.lock().unwrap()
    }
}

#[async_trait]
impl UserInterface for ScriptedUi {
    async fn prompt_text(&self, label: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(label.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(DocflowError::Cancelled)
    }

    fn begin_assistant(&self, header: &str) {
        self.output.lock().unwrap().push_str(&format!("[{}] ", header));
    }

    fn assistant_chunk(&self, chunk: &str) {
        self.output.lock().unwrap().push_str(chunk);
    }

    fn end_assistant(&self) {
        self.output.lock().unwrap().push('\n');
        *self.messages.lock().unwrap() += 1;
    }
}

/// Provider replaying canned replies in order; fails once they run out
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<std::result::Result<String, LlmError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
    /// Split streamed replies into chunks of this many chars
    pub chunk_chars: usize,
}

impl ScriptedProvider {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<String, LlmError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            chunk_chars: 4,
        }
    }

    /// Always fails
    pub fn failing() -> Self {
        Self::new([])
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next(&self, request: &CompletionRequest) -> std::result::Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::unavailable("script exhausted").provider("scripted")))
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<LlmResponse, LlmError> {
        self.next(request).map(LlmResponse::content_only)
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> std::result::Result<LlmResponse, LlmError> {
        let content = self.next(request)?;
        let chars: Vec<char> = content.chars().collect();
        for piece in chars.chunks(self.chunk_chars.max(1)) {
            let _ = chunk_tx.send(piece.iter().collect()).await;
        }
        Ok(LlmResponse::content_only(content))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "script"
    }
}
