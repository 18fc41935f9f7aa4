//! Relay backend
//!
//! Optional secondary path for question generation: the same prompt pair is
//! posted to a server-side relay which streams the reply back. The relay
//! fails closed. Every failure, including "not configured", comes back as
//! [`RelayOutcome::Unavailable`] so callers fall through to the primary backend.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::provider::CompletionRequest;
use super::timeout::with_timeout;
use crate::config::RelayConfig;
use crate::types::{DocflowError, ErrorClassifier, Result};

/// Result of a relayed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Full accumulated text
    Completed(String),
    /// Disabled, unreachable, timed out or empty; carries the reason
    Unavailable(String),
}

/// Secondary streaming backend for question generation
#[async_trait]
pub trait QuestionRelay: Send + Sync {
    /// Stream a completion through the relay. Never fails; see [`RelayOutcome`].
    async fn stream(
        &self,
        request: &CompletionRequest,
        session_id: Option<&str>,
        chunk_tx: mpsc::Sender<String>,
    ) -> RelayOutcome;
}

pub type SharedRelay = Arc<dyn QuestionRelay>;

/// Relay that is switched off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRelay;

#[async_trait]
impl QuestionRelay for DisabledRelay {
    async fn stream(
        &self,
        _request: &CompletionRequest,
        _session_id: Option<&str>,
        _chunk_tx: mpsc::Sender<String>,
    ) -> RelayOutcome {
        RelayOutcome::Unavailable("relay disabled".to_string())
    }
}

/// HTTP relay: `POST {url}/questions`, plain-text chunked reply
#[derive(Debug, Clone)]
pub struct HttpRelay {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    system: &'a str,
    user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

impl HttpRelay {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            endpoint: format!("{}/questions", base_url.trim_end_matches('/')),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    async fn call(
        &self,
        request: &CompletionRequest,
        session_id: Option<&str>,
        chunk_tx: &mpsc::Sender<String>,
    ) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RelayRequest {
                system: &request.system,
                user: &request.user,
                session_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(status, &body, "relay").into());
        }

        let mut text = String::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut body = response.bytes_stream();

        while let Some(bytes) = body.next().await {
            pending.extend_from_slice(&bytes?);
            if let Some(chunk) = drain_utf8(&mut pending) {
                text.push_str(&chunk);
                let _ = chunk_tx.send(chunk).await;
            }
        }
        if !pending.is_empty() {
            let rest = String::from_utf8_lossy(&pending).into_owned();
            text.push_str(&rest);
            let _ = chunk_tx.send(rest).await;
        }

        Ok(text)
    }
}

/// Take the decodable prefix of `pending`. Invalid bytes are replaced right
/// away; only a sequence cut off at the end is held back for the next chunk.
fn drain_utf8(pending: &mut Vec<u8>) -> Option<String> {
    let mut end = 0;
    loop {
        match std::str::from_utf8(&pending[end..]) {
            Ok(_) => {
                end = pending.len();
                break;
            }
            Err(e) => match e.error_len() {
                Some(len) => end += e.valid_up_to() + len,
                None => {
                    end += e.valid_up_to();
                    break;
                }
            },
        }
    }
    if end == 0 {
        return None;
    }
    let chunk = String::from_utf8_lossy(&pending[..end]).into_owned();
    pending.drain(..end);
    Some(chunk)
}

#[async_trait]
impl QuestionRelay for HttpRelay {
    async fn stream(
        &self,
        request: &CompletionRequest,
        session_id: Option<&str>,
        chunk_tx: mpsc::Sender<String>,
    ) -> RelayOutcome {
        debug!("Relaying question request to {}", self.endpoint);
        let result = with_timeout(
            self.timeout,
            self.call(request, session_id, &chunk_tx),
            "relay call",
        )
        .await;

        match result {
            Ok(text) if !text.trim().is_empty() => RelayOutcome::Completed(text),
            Ok(_) => RelayOutcome::Unavailable("relay returned no text".to_string()),
            Err(e) => RelayOutcome::Unavailable(fold(e)),
        }
    }
}

fn fold(err: DocflowError) -> String {
    err.into_llm_error("relay").to_string()
}

/// Build the relay described by `config`
pub fn create_relay(config: &RelayConfig) -> SharedRelay {
    match config.url.as_deref().map(str::trim) {
        Some(url) if config.enabled && !url.is_empty() => {
            Arc::new(HttpRelay::new(url, Duration::from_secs(config.timeout_secs)))
        }
        _ => {
            if config.enabled {
                debug!("Relay enabled without a URL; treating as disabled");
            }
            Arc::new(DisabledRelay)
        }
    }
}
