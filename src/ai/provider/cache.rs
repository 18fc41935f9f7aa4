//! Per-run completion cache
//!
//! Memoizes non-streamed completions keyed by a digest of the prompt pair.
//! One cache is created per conversation run and injected where needed;
//! nothing is shared across runs.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use super::{CompletionRequest, LlmError, LlmProvider, LlmResponse, SharedProvider};

/// Completion memo scoped to one conversation run
#[derive(Debug, Default)]
pub struct CompletionCache {
    entries: DashMap<String, LlmResponse>,
    hits: AtomicU64,
}

impl CompletionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, request: &CompletionRequest) -> Option<LlmResponse> {
        let hit = self
            .entries
            .get(&request.cache_key())
            .map(|entry| entry.value().clone());
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    pub fn insert(&self, request: &CompletionRequest, response: LlmResponse) {
        self.entries.insert(request.cache_key(), response);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Provider wrapper consulting a [`CompletionCache`] before `complete`.
///
/// Streamed calls always reach the inner provider. Failures are never cached.
pub struct CachedProvider {
    inner: SharedProvider,
    cache: Arc<CompletionCache>,
}

impl CachedProvider {
    pub fn new(inner: SharedProvider, cache: Arc<CompletionCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl LlmProvider for CachedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        if let Some(hit) = self.cache.get(request) {
            debug!("Completion cache hit ({} entries)", self.cache.len());
            return Ok(hit);
        }
        let response = self.inner.complete(request).await?;
        log_call("complete", &response);
        self.cache.insert(request, response.clone());
        Ok(response)
    }

    async fn stream(
        &self,
        request: &CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.inner.stream(request, chunk_tx).await?;
        log_call("stream", &response);
        Ok(response)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

fn log_call(kind: &str, response: &LlmResponse) {
    debug!(
        provider = %response.metadata.provider,
        model = %response.metadata.model,
        tokens = response.usage.total(),
        elapsed_ms = response.timing.total_ms,
        "Backend {} finished",
        kind
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::unavailable("down"));
            }
            Ok(LlmResponse::content_only(format!("echo: {}", request.user)))
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_repeated_request_hits_cache() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = Arc::new(CompletionCache::new());
        let provider = CachedProvider::new(inner.clone(), cache.clone());

        let request = CompletionRequest::new("sys", "hello");
        let first = provider.complete(&request).await.unwrap();
        let second = provider.complete(&request).await.unwrap();
        provider
            .complete(&CompletionRequest::new("sys", "other"))
            .await
            .unwrap();

        assert_eq!(first.content, second.content);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cache = Arc::new(CompletionCache::new());
        let provider = CachedProvider::new(inner.clone(), cache.clone());

        let request = CompletionRequest::new("sys", "hello");
        assert!(provider.complete(&request).await.is_err());
        assert!(provider.complete(&request).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_stream_bypasses_cache() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = Arc::new(CompletionCache::new());
        let provider = CachedProvider::new(inner.clone(), cache.clone());

        let (tx, mut rx) = mpsc::channel(4);
        let response = provider
            .stream(&CompletionRequest::new("s", "u"), tx)
            .await
            .unwrap();
        assert_eq!(response.content, "echo: u");
        assert_eq!(rx.recv().await.as_deref(), Some("echo: u"));
        assert!(cache.is_empty());
    }
}
