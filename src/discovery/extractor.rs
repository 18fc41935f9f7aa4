//! Answer extraction
//!
//! Turns the latest answer into an update fragment via the backend. Any
//! failure (no backend, network, unusable JSON) yields an empty fragment,
//! which the orchestrator answers with the heuristic extractor.

use tracing::{debug, warn};

use super::gaps::DocumentGap;
use super::prompts::extraction_request;
use crate::ai::{LlmError, SharedProvider, extract_json_object};
use crate::types::{DiscoverySummary, Turn};

pub struct AnswerExtractor {
    provider: SharedProvider,
}

impl AnswerExtractor {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    /// Update fragment for the latest answer; empty on any failure
    pub async fn extract(
        &self,
        history: &[Turn],
        summary: &DiscoverySummary,
        gaps: &[DocumentGap],
    ) -> DiscoverySummary {
        match self.try_extract(history, summary, gaps).await {
            Ok(fragment) => {
                debug!(empty = fragment.is_empty(), "Extracted answer fragment");
                fragment
            }
            Err(e) if e.is_unavailable() => {
                debug!("Extraction skipped: {}", e);
                DiscoverySummary::default()
            }
            Err(e) => {
                warn!("Extraction failed, falling back to heuristics: {}", e);
                DiscoverySummary::default()
            }
        }
    }

    async fn try_extract(
        &self,
        history: &[Turn],
        summary: &DiscoverySummary,
        gaps: &[DocumentGap],
    ) -> Result<DiscoverySummary, LlmError> {
        let request = extraction_request(history, summary, gaps);
        let response = self.provider.complete(&request).await?;
        let value = extract_json_object(&response.content)?;
        Ok(DiscoverySummary::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::testing::ScriptedProvider;
    use std::sync::Arc;

    fn history() -> Vec<Turn> {
        vec![Turn::assistant("Who is it for?"), Turn::user("busy parents and nannies")]
    }

    #[tokio::test]
    async fn test_extracts_first_json_block() {
        let reply = "Sure! ```json\n{\"targetUsers\": [\"busy parents\", \"nannies\"], \"features\": []}\n```";
        let extractor = AnswerExtractor::new(Arc::new(ScriptedProvider::new([Ok(reply.to_string())])));

        let fragment = extractor
            .extract(&history(), &DiscoverySummary::default(), &[])
            .await;
        assert_eq!(
            fragment.target_users,
            Some(vec!["busy parents".into(), "nannies".into()])
        );
        assert_eq!(fragment.features, None);
    }

    #[tokio::test]
    async fn test_failure_yields_empty_fragment() {
        let extractor = AnswerExtractor::new(Arc::new(ScriptedProvider::failing()));
        let fragment = extractor
            .extract(&history(), &DiscoverySummary::default(), &[])
            .await;
        assert!(fragment.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_reply_yields_empty_fragment() {
        let extractor = AnswerExtractor::new(Arc::new(ScriptedProvider::new([Ok(
            "I could not find anything.".to_string(),
        )])));
        let fragment = extractor
            .extract(&history(), &DiscoverySummary::default(), &[])
            .await;
        assert!(fragment.is_empty());
    }
}
