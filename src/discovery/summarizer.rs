//! Final summarization
//!
//! One backend pass that tidies the accumulated summary before hand-off.
//! On any failure the input comes back unchanged.

use tracing::{debug, warn};

use super::merge::merge;
use super::prompts::summarizer_request;
use crate::ai::{LlmError, SharedProvider, extract_json_object};
use crate::types::DiscoverySummary;

pub struct DiscoverySummarizer {
    provider: SharedProvider,
}

impl DiscoverySummarizer {
    pub fn new(provider: SharedProvider) -> Self {
        Self { provider }
    }

    /// Cleaned summary; `partial` unchanged when the backend cannot help.
    ///
    /// The cleaned result is merged over `partial`, so a reply that leaves a
    /// field out cannot drop it.
    pub async fn finalize(&self, seed: Option<&str>, partial: &DiscoverySummary) -> DiscoverySummary {
        match self.try_finalize(seed, partial).await {
            Ok(cleaned) => merge(partial, &cleaned),
            Err(e) if e.is_unavailable() => {
                debug!("Summarizer skipped: {}", e);
                partial.clone()
            }
            Err(e) => {
                warn!("Summarizer failed, keeping collected summary: {}", e);
                partial.clone()
            }
        }
    }

    async fn try_finalize(
        &self,
        seed: Option<&str>,
        partial: &DiscoverySummary,
    ) -> Result<DiscoverySummary, LlmError> {
        let response = self
            .provider
            .complete(&summarizer_request(seed, partial))
            .await?;
        let value = extract_json_object(&response.content)?;
        Ok(DiscoverySummary::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::testing::ScriptedProvider;
    use std::sync::Arc;

    fn partial() -> DiscoverySummary {
        DiscoverySummary {
            description: Some("app for  tracking plants".into()),
            features: Some(vec!["reminders".into(), "Reminders".into()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_failure_returns_input_unchanged() {
        let summarizer = DiscoverySummarizer::new(Arc::new(ScriptedProvider::failing()));
        assert_eq!(summarizer.finalize(Some("plants"), &partial()).await, partial());
    }

    #[tokio::test]
    async fn test_malformed_reply_returns_input_unchanged() {
        let summarizer = DiscoverySummarizer::new(Arc::new(ScriptedProvider::new([Ok(
            "{not json".to_string(),
        )])));
        assert_eq!(summarizer.finalize(None, &partial()).await, partial());
    }

    #[tokio::test]
    async fn test_cleaned_values_win_and_missing_fields_survive() {
        let reply = r#"{"name": "plant-pal", "description": "An app for tracking houseplants.", "features": ["reminders"]}"#;
        let summarizer =
            DiscoverySummarizer::new(Arc::new(ScriptedProvider::new([Ok(reply.to_string())])));

        let mut input = partial();
        input.objectives = Some(vec!["keep plants alive".into()]);
        let finalized = summarizer.finalize(Some("plants"), &input).await;

        assert_eq!(finalized.name.as_deref(), Some("plant-pal"));
        assert_eq!(finalized.features, Some(vec!["reminders".into()]));
        assert_eq!(finalized.objectives, Some(vec!["keep plants alive".into()]));
    }
}
