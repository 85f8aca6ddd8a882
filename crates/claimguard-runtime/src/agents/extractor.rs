//! Key-fact extractor agent.

use async_trait::async_trait;
use std::sync::Arc;

use super::{AgentError, AgentResponse, PromptedCall, TextAgent};
use crate::collaborator::Collaborator;
use crate::prompts::EXTRACTOR_SYSTEM_PROMPT;
use crate::providers::{CompletionConfig, LlmProvider};

/// Pulls incident date, damaged item, amount, cause and documents out of
/// the summarizer's text.
pub struct KeyFactExtractor {
    call: PromptedCall,
}

impl KeyFactExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            call: PromptedCall::new(provider, EXTRACTOR_SYSTEM_PROMPT, config),
        }
    }
}

#[async_trait]
impl TextAgent for KeyFactExtractor {
    fn collaborator(&self) -> Collaborator {
        Collaborator::Extractor
    }

    fn model(&self) -> &str {
        self.call.model()
    }

    async fn run(&self, input: &str) -> Result<AgentResponse, AgentError> {
        self.call.call(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::extractor_input;
    use crate::providers::{ChatMessage, CompletionResponse, ProviderError};

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Err(ProviderError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            })
        }

        async fn health_check(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_provider_error_is_wrapped() {
        let extractor = KeyFactExtractor::new(Arc::new(FailingProvider), CompletionConfig::default());
        let result = extractor.run(&extractor_input("- Summary: roof")).await;

        assert!(matches!(
            result,
            Err(AgentError::Provider(ProviderError::ApiError { status: 503, .. }))
        ));
    }

    #[test]
    fn test_model_comes_from_config() {
        let config = CompletionConfig {
            model: "gemini-1.5-pro".to_string(),
            ..CompletionConfig::default()
        };
        let extractor = KeyFactExtractor::new(Arc::new(FailingProvider), config);
        assert_eq!(extractor.model(), "gemini-1.5-pro");
        assert_eq!(extractor.collaborator(), Collaborator::Extractor);
    }
}
