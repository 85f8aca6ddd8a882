//! Narrative summarizer agent.

use async_trait::async_trait;
use std::sync::Arc;

use super::{AgentError, AgentResponse, PromptedCall, TextAgent};
use crate::collaborator::Collaborator;
use crate::prompts::SUMMARIZER_SYSTEM_PROMPT;
use crate::providers::{CompletionConfig, LlmProvider};

/// Condenses the narrative and labels into a synopsis and a label
/// relevance remark.
pub struct NarrativeSummarizer {
    call: PromptedCall,
}

impl NarrativeSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            call: PromptedCall::new(provider, SUMMARIZER_SYSTEM_PROMPT, config),
        }
    }
}

#[async_trait]
impl TextAgent for NarrativeSummarizer {
    fn collaborator(&self) -> Collaborator {
        Collaborator::Summarizer
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
    use crate::prompts::summarizer_input;
    use crate::providers::{ChatMessage, CompletionResponse, ProviderError, TokenUsage};
    use parking_lot::Mutex;

    /// Records the messages it was sent and answers with a fixed text.
    struct RecordingProvider {
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            *self.seen.lock() = messages;
            Ok(CompletionResponse {
                content: "- 📝 Summary: Roof damaged by a fallen tree.".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 40,
                    completion_tokens: 10,
                },
                model: config.model.clone(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_summarizer_sends_system_prompt_and_input() {
        let provider = Arc::new(RecordingProvider {
            seen: Mutex::new(Vec::new()),
        });
        let summarizer = NarrativeSummarizer::new(provider.clone(), CompletionConfig::default());

        let input = summarizer_input("A tree fell on my roof", &["Roof".to_string()]);
        let response = summarizer.run(&input).await.unwrap();

        assert_eq!(response.text, "- 📝 Summary: Roof damaged by a fallen tree.");
        assert_eq!(response.usage.total(), 50);
        assert_eq!(summarizer.collaborator(), Collaborator::Summarizer);

        let seen = provider.seen.lock();
        assert_eq!(seen[0].role, "system");
        assert!(seen[0].content.contains("expert insurance assistant"));
        assert!(seen[1].content.contains("A tree fell on my roof"));
    }
}
