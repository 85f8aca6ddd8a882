//! Text agents.
//!
//! Each agent pairs a fixed system prompt with an [`LlmProvider`] and makes
//! one model call per claim. Agents know nothing about timeouts, circuits
//! or budgets; the pipeline wraps every call in those.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::collaborator::Collaborator;
use crate::labeler::LabelerError;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, TokenUsage};

mod extractor;
mod summarizer;

pub use extractor::KeyFactExtractor;
pub use summarizer::NarrativeSummarizer;

/// Why a collaborator call produced no usable answer.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Text model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Image labeling failed: {0}")]
    Labeler(#[from] LabelerError),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Token budget exceeded")]
    BudgetExceeded,

    #[error("Circuit open")]
    CircuitOpen,
}

/// One agent answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// Model that answered
    pub model: String,
}

/// A prompted text-model call.
#[async_trait]
pub trait TextAgent: Send + Sync {
    fn collaborator(&self) -> Collaborator;

    /// Configured model name, used in cache keys and cost estimates.
    fn model(&self) -> &str;

    async fn run(&self, input: &str) -> Result<AgentResponse, AgentError>;
}

/// System prompt + provider + completion settings.
pub(crate) struct PromptedCall {
    provider: Arc<dyn LlmProvider>,
    system_prompt: &'static str,
    config: CompletionConfig,
}

impl PromptedCall {
    pub(crate) fn new(
        provider: Arc<dyn LlmProvider>,
        system_prompt: &'static str,
        config: CompletionConfig,
    ) -> Self {
        Self {
            provider,
            system_prompt,
            config,
        }
    }

    pub(crate) fn model(&self) -> &str {
        &self.config.model
    }

    pub(crate) async fn call(&self, input: &str) -> Result<AgentResponse, AgentError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt),
            ChatMessage::user(input),
        ];

        let response = self.provider.complete(messages, &self.config).await?;
        tracing::debug!(
            provider = self.provider.name(),
            model = %response.model,
            tokens = response.usage.total(),
            "Text model answered"
        );

        Ok(AgentResponse {
            text: response.content,
            usage: response.usage,
            model: response.model,
        })
    }
}
