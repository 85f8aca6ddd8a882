//! # claimguard-runtime
//!
//! Runs the claim pipeline against live collaborators: an image labeler
//! and a text model for summarization and key-fact extraction.
//!
//! All verdict logic lives in `claimguard-core`. This crate only decides
//! what text and labels the core sees, and what it sees when a
//! collaborator is down: every call is bounded by a timeout, a circuit
//! breaker and a token budget, and a failed call yields the stage's
//! degraded value rather than an error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimguard_runtime::{ClaimPipeline, ClaimSubmission, GeminiProvider, GoogleVisionLabeler};
//!
//! let pipeline = ClaimPipeline::builder()
//!     .labeler(Arc::new(GoogleVisionLabeler::from_env()?))
//!     .provider(Arc::new(GeminiProvider::from_env()?))
//!     .config(RuntimeConfig::from_env()?)
//!     .build()?;
//!
//! let outcome = pipeline.evaluate(submission).await?;
//! println!("{}", outcome.record.verdict_reason().unwrap_or_default());
//! ```

pub mod agents;
pub mod cache;
pub mod collaborator;
pub mod config;
pub mod labeler;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use agents::{AgentError, AgentResponse, KeyFactExtractor, NarrativeSummarizer, TextAgent};
pub use cache::{CacheKey, CachedValue, ResponseCache};
pub use collaborator::Collaborator;
pub use config::{ConfigError, RuntimeConfig};
pub use labeler::{ImageLabeler, LabelerError, StaticLabeler};
pub use pipeline::{ClaimPipeline, ClaimPipelineBuilder, ClaimSubmission, PipelineError, PipelineOutcome};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
pub use resilience::{BudgetTracker, CircuitBreaker, CircuitBreakerConfig, CircuitState, LlmUsage};

#[cfg(feature = "google")]
pub use labeler::GoogleVisionLabeler;
#[cfg(feature = "google")]
pub use providers::GeminiProvider;
