//! Claim pipeline over live collaborators.
//!
//! Runs the six stages in order for one claim. Every collaborator call goes
//! through the same guard: response cache, circuit breaker, token budget,
//! then a timeout. A call that fails any of these writes the stage's
//! degraded value and evaluation continues; only bad input aborts.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;

use claimguard_core::{
    ClaimError, ClaimIntake, ClaimRecord, ContentRelevanceChecker, DecisionEngine,
    ExifMetadataReader, KeyFactStage, MetadataReader, MetadataValidator,
    MisrepresentationDetector, PolicyTerms, RecordError, SummaryStage,
};

use crate::agents::{AgentError, KeyFactExtractor, NarrativeSummarizer, TextAgent};
use crate::cache::{CacheKey, CachedValue, ResponseCache};
use crate::collaborator::Collaborator;
use crate::config::RuntimeConfig;
use crate::labeler::ImageLabeler;
use crate::prompts::{extractor_input, summarizer_input};
use crate::providers::{CompletionConfig, LlmProvider, TokenUsage};
use crate::resilience::{BudgetTracker, CircuitBreaker, LlmUsage};

/// Errors that stop a claim before a verdict.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid claim input: {0}")]
    Input(#[from] ClaimError),

    #[error("Claim record error: {0}")]
    Record(#[from] RecordError),

    #[error("Pipeline needs a {0}")]
    MissingCollaborator(&'static str),
}

/// A claim as submitted: raw strings straight from the upload surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub image_path: PathBuf,

    pub user_narrative: String,

    pub policy_start_date: String,

    pub date_of_loss: String,

    pub allowed_day_threshold: u32,
}

impl ClaimSubmission {
    /// Validate dates and narrative.
    pub fn into_intake(self) -> Result<ClaimIntake, ClaimError> {
        let policy = PolicyTerms::parse(
            &self.policy_start_date,
            &self.date_of_loss,
            self.allowed_day_threshold,
        )?;
        ClaimIntake::new(self.image_path, self.user_narrative, policy)
    }
}

/// One finished evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Fully populated record, verdict included
    pub record: ClaimRecord,

    /// Text-model usage for this claim only
    pub usage: LlmUsage,

    /// Collaborators whose degraded value was written
    pub degraded: Vec<Collaborator>,

    pub evaluated_at: DateTime<Utc>,
}

impl PipelineOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// A successful collaborator answer before caching.
struct Answer {
    value: CachedValue,
    tokens: Option<(TokenUsage, String)>,
}

/// Per-claim bookkeeping.
#[derive(Default)]
struct ClaimRun {
    usage: LlmUsage,
    degraded: Vec<Collaborator>,
}

impl ClaimRun {
    fn degrade(&mut self, collaborator: Collaborator, error: &AgentError) {
        tracing::warn!(%collaborator, error = %error, "Collaborator unavailable, using degraded value");
        self.degraded.push(collaborator);
    }
}

/// Evaluates claims. `Send + Sync`; one instance serves concurrent claims.
pub struct ClaimPipeline {
    labeler: Arc<dyn ImageLabeler>,
    summarizer: Arc<dyn TextAgent>,
    extractor: Arc<dyn TextAgent>,
    metadata_reader: Arc<dyn MetadataReader>,
    decision_engine: DecisionEngine,
    config: RuntimeConfig,
    circuit_breaker: CircuitBreaker,
    budget: BudgetTracker,
    cache: Option<ResponseCache>,
}

impl ClaimPipeline {
    pub fn builder() -> ClaimPipelineBuilder {
        ClaimPipelineBuilder::default()
    }

    /// Parse a submission and evaluate it.
    pub async fn evaluate(&self, submission: ClaimSubmission) -> Result<PipelineOutcome, PipelineError> {
        let intake = submission.into_intake()?;
        self.evaluate_intake(intake).await
    }

    /// Evaluate an already validated claim.
    pub async fn evaluate_intake(&self, intake: ClaimIntake) -> Result<PipelineOutcome, PipelineError> {
        let image = tokio::fs::read(intake.image_path())
            .await
            .map_err(|source| ClaimError::ImageUnreadable {
                path: intake.image_path().to_path_buf(),
                source,
            })?;

        let span = tracing::info_span!("claim", image = %intake.image_path().display());
        self.run(intake, image).instrument(span).await
    }

    async fn run(&self, intake: ClaimIntake, image: Vec<u8>) -> Result<PipelineOutcome, PipelineError> {
        let mut run = ClaimRun::default();
        let record = ClaimRecord::new(intake);

        let metadata = self.metadata_reader.read(&image);
        let record = MetadataValidator::new().apply(record, &metadata)?;
        tracing::info!(
            capture_vs_policy = ?record.capture_vs_policy(),
            capture_vs_loss_date = ?record.capture_vs_loss_date(),
            "Metadata stage done"
        );

        let labels = self.labels(&image, &mut run).await;
        let record = ContentRelevanceChecker::new().apply(record, labels)?;
        tracing::info!(
            labels = record.content_labels().len(),
            matches = ?record.narrative_matches_content(),
            "Content relevance stage done"
        );

        let input = summarizer_input(record.user_narrative(), record.content_labels());
        let summary_text = self.ask(self.summarizer.as_ref(), &input, &mut run).await;
        let record = SummaryStage::new().apply(record, &summary_text)?;
        tracing::info!(chars = summary_text.len(), "Summary stage done");

        let key_fact_text = if summary_text.trim().is_empty() {
            tracing::debug!("No summary to extract from, skipping extractor");
            run.degraded.push(Collaborator::Extractor);
            String::new()
        } else {
            let input = extractor_input(&summary_text);
            self.ask(self.extractor.as_ref(), &input, &mut run).await
        };
        let record = KeyFactStage::new().apply(record, &key_fact_text)?;
        tracing::info!("Key fact stage done");

        let record = MisrepresentationDetector::new().apply(record)?;
        tracing::info!(flag = ?record.misrepresentation_flag(), "Misrepresentation stage done");

        let record = self.decision_engine.apply(record)?;
        tracing::info!(
            verdict = ?record.verdict(),
            reason = %record.verdict_reason().unwrap_or_default(),
            degraded = run.degraded.len(),
            "Claim evaluated"
        );

        Ok(PipelineOutcome {
            record,
            usage: run.usage,
            degraded: run.degraded,
            evaluated_at: Utc::now(),
        })
    }

    async fn labels(&self, image: &[u8], run: &mut ClaimRun) -> Vec<String> {
        let labeler = &self.labeler;
        let key = CacheKey::for_image(labeler.name(), image);

        let result = self
            .guarded(Collaborator::Labeler, key, &mut run.usage, || async move {
                let labels = labeler.labels(image).await?;
                Ok::<_, AgentError>(Answer {
                    value: CachedValue::Labels(labels),
                    tokens: None,
                })
            })
            .await;

        match result {
            Ok(CachedValue::Labels(labels)) => labels,
            Ok(CachedValue::Completion(_)) => Vec::new(),
            Err(e) => {
                run.degrade(Collaborator::Labeler, &e);
                Vec::new()
            }
        }
    }

    async fn ask(&self, agent: &dyn TextAgent, input: &str, run: &mut ClaimRun) -> String {
        let collaborator = agent.collaborator();
        let key = CacheKey::for_text(collaborator, agent.model(), input);

        let result = self
            .guarded(collaborator, key, &mut run.usage, || async move {
                let response = agent.run(input).await?;
                Ok::<_, AgentError>(Answer {
                    value: CachedValue::Completion(response.text),
                    tokens: Some((response.usage, response.model)),
                })
            })
            .await;

        match result {
            Ok(CachedValue::Completion(text)) => text,
            Ok(CachedValue::Labels(_)) => String::new(),
            Err(e) => {
                run.degrade(collaborator, &e);
                String::new()
            }
        }
    }

    /// Cache, circuit, budget, timeout. Only successful answers are cached.
    async fn guarded<F, Fut>(
        &self,
        collaborator: Collaborator,
        key: CacheKey,
        usage: &mut LlmUsage,
        call: F,
    ) -> Result<CachedValue, AgentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Answer, AgentError>>,
    {
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&key).await {
                tracing::debug!(%collaborator, "Response cache hit");
                usage.record_cache_hit();
                return Ok(value);
            }
        }

        if self.circuit_breaker.is_open(collaborator) {
            return Err(AgentError::CircuitOpen);
        }

        let estimate = self.config.budget.estimated_tokens_per_call;
        if collaborator.uses_tokens() && !self.budget.can_afford(collaborator, estimate) {
            tracing::debug!(
                %collaborator,
                estimate,
                remaining = self.budget.remaining_for(collaborator),
                remaining_global = self.budget.remaining_global(),
                "Token budget exhausted"
            );
            return Err(AgentError::BudgetExceeded);
        }

        let timeout = self.config.timeout_for(collaborator);
        let answer = match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                self.circuit_breaker.record_failure(collaborator);
                return Err(e);
            }
            Err(_) => {
                self.circuit_breaker.record_failure(collaborator);
                return Err(AgentError::Timeout(timeout));
            }
        };

        self.circuit_breaker.record_success(collaborator);
        if let Some((tokens, model)) = &answer.tokens {
            self.budget.record_usage(collaborator, tokens, model);
            usage.add(tokens, model);
        }
        if let Some(cache) = &self.cache {
            cache.insert(key, answer.value.clone()).await;
        }

        Ok(answer.value)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Lifetime text-model usage across every claim this pipeline ran.
    pub fn total_usage(&self) -> LlmUsage {
        self.budget.get_usage()
    }

    /// Start a new accounting window: close every circuit, refill the token
    /// budgets and drop cached responses.
    pub fn reset(&self) {
        self.circuit_breaker.reset();
        self.budget.reset();
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
        tracing::info!("Pipeline state reset");
    }
}

/// Builds a [`ClaimPipeline`].
///
/// A labeler and a text-model provider are required. The metadata reader
/// defaults to EXIF; the agents default to the standard prompts over the
/// provider with models from [`RuntimeConfig::models`].
#[derive(Default)]
pub struct ClaimPipelineBuilder {
    labeler: Option<Arc<dyn ImageLabeler>>,
    provider: Option<Arc<dyn LlmProvider>>,
    summarizer: Option<Arc<dyn TextAgent>>,
    extractor: Option<Arc<dyn TextAgent>>,
    metadata_reader: Option<Arc<dyn MetadataReader>>,
    decision_engine: Option<DecisionEngine>,
    config: RuntimeConfig,
}

impl ClaimPipelineBuilder {
    pub fn labeler(mut self, labeler: Arc<dyn ImageLabeler>) -> Self {
        self.labeler = Some(labeler);
        self
    }

    /// Text model behind both agents.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn summarizer(mut self, agent: Arc<dyn TextAgent>) -> Self {
        self.summarizer = Some(agent);
        self
    }

    pub fn extractor(mut self, agent: Arc<dyn TextAgent>) -> Self {
        self.extractor = Some(agent);
        self
    }

    pub fn metadata_reader(mut self, reader: Arc<dyn MetadataReader>) -> Self {
        self.metadata_reader = Some(reader);
        self
    }

    pub fn decision_engine(mut self, engine: DecisionEngine) -> Self {
        self.decision_engine = Some(engine);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ClaimPipeline, PipelineError> {
        let config = self.config;
        let labeler = self
            .labeler
            .ok_or(PipelineError::MissingCollaborator("image labeler"))?;

        let completion = |collaborator: Collaborator, model: &str| CompletionConfig {
            model: model.to_string(),
            max_tokens: config.models.max_tokens,
            temperature: config.models.temperature,
            timeout: config.timeout_for(collaborator),
        };

        let summarizer: Arc<dyn TextAgent> = match (self.summarizer, &self.provider) {
            (Some(agent), _) => agent,
            (None, Some(provider)) => Arc::new(NarrativeSummarizer::new(
                provider.clone(),
                completion(Collaborator::Summarizer, &config.models.summarizer),
            )),
            (None, None) => return Err(PipelineError::MissingCollaborator("text model provider")),
        };

        let extractor: Arc<dyn TextAgent> = match (self.extractor, &self.provider) {
            (Some(agent), _) => agent,
            (None, Some(provider)) => Arc::new(KeyFactExtractor::new(
                provider.clone(),
                completion(Collaborator::Extractor, &config.models.extractor),
            )),
            (None, None) => return Err(PipelineError::MissingCollaborator("text model provider")),
        };

        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::from_config(&config.cache));

        Ok(ClaimPipeline {
            labeler,
            summarizer,
            extractor,
            metadata_reader: self
                .metadata_reader
                .unwrap_or_else(|| Arc::new(ExifMetadataReader::new())),
            decision_engine: self.decision_engine.unwrap_or_default(),
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            budget: BudgetTracker::new(
                config.budget.global_max_tokens,
                config.budget.per_collaborator_max_tokens,
            ),
            cache,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeler::StaticLabeler;

    #[test]
    fn test_submission_rejects_bad_dates() {
        let submission = ClaimSubmission {
            image_path: "claim.jpg".into(),
            user_narrative: "A tree fell on my roof".to_string(),
            policy_start_date: "April first".to_string(),
            date_of_loss: "2024-05-01".to_string(),
            allowed_day_threshold: 2,
        };

        assert!(matches!(
            submission.into_intake(),
            Err(ClaimError::InvalidDate { field: "policy start date", .. })
        ));
    }

    #[test]
    fn test_submission_rejects_empty_narrative() {
        let submission = ClaimSubmission {
            image_path: "claim.jpg".into(),
            user_narrative: "   ".to_string(),
            policy_start_date: "2024-04-01".to_string(),
            date_of_loss: "2024-05-01".to_string(),
            allowed_day_threshold: 2,
        };

        assert!(matches!(submission.into_intake(), Err(ClaimError::EmptyNarrative)));
    }

    #[test]
    fn test_builder_requires_provider() {
        let result = ClaimPipeline::builder()
            .labeler(Arc::new(StaticLabeler::new(["Roof"])))
            .build();

        assert!(matches!(
            result,
            Err(PipelineError::MissingCollaborator("text model provider"))
        ));
    }

    #[test]
    fn test_builder_requires_labeler() {
        let result = ClaimPipeline::builder().build();
        assert!(matches!(
            result,
            Err(PipelineError::MissingCollaborator("image labeler"))
        ));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_pipeline_is_send_sync() {
        assert_send_sync::<ClaimPipeline>();
    }
}
