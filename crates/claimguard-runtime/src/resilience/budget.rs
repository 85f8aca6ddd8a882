//! Token budget management for text-model calls.
//!
//! Enforces per-collaborator and global token budgets to control costs.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::collaborator::Collaborator;
use crate::providers::TokenUsage;

/// Token budget for one scope.
pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    pub fn record(&self, tokens: u32) {
        // saturate so an exhausted budget can never wrap back to open
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_add(tokens))
            });
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}

/// Text-model usage accumulated over one or more claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,

    pub prompt_tokens: u32,

    pub completion_tokens: u32,

    /// Calls that reached a text model
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    /// Collaborator responses served from the response cache
    pub cache_hits: u32,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(usage.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(usage.total());
        self.llm_calls = self.llm_calls.saturating_add(1);
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits = self.cache_hits.saturating_add(1);
    }

    /// Fold another usage record into this one.
    pub fn merge(&mut self, other: &LlmUsage) {
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.llm_calls = self.llm_calls.saturating_add(other.llm_calls);
        self.estimated_cost += other.estimated_cost;
        self.cache_hits = self.cache_hits.saturating_add(other.cache_hits);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens (input, output)
        let (input_rate, output_rate) = match model {
            m if m.contains("1.5-pro") => (1.25, 5.0),
            m if m.contains("2.0-flash") => (0.10, 0.40),
            m if m.contains("1.5-flash") => (0.075, 0.30),
            _ => (0.075, 0.30),
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;
        input_cost + output_cost
    }
}

/// Budget tracker shared by every claim a pipeline evaluates.
pub struct BudgetTracker {
    collaborator_budgets: HashMap<Collaborator, TokenBudget>,
    global_budget: TokenBudget,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    /// Equal budgets for every token-consuming collaborator.
    pub fn new(global_max: u32, per_collaborator_max: u32) -> Self {
        let collaborator_budgets = Collaborator::ALL
            .into_iter()
            .filter(|c| c.uses_tokens())
            .map(|c| (c, TokenBudget::new(per_collaborator_max)))
            .collect();

        Self {
            collaborator_budgets,
            global_budget: TokenBudget::new(global_max),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn can_afford(&self, collaborator: Collaborator, estimated_tokens: u32) -> bool {
        let collaborator_ok = self
            .collaborator_budgets
            .get(&collaborator)
            .map(|b| b.can_afford(estimated_tokens))
            .unwrap_or(true);

        collaborator_ok && self.global_budget.can_afford(estimated_tokens)
    }

    pub fn record_usage(&self, collaborator: Collaborator, usage: &TokenUsage, model: &str) {
        let total = usage.total();
        if let Some(budget) = self.collaborator_budgets.get(&collaborator) {
            budget.record(total);
        }
        self.global_budget.record(total);
        self.usage.write().add(usage, model);
    }

    /// Lifetime usage across all claims.
    pub fn get_usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn remaining_global(&self) -> u32 {
        self.global_budget.remaining()
    }

    pub fn remaining_for(&self, collaborator: Collaborator) -> u32 {
        self.collaborator_budgets
            .get(&collaborator)
            .map(|b| b.remaining())
            .unwrap_or(0)
    }

    pub fn reset(&self) {
        for budget in self.collaborator_budgets.values() {
            budget.reset();
        }
        self.global_budget.reset();
        *self.usage.write() = LlmUsage::default();
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(1_000_000, 500_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usage(prompt: u32, completion: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
        }
    }

    #[test]
    fn test_budget_enforcement() {
        let budget = TokenBudget::new(100);
        assert!(budget.can_afford(100));
        assert!(!budget.can_afford(101));

        budget.record(60);
        assert_eq!(budget.remaining(), 40);
        assert!(!budget.can_afford(50));
    }

    #[test]
    fn test_tracker_per_collaborator_and_global() {
        let tracker = BudgetTracker::new(500, 100);
        tracker.record_usage(Collaborator::Summarizer, &usage(30, 20), "gemini-1.5-flash");

        assert_eq!(tracker.remaining_for(Collaborator::Summarizer), 50);
        assert_eq!(tracker.remaining_for(Collaborator::Extractor), 100);
        assert_eq!(tracker.remaining_global(), 450);
        assert!(!tracker.can_afford(Collaborator::Summarizer, 60));
        assert!(tracker.can_afford(Collaborator::Extractor, 60));
    }

    #[test]
    fn test_labeler_has_no_token_budget() {
        let tracker = BudgetTracker::new(10, 10);
        assert!(tracker.can_afford(Collaborator::Labeler, 0));
        assert_eq!(tracker.remaining_for(Collaborator::Labeler), 0);
    }

    #[test]
    fn test_cost_estimation() {
        let mut total = LlmUsage::default();
        total.add(&usage(1_000_000, 0), "gemini-1.5-pro");
        assert!((total.estimated_cost - 1.25).abs() < 1e-9);
        assert_eq!(total.llm_calls, 1);
    }

    #[test]
    fn test_merge() {
        let mut a = LlmUsage::default();
        a.add(&usage(10, 5), "gemini-1.5-flash");
        let mut b = LlmUsage::default();
        b.record_cache_hit();

        a.merge(&b);
        assert_eq!(a.total_tokens, 15);
        assert_eq!(a.cache_hits, 1);
    }

    #[test]
    fn test_usage_saturates_instead_of_overflowing() {
        let mut total = LlmUsage::default();
        total.add(&usage(u32::MAX, 10), "gemini-1.5-flash");
        total.add(&usage(5, 5), "gemini-1.5-flash");
        assert_eq!(total.prompt_tokens, u32::MAX);
        assert_eq!(total.total_tokens, u32::MAX);
        assert_eq!(total.completion_tokens, 15);

        let mut merged = total.clone();
        merged.merge(&total);
        assert_eq!(merged.prompt_tokens, u32::MAX);
        assert_eq!(merged.llm_calls, 4);

        let budget = TokenBudget::new(100);
        budget.record(u32::MAX);
        budget.record(10);
        assert_eq!(budget.used(), u32::MAX);
        assert!(!budget.can_afford(1));
    }

    proptest! {
        #[test]
        fn prop_budget_accounts_every_call(calls in prop::collection::vec((0u32..500, 0u32..500), 0..20)) {
            let tracker = BudgetTracker::new(5_000, 2_500);
            let mut spent = 0u32;
            for (prompt, completion) in &calls {
                tracker.record_usage(Collaborator::Extractor, &usage(*prompt, *completion), "gemini-1.5-flash");
                spent += prompt + completion;
            }

            let recorded = tracker.get_usage();
            prop_assert_eq!(recorded.total_tokens, spent);
            prop_assert_eq!(recorded.llm_calls as usize, calls.len());
            prop_assert_eq!(tracker.remaining_global(), 5_000u32.saturating_sub(spent));
            prop_assert_eq!(
                tracker.remaining_for(Collaborator::Extractor),
                2_500u32.saturating_sub(spent)
            );
        }
    }
}
