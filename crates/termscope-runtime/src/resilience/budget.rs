//! Token budget for summary model calls.
//!
//! One global budget per pipeline. When it runs dry, summaries fall back to
//! the rule-based path instead of failing.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

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
        self.used.fetch_add(tokens, Ordering::SeqCst);
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

/// Accumulated model usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub llm_calls: u32,

    /// Estimated cost in USD; zero for local models
    pub estimated_cost: f64,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    pub fn merge(&mut self, other: &LlmUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.llm_calls += other.llm_calls;
        self.estimated_cost += other.estimated_cost;
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens
        let (input_rate, output_rate) = match model {
            m if m.contains("opus") => (5.0, 25.0),
            m if m.contains("haiku") => (1.0, 5.0),
            m if m.contains("claude") || m.contains("sonnet") => (3.0, 15.0),
            _ => (0.0, 0.0),
        };

        (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate
            + (usage.completion_tokens as f64 / 1_000_000.0) * output_rate
    }
}

pub struct BudgetTracker {
    budget: TokenBudget,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            budget: TokenBudget::new(max_tokens),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        self.budget.can_afford(estimated_tokens)
    }

    pub fn record_usage(&self, usage: &TokenUsage, model: &str) {
        self.budget.record(usage.total());
        self.usage.write().add(usage, model);
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn remaining(&self) -> u32 {
        self.budget.remaining()
    }

    pub fn reset(&self) {
        self.budget.reset();
        *self.usage.write() = LlmUsage::default();
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(200_000)
    }
}

impl std::fmt::Debug for BudgetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetTracker")
            .field("max_tokens", &self.budget.max_tokens)
            .field("used", &self.budget.used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_enforcement() {
        let budget = TokenBudget::new(100);

        assert!(budget.can_afford(100));
        assert!(!budget.can_afford(101));

        budget.record(60);
        assert_eq!(budget.remaining(), 40);
        assert!(!budget.can_afford(50));
        assert!(budget.can_afford(40));
    }

    #[test]
    fn test_budget_tracker() {
        let tracker = BudgetTracker::new(500);
        assert!(tracker.can_afford(500));

        let usage = TokenUsage {
            prompt_tokens: 300,
            completion_tokens: 100,
        };
        tracker.record_usage(&usage, "llama3.1:8b");

        assert_eq!(tracker.remaining(), 100);
        assert!(!tracker.can_afford(101));
        assert_eq!(tracker.usage().llm_calls, 1);
        assert_eq!(tracker.usage().estimated_cost, 0.0);

        tracker.reset();
        assert_eq!(tracker.remaining(), 500);
    }

    #[test]
    fn test_cost_estimation() {
        let mut usage = LlmUsage::default();
        usage.add(
            &TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 500,
            },
            "claude-sonnet-4-5",
        );

        // 1000 * $3/MTok + 500 * $15/MTok
        assert!((usage.estimated_cost - 0.0105).abs() < 1e-9);
    }

    #[test]
    fn test_merge() {
        let mut a = LlmUsage::default();
        a.add(&TokenUsage { prompt_tokens: 10, completion_tokens: 5 }, "local");
        let mut b = LlmUsage::default();
        b.merge(&a);
        b.merge(&a);
        assert_eq!(b.total_tokens, 30);
        assert_eq!(b.llm_calls, 2);
    }
}
