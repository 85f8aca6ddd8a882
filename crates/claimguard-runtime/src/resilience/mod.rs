//! Resilience at the collaborator boundary.
//!
//! - Circuit breaker per collaborator
//! - Token budget management
//!
//! Timeouts are applied by the pipeline itself; on any failure the stage
//! writes its degraded value instead of retrying.

mod budget;
mod circuit_breaker;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
