//! Guards around the summary model.
//!
//! - Circuit breaker so a failing model stops being called
//! - Token budget so spend stays bounded
//! - Retry with backoff for transient provider errors

mod budget;
mod circuit_breaker;
mod retry;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{complete_with_retry, RetryConfig};
