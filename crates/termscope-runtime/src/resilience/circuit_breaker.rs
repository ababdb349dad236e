//! Circuit breaker around the summary model.
//!
//! When model calls fail repeatedly the circuit opens and summaries go
//! straight to the rule-based fallback until the recovery timeout passes.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::duration_str;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// Time before a trial call is allowed, e.g. "30s"
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,

    /// Trial successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls skip the model
    Open { opened_at: Instant },

    /// Trial calls allowed
    HalfOpen { successes: u32 },
}

impl CircuitState {
    pub fn name(&self) -> &'static str {
        match self {
            CircuitState::Closed { .. } => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen { .. } => "half_open",
        }
    }
}

pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed { failures: 0 }),
            config,
        }
    }

    /// Whether calls should skip the model right now.
    ///
    /// An open circuit whose recovery timeout has passed moves to half-open
    /// and lets the call through.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    *state = CircuitState::HalfOpen { successes: 0 };
                    tracing::info!("Summary circuit half-open, allowing trial call");
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write();
        match *state {
            CircuitState::HalfOpen { successes } => {
                if successes + 1 >= self.config.success_threshold {
                    *state = CircuitState::Closed { failures: 0 };
                    tracing::info!("Summary circuit closed after successful recovery");
                } else {
                    *state = CircuitState::HalfOpen {
                        successes: successes + 1,
                    };
                }
            }
            CircuitState::Closed { .. } => {
                *state = CircuitState::Closed { failures: 0 };
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.write();
        match *state {
            CircuitState::Closed { failures } => {
                if failures + 1 >= self.config.failure_threshold {
                    *state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                    tracing::warn!(
                        failures = failures + 1,
                        "Summary circuit opened after repeated failures"
                    );
                } else {
                    *state = CircuitState::Closed {
                        failures: failures + 1,
                    };
                }
            }
            CircuitState::HalfOpen { .. } => {
                *state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
                tracing::warn!("Summary circuit reopened after failed trial call");
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.read().clone()
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn reset(&self) {
        *self.state.write() = CircuitState::Closed { failures: 0 };
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state().name())
            .field("config", &self.config)
            .finish()
    }
}
