//! Circuit breaker to stop calling a collaborator that keeps failing.
//!
//! While a circuit is open the pipeline skips the call and writes the
//! collaborator's degraded value straight away.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::collaborator::Collaborator;
use crate::config::humantime_duration;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// How long an open circuit waits before a trial call
    #[serde(with = "humantime_duration")]
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

/// State of a circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls are skipped
    Open { opened_at: Instant },

    /// Trial calls allowed
    HalfOpen { successes: u32 },
}

/// One circuit per collaborator, shared by every claim the pipeline runs.
pub struct CircuitBreaker {
    states: RwLock<HashMap<Collaborator, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// True if the call should be skipped.
    ///
    /// An open circuit past its recovery timeout moves to half-open and
    /// lets the call through.
    pub fn is_open(&self, collaborator: Collaborator) -> bool {
        let states = self.states.read();
        match states.get(&collaborator) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(collaborator);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        match states.get(&collaborator).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(collaborator, CircuitState::Closed { failures: 0 });
                    tracing::info!(%collaborator, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        collaborator,
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(collaborator, CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        let failures = match states.get(&collaborator).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    collaborator,
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(%collaborator, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                collaborator,
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(%collaborator, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(collaborator, CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, collaborator: Collaborator) {
        let mut states = self.states.write();
        if matches!(states.get(&collaborator), Some(CircuitState::Open { .. })) {
            states.insert(collaborator, CircuitState::HalfOpen { successes: 0 });
            tracing::info!(%collaborator, "Circuit half-open, allowing a trial call");
        }
    }

    pub fn state(&self, collaborator: Collaborator) -> CircuitState {
        self.states
            .read()
            .get(&collaborator)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
