//! Per-source circuit breaker.
//!
//! A sourcing site that keeps failing (usually because it started serving
//! block pages) is skipped for a cooldown instead of burning a provider
//! slot on every search. After the cooldown the next search tries it
//! again: a success closes the circuit, a failure reopens it.
//!
//! ```text
//! Closed --threshold failures--> Open --cooldown--> HalfOpen
//!   ^                              ^                  |
//!   |                              +-----failure------+
//!   +----------------success--------------------------+
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::types::SourceId;

/// Externally visible circuit state of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Health {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

impl Health {
    fn state(self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

/// Breaker tuning, part of the search config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit. 0 disables the breaker.
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before the next attempt.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 120,
        }
    }
}

/// Independent breaker state for each source.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    sources: HashMap<SourceId, Health>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            threshold: config.failure_threshold,
            cooldown: Duration::from_secs(config.cooldown_secs),
            sources: HashMap::new(),
        }
    }

    pub fn record_success(&mut self, source: SourceId) {
        self.sources.insert(source, Health::Closed { failures: 0 });
    }

    pub fn record_failure(&mut self, source: SourceId) {
        let failures = match self.sources.get(&source) {
            Some(Health::Closed { failures }) => failures.saturating_add(1),
            // A half-open failure reopens immediately.
            Some(Health::HalfOpen | Health::Open { .. }) => self.threshold.max(1),
            None => 1,
        };
        let next = if self.threshold > 0 && failures >= self.threshold {
            Health::Open {
                since: Instant::now(),
            }
        } else {
            Health::Closed { failures }
        };
        self.sources.insert(source, next);
    }

    /// Whether `source` may be searched now. An open circuit whose cooldown
    /// has elapsed moves to half-open and lets the request through.
    pub fn should_attempt(&mut self, source: SourceId) -> bool {
        match self.sources.get(&source).copied() {
            Some(Health::Open { since }) if since.elapsed() < self.cooldown => false,
            Some(Health::Open { .. }) => {
                self.sources.insert(source, Health::HalfOpen);
                true
            }
            _ => true,
        }
    }

    pub fn state(&self, source: SourceId) -> CircuitState {
        self.sources
            .get(&source)
            .map_or(CircuitState::Closed, |h| h.state())
    }
}
