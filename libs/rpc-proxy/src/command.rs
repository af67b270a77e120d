//! Per-service resilience configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Resilience strategy applied when the direct call is unavailable.
///
/// The string form is the name cluster invokers are registered under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    #[default]
    Failover,
    Injection,
    FallBack,
}

impl StrategyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failover => "Failover",
            Self::Injection => "Injection",
            Self::FallBack => "FallBack",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resilience settings for one service id.
///
/// Values come from the command resolver and may be stale for a bounded
/// interval; the engine reads them once per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceCommand {
    pub strategy: StrategyType,
    pub fallback_name: Option<String>,
    /// Attempts a failover cluster makes once the direct call was unavailable.
    pub failover_cluster: u32,
    /// Bound on a single cluster attempt; 0 disables it.
    pub execution_timeout_ms: u64,
}

impl Default for ServiceCommand {
    fn default() -> Self {
        Self {
            strategy: StrategyType::Failover,
            fallback_name: None,
            failover_cluster: 3,
            execution_timeout_ms: 1_000,
        }
    }
}

impl ServiceCommand {
    #[must_use]
    pub fn failover(retries: u32) -> Self {
        Self {
            strategy: StrategyType::Failover,
            failover_cluster: retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            strategy: StrategyType::FallBack,
            fallback_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Per-attempt bound, `None` when `execution_timeout_ms` is 0.
    #[must_use]
    pub fn execution_timeout(&self) -> Option<Duration> {
        (self.execution_timeout_ms > 0).then(|| Duration::from_millis(self.execution_timeout_ms))
    }

    #[must_use]
    pub fn with_execution_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.execution_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyType) -> Self {
        self.strategy = strategy;
        self
    }
}
