//! Error taxonomy for the invocation core.
//!
//! "Service unavailable" is intentionally absent: the breaker-wrapped remote
//! invoker reports it as `Ok(None)` and the engine routes it into the
//! resilience fallback. Everything here is a real failure that reaches the
//! caller.

use std::time::Duration;

use crate::container::ContainerError;

pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised by the engine, the factory or any collaborator they call.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Command or route resolution failed for the given service id.
    #[error("failed to resolve {what} for service '{service_id}': {reason}")]
    Resolution {
        what: &'static str,
        service_id: String,
        reason: String,
    },

    /// The command selects the `FallBack` strategy but names no fallback.
    #[error("service '{service_id}' uses the FallBack strategy without a fallback name")]
    FallbackNotConfigured { service_id: String },

    /// The command names a fallback invoker that is not registered.
    #[error("no fallback invoker registered under '{name}'")]
    FallbackNotFound { name: String },

    /// No cluster invoker is registered for the command's strategy.
    #[error("no cluster invoker registered for strategy '{strategy}'")]
    ClusterInvokerNotFound { strategy: String },

    /// The factory has no adapter type for the requested interface.
    #[error("no proxy adapter found for interface '{interface}'")]
    NoAdapterFound { interface: String },

    /// The cached or constructed adapter does not implement the requested interface.
    #[error("proxy adapter for '{interface}' does not match the requested type")]
    AdapterTypeMismatch { interface: String },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A required collaborator is missing from the service container.
    #[error(transparent)]
    MissingDependency(#[from] ContainerError),

    /// An argument could not be encoded into the parameter map.
    #[error("failed to encode parameter '{parameter}': {source}")]
    Parameter {
        parameter: String,
        #[source]
        source: serde_json::Error,
    },

    /// The final payload could not be decoded into the caller's return type.
    #[error("failed to convert result into '{target}': {source}")]
    Conversion {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The remote side answered with an error.
    #[error("remote invocation of '{service_id}' failed ({code}): {message}")]
    Remote {
        service_id: String,
        code: i32,
        message: String,
    },

    /// A cluster strategy gave up after its retry budget.
    #[error("service '{service_id}' still unavailable after {attempts} attempts")]
    RetriesExhausted { service_id: String, attempts: u32 },

    #[error("invocation of '{service_id}' timed out after {timeout:?}")]
    Timeout {
        service_id: String,
        timeout: Duration,
    },

    #[error("invocation of '{service_id}' was cancelled")]
    Cancelled { service_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProxyError {
    #[must_use]
    pub fn resolution(
        what: &'static str,
        service_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            what,
            service_id: service_id.into(),
            reason: reason.into(),
        }
    }

    /// Configuration-class failures: reported at first use, never retried.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::FallbackNotConfigured { .. }
                | Self::FallbackNotFound { .. }
                | Self::ClusterInvokerNotFound { .. }
                | Self::NoAdapterFound { .. }
                | Self::AdapterTypeMismatch { .. }
                | Self::Generation(_)
                | Self::MissingDependency(_)
        )
    }
}

/// Failure of a whole adapter generation batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("interface '{interface}' is in unreferenced namespace '{namespace}'")]
    UnresolvedNamespace {
        interface: &'static str,
        namespace: &'static str,
    },

    #[error("service id '{service_id}' is produced by both '{first}' and '{second}'")]
    DuplicateServiceId {
        service_id: &'static str,
        first: String,
        second: String,
    },

    #[error("interface '{interface}' is malformed: {reason}")]
    InvalidInterface {
        interface: &'static str,
        reason: String,
    },
}
