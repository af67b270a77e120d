//! Collaborator contracts consumed by the invocation engine.
//!
//! Registry storage, wire transport, codecs and the concrete breaker and
//! load-balancing algorithms live behind these traits.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::command::ServiceCommand;
use crate::error::ProxyResult;
use crate::message::{Parameters, ResultMessage, ReturnType};
use crate::route::ServiceRoute;

/// Outcome of a cache-backed lookup: either already available or still in flight.
///
/// Resolvers hand out `Ready` on a cache hit so the engine can continue
/// without suspending; awaiting either variant yields the same result.
pub enum Resolution<'a, T> {
    Ready(ProxyResult<T>),
    Pending(BoxFuture<'a, ProxyResult<T>>),
}

impl<'a, T> Resolution<'a, T> {
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    #[must_use]
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = ProxyResult<T>> + Send + 'a,
    {
        Self::Pending(Box::pin(fut))
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Take the value, suspending only when the lookup is still pending.
    ///
    /// # Errors
    /// Propagates the resolver's error unchanged.
    pub async fn resolve(self) -> ProxyResult<T> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(fut) => fut.await,
        }
    }
}

impl<T> std::fmt::Debug for Resolution<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Resolution::Ready"),
            Self::Pending(_) => f.write_str("Resolution::Pending"),
        }
    }
}

/// Maps a service id to its resilience command.
pub trait CommandResolver: Send + Sync {
    fn resolve_command<'a>(&'a self, service_id: &'a str) -> Resolution<'a, Arc<ServiceCommand>>;
}

/// Maps a service id to its live route; `None` means "no known route".
pub trait RouteResolver: Send + Sync {
    fn resolve_route<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Resolution<'a, Option<Arc<ServiceRoute>>>;
}

/// One direct remote call guarded by a circuit breaker.
///
/// `Ok(None)` signals "unavailable" (breaker open, nothing reachable) and is
/// never an error. Timeouts and cancellation are errors and propagate.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    async fn invoke(
        &self,
        parameters: &Parameters,
        service_id: &str,
        service_key: Option<&str>,
        decode_raw: bool,
    ) -> ProxyResult<Option<ResultMessage>>;
}

/// Resilience strategy registered under a `StrategyType` name.
///
/// The returned value is final: it must already have the shape of
/// `return_type`, so implementations that talk to the remote side convert
/// its payloads themselves. `return_type.is_raw()` is the decode-raw flag.
#[async_trait]
pub trait ClusterInvoker: Send + Sync {
    async fn invoke(
        &self,
        parameters: &Parameters,
        service_id: &str,
        service_key: Option<&str>,
        return_type: &ReturnType,
    ) -> ProxyResult<Value>;
}

/// Substitute result provider registered under a fallback name.
#[async_trait]
pub trait FallbackInvoker: Send + Sync {
    async fn invoke(
        &self,
        parameters: &Parameters,
        service_id: &str,
        service_key: Option<&str>,
    ) -> ProxyResult<Value>;
}

/// Converts a decoded remote payload towards the caller's declared type.
pub trait TypeConvertibleService: Send + Sync {
    /// # Errors
    /// Returns an error when `value` cannot represent `target`.
    fn convert(&self, value: Value, target: &ReturnType) -> ProxyResult<Value>;
}
