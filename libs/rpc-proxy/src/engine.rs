//! The invocation engine shared by every generated adapter.
//!
//! Per call: resolve the command, resolve the route, then either call the
//! breaker-wrapped remote invoker directly (falling back to the command's
//! resilience strategy when it reports "unavailable") or run the call through
//! the interceptor chain. A remote answer is converted through the type
//! conversion service; values produced by fallbacks, clusters or interceptors
//! are final and only decoded.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;

use crate::command::{ServiceCommand, StrategyType};
use crate::container::ServiceContainer;
use crate::contracts::{CommandResolver, RemoteInvoker, RouteResolver, TypeConvertibleService};
use crate::error::{ProxyError, ProxyResult};
use crate::interceptor::InterceptorChain;
use crate::invocation::{Invocation, InvocationResult};
use crate::message::{Parameters, ResultMessage, ReturnType};
use crate::route::ServiceRoute;
use crate::telemetry::WarnThrottle;

const UNAVAILABLE_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Where a call ended up before conversion.
enum Outcome {
    /// Remote answer, still to be converted.
    Message(ResultMessage),
    /// Final value from a fallback, a cluster or an interceptor.
    Final(Value),
    /// Nothing produced a result.
    Empty,
}

/// Engine state bound to one adapter instance.
///
/// Holds no per-call state and is safe to share across concurrent calls.
#[derive(Clone)]
pub struct ProxyBase {
    remote_invoker: Arc<dyn RemoteInvoker>,
    type_converter: Arc<dyn TypeConvertibleService>,
    service_key: Option<Arc<str>>,
    container: Arc<ServiceContainer>,
    command_resolver: Arc<dyn CommandResolver>,
    route_resolver: Arc<dyn RouteResolver>,
    interceptors: Arc<InterceptorChain>,
    unavailable_log: Arc<WarnThrottle>,
}

impl std::fmt::Debug for ProxyBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyBase")
            .field("service_key", &self.service_key)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl ProxyBase {
    /// Build the engine and resolve its long-lived collaborators from `container`.
    ///
    /// `dyn CommandResolver` and `dyn RouteResolver` are required; the
    /// `InterceptorChain` is optional and defaults to empty.
    ///
    /// # Errors
    /// Returns `ProxyError::MissingDependency` if a required resolver is not registered.
    pub fn new(
        remote_invoker: Arc<dyn RemoteInvoker>,
        type_converter: Arc<dyn TypeConvertibleService>,
        service_key: Option<String>,
        container: Arc<ServiceContainer>,
    ) -> ProxyResult<Self> {
        let command_resolver = container.get::<dyn CommandResolver>()?;
        let route_resolver = container.get::<dyn RouteResolver>()?;
        let interceptors = container.get::<InterceptorChain>().unwrap_or_default();

        Ok(Self {
            remote_invoker,
            type_converter,
            service_key: service_key.map(Arc::from),
            container,
            command_resolver,
            route_resolver,
            interceptors,
            unavailable_log: Arc::new(WarnThrottle::new(UNAVAILABLE_LOG_INTERVAL)),
        })
    }

    #[must_use]
    pub fn service_key(&self) -> Option<&str> {
        self.service_key.as_deref()
    }

    #[must_use]
    pub fn container(&self) -> &Arc<ServiceContainer> {
        &self.container
    }

    /// Invoke `service_id` and decode the outcome into `T`.
    ///
    /// `T = serde_json::Value` requests the raw decoded payload.
    ///
    /// # Errors
    /// Propagates resolution, interceptor, fallback and cluster failures, and
    /// reports `ProxyError::Conversion` if the final value does not fit `T`.
    pub async fn invoke<T>(&self, parameters: Parameters, service_id: &str) -> ProxyResult<T>
    where
        T: DeserializeOwned + 'static,
    {
        let return_type = ReturnType::of::<T>();
        let span = tracing::debug_span!(
            "rpc_invoke",
            service_id,
            service_key = self.service_key(),
            return_type = return_type.name()
        );

        async {
            let outcome = self.dispatch(parameters, service_id, return_type).await?;
            let value = self.settle(outcome, &return_type)?;
            decode::<T>(value, &return_type)
        }
        .instrument(span)
        .await
    }

    /// Invoke `service_id` for completion only.
    ///
    /// # Errors
    /// Same propagation rules as [`ProxyBase::invoke`], minus conversion.
    pub async fn invoke_void(&self, parameters: Parameters, service_id: &str) -> ProxyResult<()> {
        let span = tracing::debug_span!(
            "rpc_invoke",
            service_id,
            service_key = self.service_key(),
            return_type = "()"
        );

        async {
            self.dispatch(parameters, service_id, ReturnType::unit())
                .await
                .map(|_| ())
        }
        .instrument(span)
        .await
    }

    /// Direct call on behalf of an interceptor.
    ///
    /// Repeats command resolution, the direct call and the resilience
    /// fallback, but never the interceptor chain. Returns `Value::Null` when
    /// the declared return type is `()`.
    ///
    /// # Errors
    /// Propagates resolution, remote and resilience failures.
    pub async fn call_invoke(&self, invocation: &Invocation<'_>) -> ProxyResult<Value> {
        let service_id = invocation.service_id();
        let return_type = invocation.return_type();
        let command = self
            .command_resolver
            .resolve_command(service_id)
            .resolve()
            .await?;

        let outcome = self
            .invoke_direct(&command, invocation.arguments(), service_id, &return_type)
            .await?;

        if return_type.is_unit() {
            return Ok(Value::Null);
        }
        self.settle(outcome, &return_type)
    }

    async fn dispatch(
        &self,
        parameters: Parameters,
        service_id: &str,
        return_type: ReturnType,
    ) -> ProxyResult<Outcome> {
        let command = self
            .command_resolver
            .resolve_command(service_id)
            .resolve()
            .await?;
        let route = self
            .route_resolver
            .resolve_route(service_id)
            .resolve()
            .await?;

        let decode_raw = return_type.is_raw();

        match route {
            Some(route) if !takes_direct_path(&route, decode_raw) => {
                tracing::trace!(interceptors = self.interceptors.len(), "intercepted path");
                self.run_interceptors(route, parameters, service_id, return_type)
                    .await
            }
            route => {
                tracing::trace!(has_route = route.is_some(), decode_raw, "direct path");
                self.invoke_direct(&command, &parameters, service_id, &return_type)
                    .await
            }
        }
    }

    async fn invoke_direct(
        &self,
        command: &ServiceCommand,
        parameters: &Parameters,
        service_id: &str,
        return_type: &ReturnType,
    ) -> ProxyResult<Outcome> {
        let message = self
            .remote_invoker
            .invoke(parameters, service_id, self.service_key(), return_type.is_raw())
            .await?;

        if let Some(message) = message {
            return Ok(Outcome::Message(message));
        }

        if let Some(suppressed) = self.unavailable_log.admit(service_id) {
            tracing::warn!(
                service_id,
                strategy = %command.strategy,
                suppressed,
                "remote invoker unavailable, dispatching to resilience strategy"
            );
        }

        self.fall_back(command, parameters, service_id, return_type)
            .await
            .map(Outcome::Final)
    }

    async fn fall_back(
        &self,
        command: &ServiceCommand,
        parameters: &Parameters,
        service_id: &str,
        return_type: &ReturnType,
    ) -> ProxyResult<Value> {
        if command.strategy == StrategyType::FallBack {
            let name = command
                .fallback_name
                .as_deref()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ProxyError::FallbackNotConfigured {
                    service_id: service_id.to_owned(),
                })?;

            let invoker = self.container.fallback_invoker(name)?;

            tracing::debug!(service_id, fallback = name, "invoking fallback");
            return invoker
                .invoke(parameters, service_id, self.service_key())
                .await;
        }

        let invoker = self.container.cluster_invoker(command.strategy)?;

        tracing::debug!(service_id, strategy = %command.strategy, "invoking cluster strategy");
        invoker
            .invoke(parameters, service_id, self.service_key(), return_type)
            .await
    }

    async fn run_interceptors(
        &self,
        route: Arc<ServiceRoute>,
        parameters: Parameters,
        service_id: &str,
        return_type: ReturnType,
    ) -> ProxyResult<Outcome> {
        let mut invocation = Invocation::new(self, route, parameters, service_id, return_type);
        let mut current = None;

        // The slot stays filled so later interceptors can inspect it.
        for interceptor in self.interceptors.iter() {
            interceptor.intercept(&mut invocation).await?;
            if let Some(result) = invocation.result() {
                current = Some(result.clone());
            }
        }

        Ok(match current {
            Some(InvocationResult::Message(message)) => Outcome::Message(message),
            Some(InvocationResult::Value(value)) => Outcome::Final(value),
            None => Outcome::Empty,
        })
    }

    fn settle(&self, outcome: Outcome, return_type: &ReturnType) -> ProxyResult<Value> {
        match outcome {
            Outcome::Message(message) if message.result.is_null() => Ok(Value::Null),
            Outcome::Message(message) => self.type_converter.convert(message.result, return_type),
            Outcome::Final(value) => Ok(value),
            Outcome::Empty => Ok(Value::Null),
        }
    }
}

/// Direct path when there is no route, no interceptable policy, or a raw
/// (`serde_json::Value`) caller on a route whose stage cache is off.
fn takes_direct_path(route: &ServiceRoute, decode_raw: bool) -> bool {
    !route.exist_intercept() || (!route.enable_stage_cache() && decode_raw)
}

fn decode<T: DeserializeOwned>(value: Value, return_type: &ReturnType) -> ProxyResult<T> {
    serde_json::from_value(value).map_err(|source| ProxyError::Conversion {
        target: return_type.name(),
        source,
    })
}
