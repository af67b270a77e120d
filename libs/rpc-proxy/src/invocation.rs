//! Per-call context handed through the interceptor chain.

use std::sync::Arc;

use serde_json::Value;

use crate::engine::ProxyBase;
use crate::error::ProxyResult;
use crate::message::{Parameters, ResultMessage, ReturnType};
use crate::route::ServiceRoute;

/// What an interceptor produced for the call.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    /// A remote answer; still passes through the type conversion service.
    Message(ResultMessage),
    /// A final value, decoded straight into the caller's type.
    Value(Value),
}

/// Ephemeral context of one intercepted call.
///
/// Created fresh by the engine, never retained after the call returns. The
/// result slot is read back after every interceptor.
pub struct Invocation<'a> {
    proxy: &'a ProxyBase,
    route: Arc<ServiceRoute>,
    arguments: Parameters,
    service_id: &'a str,
    return_type: ReturnType,
    result: Option<InvocationResult>,
}

impl<'a> Invocation<'a> {
    #[must_use]
    pub fn new(
        proxy: &'a ProxyBase,
        route: Arc<ServiceRoute>,
        arguments: Parameters,
        service_id: &'a str,
        return_type: ReturnType,
    ) -> Self {
        Self {
            proxy,
            route,
            arguments,
            service_id,
            return_type,
            result: None,
        }
    }

    /// The engine of the adapter that issued the call.
    #[must_use]
    pub fn proxy(&self) -> &'a ProxyBase {
        self.proxy
    }

    #[must_use]
    pub fn route(&self) -> &ServiceRoute {
        &self.route
    }

    #[must_use]
    pub fn arguments(&self) -> &Parameters {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Parameters {
        &mut self.arguments
    }

    #[must_use]
    pub fn service_id(&self) -> &'a str {
        self.service_id
    }

    #[must_use]
    pub fn service_key(&self) -> Option<&str> {
        self.proxy.service_key()
    }

    #[must_use]
    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }

    pub fn set_result(&mut self, result: InvocationResult) {
        self.result = Some(result);
    }

    pub fn set_return_value(&mut self, value: Value) {
        self.result = Some(InvocationResult::Value(value));
    }

    #[must_use]
    pub fn result(&self) -> Option<&InvocationResult> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<InvocationResult> {
        self.result.take()
    }

    /// Perform the underlying call without re-entering the interceptor chain.
    ///
    /// # Errors
    /// Propagates resolution, remote and resilience failures.
    pub async fn proceed(&self) -> ProxyResult<Value> {
        self.proxy.call_invoke(self).await
    }
}

impl std::fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("service_id", &self.service_id)
            .field("arguments", &self.arguments)
            .field("return_type", &self.return_type.name())
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}
