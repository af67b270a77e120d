//! Failover cluster strategy.
//!
//! Registered in the container under the `Failover` strategy name. When the
//! engine's direct call reports "unavailable", the failover invoker retries
//! the same remote call with capped linear backoff.
//!
//! Only "unavailable" answers and timeouts are retried; any other error is
//! returned at once. Retried operations are assumed to be idempotent. Each
//! attempt is bounded by the command's `execution_timeout_ms` (0 disables
//! the bound).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::Instrument;

use crate::command::ServiceCommand;
use crate::config::RetryConfig;
use crate::contracts::{ClusterInvoker, CommandResolver, RemoteInvoker, TypeConvertibleService};
use crate::error::{ProxyError, ProxyResult};
use crate::message::{Parameters, ResultMessage, ReturnType};
use crate::telemetry::duration_millis;

/// Retries the breaker-wrapped remote call `failover_cluster` times.
pub struct FailoverInvoker {
    remote_invoker: Arc<dyn RemoteInvoker>,
    command_resolver: Arc<dyn CommandResolver>,
    type_converter: Arc<dyn TypeConvertibleService>,
    retry: RetryConfig,
}

impl FailoverInvoker {
    #[must_use]
    pub fn new(
        remote_invoker: Arc<dyn RemoteInvoker>,
        command_resolver: Arc<dyn CommandResolver>,
        type_converter: Arc<dyn TypeConvertibleService>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            remote_invoker,
            command_resolver,
            type_converter,
            retry,
        }
    }

    /// `base * attempt`, capped at `max`.
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry
            .base_backoff()
            .saturating_mul(attempt)
            .min(self.retry.max_backoff())
    }

    async fn attempt(
        &self,
        command: &ServiceCommand,
        parameters: &Parameters,
        service_id: &str,
        service_key: Option<&str>,
        decode_raw: bool,
    ) -> ProxyResult<Option<ResultMessage>> {
        let call = self
            .remote_invoker
            .invoke(parameters, service_id, service_key, decode_raw);

        let Some(limit) = command.execution_timeout() else {
            return call.await;
        };
        timeout(limit, call)
            .await
            .unwrap_or_else(|_| {
                Err(ProxyError::Timeout {
                    service_id: service_id.to_owned(),
                    timeout: limit,
                })
            })
    }

    fn finish(&self, message: ResultMessage, return_type: &ReturnType) -> ProxyResult<Value> {
        if message.result.is_null() {
            return Ok(Value::Null);
        }
        self.type_converter.convert(message.result, return_type)
    }
}

impl std::fmt::Debug for FailoverInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverInvoker")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ClusterInvoker for FailoverInvoker {
    async fn invoke(
        &self,
        parameters: &Parameters,
        service_id: &str,
        service_key: Option<&str>,
        return_type: &ReturnType,
    ) -> ProxyResult<Value> {
        let command = self
            .command_resolver
            .resolve_command(service_id)
            .resolve()
            .await?;
        let attempts = command.failover_cluster;

        for attempt in 1..=attempts {
            let span = tracing::debug_span!("rpc_failover", service_id, attempt);

            let result = self
                .attempt(
                    &command,
                    parameters,
                    service_id,
                    service_key,
                    return_type.is_raw(),
                )
                .instrument(span)
                .await;

            match result {
                Ok(Some(message)) => {
                    if attempt > 1 {
                        tracing::info!(service_id, attempt, "call succeeded after failover");
                    }
                    return self.finish(message, return_type);
                }
                Ok(None) => {
                    tracing::debug!(service_id, attempt, "remote still unavailable");
                }
                Err(err @ ProxyError::Timeout { .. }) => {
                    tracing::warn!(service_id, attempt, error = %err, "attempt timed out");
                }
                Err(err) => return Err(err),
            }

            if attempt < attempts {
                let backoff = self.backoff(attempt);
                tracing::debug!(
                    service_id,
                    attempt,
                    backoff_ms = duration_millis(backoff),
                    "retrying after backoff"
                );
                sleep(backoff).await;
            }
        }

        tracing::error!(service_id, attempts, "failover giving up");
        Err(ProxyError::RetriesExhausted {
            service_id: service_id.to_owned(),
            attempts,
        })
    }
}
