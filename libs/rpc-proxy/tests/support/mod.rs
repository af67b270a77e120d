//! Shared fixtures for the integration suites.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rpc_proxy::{
    AdapterFactory, CacheIntercept, ClusterInvoker, CommandResolver, ConfigCommandResolver,
    FallbackInvoker, InterceptorChain, JsonTypeConverter, Parameters, ProxyConfig, ProxyError,
    ProxyResult, RemoteInvoker, Resolution, ResultMessage, ReturnType, RouteResolver,
    ServiceCommand, ServiceContainer, ServiceDescriptor, ServiceRoute, StaticRouteResolver,
    service_proxy,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub total: f64,
}

#[service_proxy(namespace = "shop.orders")]
pub trait OrderService {
    async fn get(&self, id: u64) -> Result<Order, ProxyError>;
    async fn find(&self, id: u64) -> Result<Option<Order>, ProxyError>;
    async fn raw(&self, id: u64) -> Result<Value, ProxyError>;
    async fn cancel(&self, id: u64, reason: String) -> Result<(), ProxyError>;
}

pub const GET: &str = "shop.orders.OrderService.get_id";
pub const FIND: &str = "shop.orders.OrderService.find_id";
pub const RAW: &str = "shop.orders.OrderService.raw_id";
pub const CANCEL: &str = "shop.orders.OrderService.cancel_id_reason";

/// One observed call to an invoker.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub service_id: String,
    pub parameters: Parameters,
    pub service_key: Option<String>,
    pub decode_raw: bool,
}

type Responder = dyn Fn(&str) -> ProxyResult<Option<ResultMessage>> + Send + Sync;

/// Breaker-wrapped remote invoker stand-in.
pub struct ScriptedRemote {
    calls: Mutex<Vec<Call>>,
    respond: Box<Responder>,
}

impl ScriptedRemote {
    pub fn with(
        respond: impl Fn(&str) -> ProxyResult<Option<ResultMessage>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn answering(value: Value) -> Self {
        Self::with(move |_| Ok(Some(ResultMessage::new(value.clone()))))
    }

    pub fn unavailable() -> Self {
        Self::with(|_| Ok(None))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RemoteInvoker for ScriptedRemote {
    async fn invoke(
        &self,
        parameters: &Parameters,
        service_id: &str,
        service_key: Option<&str>,
        decode_raw: bool,
    ) -> ProxyResult<Option<ResultMessage>> {
        self.calls.lock().push(Call {
            service_id: service_id.to_owned(),
            parameters: parameters.clone(),
            service_key: service_key.map(str::to_owned),
            decode_raw,
        });
        tokio::task::yield_now().await;
        (self.respond)(service_id)
    }
}

/// Cluster invoker returning a fixed value.
pub struct RecordingCluster {
    pub value: Value,
    pub calls: Mutex<Vec<Call>>,
}

impl RecordingCluster {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ClusterInvoker for RecordingCluster {
    async fn invoke(
        &self,
        parameters: &Parameters,
        service_id: &str,
        service_key: Option<&str>,
        return_type: &ReturnType,
    ) -> ProxyResult<Value> {
        self.calls.lock().push(Call {
            service_id: service_id.to_owned(),
            parameters: parameters.clone(),
            service_key: service_key.map(str::to_owned),
            decode_raw: return_type.is_raw(),
        });
        Ok(self.value.clone())
    }
}

/// Fallback invoker returning a fixed value.
pub struct RecordingFallback {
    pub value: Value,
    pub calls: AtomicUsize,
}

impl RecordingFallback {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackInvoker for RecordingFallback {
    async fn invoke(
        &self,
        _parameters: &Parameters,
        _service_id: &str,
        _service_key: Option<&str>,
    ) -> ProxyResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

/// Command resolver that never answers synchronously.
pub struct PendingCommands(pub Arc<ServiceCommand>);

impl CommandResolver for PendingCommands {
    fn resolve_command<'a>(&'a self, _service_id: &'a str) -> Resolution<'a, Arc<ServiceCommand>> {
        Resolution::pending(async move {
            tokio::task::yield_now().await;
            Ok(Arc::clone(&self.0))
        })
    }
}

/// Route resolver that always fails.
pub struct BrokenRoutes;

impl RouteResolver for BrokenRoutes {
    fn resolve_route<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Resolution<'a, Option<Arc<ServiceRoute>>> {
        Resolution::pending(async move {
            Err(ProxyError::resolution("route", service_id, "registry offline"))
        })
    }
}

pub fn plain_route(service_id: &str) -> ServiceRoute {
    ServiceRoute::new(ServiceDescriptor::new(service_id), Vec::new())
}

pub fn cached_route(service_id: &str, intercept: CacheIntercept) -> ServiceRoute {
    let mut descriptor = ServiceDescriptor::new(service_id);
    descriptor.with_cache_intercept(intercept);
    ServiceRoute::new(descriptor, Vec::new())
}

/// Container, resolvers, remote and factory wired together.
pub struct Harness {
    pub container: Arc<ServiceContainer>,
    pub remote: Arc<ScriptedRemote>,
    pub routes: Arc<StaticRouteResolver>,
    pub factory: AdapterFactory,
}

impl Harness {
    pub fn new(remote: ScriptedRemote) -> Self {
        Self::with_config(remote, &ProxyConfig::default())
    }

    pub fn with_config(remote: ScriptedRemote, config: &ProxyConfig) -> Self {
        let container = Arc::new(ServiceContainer::new());
        container.register::<dyn CommandResolver>(Arc::new(ConfigCommandResolver::new(config)));
        let routes = Arc::new(StaticRouteResolver::new());
        container.register::<dyn RouteResolver>(routes.clone());

        let remote = Arc::new(remote);
        let factory = AdapterFactory::new(
            remote.clone(),
            Arc::new(JsonTypeConverter),
            container.clone(),
        );
        factory
            .register_interfaces(&[&OrderServiceProxy::DEFINITION], &["shop.orders"])
            .unwrap();

        Self {
            container,
            remote,
            routes,
            factory,
        }
    }

    /// Must be called before the first proxy is created.
    pub fn with_interceptors(self, chain: InterceptorChain) -> Self {
        self.container.register::<InterceptorChain>(Arc::new(chain));
        self
    }

    pub fn orders(&self) -> Arc<dyn OrderService> {
        self.factory.create_proxy::<dyn OrderService>().unwrap()
    }

    pub fn orders_for(&self, key: &str) -> Arc<dyn OrderService> {
        self.factory.create_proxy_keyed::<dyn OrderService>(key).unwrap()
    }
}

pub fn params(pairs: &[(&str, Value)]) -> Parameters {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), value.clone()))
        .collect()
}
