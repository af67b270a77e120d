#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `rpc-proxy` - client-side invocation core
//!
//! Turns calls on a strongly-typed service trait into routed, resilient
//! remote invocations:
//!
//! - **Adapters** (`#[service_proxy]`, [`generator`]) - one generated proxy type
//!   per trait, with service ids fixed at compile time
//! - **Factory** ([`factory`]) - builds and caches one proxy per (trait, service key)
//! - **Engine** ([`engine`]) - resolves command and route, then takes the direct
//!   breaker-wrapped call, the resilience fallback or the interceptor chain
//! - **Collaborators** ([`contracts`]) - resolvers, invokers and the type
//!   conversion service, looked up through the [`container`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use rpc_proxy::{service_proxy, AdapterFactory, ProxyError};
//!
//! #[service_proxy(namespace = "shop.orders")]
//! #[async_trait::async_trait]
//! pub trait OrderService {
//!     async fn get(&self, id: u64) -> Result<Order, ProxyError>;
//! }
//!
//! let factory = AdapterFactory::new(remote_invoker, converter, container);
//! factory.register_discovered(&["shop.orders"])?;
//! let orders = factory.create_proxy::<dyn OrderService>()?;
//! let order = orders.get(1).await?;
//! ```

pub mod caching;
pub mod cluster;
pub mod command;
pub mod config;
pub mod container;
pub mod contracts;
pub mod convert;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod factory;
pub mod generator;
pub mod interceptor;
pub mod invocation;
pub mod message;
pub mod resolvers;
pub mod route;
pub mod service_id;
pub mod telemetry;

pub use caching::CacheInterceptor;
pub use cluster::FailoverInvoker;
pub use command::{ServiceCommand, StrategyType};
pub use config::{ConfigError, ProxyConfig};
pub use container::{ContainerError, ServiceContainer, TypeKey};
pub use contracts::{
    ClusterInvoker, CommandResolver, FallbackInvoker, RemoteInvoker, Resolution, RouteResolver,
    TypeConvertibleService,
};
pub use convert::JsonTypeConverter;
pub use descriptor::{AuthorizationType, CacheIntercept, CachingMethod, ServiceDescriptor};
pub use engine::ProxyBase;
pub use error::{GenerationError, ProxyError, ProxyResult};
pub use factory::{AdapterFactory, ProxyCache};
pub use generator::{AdapterGenerator, GeneratedAssembly, InterfaceDefinition, MethodDescriptor};
pub use interceptor::{Interceptor, InterceptorChain};
pub use invocation::{Invocation, InvocationResult};
pub use message::{Parameters, ResultMessage, ReturnType};
pub use resolvers::{
    CachedCommandResolver, CachedRouteResolver, ConfigCommandResolver, StaticRouteResolver,
};
pub use route::{ServiceAddress, ServiceRoute};
pub use service_id::{DefaultServiceIdGenerator, ServiceIdGenerator};

pub use rpc_proxy_macros::service_proxy;

/// Paths used by `#[service_proxy]` expansions. Not a public API.
#[doc(hidden)]
pub mod __private {
    pub use async_trait;
    pub use inventory;
}
