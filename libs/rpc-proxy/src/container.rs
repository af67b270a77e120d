//! Collaborator registry shared by the factory and every adapter.
//!
//! Components (the command and route resolvers, the interceptor chain) are
//! stored once per interface type. Resilience collaborators have their own
//! tables: fallback invokers by fallback name, cluster invokers by
//! [`StrategyType`]. Lookups are synchronous and hand out `Arc`s, so a
//! re-registration never invalidates an instance already in use.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::command::StrategyType;
use crate::contracts::{ClusterInvoker, FallbackInvoker};
use crate::error::{ProxyError, ProxyResult};

/// Identity of an interface type, usually a trait object such as `dyn RouteResolver`.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>())
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContainerError {
    #[error("no component registered for {0}")]
    NotFound(TypeKey),

    #[error("component registered for {0} has a different concrete type")]
    TypeMismatch(TypeKey),
}

/// `Arc<T>` boxed as `Any`, stored under `TypeKey::of::<T>()`.
type Component = Box<dyn Any + Send + Sync>;

/// Registry of the collaborators a proxy resolves at creation and per call.
#[derive(Default)]
pub struct ServiceContainer {
    components: RwLock<HashMap<TypeKey, Component>>,
    fallbacks: DashMap<String, Arc<dyn FallbackInvoker>>,
    clusters: DashMap<StrategyType, Arc<dyn ClusterInvoker>>,
}

impl ServiceContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the component for interface `T`, replacing any earlier one.
    pub fn register<T>(&self, component: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        tracing::trace!(component = %key, "registering component");
        self.components.write().insert(key, Box::new(component));
    }

    /// Resolve the component registered for interface `T`.
    ///
    /// # Errors
    /// Returns `ContainerError::NotFound` when nothing is registered for `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ContainerError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let components = self.components.read();
        let boxed = components.get(&key).ok_or(ContainerError::NotFound(key))?;
        boxed
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(ContainerError::TypeMismatch(key))
    }

    /// Register the fallback invoker a `FallBack` command names.
    pub fn register_fallback(&self, name: impl Into<String>, invoker: Arc<dyn FallbackInvoker>) {
        let name = name.into();
        tracing::trace!(fallback = %name, "registering fallback invoker");
        self.fallbacks.insert(name, invoker);
    }

    /// # Errors
    /// Returns `ProxyError::FallbackNotFound` when `name` is not registered.
    pub fn fallback_invoker(&self, name: &str) -> ProxyResult<Arc<dyn FallbackInvoker>> {
        self.fallbacks
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProxyError::FallbackNotFound {
                name: name.to_owned(),
            })
    }

    /// Register the cluster invoker that serves `strategy`.
    pub fn register_cluster(&self, strategy: StrategyType, invoker: Arc<dyn ClusterInvoker>) {
        tracing::trace!(%strategy, "registering cluster invoker");
        self.clusters.insert(strategy, invoker);
    }

    /// # Errors
    /// Returns `ProxyError::ClusterInvokerNotFound` when no invoker serves `strategy`.
    pub fn cluster_invoker(&self, strategy: StrategyType) -> ProxyResult<Arc<dyn ClusterInvoker>> {
        self.clusters
            .get(&strategy)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProxyError::ClusterInvokerNotFound {
                strategy: strategy.as_str().to_owned(),
            })
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("components", &self.components.read().keys().collect::<Vec<_>>())
            .field("fallbacks", &self.fallbacks.len())
            .field("clusters", &self.clusters.len())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::message::{Parameters, ReturnType};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Fixed(&'static str);

    impl Named for Fixed {
        fn name(&self) -> &str {
            self.0
        }
    }

    struct Constant(Value);

    #[async_trait]
    impl FallbackInvoker for Constant {
        async fn invoke(
            &self,
            _parameters: &Parameters,
            _service_id: &str,
            _service_key: Option<&str>,
        ) -> ProxyResult<Value> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl ClusterInvoker for Constant {
        async fn invoke(
            &self,
            _parameters: &Parameters,
            _service_id: &str,
            _service_key: Option<&str>,
            _return_type: &ReturnType,
        ) -> ProxyResult<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn components_are_keyed_by_interface() {
        let c = ServiceContainer::new();
        let named: Arc<dyn Named> = Arc::new(Fixed("routes"));
        c.register::<dyn Named>(named.clone());

        assert!(Arc::ptr_eq(&c.get::<dyn Named>().unwrap(), &named));
        assert!(matches!(c.get::<Fixed>(), Err(ContainerError::NotFound(_))));
    }

    #[test]
    fn re_registering_keeps_handed_out_components_alive() {
        let c = ServiceContainer::new();
        c.register::<dyn Named>(Arc::new(Fixed("first")));
        let first = c.get::<dyn Named>().unwrap();
        c.register::<dyn Named>(Arc::new(Fixed("second")));

        assert_eq!(first.name(), "first");
        assert_eq!(c.get::<dyn Named>().unwrap().name(), "second");
    }

    #[tokio::test]
    async fn fallbacks_are_found_by_name() {
        let c = ServiceContainer::new();
        c.register_fallback("OrderCacheFallback", Arc::new(Constant(json!(1))));

        let invoker = c.fallback_invoker("OrderCacheFallback").unwrap();
        let value = invoker.invoke(&Parameters::new(), "Order.Get", None).await.unwrap();
        assert_eq!(value, json!(1));

        let err = c.fallback_invoker("Missing").err().unwrap();
        assert!(matches!(err, ProxyError::FallbackNotFound { ref name } if name == "Missing"));
    }

    #[test]
    fn clusters_are_found_by_strategy() {
        let c = ServiceContainer::new();
        c.register_cluster(StrategyType::Failover, Arc::new(Constant(json!("failover"))));

        assert!(c.cluster_invoker(StrategyType::Failover).is_ok());
        let err = c.cluster_invoker(StrategyType::Injection).err().unwrap();
        assert!(matches!(
            err,
            ProxyError::ClusterInvokerNotFound { ref strategy } if strategy == "Injection"
        ));
        assert!(err.is_configuration());
    }
}
