//! Adapter factory: the single entry point for obtaining proxies.
//!
//! Adapter types come from [`AdapterGenerator`] batches and live in a table
//! keyed by interface type. Instances are created lazily, one per
//! (interface, service key), and kept in an injected [`ProxyCache`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::container::{ServiceContainer, TypeKey};
use crate::contracts::{RemoteInvoker, TypeConvertibleService};
use crate::engine::ProxyBase;
use crate::error::{ProxyError, ProxyResult};
use crate::generator::{
    AdapterGenerator, AdapterType, InterfaceDefinition, discovered_definitions, namespace_covered,
};

type CacheKey = (TypeKey, Option<Arc<str>>);

/// Concurrent store of adapter instances keyed by (interface, service key).
///
/// Racing first-use inserts are allowed; the last one stays.
#[derive(Default)]
pub struct ProxyCache {
    entries: DashMap<CacheKey, Arc<dyn Any + Send + Sync>>,
}

impl ProxyCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, interface: TypeKey, key: Option<&str>) -> Option<Arc<dyn Any + Send + Sync>> {
        self.entries
            .get(&(interface, key.map(Arc::from)))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, interface: TypeKey, key: Option<&str>, proxy: Arc<dyn Any + Send + Sync>) {
        self.entries.insert((interface, key.map(Arc::from)), proxy);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ProxyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCache")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Builds and caches proxies for registered service interfaces.
pub struct AdapterFactory {
    remote_invoker: Arc<dyn RemoteInvoker>,
    type_converter: Arc<dyn TypeConvertibleService>,
    container: Arc<ServiceContainer>,
    generator: AdapterGenerator,
    adapters: RwLock<HashMap<TypeKey, AdapterType>>,
    cache: Arc<ProxyCache>,
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("adapters", &self.adapters.read().len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl AdapterFactory {
    /// Factory with a private instance cache.
    #[must_use]
    pub fn new(
        remote_invoker: Arc<dyn RemoteInvoker>,
        type_converter: Arc<dyn TypeConvertibleService>,
        container: Arc<ServiceContainer>,
    ) -> Self {
        Self::with_cache(
            remote_invoker,
            type_converter,
            container,
            Arc::new(ProxyCache::new()),
        )
    }

    /// Factory sharing `cache` with other owners.
    #[must_use]
    pub fn with_cache(
        remote_invoker: Arc<dyn RemoteInvoker>,
        type_converter: Arc<dyn TypeConvertibleService>,
        container: Arc<ServiceContainer>,
        cache: Arc<ProxyCache>,
    ) -> Self {
        Self {
            remote_invoker,
            type_converter,
            container,
            generator: AdapterGenerator::new(),
            adapters: RwLock::new(HashMap::new()),
            cache,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ProxyCache> {
        &self.cache
    }

    /// Generate adapters for `definitions` and merge them into the type table.
    ///
    /// Later registrations for an interface replace earlier ones. Returns the
    /// number of adapter types registered.
    ///
    /// # Errors
    /// Returns `ProxyError::Generation` if the batch fails validation; the
    /// type table is left untouched in that case.
    pub fn register_interfaces(
        &self,
        definitions: &[&'static InterfaceDefinition],
        namespaces: &[&str],
    ) -> ProxyResult<usize> {
        let assembly = self.generator.generate(definitions, namespaces)?;
        let count = assembly.len();

        let mut adapters = self.adapters.write();
        for adapter in assembly {
            if let Some(previous) = adapters.insert(adapter.interface_key(), adapter) {
                tracing::debug!(
                    interface = %adapter.interface_key(),
                    previous = previous.name(),
                    adapter = adapter.name(),
                    "replacing proxy adapter"
                );
            }
        }
        drop(adapters);

        tracing::info!(count, "registered proxy adapters");
        Ok(count)
    }

    /// Register every `#[service_proxy]` interface linked into the binary
    /// whose namespace is covered by `namespaces` (all of them when empty).
    ///
    /// # Errors
    /// Returns `ProxyError::Generation` if the discovered batch fails validation.
    pub fn register_discovered(&self, namespaces: &[&str]) -> ProxyResult<usize> {
        let definitions: Vec<_> = discovered_definitions()
            .into_iter()
            .filter(|d| namespace_covered(d.namespace, namespaces))
            .collect();
        self.register_interfaces(&definitions, namespaces)
    }

    /// Whether an adapter type is registered for interface `T`.
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.adapters.read().contains_key(&TypeKey::of::<T>())
    }

    /// Proxy for `T` without a service key.
    ///
    /// # Errors
    /// See [`AdapterFactory::create_proxy_by_type`].
    pub fn create_proxy<T>(&self) -> ProxyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.typed::<T>(None)
    }

    /// Proxy for `T` bound to `key`.
    ///
    /// # Errors
    /// See [`AdapterFactory::create_proxy_by_type`].
    pub fn create_proxy_keyed<T>(&self, key: &str) -> ProxyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.typed::<T>(Some(key))
    }

    /// Untyped proxy lookup. The returned value wraps an `Arc<dyn Trait>`.
    ///
    /// # Errors
    /// Returns `ProxyError::NoAdapterFound` when no adapter implements the
    /// interface and propagates `ProxyBase::new` failures.
    pub fn create_proxy_by_type(
        &self,
        interface: TypeKey,
        key: Option<&str>,
    ) -> ProxyResult<Arc<dyn Any + Send + Sync>> {
        if let Some(proxy) = self.cache.get(interface, key) {
            return Ok(proxy);
        }

        let adapter = self
            .adapters
            .read()
            .get(&interface)
            .copied()
            .ok_or_else(|| ProxyError::NoAdapterFound {
                interface: interface.name().to_owned(),
            })?;

        let base = ProxyBase::new(
            Arc::clone(&self.remote_invoker),
            Arc::clone(&self.type_converter),
            key.map(str::to_owned),
            Arc::clone(&self.container),
        )?;
        let proxy = adapter.construct(base);
        self.cache.insert(interface, key, Arc::clone(&proxy));

        tracing::debug!(
            interface = %interface,
            adapter = adapter.name(),
            service_key = key,
            "created proxy"
        );
        Ok(proxy)
    }

    fn typed<T>(&self, key: Option<&str>) -> ProxyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let interface = TypeKey::of::<T>();
        let proxy = self.create_proxy_by_type(interface, key)?;
        proxy
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| ProxyError::AdapterTypeMismatch {
                interface: interface.name().to_owned(),
            })
    }
}
