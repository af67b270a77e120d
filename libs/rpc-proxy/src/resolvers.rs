//! Stock command and route resolvers.
//!
//! The caching wrappers answer hits with `Resolution::Ready`, which lets the
//! engine continue without a scheduler hop. Entries expire after a TTL so a
//! refreshed command or route is picked up within a bounded interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::command::ServiceCommand;
use crate::config::{CacheConfig, ProxyConfig};
use crate::contracts::{CommandResolver, Resolution, RouteResolver};
use crate::route::ServiceRoute;

/// Inserts between two sweeps of expired entries.
const SWEEP_EVERY: u64 = 128;

/// Service-id keyed map whose entries expire after `ttl`.
struct TtlMap<V> {
    ttl: Duration,
    entries: DashMap<String, (Instant, V)>,
    inserts: AtomicU64,
}

impl<V: Clone> TtlMap<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            inserts: AtomicU64::new(0),
        }
    }

    fn get(&self, service_id: &str) -> Option<V> {
        let entry = self.entries.get(service_id)?;
        let (stored_at, value) = entry.value();
        if stored_at.elapsed() < self.ttl {
            return Some(value.clone());
        }
        drop(entry);
        self.entries.remove(service_id);
        None
    }

    fn insert(&self, service_id: &str, value: V) {
        self.entries
            .insert(service_id.to_owned(), (Instant::now(), value));
        if self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
    }

    fn sweep(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn remove(&self, service_id: &str) {
        self.entries.remove(service_id);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// TTL cache in front of another command resolver.
pub struct CachedCommandResolver {
    inner: Arc<dyn CommandResolver>,
    cache: TtlMap<Arc<ServiceCommand>>,
}

impl CachedCommandResolver {
    #[must_use]
    pub fn new(inner: Arc<dyn CommandResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlMap::new(ttl),
        }
    }

    /// TTL taken from `cache.command_ttl_ms`.
    #[must_use]
    pub fn from_config(inner: Arc<dyn CommandResolver>, cache: &CacheConfig) -> Self {
        Self::new(inner, Duration::from_millis(cache.command_ttl_ms))
    }

    /// Drop the cached command for `service_id`.
    pub fn invalidate(&self, service_id: &str) {
        self.cache.remove(service_id);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl CommandResolver for CachedCommandResolver {
    fn resolve_command<'a>(&'a self, service_id: &'a str) -> Resolution<'a, Arc<ServiceCommand>> {
        if let Some(command) = self.cache.get(service_id) {
            return Resolution::ready(command);
        }

        Resolution::pending(async move {
            let command = self.inner.resolve_command(service_id).resolve().await?;
            self.cache.insert(service_id, Arc::clone(&command));
            tracing::trace!(service_id, strategy = %command.strategy, "cached service command");
            Ok(command)
        })
    }
}

/// TTL cache in front of another route resolver.
///
/// "No route" answers are cached too, for the same interval.
pub struct CachedRouteResolver {
    inner: Arc<dyn RouteResolver>,
    cache: TtlMap<Option<Arc<ServiceRoute>>>,
}

impl CachedRouteResolver {
    #[must_use]
    pub fn new(inner: Arc<dyn RouteResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlMap::new(ttl),
        }
    }

    /// TTL taken from `cache.route_ttl_ms`.
    #[must_use]
    pub fn from_config(inner: Arc<dyn RouteResolver>, cache: &CacheConfig) -> Self {
        Self::new(inner, Duration::from_millis(cache.route_ttl_ms))
    }

    pub fn invalidate(&self, service_id: &str) {
        self.cache.remove(service_id);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl RouteResolver for CachedRouteResolver {
    fn resolve_route<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Resolution<'a, Option<Arc<ServiceRoute>>> {
        if let Some(route) = self.cache.get(service_id) {
            return Resolution::ready(route);
        }

        Resolution::pending(async move {
            let route = self.inner.resolve_route(service_id).resolve().await?;
            self.cache.insert(service_id, route.clone());
            tracing::trace!(service_id, found = route.is_some(), "cached service route");
            Ok(route)
        })
    }
}

/// Commands taken from [`ProxyConfig`]: per-service overrides, else the default.
#[derive(Debug, Clone)]
pub struct ConfigCommandResolver {
    default: Arc<ServiceCommand>,
    overrides: HashMap<String, Arc<ServiceCommand>>,
}

impl ConfigCommandResolver {
    #[must_use]
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            default: Arc::new(config.command.clone()),
            overrides: config
                .commands
                .iter()
                .map(|(id, command)| (id.clone(), Arc::new(command.clone())))
                .collect(),
        }
    }
}

impl CommandResolver for ConfigCommandResolver {
    fn resolve_command<'a>(&'a self, service_id: &'a str) -> Resolution<'a, Arc<ServiceCommand>> {
        let command = self.overrides.get(service_id).unwrap_or(&self.default);
        Resolution::ready(Arc::clone(command))
    }
}

/// In-memory route table, filled by whoever owns discovery.
#[derive(Debug, Default)]
pub struct StaticRouteResolver {
    routes: DashMap<String, Arc<ServiceRoute>>,
}

impl StaticRouteResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the route for its descriptor's service id.
    pub fn insert(&self, route: ServiceRoute) {
        self.routes
            .insert(route.service_id().to_owned(), Arc::new(route));
    }

    #[must_use]
    pub fn remove(&self, service_id: &str) -> Option<Arc<ServiceRoute>> {
        self.routes.remove(service_id).map(|(_, route)| route)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<ServiceRoute> for StaticRouteResolver {
    fn from_iter<I: IntoIterator<Item = ServiceRoute>>(iter: I) -> Self {
        let resolver = Self::new();
        for route in iter {
            resolver.insert(route);
        }
        resolver
    }
}

impl RouteResolver for StaticRouteResolver {
    fn resolve_route<'a>(
        &'a self,
        service_id: &'a str,
    ) -> Resolution<'a, Option<Arc<ServiceRoute>>> {
        Resolution::ready(self.routes.get(service_id).map(|r| Arc::clone(r.value())))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::command::StrategyType;
    use crate::descriptor::ServiceDescriptor;
    use crate::error::ProxyError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Always pending; counts how often it is consulted.
    #[derive(Default)]
    struct SlowCommands {
        calls: AtomicUsize,
    }

    impl CommandResolver for SlowCommands {
        fn resolve_command<'a>(
            &'a self,
            _service_id: &'a str,
        ) -> Resolution<'a, Arc<ServiceCommand>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Resolution::pending(async {
                tokio::task::yield_now().await;
                Ok(Arc::new(ServiceCommand::failover(2)))
            })
        }
    }

    struct BrokenRoutes;

    impl RouteResolver for BrokenRoutes {
        fn resolve_route<'a>(
            &'a self,
            service_id: &'a str,
        ) -> Resolution<'a, Option<Arc<ServiceRoute>>> {
            Resolution::Ready(Err(ProxyError::resolution("route", service_id, "registry offline")))
        }
    }

    #[tokio::test]
    async fn command_cache_turns_hits_ready() {
        let inner = Arc::new(SlowCommands::default());
        let cached = CachedCommandResolver::new(inner.clone(), Duration::from_secs(60));

        let first = cached.resolve_command("Order.Get");
        assert!(!first.is_ready());
        assert_eq!(first.resolve().await.unwrap().failover_cluster, 2);

        let second = cached.resolve_command("Order.Get");
        assert!(second.is_ready());
        second.resolve().await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_and_invalidated_entries_are_refetched() {
        let inner = Arc::new(SlowCommands::default());
        let cached = CachedCommandResolver::new(inner.clone(), Duration::ZERO);
        cached.resolve_command("a").resolve().await.unwrap();
        assert!(!cached.resolve_command("a").is_ready());

        let cached = CachedCommandResolver::new(inner.clone(), Duration::from_secs(60));
        cached.resolve_command("b").resolve().await.unwrap();
        cached.invalidate("b");
        assert!(!cached.resolve_command("b").is_ready());
    }

    #[tokio::test]
    async fn route_cache_remembers_absent_routes_and_passes_errors() {
        let routes = Arc::new(StaticRouteResolver::new());
        let cached = CachedRouteResolver::new(routes.clone(), Duration::from_secs(60));
        assert!(cached.resolve_route("Order.Get").resolve().await.unwrap().is_none());

        routes.insert(ServiceRoute::new(ServiceDescriptor::new("Order.Get"), Vec::new()));
        // Still the cached "no route" answer until invalidated.
        assert!(cached.resolve_route("Order.Get").resolve().await.unwrap().is_none());
        cached.invalidate("Order.Get");
        assert!(cached.resolve_route("Order.Get").resolve().await.unwrap().is_some());

        let broken = CachedRouteResolver::new(Arc::new(BrokenRoutes), Duration::from_secs(60));
        let err = broken.resolve_route("x").resolve().await.unwrap_err();
        assert!(matches!(err, ProxyError::Resolution { what: "route", .. }));
    }

    #[tokio::test]
    async fn config_resolver_prefers_overrides() {
        let mut config = ProxyConfig::default();
        config
            .commands
            .insert("Order.Get".to_owned(), ServiceCommand::fallback("OrderCacheFallback"));
        let resolver = ConfigCommandResolver::new(&config);

        let hit = resolver.resolve_command("Order.Get");
        assert!(hit.is_ready());
        assert_eq!(hit.resolve().await.unwrap().strategy, StrategyType::FallBack);
        assert_eq!(
            resolver.resolve_command("Order.List").resolve().await.unwrap().strategy,
            StrategyType::Failover
        );
    }

    #[tokio::test]
    async fn ttls_come_from_the_cache_config() {
        let cache = CacheConfig {
            command_ttl_ms: 0,
            route_ttl_ms: 60_000,
            ..CacheConfig::default()
        };
        let commands =
            CachedCommandResolver::from_config(Arc::new(SlowCommands::default()), &cache);
        commands.resolve_command("a").resolve().await.unwrap();
        assert!(!commands.resolve_command("a").is_ready());

        let routes =
            CachedRouteResolver::from_config(Arc::new(StaticRouteResolver::new()), &cache);
        routes.resolve_route("a").resolve().await.unwrap();
        assert!(routes.resolve_route("a").is_ready());
    }

    #[test]
    fn unread_expired_ids_are_swept_by_later_inserts() {
        let map = TtlMap::new(Duration::from_millis(1));
        for i in 0..SWEEP_EVERY - 1 {
            map.insert(&format!("Order.Get{i}"), i);
        }
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(map.len(), usize::try_from(SWEEP_EVERY - 1).unwrap());

        map.insert("Order.Last", 0);
        assert!(!map.entries.contains_key("Order.Get0"));
        assert!(map.len() <= 1);
    }
}
