//! Response-caching interceptor.
//!
//! Acts on routes whose descriptor carries a [`CacheIntercept`] policy:
//! - `Get` serves a fresh cached value, or proceeds and stores the answer;
//! - `Put` always proceeds and stores the answer;
//! - `Remove` always proceeds and evicts the entry.
//!
//! Cache keys come from the policy's key template, where `{name}` is replaced
//! by the call argument `name`. An empty template keys on the service id and
//! the full argument map.
//!
//! Expired entries are dropped when read, and every [`SWEEP_EVERY`] stores
//! the whole map is swept so keys that are never read again do not pile up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::config::CacheConfig;
use crate::descriptor::{CacheIntercept, CachingMethod};
use crate::error::ProxyResult;
use crate::interceptor::Interceptor;
use crate::invocation::Invocation;
use crate::message::Parameters;

struct Entry {
    stored_at: Instant,
    ttl: Duration,
    value: Value,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// Stores between two full sweeps of expired entries.
pub const SWEEP_EVERY: u64 = 256;

/// In-memory response cache shared by every proxy that registers it.
pub struct CacheInterceptor {
    entries: DashMap<String, Entry>,
    default_ttl: Duration,
    stores: AtomicU64,
}

impl CacheInterceptor {
    /// `default_ttl` applies to policies that set no TTL of their own.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            stores: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self::new(Duration::from_millis(cfg.response_ttl_ms))
    }

    /// Fresh cached value under `key`; expired entries are dropped on sight.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh() {
            return Some(entry.value.clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    #[must_use]
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "swept expired response cache entries");
        }
    }

    /// Number of stored entries, expired ones included until swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn store(&self, key: String, value: Value, policy: &CacheIntercept) {
        let ttl = if policy.ttl_ms == 0 {
            self.default_ttl
        } else {
            Duration::from_millis(policy.ttl_ms)
        };
        self.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                ttl,
                value,
            },
        );

        if self.stores.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
    }
}

impl std::fmt::Debug for CacheInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInterceptor")
            .field("entries", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[async_trait]
impl Interceptor for CacheInterceptor {
    async fn intercept(&self, invocation: &mut Invocation<'_>) -> ProxyResult<()> {
        let Some(policy) = invocation.route().cache_intercept() else {
            return Ok(());
        };
        let key = cache_key(&policy.key, invocation.service_id(), invocation.arguments());

        match policy.method {
            CachingMethod::Get => {
                if let Some(value) = self.get(&key) {
                    tracing::trace!(key, "response cache hit");
                    invocation.set_return_value(value);
                    return Ok(());
                }
                let value = invocation.proceed().await?;
                self.store(key, value.clone(), &policy);
                invocation.set_return_value(value);
            }
            CachingMethod::Put => {
                let value = invocation.proceed().await?;
                self.store(key, value.clone(), &policy);
                invocation.set_return_value(value);
            }
            CachingMethod::Remove => {
                let value = invocation.proceed().await?;
                if self.invalidate(&key) {
                    tracing::trace!(key, "response cache entry evicted");
                }
                invocation.set_return_value(value);
            }
        }
        Ok(())
    }
}

/// Fill `{name}` placeholders from `arguments`.
///
/// String arguments are inserted verbatim, anything else as compact JSON.
/// Unknown placeholders are kept as written.
fn cache_key(template: &str, service_id: &str, arguments: &Parameters) -> String {
    if template.is_empty() {
        let args = serde_json::to_string(arguments).unwrap_or_default();
        return format!("{service_id}:{args}");
    }

    let mut key = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        key.push_str(&rest[..open]);
        let name = &rest[open + 1..open + close];
        match arguments.get(name) {
            Some(Value::String(s)) => key.push_str(s),
            Some(other) => key.push_str(&other.to_string()),
            None => key.push_str(&rest[open..=open + close]),
        }
        rest = &rest[open + close + 1..];
    }
    key.push_str(rest);
    key
}
