//! Service descriptor: identity of one remote operation plus its policy metadata.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const GROUP_NAME: &str = "groupname";
const WAIT_EXECUTION: &str = "waitexecution";
const ENABLE_AUTHORIZATION: &str = "enableauthorization";
const AUTHORIZATION_TYPE: &str = "authorizationtype";
const DISABLE_NETWORK: &str = "disablenetwork";
const DIRECTOR: &str = "director";
const DATE: &str = "date";
const CACHE_INTERCEPT: &str = "cacheintercept";

/// Metadata map with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, Value>", into = "HashMap<String, Value>")]
pub struct Metadata(HashMap<String, Value>);

impl From<HashMap<String, Value>> for Metadata {
    fn from(raw: HashMap<String, Value>) -> Self {
        Self(
            raw.into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        )
    }
}

impl From<Metadata> for HashMap<String, Value> {
    fn from(m: Metadata) -> Self {
        m.0
    }
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.0.insert(key.to_ascii_lowercase(), value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(&key.to_ascii_lowercase())
    }

    /// Typed read; `None` when absent or not decodable as `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationType {
    AppSecret,
    #[serde(rename = "JWT")]
    Jwt,
}

/// How a cache interceptor treats the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingMethod {
    /// Read-through: serve from cache, call and store on miss.
    #[default]
    Get,
    /// Always call, then store the fresh result.
    Put,
    /// Always call, then evict the cached entry.
    Remove,
}

/// Cache-intercept sub-configuration of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIntercept {
    /// Cache key template; `{name}` placeholders are filled from call parameters.
    pub key: String,
    #[serde(default)]
    pub method: CachingMethod,
    #[serde(default)]
    pub ttl_ms: u64,
    /// Whether dynamically typed (`serde_json::Value`) callers still go through
    /// the interceptor chain.
    #[serde(default)]
    pub enable_stage_cache: bool,
}

impl CacheIntercept {
    #[must_use]
    pub fn new(key: impl Into<String>, method: CachingMethod) -> Self {
        Self {
            key: key.into(),
            method,
            ttl_ms: 0,
            enable_stage_cache: false,
        }
    }

    #[must_use]
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    #[must_use]
    pub fn with_stage_cache(mut self, enabled: bool) -> Self {
        self.enable_stage_cache = enabled;
        self
    }
}

/// Identity of one remote operation and its policy flags.
///
/// Equality is `id` plus element-wise metadata; `route_path` and `token` do
/// not participate. The `with_*` builders mutate in place and hand back the
/// same instance, so a descriptor behaves like append-only configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: String,
    #[serde(default)]
    pub route_path: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PartialEq for ServiceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.metadata == other.metadata
    }
}

impl Eq for ServiceDescriptor {}

impl ServiceDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_route_path(&mut self, route_path: impl Into<String>) -> &mut Self {
        self.route_path = route_path.into();
        self
    }

    pub fn with_token(&mut self, token: impl Into<String>) -> &mut Self {
        self.token = token.into();
        self
    }

    pub fn with_metadata(&mut self, key: &str, value: Value) -> &mut Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_group_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.with_metadata(GROUP_NAME, Value::String(name.into()))
    }

    pub fn with_wait_execution(&mut self, wait: bool) -> &mut Self {
        self.with_metadata(WAIT_EXECUTION, Value::Bool(wait))
    }

    pub fn with_enable_authorization(&mut self, enabled: bool) -> &mut Self {
        self.with_metadata(ENABLE_AUTHORIZATION, Value::Bool(enabled))
    }

    pub fn with_authorization_type(&mut self, kind: AuthorizationType) -> &mut Self {
        let value = serde_json::to_value(kind).unwrap_or(Value::Null);
        self.with_metadata(AUTHORIZATION_TYPE, value)
    }

    pub fn with_disable_network(&mut self, disabled: bool) -> &mut Self {
        self.with_metadata(DISABLE_NETWORK, Value::Bool(disabled))
    }

    pub fn with_director(&mut self, director: impl Into<String>) -> &mut Self {
        self.with_metadata(DIRECTOR, Value::String(director.into()))
    }

    pub fn with_date(&mut self, date: impl Into<String>) -> &mut Self {
        self.with_metadata(DATE, Value::String(date.into()))
    }

    pub fn with_cache_intercept(&mut self, intercept: CacheIntercept) -> &mut Self {
        let value = serde_json::to_value(intercept).unwrap_or(Value::Null);
        self.with_metadata(CACHE_INTERCEPT, value)
    }

    #[must_use]
    pub fn group_name(&self) -> Option<String> {
        self.metadata.get_as(GROUP_NAME)
    }

    /// Defaults to `true` when unset.
    #[must_use]
    pub fn wait_execution(&self) -> bool {
        self.metadata.get_as(WAIT_EXECUTION).unwrap_or(true)
    }

    #[must_use]
    pub fn enable_authorization(&self) -> bool {
        self.metadata.get_as(ENABLE_AUTHORIZATION).unwrap_or(false)
    }

    #[must_use]
    pub fn authorization_type(&self) -> Option<AuthorizationType> {
        self.metadata.get_as(AUTHORIZATION_TYPE)
    }

    #[must_use]
    pub fn disable_network(&self) -> bool {
        self.metadata.get_as(DISABLE_NETWORK).unwrap_or(false)
    }

    #[must_use]
    pub fn director(&self) -> Option<String> {
        self.metadata.get_as(DIRECTOR)
    }

    #[must_use]
    pub fn date(&self) -> Option<String> {
        self.metadata.get_as(DATE)
    }

    #[must_use]
    pub fn cache_intercept(&self) -> Option<CacheIntercept> {
        self.metadata.get_as(CACHE_INTERCEPT)
    }

    /// Whether any interceptable policy is configured.
    #[must_use]
    pub fn exist_intercept(&self) -> bool {
        self.cache_intercept().is_some()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_keys_are_case_insensitive() {
        let mut m = Metadata::new();
        m.insert("GroupName", json!("orders"));
        assert_eq!(m.get("groupname"), Some(&json!("orders")));
        assert_eq!(m.get("GROUPNAME"), Some(&json!("orders")));
        assert!(m.contains_key("groupName"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn deserialized_metadata_is_normalized() {
        let m: Metadata = serde_json::from_value(json!({"WaitExecution": false})).unwrap();
        assert_eq!(m.get_as::<bool>("waitexecution"), Some(false));
    }

    #[test]
    fn builders_mutate_the_same_instance() {
        let mut d = ServiceDescriptor::new("Order.Get");
        d.with_group_name("orders")
            .with_wait_execution(false)
            .with_enable_authorization(true)
            .with_authorization_type(AuthorizationType::Jwt)
            .with_director("ops")
            .with_date("2024-01-01");

        assert_eq!(d.group_name().as_deref(), Some("orders"));
        assert!(!d.wait_execution());
        assert!(d.enable_authorization());
        assert_eq!(d.authorization_type(), Some(AuthorizationType::Jwt));
        assert!(!d.disable_network());
        assert_eq!(d.director().as_deref(), Some("ops"));
        assert_eq!(d.date().as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn defaults_when_metadata_missing() {
        let d = ServiceDescriptor::new("Order.Get");
        assert!(d.wait_execution());
        assert!(!d.enable_authorization());
        assert!(d.authorization_type().is_none());
        assert!(!d.exist_intercept());
    }

    #[test]
    fn equality_ignores_route_path_and_token() {
        let mut a = ServiceDescriptor::new("Order.Get");
        a.with_route_path("api/order/get").with_group_name("g");
        let mut b = ServiceDescriptor::new("Order.Get");
        b.with_token("secret").with_group_name("g");
        assert_eq!(a, b);

        b.with_director("someone");
        assert_ne!(a, b);
    }

    #[test]
    fn cache_intercept_enables_interception() {
        let mut d = ServiceDescriptor::new("Order.Get");
        d.with_cache_intercept(
            CacheIntercept::new("order:{id}", CachingMethod::Get)
                .with_ttl_ms(500)
                .with_stage_cache(true),
        );
        assert!(d.exist_intercept());
        let ci = d.cache_intercept().unwrap();
        assert_eq!(ci.key, "order:{id}");
        assert_eq!(ci.ttl_ms, 500);
        assert!(ci.enable_stage_cache);
    }
}
