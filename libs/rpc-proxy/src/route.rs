//! Resolved network target(s) for a service descriptor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::{CacheIntercept, ServiceDescriptor};

/// One reachable endpoint of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl ServiceAddress {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: default_weight(),
        }
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A descriptor bound to the addresses it can currently be reached at.
///
/// Produced and refreshed by the route resolver; the core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRoute {
    pub descriptor: ServiceDescriptor,
    pub addresses: Vec<ServiceAddress>,
}

impl ServiceRoute {
    #[must_use]
    pub fn new(descriptor: ServiceDescriptor, addresses: Vec<ServiceAddress>) -> Self {
        Self {
            descriptor,
            addresses,
        }
    }

    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.descriptor.id
    }

    /// Whether any interceptable policy is configured for the descriptor.
    #[must_use]
    pub fn exist_intercept(&self) -> bool {
        self.descriptor.exist_intercept()
    }

    #[must_use]
    pub fn cache_intercept(&self) -> Option<CacheIntercept> {
        self.descriptor.cache_intercept()
    }

    /// Stage-cache flag of the cache-intercept policy; `false` when none is set.
    #[must_use]
    pub fn enable_stage_cache(&self) -> bool {
        self.cache_intercept()
            .is_some_and(|ci| ci.enable_stage_cache)
    }
}
