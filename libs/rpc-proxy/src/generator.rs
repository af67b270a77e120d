//! Adapter generation.
//!
//! `#[service_proxy]` emits one adapter type per service trait together with
//! a static [`InterfaceDefinition`] describing it. [`AdapterGenerator`] turns
//! a batch of those definitions into a [`GeneratedAssembly`]: the set of
//! adapter types the factory can instantiate. A batch is validated as a
//! whole; one bad interface fails all of them.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use crate::container::TypeKey;
use crate::engine::ProxyBase;
use crate::error::GenerationError;
use crate::service_id::{DefaultServiceIdGenerator, ServiceIdGenerator};

/// Type-erased adapter constructor.
///
/// The returned value wraps an `Arc<dyn Trait>` for the definition's interface.
pub type AdapterConstructor = fn(ProxyBase) -> Arc<dyn Any + Send + Sync>;

/// One proxied trait method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    /// Precomputed at compile time.
    pub service_id: &'static str,
    /// Parameter names in declaration order.
    pub parameters: &'static [&'static str],
    /// Declared success type, as written in the trait.
    pub return_type: &'static str,
    /// `true` when the method returns `Result<(), E>`.
    pub returns_unit: bool,
}

/// Static description of one `#[service_proxy]` trait and its adapter.
pub struct InterfaceDefinition {
    pub namespace: &'static str,
    pub interface: &'static str,
    pub adapter: &'static str,
    pub methods: &'static [MethodDescriptor],
    pub interface_key: fn() -> TypeKey,
    pub construct: AdapterConstructor,
}

inventory::collect!(InterfaceDefinition);

impl InterfaceDefinition {
    /// `{namespace}::{interface}`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.namespace, self.interface)
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

impl fmt::Debug for InterfaceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDefinition")
            .field("namespace", &self.namespace)
            .field("interface", &self.interface)
            .field("adapter", &self.adapter)
            .field("methods", &self.methods.len())
            .finish_non_exhaustive()
    }
}

/// Every definition linked into the binary through `#[service_proxy]`.
#[must_use]
pub fn discovered_definitions() -> Vec<&'static InterfaceDefinition> {
    inventory::iter::<InterfaceDefinition>.into_iter().collect()
}

/// A validated adapter type, ready to be instantiated.
#[derive(Clone, Copy)]
pub struct AdapterType {
    definition: &'static InterfaceDefinition,
    interface_key: TypeKey,
}

impl AdapterType {
    #[must_use]
    pub fn interface_key(&self) -> TypeKey {
        self.interface_key
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.definition.adapter
    }

    #[must_use]
    pub fn definition(&self) -> &'static InterfaceDefinition {
        self.definition
    }

    #[must_use]
    pub fn methods(&self) -> &'static [MethodDescriptor] {
        self.definition.methods
    }

    /// Instantiate the adapter around an engine.
    #[must_use]
    pub fn construct(&self, base: ProxyBase) -> Arc<dyn Any + Send + Sync> {
        (self.definition.construct)(base)
    }
}

impl fmt::Debug for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterType")
            .field("interface", &self.interface_key)
            .field("adapter", &self.definition.adapter)
            .finish()
    }
}

/// Output of one generation batch.
#[derive(Debug, Clone, Default)]
pub struct GeneratedAssembly {
    adapters: Vec<AdapterType>,
}

impl GeneratedAssembly {
    #[must_use]
    pub fn adapters(&self) -> &[AdapterType] {
        &self.adapters
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Every service id in the batch, in definition and method order.
    pub fn service_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.adapters
            .iter()
            .flat_map(|a| a.methods().iter().map(|m| m.service_id))
    }
}

impl IntoIterator for GeneratedAssembly {
    type Item = AdapterType;
    type IntoIter = std::vec::IntoIter<AdapterType>;

    fn into_iter(self) -> Self::IntoIter {
        self.adapters.into_iter()
    }
}

/// Validates interface definitions in batches. Holds no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterGenerator {
    ids: DefaultServiceIdGenerator,
}

impl AdapterGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate adapter types for `definitions`.
    ///
    /// `namespaces` lists the namespaces the batch may draw from; a definition
    /// matches a namespace when it is that namespace or nested below it. An
    /// empty list imposes no restriction.
    ///
    /// # Errors
    /// Fails the whole batch with a [`GenerationError`] on the first invalid
    /// definition, uncovered namespace or duplicate service id.
    pub fn generate(
        &self,
        definitions: &[&'static InterfaceDefinition],
        namespaces: &[&str],
    ) -> Result<GeneratedAssembly, GenerationError> {
        let mut seen: HashMap<&'static str, &'static str> = HashMap::new();
        let mut adapters = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if !namespace_covered(definition.namespace, namespaces) {
                return Err(GenerationError::UnresolvedNamespace {
                    interface: definition.interface,
                    namespace: definition.namespace,
                });
            }
            self.validate(definition)?;

            for method in definition.methods {
                match seen.entry(method.service_id) {
                    Entry::Occupied(first) => {
                        return Err(GenerationError::DuplicateServiceId {
                            service_id: method.service_id,
                            first: (*first.get()).to_owned(),
                            second: definition.interface.to_owned(),
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(definition.interface);
                    }
                }
            }

            adapters.push(AdapterType {
                definition,
                interface_key: (definition.interface_key)(),
            });
        }

        tracing::debug!(
            adapters = adapters.len(),
            service_ids = seen.len(),
            "generated proxy adapters"
        );
        Ok(GeneratedAssembly { adapters })
    }

    fn validate(&self, definition: &InterfaceDefinition) -> Result<(), GenerationError> {
        let invalid = |reason: String| GenerationError::InvalidInterface {
            interface: definition.interface,
            reason,
        };

        if definition.interface.is_empty() {
            return Err(invalid("empty interface name".to_owned()));
        }
        if definition.adapter.is_empty() {
            return Err(invalid("empty adapter name".to_owned()));
        }

        for method in definition.methods {
            if method.name.is_empty() {
                return Err(invalid("method with an empty name".to_owned()));
            }
            if method.service_id.is_empty() {
                return Err(invalid(format!("method '{}' has no service id", method.name)));
            }
            let expected = self.ids.generate(
                definition.namespace,
                definition.interface,
                method.name,
                method.parameters,
            );
            if method.service_id != expected {
                return Err(invalid(format!(
                    "method '{}' carries service id '{}', expected '{expected}'",
                    method.name, method.service_id
                )));
            }
        }
        Ok(())
    }
}

/// `namespace` equals an entry or nests below it, as a `::` module path or a
/// `.` separated namespace.
pub(crate) fn namespace_covered(namespace: &str, namespaces: &[&str]) -> bool {
    namespaces.is_empty()
        || namespaces.iter().any(|ns| {
            namespace.strip_prefix(ns).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with("::") || rest.starts_with('.')
            })
        })
}
