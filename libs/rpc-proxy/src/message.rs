//! Values exchanged between adapters, the engine and its collaborators.

use std::any::TypeId;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProxyError, ProxyResult};

/// Ordered name → value map of call arguments, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `value` and append it under `name`.
    ///
    /// # Errors
    /// Returns `ProxyError::Parameter` if the value cannot be encoded.
    pub fn insert<V>(&mut self, name: &str, value: &V) -> ProxyResult<()>
    where
        V: Serialize + ?Sized,
    {
        let encoded = serde_json::to_value(value).map_err(|source| ProxyError::Parameter {
            parameter: name.to_owned(),
            source,
        })?;
        self.0.insert(name.to_owned(), encoded);
        Ok(())
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Decoded answer of a direct remote call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub result: Value,
}

impl ResultMessage {
    #[must_use]
    pub fn new(result: Value) -> Self {
        Self { result }
    }
}

/// Shape of a proxied method's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// `Result<(), E>`: completion only.
    Unit,
    /// `Result<serde_json::Value, E>`: the raw decoded payload.
    Raw,
    /// Any other `Result<T, E>`.
    Typed,
}

/// Declared return type of a call, as seen by the engine and interceptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnType {
    name: &'static str,
    id: TypeId,
    kind: ReturnKind,
}

impl ReturnType {
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        let id = TypeId::of::<T>();
        let kind = if id == TypeId::of::<()>() {
            ReturnKind::Unit
        } else if id == TypeId::of::<Value>() {
            ReturnKind::Raw
        } else {
            ReturnKind::Typed
        };
        Self {
            name: std::any::type_name::<T>(),
            id,
            kind,
        }
    }

    #[must_use]
    pub fn unit() -> Self {
        Self::of::<()>()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ReturnKind {
        self.kind
    }

    /// The caller asked for the generic "any" type (`serde_json::Value`).
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.kind == ReturnKind::Raw
    }

    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.kind == ReturnKind::Unit
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        self.id == TypeId::of::<String>()
    }
}
