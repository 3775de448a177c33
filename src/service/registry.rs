//! Service type registry.

use crate::service::primitive::PrimitiveService;
use std::collections::BTreeMap;

/// Factory producing fresh primitive instances for one type tag.
pub type ServiceFactory = Box<dyn Fn() -> Box<dyn PrimitiveService> + Send + Sync>;

/// Maps type tags to primitive factories.
///
/// The registry is static across the lifetime of a manager: every replica
/// must register the same set of types before applying any log entry, or
/// create/restore of an unregistered type halts the apply loop with a fatal
/// `UnknownType` error.
#[derive(Default)]
pub struct ServiceTypeRegistry {
    types: BTreeMap<String, ServiceFactory>,
}

impl ServiceTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Register a factory for a type tag, replacing any previous entry.
    pub fn register<F>(&mut self, type_tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn PrimitiveService> + Send + Sync + 'static,
    {
        self.types.insert(type_tag.into(), Box::new(factory));
    }

    /// Look up the factory for a type tag.
    pub fn get(&self, type_tag: &str) -> Option<&ServiceFactory> {
        self.types.get(type_tag)
    }

    /// Iterate over registered type tags in sorted order.
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl std::fmt::Debug for ServiceTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTypeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}
