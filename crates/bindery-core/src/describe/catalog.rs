//! Type catalog: every named type the pipeline may introspect.

use indexmap::IndexMap;

use super::{Describe, TypeDescriptor, TypeRef};
use crate::error::{Error, Result};

/// Ordered store of type descriptors keyed by fully-qualified path.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: IndexMap<String, TypeDescriptor>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, replacing any earlier one with the same path.
    pub fn insert(&mut self, mut descriptor: TypeDescriptor) {
        if descriptor.module.is_empty() {
            descriptor.module = descriptor.path.split("::").next().unwrap_or_default().to_string();
        }
        self.types.insert(descriptor.path.clone(), descriptor);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Register a Rust type (and the named types it references).
    pub fn register<T: Describe>(&mut self) -> TypeRef {
        T::register(self);
        T::type_ref()
    }

    pub fn get(&self, path: &str) -> Option<&TypeDescriptor> {
        self.types.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.types.contains_key(path)
    }

    /// Look up a descriptor the pipeline cannot proceed without.
    pub fn require(&self, path: &str) -> Result<&TypeDescriptor> {
        self.get(path).ok_or_else(|| {
            Error::configuration(format!("type {path} is not described in the type catalog"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<TypeDescriptor> for TypeCatalog {
    fn from_iter<I: IntoIterator<Item = TypeDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.insert(descriptor);
        }
        catalog
    }
}
