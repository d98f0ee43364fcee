//! Cycle-safe schema reference registry.

use indexmap::IndexMap;
use tracing::debug;

use super::{Schema, sanitize_key};
use crate::describe::{TypeCatalog, TypeDescriptor, TypeKind, TypeRef};
use crate::error::{Error, Result};

/// Maps a type descriptor to a schema key.
pub type SchemaIdSelector = Box<dyn Fn(&TypeDescriptor) -> String>;

/// Converts described types into API schemas, registering each composite
/// type exactly once under a stable key.
///
/// Object types are registered as a placeholder before their properties are
/// resolved, so self-referential and mutually referential types resolve to a
/// reference instead of recursing. A failure while building a body removes
/// the placeholder again.
pub struct SchemaRegistry<'a> {
    catalog: &'a TypeCatalog,
    selector: Option<&'a dyn Fn(&TypeDescriptor) -> String>,
    schemas: IndexMap<String, Schema>,
}

impl<'a> SchemaRegistry<'a> {
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        Self {
            catalog,
            selector: None,
            schemas: IndexMap::new(),
        }
    }

    /// Use a custom key selector for types without an explicit schema name.
    pub fn with_selector(mut self, selector: Option<&'a dyn Fn(&TypeDescriptor) -> String>) -> Self {
        self.selector = selector;
        self
    }

    /// Schema key of a described type.
    pub fn key_for(&self, descriptor: &TypeDescriptor) -> String {
        if let Some(name) = descriptor.schema_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return sanitize_key(name);
        }
        match self.selector {
            Some(selector) => sanitize_key(&selector(descriptor)),
            None => sanitize_key(&descriptor.path),
        }
    }

    /// Resolve a type to a reference (composite types) or an inline schema.
    pub fn resolve(&mut self, ty: &TypeRef) -> Result<Schema> {
        match ty {
            TypeRef::Scalar(scalar) => Ok(Schema::scalar(*scalar)),
            TypeRef::FormCollection => Ok(Schema::map(Schema::typed("string"))),
            TypeRef::Optional(inner) => {
                let mut schema = self.resolve(inner)?;
                if !schema.is_reference() {
                    schema.nullable = true;
                }
                Ok(schema)
            }
            TypeRef::Sequence(item) => Ok(Schema::array(self.resolve(item)?)),
            TypeRef::Map(value) => Ok(Schema::map(self.resolve(value)?)),
            TypeRef::Named(path) => self.resolve_named(path),
        }
    }

    fn resolve_named(&mut self, path: &str) -> Result<Schema> {
        let catalog = self.catalog;
        let descriptor = catalog
            .get(path)
            .ok_or_else(|| Error::schema(path, "type is not described in the type catalog"))?;
        let key = self.key_for(descriptor);

        if self.schemas.contains_key(&key) {
            return Ok(Schema::reference(&key));
        }

        match &descriptor.kind {
            TypeKind::Enum(variants) => Ok(Schema::string_enum(variants)),
            TypeKind::Opaque => Err(Error::schema(path, "type has no describable shape")),
            TypeKind::Object(_) => {
                debug!("Registering schema {} for {}", key, path);
                self.schemas.insert(key.clone(), Schema::object());

                match self.object_body(descriptor) {
                    Ok(body) => {
                        self.schemas.insert(key.clone(), body);
                        Ok(Schema::reference(&key))
                    }
                    Err(e) => {
                        debug!("Rolling back schema {}: {}", key, e);
                        self.schemas.shift_remove(&key);
                        Err(e)
                    }
                }
            }
        }
    }

    fn object_body(&mut self, descriptor: &TypeDescriptor) -> Result<Schema> {
        let mut body = Schema::object();
        body.description = descriptor.description.clone();

        for property in descriptor.properties().iter().filter(|p| !p.is_hidden()) {
            let wire_name = property.wire_name();
            let mut schema = self.resolve(&property.ty)?;
            if !schema.is_reference() && schema.description.is_none() {
                schema.description = property.description.clone();
            }
            if !property.settable {
                schema = schema.read_only();
            }

            if property.required {
                body.required.push(wire_name.clone());
            }
            body.properties.insert(wire_name, schema);
        }

        Ok(body)
    }

    /// Reference to an already registered type, without registering it.
    pub fn find_reference(&self, ty: &TypeRef) -> Option<Schema> {
        let TypeRef::Named(path) = ty.unwrap_optional() else {
            return None;
        };
        let descriptor = self.catalog.get(path)?;
        let key = self.key_for(descriptor);
        self.schemas
            .contains_key(&key)
            .then(|| Schema::reference(&key))
    }

    /// Registered body of an object type, resolving it first if needed.
    pub fn object_schema(&mut self, path: &str) -> Result<&Schema> {
        let resolved = self.resolve_named(path)?;
        let key = resolved
            .reference_key()
            .map(str::to_string)
            .ok_or_else(|| Error::schema(path, "type is not an object type"))?;
        self.schemas
            .get(&key)
            .ok_or_else(|| Error::schema(path, "schema was not registered"))
    }

    pub fn get(&self, key: &str) -> Option<&Schema> {
        self.schemas.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.schemas.contains_key(key)
    }

    /// Every registered schema, keyed by schema key.
    pub fn schemas(&self) -> &IndexMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> IndexMap<String, Schema> {
        self.schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
