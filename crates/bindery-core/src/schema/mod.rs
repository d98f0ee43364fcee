//! Schema synthesis: described types to OpenAPI schemas.

mod model;
mod registry;

use heck::ToLowerCamelCase;

pub use model::{COMPONENT_PREFIX, Schema};
pub use registry::{SchemaIdSelector, SchemaRegistry};

/// Default wire name of a property: `FilterText` → `filterText`.
pub fn camel_case(name: &str) -> String {
    name.to_lower_camel_case()
}

/// Turn a type path into a legal component key (`^[a-zA-Z0-9.\-_]+$`).
pub fn sanitize_key(name: &str) -> String {
    name.replace("::", ".")
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
