//! Type description model.
//!
//! A [`TypeDescriptor`] is the public shape of one user type: the properties
//! the pipeline may bind, the capability contracts it implements and the crate
//! that defines it. Descriptors are declared explicitly (builder, manifest or
//! `#[derive(Describe)]`), never discovered at runtime.

use serde::{Deserialize, Serialize};

/// Scalar types with a fixed API schema shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Char,
    Bool,
    Byte,
    Int16,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Decimal,
    DateTime,
    Date,
    Duration,
    Guid,
    Uri,
}

impl ScalarType {
    /// Rust spelling of the scalar, used by synthesized source.
    pub fn rust_type(&self) -> &'static str {
        match self {
            Self::String | Self::Decimal | Self::Uri => "String",
            Self::Char => "char",
            Self::Bool => "bool",
            Self::Byte => "u8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::Float => "f32",
            Self::Double => "f64",
            Self::DateTime | Self::Date | Self::Duration => "String",
            Self::Guid => "uuid::Uuid",
        }
    }
}

/// Reference to a type from a property or definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Scalar(ScalarType),
    /// A type registered in the catalog under its fully-qualified path.
    Named(String),
    Sequence(Box<TypeRef>),
    /// String-keyed map; the boxed type is the value type.
    Map(Box<TypeRef>),
    Optional(Box<TypeRef>),
    /// Posted form fields bound as a whole.
    FormCollection,
}

impl TypeRef {
    pub fn string() -> Self {
        Self::Scalar(ScalarType::String)
    }

    pub fn named(path: impl Into<String>) -> Self {
        Self::Named(path.into())
    }

    pub fn sequence(item: TypeRef) -> Self {
        Self::Sequence(Box::new(item))
    }

    pub fn map(value: TypeRef) -> Self {
        Self::Map(Box::new(value))
    }

    pub fn optional(inner: TypeRef) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// The type with any `Optional` wrappers removed.
    pub fn unwrap_optional(&self) -> &TypeRef {
        match self {
            Self::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Paths of every named type referenced, outermost first.
    pub fn named_paths(&self) -> Vec<&str> {
        match self {
            Self::Named(path) => vec![path.as_str()],
            Self::Sequence(inner) | Self::Map(inner) | Self::Optional(inner) => inner.named_paths(),
            Self::Scalar(_) | Self::FormCollection => Vec::new(),
        }
    }

    /// Human-readable spelling for log messages.
    pub fn display_name(&self) -> String {
        match self {
            Self::Scalar(scalar) => scalar.rust_type().to_string(),
            Self::Named(path) => path.clone(),
            Self::Sequence(item) => format!("Vec<{}>", item.display_name()),
            Self::Map(value) => format!("HashMap<String, {}>", value.display_name()),
            Self::Optional(inner) => format!("Option<{}>", inner.display_name()),
            Self::FormCollection => "FormCollection".to_string(),
        }
    }
}

/// Whether a type can be referenced from generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    /// `pub(crate)`, private, or otherwise unreachable from another crate.
    Restricted,
}

/// Capability contracts the pipeline dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Command built from one change-feed document.
    SingleDocument,
    /// Command built from a batch of change-feed documents.
    DocumentBatch,
    /// Command whose response is streamed.
    Stream,
    /// Result type carrying validation failures.
    ValidationResult,
}

/// A trait (contract) implemented by a described type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Trait path, e.g. `bindery::ChangeFeedDocument`.
    pub path: String,
    /// Crate that defines the trait.
    pub module: String,
    /// Pipeline capability this contract stands for, if any.
    #[serde(default)]
    pub capability: Option<Capability>,
}

impl Contract {
    pub fn new(path: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            module: module.into(),
            capability: None,
        }
    }

    /// A contract that maps to a pipeline capability.
    pub fn capability(capability: Capability) -> Self {
        let path = match capability {
            Capability::SingleDocument => "bindery::ChangeFeedDocument",
            Capability::DocumentBatch => "bindery::ChangeFeedBatch",
            Capability::Stream => "bindery::StreamCommand",
            Capability::ValidationResult => "bindery::ValidationResult",
        };
        Self {
            path: path.to_string(),
            module: "bindery".to_string(),
            capability: Some(capability),
        }
    }
}

/// One public property of a described object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property name as declared on the type.
    pub name: String,
    /// Explicit wire-name override.
    #[serde(default)]
    pub wire_name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Explicitly marked required.
    #[serde(default)]
    pub required: bool,
    /// Whether the property can be assigned; unsettable properties are read-only.
    #[serde(default = "default_true")]
    pub settable: bool,
    /// Populated from the caller's security context, never from the payload.
    #[serde(default)]
    pub security: bool,
    /// Explicitly excluded from serialization.
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            wire_name: None,
            ty,
            required: false,
            settable: true,
            security: false,
            ignored: false,
            description: None,
        }
    }

    pub fn rename(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.settable = false;
        self
    }

    pub fn security(mut self) -> Self {
        self.security = true;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Excluded from schemas and bindings.
    pub fn is_hidden(&self) -> bool {
        self.security || self.ignored
    }

    /// Wire name: explicit override, else the camel-cased property name.
    pub fn wire_name(&self) -> String {
        match &self.wire_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => crate::schema::camel_case(&self.name),
        }
    }
}

/// Shape of a named type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Object(Vec<PropertyDescriptor>),
    /// Fieldless enum; the strings are the variant names.
    Enum(Vec<String>),
    /// A type with no describable shape (handles, trait objects).
    Opaque,
}

/// Public shape of a named user type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Fully-qualified path, e.g. `shop::commands::GetWidget`.
    pub path: String,
    /// Crate that defines the type; empty until resolved from the path.
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub visibility: Visibility,
    /// Explicit schema-key override.
    #[serde(default)]
    pub schema_name: Option<String>,
    pub kind: TypeKind,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TypeDescriptor {
    /// Describe an object type. The module defaults to the first path segment.
    pub fn object(path: impl Into<String>) -> Self {
        Self::with_kind(path.into(), TypeKind::Object(Vec::new()))
    }

    /// Describe a fieldless enum.
    pub fn enumeration<I, S>(path: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variants = variants.into_iter().map(Into::into).collect();
        Self::with_kind(path.into(), TypeKind::Enum(variants))
    }

    pub fn opaque(path: impl Into<String>) -> Self {
        Self::with_kind(path.into(), TypeKind::Opaque)
    }

    fn with_kind(path: String, kind: TypeKind) -> Self {
        let module = path.split("::").next().unwrap_or_default().to_string();
        Self {
            path,
            module,
            visibility: Visibility::Public,
            schema_name: None,
            kind,
            contracts: Vec::new(),
            description: None,
        }
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        if let TypeKind::Object(properties) = &mut self.kind {
            properties.push(property);
        }
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn restricted(mut self) -> Self {
        self.visibility = Visibility::Restricted;
        self
    }

    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    pub fn implements(mut self, contract: Contract) -> Self {
        self.contracts.push(contract);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Last path segment.
    pub fn short_name(&self) -> &str {
        self.path.rsplit("::").next().unwrap_or(&self.path)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.contracts
            .iter()
            .any(|c| c.capability == Some(capability))
    }

    /// Properties of an object type; empty for every other kind.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        match &self.kind {
            TypeKind::Object(properties) => properties,
            _ => &[],
        }
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties().iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_defaults_to_crate_segment() {
        let ty = TypeDescriptor::object("shop::commands::GetWidget");
        assert_eq!(ty.module, "shop");
        assert_eq!(ty.short_name(), "GetWidget");
    }

    #[test]
    fn test_wire_name_override() {
        let plain = PropertyDescriptor::new("FilterText", TypeRef::string());
        assert_eq!(plain.wire_name(), "filterText");

        let renamed = PropertyDescriptor::new("FilterText", TypeRef::string()).rename("q");
        assert_eq!(renamed.wire_name(), "q");
    }

    #[test]
    fn test_unwrap_optional() {
        let ty = TypeRef::optional(TypeRef::optional(TypeRef::Scalar(ScalarType::Int32)));
        assert_eq!(ty.unwrap_optional(), &TypeRef::Scalar(ScalarType::Int32));
        assert_eq!(ty.display_name(), "Option<Option<i32>>");
    }

    #[test]
    fn test_capability_lookup() {
        let ty = TypeDescriptor::object("feed::Changed")
            .implements(Contract::capability(Capability::SingleDocument));
        assert!(ty.has_capability(Capability::SingleDocument));
        assert!(!ty.has_capability(Capability::DocumentBatch));
    }
}
