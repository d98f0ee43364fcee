//! OpenAPI 3.0 schema object (the subset the registry produces).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::describe::ScalarType;

/// Prefix of component references.
pub const COMPONENT_PREFIX: &str = "#/components/schemas/";

fn is_false(value: &bool) -> bool {
    !*value
}

/// An API schema: either a `$ref` to a registered component or an inline body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
}

impl Schema {
    /// Reference to a registered component.
    pub fn reference(key: &str) -> Self {
        Self {
            reference: Some(format!("{COMPONENT_PREFIX}{key}")),
            ..Default::default()
        }
    }

    /// Keywords beside a `$ref` are ignored by OpenAPI 3.0; a read-only
    /// reference is wrapped in `allOf` so the flag survives.
    pub fn read_only(self) -> Self {
        if self.is_reference() {
            Self {
                all_of: vec![self],
                read_only: true,
                ..Default::default()
            }
        } else {
            Self {
                read_only: true,
                ..self
            }
        }
    }

    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    fn formatted(schema_type: &str, format: &str) -> Self {
        Self {
            format: Some(format.to_string()),
            ..Self::typed(schema_type)
        }
    }

    pub fn object() -> Self {
        Self::typed("object")
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::typed("array")
        }
    }

    /// String-keyed map with the given value schema.
    pub fn map(value: Schema) -> Self {
        Self {
            additional_properties: Some(Box::new(value)),
            ..Self::object()
        }
    }

    /// String schema restricted to the given values.
    pub fn string_enum(values: &[String]) -> Self {
        Self {
            enumeration: values.to_vec(),
            ..Self::typed("string")
        }
    }

    /// Fixed primitive shape of a scalar, including its refinements.
    pub fn scalar(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::String => Self::typed("string"),
            ScalarType::Char => Self {
                min_length: Some(1),
                max_length: Some(1),
                ..Self::typed("string")
            },
            ScalarType::Bool => Self::typed("boolean"),
            ScalarType::Byte => Self::formatted("string", "byte"),
            ScalarType::Int16 | ScalarType::Int32 | ScalarType::UInt32 => {
                Self::formatted("integer", "int32")
            }
            ScalarType::Int64 | ScalarType::UInt64 => Self::formatted("integer", "int64"),
            ScalarType::Float => Self::formatted("number", "float"),
            ScalarType::Double | ScalarType::Decimal => Self::formatted("number", "double"),
            ScalarType::DateTime => Self::formatted("string", "date-time"),
            ScalarType::Date => Self::formatted("string", "date"),
            ScalarType::Duration => Self::formatted("string", "duration"),
            ScalarType::Guid => Self {
                example: Some(serde_json::Value::String(uuid::Uuid::nil().to_string())),
                ..Self::formatted("string", "uuid")
            },
            ScalarType::Uri => Self::formatted("string", "uri"),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Registry key of a `$ref` schema.
    pub fn reference_key(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(COMPONENT_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_serializes_as_dollar_ref() {
        let json = serde_json::to_value(Schema::reference("shop.Widget")).unwrap();
        assert_eq!(json, serde_json::json!({"$ref": "#/components/schemas/shop.Widget"}));
    }

    #[test]
    fn test_scalar_refinements() {
        let char_schema = Schema::scalar(ScalarType::Char);
        assert_eq!(char_schema.min_length, Some(1));
        assert_eq!(char_schema.max_length, Some(1));

        let guid = Schema::scalar(ScalarType::Guid);
        assert_eq!(
            guid.example,
            Some(serde_json::json!("00000000-0000-0000-0000-000000000000"))
        );
    }

    #[test]
    fn test_reference_key() {
        let schema = Schema::reference("a.B");
        assert_eq!(schema.reference_key(), Some("a.B"));
        assert_eq!(Schema::object().reference_key(), None);
    }
}
