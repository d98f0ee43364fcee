//! OpenAPI output configuration.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::document::SecurityScheme;
use super::filter::{DocumentFilter, HttpFunctionFilter, OperationFilter, ParameterFilter};
use crate::error::{Error, Result};
use crate::schema::SchemaIdSelector;

/// Serialization format of emitted documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// A static asset injected into the explorer bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedAsset {
    /// Logical file name, e.g. `custom.css`.
    pub name: String,
    pub content: Vec<u8>,
    /// Media attribute for stylesheets.
    #[serde(default)]
    pub media: Option<String>,
}

impl InjectedAsset {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            media: None,
        }
    }
}

/// One emitted document.
pub struct DocumentInfo {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Route the document is served under, e.g. `openapi.yaml` or `v2/openapi.yaml`.
    pub route: String,
    /// Pre-selected in the explorer's document picker.
    pub selected: bool,
    pub function_filter: Option<Box<dyn HttpFunctionFilter>>,
}

impl DocumentInfo {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            title: None,
            version: None,
            description: None,
            route: route.into().trim_start_matches('/').to_string(),
            selected: false,
            function_filter: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    pub fn function_filter(mut self, filter: impl HttpFunctionFilter + 'static) -> Self {
        self.function_filter = Some(Box::new(filter));
        self
    }
}

impl fmt::Debug for DocumentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentInfo")
            .field("title", &self.title)
            .field("version", &self.version)
            .field("route", &self.route)
            .field("selected", &self.selected)
            .field("function_filter", &self.function_filter.is_some())
            .finish()
    }
}

/// Everything that shapes the emitted OpenAPI documents.
#[derive(Default)]
pub struct OpenApiConfiguration {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub servers: Vec<String>,
    pub output_format: OutputFormat,
    /// Route of the Swagger UI explorer, when requested.
    pub user_interface_route: Option<String>,
    /// Route of the ReDoc explorer, when requested.
    pub redoc_user_interface_route: Option<String>,
    /// Overrides the `host.json` route prefix.
    pub route_prefix: Option<String>,
    pub documents: Vec<DocumentInfo>,
    pub security_schemes: IndexMap<String, SecurityScheme>,
    pub document_filters: Vec<Box<dyn DocumentFilter>>,
    pub redoc_document_filters: Vec<Box<dyn DocumentFilter>>,
    pub operation_filters: Vec<Box<dyn OperationFilter>>,
    pub parameter_filters: Vec<Box<dyn ParameterFilter>>,
    pub schema_id_selector: Option<SchemaIdSelector>,
    pub injected_stylesheets: Vec<InjectedAsset>,
    pub injected_scripts: Vec<InjectedAsset>,
    pub injected_resources: Vec<InjectedAsset>,
    pub injected_logo: Option<InjectedAsset>,
}

impl OpenApiConfiguration {
    /// Whether any OpenAPI setting was made.
    pub fn is_requested(&self) -> bool {
        self.title.is_some()
            || self.version.is_some()
            || self.user_interface_route.is_some()
            || self.redoc_user_interface_route.is_some()
            || !self.documents.is_empty()
    }

    /// Documents are emitted only when a title and a version are both set.
    pub fn is_enabled(&self) -> bool {
        self.title.is_some() && self.version.is_some()
    }

    /// Reject a partial configuration.
    pub fn validate(&self) -> Result<()> {
        if self.is_requested() && !self.is_enabled() {
            return Err(Error::configuration(
                "a title and a version must be specified for OpenAPI output",
            ));
        }
        Ok(())
    }

    /// Route of the default document.
    pub fn default_document_route(&self) -> String {
        format!("openapi.{}", self.output_format.extension())
    }
}

impl fmt::Debug for OpenApiConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenApiConfiguration")
            .field("title", &self.title)
            .field("version", &self.version)
            .field("servers", &self.servers)
            .field("output_format", &self.output_format)
            .field("user_interface_route", &self.user_interface_route)
            .field("redoc_user_interface_route", &self.redoc_user_interface_route)
            .field("route_prefix", &self.route_prefix)
            .field("documents", &self.documents)
            .field("security_schemes", &self.security_schemes.keys().collect::<Vec<_>>())
            .field("document_filters", &self.document_filters.len())
            .field("operation_filters", &self.operation_filters.len())
            .field("parameter_filters", &self.parameter_filters.len())
            .finish_non_exhaustive()
    }
}
