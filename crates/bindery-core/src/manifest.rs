//! Declarative function-app manifest.
//!
//! The CLI reads a JSON or YAML file with the same information the builder
//! API takes, and replays it through [`FunctionHostBuilder`].
//!
//! ```yaml
//! namespace: shop_functions
//! types:
//!   - path: shop::GetWidget
//!     kind: { object: [{ name: Id, type: { scalar: string } }] }
//! routes:
//!   - route: /widgets
//!     functions:
//!       - command: shop::GetWidget
//!         route: "{id}"
//!         verbs: [get]
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::describe::{TypeDescriptor, TypeRef};
use crate::error::{Error, Result};
use crate::model::builder::{
    EventFeedFunctionBuilder, FunctionApp, FunctionHostBuilder, HttpFunctionBuilder,
    ServiceRegistration, header_mappings,
};
use crate::model::{AuthorizationKind, HttpMethod};
use crate::openapi::{DocumentInfo, OutputFormat, SecurityScheme};

/// Root of a manifest file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppManifest {
    /// Namespace of the compiled module; the CLI falls back to the project
    /// directory name.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
    #[serde(default)]
    pub services: Vec<ServiceRegistration>,
    #[serde(default)]
    pub validator: Option<String>,
    #[serde(default)]
    pub authorization: AuthorizationManifest,
    #[serde(default)]
    pub defaults: DefaultsManifest,
    #[serde(default)]
    pub openapi: Option<OpenApiManifest>,
    #[serde(default)]
    pub output_source_folder: Option<PathBuf>,
    #[serde(default)]
    pub routes: Vec<RouteManifest>,
    #[serde(default)]
    pub event_feeds: Vec<EventFeedManifest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationManifest {
    #[serde(default)]
    pub default: Option<AuthorizationKind>,
    #[serde(default)]
    pub token_header: Option<String>,
    #[serde(default)]
    pub token_validator: Option<String>,
    #[serde(default)]
    pub claims_principal_authorization: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsManifest {
    /// Property → header name.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub response_handler: Option<String>,
    #[serde(default)]
    pub command_deserializer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenApiManifest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub user_interface_route: Option<String>,
    #[serde(default)]
    pub redoc_user_interface_route: Option<String>,
    #[serde(default)]
    pub route_prefix: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentManifest>,
    #[serde(default)]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentManifest {
    pub route: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

/// A route family.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteManifest {
    pub route: String,
    #[serde(default)]
    pub openapi_name: Option<String>,
    #[serde(default)]
    pub openapi_description: Option<String>,
    #[serde(default)]
    pub authorization: Option<AuthorizationKind>,
    #[serde(default)]
    pub claims_principal_authorization: Option<String>,
    #[serde(default)]
    pub functions: Vec<HttpFunctionManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpFunctionManifest {
    pub command: String,
    /// Sub-route appended to the family route.
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub verbs: Vec<HttpMethod>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub returns: Option<TypeRef>,
    #[serde(default)]
    pub deserializer: Option<String>,
    #[serde(default)]
    pub authorization: Option<AuthorizationKind>,
    #[serde(default)]
    pub token_header: Option<String>,
    #[serde(default)]
    pub token_validator: Option<String>,
    #[serde(default)]
    pub claims_principal_authorization: Option<String>,
    /// Property → header name.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub response_handler: Option<String>,
    #[serde(default)]
    pub openapi_description: Option<String>,
    #[serde(default)]
    pub openapi_summary: Option<String>,
    #[serde(default)]
    pub openapi_ignore: bool,
    #[serde(default)]
    pub responses: IndexMap<u16, ResponseManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseManifest {
    pub description: String,
    #[serde(default, rename = "type")]
    pub response_type: Option<TypeRef>,
}

/// Change-feed functions sharing one connection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventFeedManifest {
    pub connection: String,
    pub database: String,
    #[serde(default)]
    pub functions: Vec<ChangeFeedFunctionManifest>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeFeedFunctionManifest {
    pub command: String,
    pub collection: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lease_collection_name: Option<String>,
    #[serde(default)]
    pub lease_database_name: Option<String>,
    #[serde(default)]
    pub lease_connection_name: Option<String>,
    #[serde(default)]
    pub lease_collection_prefix: Option<String>,
    #[serde(default)]
    pub error_handler: Option<String>,
    #[serde(default)]
    pub create_lease_collection_if_not_exists: Option<bool>,
    #[serde(default)]
    pub start_from_beginning: Option<bool>,
    #[serde(default)]
    pub convert_to_pascal_case: Option<bool>,
    #[serde(default)]
    pub max_items_per_invocation: Option<u32>,
    #[serde(default)]
    pub feed_poll_delay: Option<u32>,
    #[serde(default)]
    pub lease_acquire_interval: Option<u32>,
    #[serde(default)]
    pub lease_expiration_interval: Option<u32>,
    #[serde(default)]
    pub lease_renew_interval: Option<u32>,
    #[serde(default)]
    pub checkpoint_frequency: Option<u32>,
    #[serde(default)]
    pub leases_collection_throughput: Option<u32>,
}

impl AppManifest {
    /// Load a manifest; `.yaml`/`.yml` files are read as YAML, anything else
    /// as JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let parsed = if is_yaml {
            Self::from_yaml_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        parsed.map_err(|e| Error::Manifest(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Manifest(e.to_string()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Replay the manifest through the builder.
    pub fn into_app(self) -> Result<FunctionApp> {
        let mut host = FunctionHostBuilder::new();

        host.types(|catalog| {
            for descriptor in self.types {
                catalog.insert(descriptor);
            }
        });

        host.setup(|services| {
            for registration in self.services {
                services.add(
                    registration.service,
                    registration.implementation,
                    registration.lifetime,
                );
            }
        });

        if let Some(validator) = self.validator {
            host.add_validator(validator);
        }

        let authorization = self.authorization;
        host.authorization(|auth| {
            if let Some(kind) = authorization.default {
                auth.default_authorization(kind);
            }
            if let Some(header) = authorization.token_header {
                auth.token_header(header);
            }
            if let Some(validator) = authorization.token_validator {
                auth.token_validator(validator);
            }
            if let Some(claims) = authorization.claims_principal_authorization {
                auth.claims_principal_authorization(claims);
            }
        });

        if !self.defaults.headers.is_empty() {
            host.default_header_binding(header_mappings(self.defaults.headers));
        }
        if let Some(handler) = self.defaults.response_handler {
            host.default_response_handler(handler);
        }
        if let Some(deserializer) = self.defaults.command_deserializer {
            host.default_command_deserializer(deserializer);
        }

        if let Some(openapi) = self.openapi {
            apply_openapi(&mut host, openapi);
        }
        if let Some(folder) = self.output_source_folder {
            host.output_source_to(folder);
        }

        let routes = self.routes;
        let feeds = self.event_feeds;
        host.functions(|functions| {
            for family in routes {
                functions.http_route(family.route, |route| {
                    if let Some(name) = family.openapi_name {
                        route.openapi_name(name);
                    }
                    if let Some(description) = family.openapi_description {
                        route.openapi_description(description);
                    }
                    if let Some(kind) = family.authorization {
                        route.authorization(kind);
                    }
                    if let Some(claims) = family.claims_principal_authorization {
                        route.claims_principal_authorization(claims);
                    }
                    for function in family.functions {
                        let command = function.command.clone();
                        apply_http_function(&mut route.http_function(command), function);
                    }
                });
            }

            for feed in feeds {
                functions.event_feed(feed.connection, feed.database, |builder| {
                    for function in feed.functions {
                        let mut definition = builder
                            .change_feed_function(function.command.clone(), function.collection.clone());
                        apply_change_feed_function(&mut definition, function);
                    }
                });
            }
        });

        Ok(host.build())
    }
}

fn apply_openapi(host: &mut FunctionHostBuilder, manifest: OpenApiManifest) {
    host.openapi(|openapi| {
        if let Some(title) = manifest.title {
            openapi.title(title);
        }
        if let Some(version) = manifest.version {
            openapi.version(version);
        }
        if let Some(description) = manifest.description {
            openapi.description(description);
        }
        for server in manifest.servers {
            openapi.server(server);
        }
        openapi.output_format(manifest.output_format);
        if let Some(route) = manifest.user_interface_route {
            openapi.user_interface(Some(&route));
        }
        if let Some(route) = manifest.redoc_user_interface_route {
            openapi.redoc_user_interface(Some(&route));
        }
        if let Some(prefix) = manifest.route_prefix {
            openapi.route_prefix(prefix);
        }
        for document in manifest.documents {
            let mut info = DocumentInfo::new(document.route);
            info.title = document.title;
            info.version = document.version;
            info.description = document.description;
            info.selected = document.selected;
            openapi.document(info);
        }
        for (name, scheme) in manifest.security_schemes {
            openapi.security_scheme(name, scheme);
        }
    });
}

fn apply_http_function(builder: &mut HttpFunctionBuilder<'_>, manifest: HttpFunctionManifest) {
    if let Some(route) = &manifest.route {
        builder.route(route);
    }
    builder.verbs(manifest.verbs);
    if let Some(name) = manifest.name {
        builder.name(name);
    }
    if let Some(result) = manifest.returns {
        builder.returns(result);
    }
    if let Some(deserializer) = manifest.deserializer {
        builder.deserializer(deserializer);
    }
    if let Some(kind) = manifest.authorization {
        builder.authorization(kind);
    }
    if let Some(header) = manifest.token_header {
        builder.token_header(header);
    }
    if let Some(validator) = manifest.token_validator {
        builder.token_validator(validator);
    }
    if let Some(claims) = manifest.claims_principal_authorization {
        builder.claims_principal_authorization(claims);
    }
    for (property, header) in manifest.headers {
        builder.header(property, header);
    }
    if let Some(handler) = manifest.response_handler {
        builder.response_handler(handler);
    }
    if let Some(description) = manifest.openapi_description {
        builder.openapi_description(description);
    }
    if let Some(summary) = manifest.openapi_summary {
        builder.openapi_summary(summary);
    }
    if manifest.openapi_ignore {
        builder.openapi_ignore();
    }
    for (status, response) in manifest.responses {
        builder.openapi_response(status, response.description, response.response_type);
    }
}

fn apply_change_feed_function(
    builder: &mut EventFeedFunctionBuilder<'_>,
    manifest: ChangeFeedFunctionManifest,
) {
    if let Some(name) = manifest.name {
        builder.name(name);
    }
    if let Some(name) = manifest.lease_collection_name {
        builder.lease_collection_name(name);
    }
    if let Some(name) = manifest.lease_database_name {
        builder.lease_database_name(name);
    }
    if let Some(name) = manifest.lease_connection_name {
        builder.lease_connection_name(name);
    }
    if let Some(prefix) = manifest.lease_collection_prefix {
        builder.lease_collection_prefix(prefix);
    }
    if let Some(handler) = manifest.error_handler {
        builder.error_handler(handler);
    }
    if let Some(create) = manifest.create_lease_collection_if_not_exists {
        builder.create_lease_collection_if_not_exists(create);
    }
    if let Some(start) = manifest.start_from_beginning {
        builder.start_from_beginning(start);
    }
    if let Some(convert) = manifest.convert_to_pascal_case {
        builder.convert_to_pascal_case(convert);
    }

    if let Some(value) = manifest.max_items_per_invocation {
        builder.max_items_per_invocation(value);
    }
    if let Some(value) = manifest.feed_poll_delay {
        builder.feed_poll_delay(value);
    }
    if let Some(value) = manifest.lease_acquire_interval {
        builder.lease_acquire_interval(value);
    }
    if let Some(value) = manifest.lease_expiration_interval {
        builder.lease_expiration_interval(value);
    }
    if let Some(value) = manifest.lease_renew_interval {
        builder.lease_renew_interval(value);
    }
    if let Some(value) = manifest.checkpoint_frequency {
        builder.checkpoint_frequency(value);
    }
    if let Some(value) = manifest.leases_collection_throughput {
        builder.leases_collection_throughput(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Trigger;
    use tempfile::TempDir;

    const SHOP_YAML: &str = r#"
namespace: shop_functions
types:
  - path: shop::GetWidget
    kind:
      object:
        - { name: Id, type: { scalar: guid } }
  - path: shop::Widget
    kind:
      object:
        - { name: Name, type: { scalar: string } }
services:
  - service: shop::WidgetStore
    implementation: shop::SqlWidgetStore
    lifetime: singleton
authorization:
  default: anonymous
openapi:
  title: Shop
  version: 1.0.0
  user_interface_route: openapi
routes:
  - route: /widgets
    openapi_name: Widgets
    functions:
      - command: shop::GetWidget
        route: "{id}"
        verbs: [get]
        returns: { named: shop::Widget }
        responses:
          404: { description: Not found }
event_feeds:
  - connection: CosmosConnection
    database: shop
    functions:
      - command: shop::WidgetChanged
        collection: widgets
        start_from_beginning: true
        feed_poll_delay: 500
"#;

    #[test]
    fn test_yaml_manifest_builds_app() {
        let manifest = AppManifest::from_yaml_str(SHOP_YAML).unwrap();
        assert_eq!(manifest.namespace.as_deref(), Some("shop_functions"));

        let app = manifest.into_app().unwrap();

        assert_eq!(app.definitions.len(), 2);
        assert_eq!(app.catalog.get("shop::GetWidget").unwrap().module, "shop");
        assert_eq!(app.services.len(), 1);
        assert_eq!(app.defaults.authorization, Some(AuthorizationKind::Anonymous));
        assert_eq!(app.openapi.title.as_deref(), Some("Shop"));
        assert_eq!(app.openapi.user_interface_route.as_deref(), Some("openapi"));

        let Trigger::Http(http) = &app.definitions[0].trigger else {
            panic!("expected an HTTP trigger");
        };
        assert_eq!(http.route.as_deref(), Some("widgets/{id}"));
        assert!(http.verbs.contains(&HttpMethod::Get));
        assert_eq!(http.openapi_responses[&404].description, "Not found");
        assert_eq!(
            app.definitions[0].command_result_type,
            Some(TypeRef::named("shop::Widget"))
        );

        let Trigger::EventFeed(feed) = &app.definitions[1].trigger else {
            panic!("expected an event-feed trigger");
        };
        assert_eq!(feed.collection_name, "widgets");
        assert!(feed.start_from_beginning);
        assert_eq!(feed.feed_poll_delay, Some(500));
        assert!(feed.create_lease_collection_if_not_exists);
    }

    #[test]
    fn test_from_path_picks_format_by_extension() {
        let temp = TempDir::new().unwrap();
        let json = temp.path().join("bindery.json");
        std::fs::write(
            &json,
            r#"{"namespace":"shop","routes":[{"route":"ping","functions":[{"command":"shop::Ping"}]}]}"#,
        )
        .unwrap();

        let manifest = AppManifest::from_path(&json).unwrap();

        assert_eq!(manifest.routes[0].functions[0].command, "shop::Ping");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bindery.yaml");
        std::fs::write(&path, "namespace: shop\nroutez: []\n").unwrap();

        let err = AppManifest::from_path(&path).unwrap_err();

        assert!(matches!(err, Error::Manifest(_)));
        assert!(err.to_string().contains("bindery.yaml"));
    }
}
