//! Programmatic construction of a function app.
//!
//! ```
//! use bindery_core::describe::{PropertyDescriptor, TypeDescriptor, TypeRef};
//! use bindery_core::model::builder::FunctionHostBuilder;
//! use bindery_core::model::{AuthorizationKind, HttpMethod};
//!
//! let mut host = FunctionHostBuilder::new();
//! host.types(|catalog| {
//!     catalog.insert(
//!         TypeDescriptor::object("shop::GetWidget")
//!             .property(PropertyDescriptor::new("Id", TypeRef::string())),
//!     );
//! })
//! .authorization(|auth| {
//!     auth.default_authorization(AuthorizationKind::Anonymous);
//! })
//! .functions(|functions| {
//!     functions.http_route("/widgets", |route| {
//!         route
//!             .http_function("shop::GetWidget")
//!             .route("{id}")
//!             .verb(HttpMethod::Get);
//!     });
//! });
//!
//! let app = host.build();
//! assert_eq!(app.definitions.len(), 1);
//! ```

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    AuthorizationKind, EventFeedTrigger, FunctionDefinition, HeaderBindingConfiguration,
    HttpMethod, HttpTrigger, ResponseConfiguration, SharedRoute, Trigger, join_route,
};
use crate::describe::{Describe, TypeCatalog, TypeDescriptor, TypeRef};
use crate::openapi::{
    DocumentFilter, DocumentInfo, InjectedAsset, OpenApiConfiguration, OperationFilter,
    OutputFormat, ParameterFilter, SecurityScheme,
};

/// Lifetime of a registered service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLifetime {
    #[default]
    Transient,
    Scoped,
    Singleton,
}

/// One dependency-injection registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    /// Service type path.
    pub service: String,
    /// Implementation type path; the service itself when absent.
    #[serde(default)]
    pub implementation: Option<String>,
    #[serde(default)]
    pub lifetime: ServiceLifetime,
}

/// Services registered with the function app's container.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceCollection {
    registrations: Vec<ServiceRegistration>,
}

impl ServiceCollection {
    pub fn add(
        &mut self,
        service: impl Into<String>,
        implementation: Option<String>,
        lifetime: ServiceLifetime,
    ) -> &mut Self {
        self.registrations.push(ServiceRegistration {
            service: service.into(),
            implementation,
            lifetime,
        });
        self
    }

    pub fn add_transient(&mut self, service: impl Into<String>) -> &mut Self {
        self.add(service, None, ServiceLifetime::Transient)
    }

    pub fn add_singleton(
        &mut self,
        service: impl Into<String>,
        implementation: impl Into<String>,
    ) -> &mut Self {
        self.add(service, Some(implementation.into()), ServiceLifetime::Singleton)
    }

    pub fn add_scoped(
        &mut self,
        service: impl Into<String>,
        implementation: impl Into<String>,
    ) -> &mut Self {
        self.add(service, Some(implementation.into()), ServiceLifetime::Scoped)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceRegistration> {
        self.registrations.iter()
    }

    /// Every type path mentioned by a registration.
    pub fn type_paths(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().flat_map(|r| {
            std::iter::once(r.service.as_str()).chain(r.implementation.as_deref())
        })
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Global defaults applied by the normalizer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostDefaults {
    pub validator: Option<String>,
    pub authorization: Option<AuthorizationKind>,
    pub token_header: Option<String>,
    pub token_validator: Option<String>,
    pub claims_principal_authorization: Option<String>,
    pub header_binding: Option<HeaderBindingConfiguration>,
    pub response_handler: Option<String>,
    pub command_deserializer: Option<String>,
}

/// A fully declared function app, ready for the pipeline.
#[derive(Debug, Default)]
pub struct FunctionApp {
    pub definitions: Vec<FunctionDefinition>,
    pub catalog: TypeCatalog,
    pub services: ServiceCollection,
    pub defaults: HostDefaults,
    pub openapi: OpenApiConfiguration,
    /// Folder the synthesized source is copied to for inspection.
    pub output_source_folder: Option<PathBuf>,
}

/// Entry point of the builder API.
#[derive(Debug, Default)]
pub struct FunctionHostBuilder {
    app: FunctionApp,
}

impl FunctionHostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe the types the definitions refer to.
    pub fn types(&mut self, configure: impl FnOnce(&mut TypeCatalog)) -> &mut Self {
        configure(&mut self.app.catalog);
        self
    }

    /// Register a Rust type through its [`Describe`] impl.
    pub fn register<T: Describe>(&mut self) -> TypeRef {
        self.app.catalog.register::<T>()
    }

    pub fn describe(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.app.catalog.insert(descriptor);
        self
    }

    pub fn setup(&mut self, configure: impl FnOnce(&mut ServiceCollection)) -> &mut Self {
        configure(&mut self.app.services);
        self
    }

    pub fn authorization(&mut self, configure: impl FnOnce(&mut AuthorizationBuilder<'_>)) -> &mut Self {
        configure(&mut AuthorizationBuilder {
            defaults: &mut self.app.defaults,
        });
        self
    }

    /// Register the command validator; it is also added to the services.
    pub fn add_validator(&mut self, validator: impl Into<String>) -> &mut Self {
        let validator = validator.into();
        self.app.services.add_transient(validator.clone());
        self.app.defaults.validator = Some(validator);
        self
    }

    pub fn default_header_binding(&mut self, binding: HeaderBindingConfiguration) -> &mut Self {
        self.app.defaults.header_binding = Some(binding);
        self
    }

    pub fn default_response_handler(&mut self, handler: impl Into<String>) -> &mut Self {
        self.app.defaults.response_handler = Some(handler.into());
        self
    }

    pub fn default_command_deserializer(&mut self, deserializer: impl Into<String>) -> &mut Self {
        self.app.defaults.command_deserializer = Some(deserializer.into());
        self
    }

    pub fn openapi(&mut self, configure: impl FnOnce(&mut OpenApiBuilder<'_>)) -> &mut Self {
        configure(&mut OpenApiBuilder {
            config: &mut self.app.openapi,
        });
        self
    }

    pub fn output_source_to(&mut self, folder: impl Into<PathBuf>) -> &mut Self {
        self.app.output_source_folder = Some(folder.into());
        self
    }

    pub fn functions(&mut self, configure: impl FnOnce(&mut FunctionBuilder<'_>)) -> &mut Self {
        configure(&mut FunctionBuilder {
            definitions: &mut self.app.definitions,
        });
        self
    }

    pub fn build(self) -> FunctionApp {
        self.app
    }
}

/// Global authorization settings.
pub struct AuthorizationBuilder<'a> {
    defaults: &'a mut HostDefaults,
}

impl AuthorizationBuilder<'_> {
    pub fn default_authorization(&mut self, kind: AuthorizationKind) -> &mut Self {
        self.defaults.authorization = Some(kind);
        self
    }

    pub fn token_header(&mut self, header: impl Into<String>) -> &mut Self {
        self.defaults.token_header = Some(header.into());
        self
    }

    pub fn token_validator(&mut self, validator: impl Into<String>) -> &mut Self {
        self.defaults.token_validator = Some(validator.into());
        self
    }

    pub fn claims_principal_authorization(&mut self, authorization: impl Into<String>) -> &mut Self {
        self.defaults.claims_principal_authorization = Some(authorization.into());
        self
    }
}

/// Declares function definitions.
pub struct FunctionBuilder<'a> {
    definitions: &'a mut Vec<FunctionDefinition>,
}

impl FunctionBuilder<'_> {
    /// Declare a route family; every function added inside shares one
    /// route configuration.
    pub fn http_route(
        &mut self,
        route: impl Into<String>,
        configure: impl FnOnce(&mut RouteBuilder<'_>),
    ) -> &mut Self {
        let route = route.into();
        configure(&mut RouteBuilder {
            route: SharedRoute::new(route.trim_matches('/')),
            definitions: &mut *self.definitions,
        });
        self
    }

    /// Declare functions triggered by a document change feed.
    pub fn event_feed(
        &mut self,
        connection_name: impl Into<String>,
        database_name: impl Into<String>,
        configure: impl FnOnce(&mut EventFeedBuilder<'_>),
    ) -> &mut Self {
        configure(&mut EventFeedBuilder {
            connection_name: connection_name.into(),
            database_name: database_name.into(),
            definitions: &mut *self.definitions,
        });
        self
    }
}

/// Functions sharing one route family.
pub struct RouteBuilder<'a> {
    route: SharedRoute,
    definitions: &'a mut Vec<FunctionDefinition>,
}

impl RouteBuilder<'_> {
    pub fn openapi_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.route.borrow_mut().openapi_name = Some(name.into());
        self
    }

    pub fn openapi_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.route.borrow_mut().openapi_description = Some(description.into());
        self
    }

    /// Authorization for family members that declare none.
    pub fn authorization(&mut self, kind: AuthorizationKind) -> &mut Self {
        self.route.borrow_mut().authorization = Some(kind);
        self
    }

    pub fn claims_principal_authorization(&mut self, authorization: impl Into<String>) -> &mut Self {
        self.route.borrow_mut().claims_principal_authorization = Some(authorization.into());
        self
    }

    /// Add a function on the family route.
    pub fn http_function(&mut self, command_type: impl Into<String>) -> HttpFunctionBuilder<'_> {
        let route = self.route.borrow().route.clone();
        let trigger = HttpTrigger::new(self.route.clone(), Some(route));
        self.definitions
            .push(FunctionDefinition::new(command_type, Trigger::Http(trigger)));
        let index = self.definitions.len() - 1;
        HttpFunctionBuilder {
            family_route: self.route.clone(),
            definition: &mut self.definitions[index],
        }
    }
}

/// Settings of one HTTP function.
pub struct HttpFunctionBuilder<'a> {
    family_route: SharedRoute,
    definition: &'a mut FunctionDefinition,
}

impl HttpFunctionBuilder<'_> {
    fn with_http(&mut self, apply: impl FnOnce(&mut HttpTrigger)) -> &mut Self {
        if let Trigger::Http(http) = &mut self.definition.trigger {
            apply(http);
        }
        self
    }

    /// Append a sub-route to the family route.
    pub fn route(&mut self, sub_route: &str) -> &mut Self {
        let route = join_route(&self.family_route.borrow().route, Some(sub_route));
        self.with_http(|http| http.route = Some(route))
    }

    pub fn verb(&mut self, method: HttpMethod) -> &mut Self {
        self.with_http(|http| {
            http.verbs.insert(method);
        })
    }

    pub fn verbs(&mut self, methods: impl IntoIterator<Item = HttpMethod>) -> &mut Self {
        self.with_http(|http| http.verbs.extend(methods))
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.definition.name = name.into();
        self
    }

    pub fn returns(&mut self, result_type: TypeRef) -> &mut Self {
        self.definition.command_result_type = Some(result_type);
        self
    }

    pub fn deserializer(&mut self, deserializer: impl Into<String>) -> &mut Self {
        self.definition.command_deserializer = Some(deserializer.into());
        self
    }

    pub fn authorization(&mut self, kind: AuthorizationKind) -> &mut Self {
        self.with_http(|http| http.authorization = Some(kind))
    }

    pub fn token_validator(&mut self, validator: impl Into<String>) -> &mut Self {
        let validator = validator.into();
        self.with_http(|http| http.token_validator = Some(validator))
    }

    pub fn token_header(&mut self, header: impl Into<String>) -> &mut Self {
        let header = header.into();
        self.with_http(|http| http.token_header = Some(header))
    }

    pub fn claims_principal_authorization(&mut self, authorization: impl Into<String>) -> &mut Self {
        let authorization = authorization.into();
        self.with_http(|http| http.claims_principal_authorization = Some(authorization))
    }

    pub fn header_binding(&mut self, binding: HeaderBindingConfiguration) -> &mut Self {
        self.with_http(|http| http.header_binding = Some(binding))
    }

    /// Bind a command property from a request header.
    pub fn header(&mut self, property: impl Into<String>, header: impl Into<String>) -> &mut Self {
        let (property, header) = (property.into(), header.into());
        self.with_http(|http| {
            http.header_binding
                .get_or_insert_with(HeaderBindingConfiguration::default)
                .property_from_header_mappings
                .insert(property, header);
        })
    }

    pub fn response_handler(&mut self, handler: impl Into<String>) -> &mut Self {
        let handler = handler.into();
        self.with_http(|http| http.response_handler = Some(handler))
    }

    pub fn openapi_description(&mut self, description: impl Into<String>) -> &mut Self {
        let description = description.into();
        self.with_http(|http| http.openapi_description = Some(description))
    }

    pub fn openapi_summary(&mut self, summary: impl Into<String>) -> &mut Self {
        let summary = summary.into();
        self.with_http(|http| http.openapi_summary = Some(summary))
    }

    /// Leave the function out of every OpenAPI document.
    pub fn openapi_ignore(&mut self) -> &mut Self {
        self.with_http(|http| http.openapi_ignore = true)
    }

    pub fn openapi_response(
        &mut self,
        status: u16,
        description: impl Into<String>,
        response_type: Option<TypeRef>,
    ) -> &mut Self {
        let response = ResponseConfiguration {
            description: description.into(),
            response_type,
        };
        self.with_http(|http| {
            http.openapi_responses.insert(status, response);
        })
    }
}

/// Functions on one change-feed connection.
pub struct EventFeedBuilder<'a> {
    connection_name: String,
    database_name: String,
    definitions: &'a mut Vec<FunctionDefinition>,
}

impl EventFeedBuilder<'_> {
    pub fn change_feed_function(
        &mut self,
        command_type: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> EventFeedFunctionBuilder<'_> {
        let trigger = EventFeedTrigger::new(
            self.connection_name.clone(),
            collection_name,
            self.database_name.clone(),
        );
        self.definitions
            .push(FunctionDefinition::new(command_type, Trigger::EventFeed(trigger)));
        let index = self.definitions.len() - 1;
        EventFeedFunctionBuilder {
            definition: &mut self.definitions[index],
        }
    }
}

/// Settings of one change-feed function.
pub struct EventFeedFunctionBuilder<'a> {
    definition: &'a mut FunctionDefinition,
}

macro_rules! feed_setters {
    ($($(#[$doc:meta])* $name:ident: $ty:ty),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, value: $ty) -> &mut Self {
                self.with_feed(|feed| feed.$name = Some(value))
            }
        )*
    };
}

impl EventFeedFunctionBuilder<'_> {
    fn with_feed(&mut self, apply: impl FnOnce(&mut EventFeedTrigger)) -> &mut Self {
        if let Trigger::EventFeed(feed) = &mut self.definition.trigger {
            apply(feed);
        }
        self
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.definition.name = name.into();
        self
    }

    pub fn lease_collection_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.with_feed(|feed| feed.lease_collection_name = name)
    }

    pub fn lease_database_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.with_feed(|feed| feed.lease_database_name = Some(name))
    }

    pub fn lease_connection_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.with_feed(|feed| feed.lease_connection_name = Some(name))
    }

    pub fn lease_collection_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        let prefix = prefix.into();
        self.with_feed(|feed| feed.lease_collection_prefix = Some(prefix))
    }

    pub fn error_handler(&mut self, handler: impl Into<String>) -> &mut Self {
        let handler = handler.into();
        self.with_feed(|feed| feed.error_handler = Some(handler))
    }

    pub fn create_lease_collection_if_not_exists(&mut self, create: bool) -> &mut Self {
        self.with_feed(|feed| feed.create_lease_collection_if_not_exists = create)
    }

    pub fn start_from_beginning(&mut self, start: bool) -> &mut Self {
        self.with_feed(|feed| feed.start_from_beginning = start)
    }

    pub fn convert_to_pascal_case(&mut self, convert: bool) -> &mut Self {
        self.with_feed(|feed| feed.convert_to_pascal_case = convert)
    }

    feed_setters! {
        max_items_per_invocation: u32,
        /// Milliseconds between polls of an empty feed.
        feed_poll_delay: u32,
        lease_acquire_interval: u32,
        lease_expiration_interval: u32,
        lease_renew_interval: u32,
        checkpoint_frequency: u32,
        leases_collection_throughput: u32,
    }
}

/// OpenAPI output settings.
pub struct OpenApiBuilder<'a> {
    config: &'a mut OpenApiConfiguration,
}

impl OpenApiBuilder<'_> {
    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.config.version = Some(version.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.config.description = Some(description.into());
        self
    }

    pub fn server(&mut self, url: impl Into<String>) -> &mut Self {
        self.config.servers.push(url.into());
        self
    }

    pub fn output_format(&mut self, format: OutputFormat) -> &mut Self {
        self.config.output_format = format;
        self
    }

    /// Emit the Swagger UI explorer under `route` (default `openapi`).
    pub fn user_interface(&mut self, route: Option<&str>) -> &mut Self {
        self.config.user_interface_route = Some(route.unwrap_or("openapi").trim_matches('/').to_string());
        self
    }

    /// Emit the ReDoc explorer under `route` (default `redoc`).
    pub fn redoc_user_interface(&mut self, route: Option<&str>) -> &mut Self {
        self.config.redoc_user_interface_route = Some(route.unwrap_or("redoc").trim_matches('/').to_string());
        self
    }

    pub fn route_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.config.route_prefix = Some(prefix.into());
        self
    }

    pub fn document(&mut self, document: DocumentInfo) -> &mut Self {
        self.config.documents.push(document);
        self
    }

    pub fn security_scheme(&mut self, name: impl Into<String>, scheme: SecurityScheme) -> &mut Self {
        self.config.security_schemes.insert(name.into(), scheme);
        self
    }

    pub fn document_filter(&mut self, filter: impl DocumentFilter + 'static) -> &mut Self {
        self.config.document_filters.push(Box::new(filter));
        self
    }

    pub fn redoc_document_filter(&mut self, filter: impl DocumentFilter + 'static) -> &mut Self {
        self.config.redoc_document_filters.push(Box::new(filter));
        self
    }

    pub fn operation_filter(&mut self, filter: impl OperationFilter + 'static) -> &mut Self {
        self.config.operation_filters.push(Box::new(filter));
        self
    }

    pub fn parameter_filter(&mut self, filter: impl ParameterFilter + 'static) -> &mut Self {
        self.config.parameter_filters.push(Box::new(filter));
        self
    }

    pub fn schema_id_selector(
        &mut self,
        selector: impl Fn(&TypeDescriptor) -> String + 'static,
    ) -> &mut Self {
        self.config.schema_id_selector = Some(Box::new(selector));
        self
    }

    pub fn inject_stylesheet(&mut self, asset: InjectedAsset) -> &mut Self {
        self.config.injected_stylesheets.push(asset);
        self
    }

    pub fn inject_script(&mut self, asset: InjectedAsset) -> &mut Self {
        self.config.injected_scripts.push(asset);
        self
    }

    pub fn inject_resource(&mut self, asset: InjectedAsset) -> &mut Self {
        self.config.injected_resources.push(asset);
        self
    }

    pub fn inject_logo(&mut self, asset: InjectedAsset) -> &mut Self {
        self.config.injected_logo = Some(asset);
        self
    }
}

/// Property name → header name pairs, in the order given.
pub fn header_mappings<I, P, H>(pairs: I) -> HeaderBindingConfiguration
where
    I: IntoIterator<Item = (P, H)>,
    P: Into<String>,
    H: Into<String>,
{
    HeaderBindingConfiguration {
        property_from_header_mappings: pairs
            .into_iter()
            .map(|(p, h)| (p.into(), h.into()))
            .collect::<IndexMap<_, _>>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_family_shares_configuration() {
        let mut host = FunctionHostBuilder::new();
        host.functions(|f| {
            f.http_route("/widgets", |route| {
                route.openapi_name("Widgets");
                route.http_function("shop::GetWidget").route("{id}");
                route.http_function("shop::ListWidgets");
            });
        });
        let app = host.build();

        let a = app.definitions[0].http().unwrap();
        let b = app.definitions[1].http().unwrap();
        assert!(a.route_configuration.ptr_eq(&b.route_configuration));
        assert_eq!(a.route.as_deref(), Some("widgets/{id}"));
        assert_eq!(b.route.as_deref(), Some("widgets"));
        assert_eq!(
            b.route_configuration.borrow().openapi_name.as_deref(),
            Some("Widgets")
        );
    }

    #[test]
    fn test_verbs_keep_declared_order() {
        let mut host = FunctionHostBuilder::new();
        host.functions(|f| {
            f.http_route("widgets", |route| {
                route
                    .http_function("shop::SaveWidget")
                    .verbs([HttpMethod::Put, HttpMethod::Post])
                    .verb(HttpMethod::Put);
            });
        });
        let app = host.build();

        let verbs: Vec<_> = app.definitions[0].http().unwrap().verbs.iter().copied().collect();
        assert_eq!(verbs, vec![HttpMethod::Put, HttpMethod::Post]);
    }

    #[test]
    fn test_validator_is_registered_as_service() {
        let mut host = FunctionHostBuilder::new();
        host.add_validator("shop::validation::Validator");
        let app = host.build();

        assert_eq!(app.defaults.validator.as_deref(), Some("shop::validation::Validator"));
        assert_eq!(app.services.len(), 1);
    }

    #[test]
    fn test_event_feed_settings() {
        let mut host = FunctionHostBuilder::new();
        host.functions(|f| {
            f.event_feed("CosmosConnection", "shop", |feed| {
                feed.change_feed_function("shop::WidgetChanged", "widgets")
                    .lease_collection_name("widget-leases")
                    .feed_poll_delay(500)
                    .start_from_beginning(true);
            });
        });
        let app = host.build();

        let feed = app.definitions[0].event_feed().unwrap();
        assert_eq!(feed.collection_name, "widgets");
        assert_eq!(feed.lease_collection_name, "widget-leases");
        assert_eq!(feed.lease_database(), "shop");
        assert_eq!(feed.feed_poll_delay, Some(500));
        assert!(feed.start_from_beginning);
    }
}
