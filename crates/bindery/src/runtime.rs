//! Types the synthesized sources are written against.
//!
//! A compiled function-app module exposes one [`FunctionIndex`] through the
//! `bindery_function_index` symbol as JSON. Hosts read it back with
//! [`FunctionIndex::from_json`] and dispatch to the user's handlers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    Anonymous,
    #[default]
    Function,
    TokenValidation,
}

impl Authorization {
    /// Parse the snake_case name; unknown names fall back to `Function`.
    pub fn named(name: &str) -> Self {
        match name {
            "anonymous" => Self::Anonymous,
            "token_validation" => Self::TokenValidation,
            _ => Self::Function,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLifetime {
    #[default]
    Transient,
    Scoped,
    Singleton,
}

impl ServiceLifetime {
    pub fn named(name: &str) -> Self {
        match name {
            "scoped" => Self::Scoped,
            "singleton" => Self::Singleton,
            _ => Self::Transient,
        }
    }
}

/// How change-feed documents become a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandShape {
    #[default]
    Plain,
    SingleDocument,
    DocumentBatch,
}

impl CommandShape {
    pub fn named(name: &str) -> Self {
        match name {
            "single_document" => Self::SingleDocument,
            "document_batch" => Self::DocumentBatch,
            _ => Self::Plain,
        }
    }
}

/// A command property bound from a route, query string or form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub name: String,
    pub wire_name: String,
    pub optional: bool,
}

/// A command property bound from a request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBinding {
    pub property: String,
    pub header: String,
}

/// HTTP trigger of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpBinding {
    pub route: String,
    pub authorization: Authorization,
    pub verbs: Vec<String>,
    pub route_parameters: Vec<ParameterBinding>,
    pub query_parameters: Vec<ParameterBinding>,
    pub form_parameters: Vec<ParameterBinding>,
    pub headers: Vec<HeaderBinding>,
    pub token_header: Option<String>,
    pub token_validator: Option<String>,
    pub claims_principal_authorization: Option<String>,
    pub response_handler: Option<String>,
    pub streamed: bool,
    pub validation_result: bool,
}

fn parameter(name: &str, wire_name: &str, optional: bool) -> ParameterBinding {
    ParameterBinding {
        name: name.to_string(),
        wire_name: wire_name.to_string(),
        optional,
    }
}

impl HttpBinding {
    pub fn new(route: &str, authorization: Authorization) -> Self {
        Self {
            route: route.to_string(),
            authorization,
            ..Self::default()
        }
    }

    pub fn verb(&mut self, verb: &str) -> &mut Self {
        self.verbs.push(verb.to_string());
        self
    }

    pub fn route_parameter(&mut self, name: &str, wire_name: &str, optional: bool) -> &mut Self {
        self.route_parameters.push(parameter(name, wire_name, optional));
        self
    }

    pub fn query_parameter(&mut self, name: &str, wire_name: &str, optional: bool) -> &mut Self {
        self.query_parameters.push(parameter(name, wire_name, optional));
        self
    }

    pub fn form_parameter(&mut self, name: &str, wire_name: &str, optional: bool) -> &mut Self {
        self.form_parameters.push(parameter(name, wire_name, optional));
        self
    }

    pub fn header(&mut self, property: &str, header: &str) -> &mut Self {
        self.headers.push(HeaderBinding {
            property: property.to_string(),
            header: header.to_string(),
        });
        self
    }

    pub fn token_header(&mut self, header: &str) -> &mut Self {
        self.token_header = Some(header.to_string());
        self
    }

    pub fn token_validator(&mut self, validator: &str) -> &mut Self {
        self.token_validator = Some(validator.to_string());
        self
    }

    pub fn claims_principal_authorization(&mut self, authorization: &str) -> &mut Self {
        self.claims_principal_authorization = Some(authorization.to_string());
        self
    }

    pub fn response_handler(&mut self, handler: &str) -> &mut Self {
        self.response_handler = Some(handler.to_string());
        self
    }

    pub fn streamed(&mut self) -> &mut Self {
        self.streamed = true;
        self
    }

    pub fn validation_result(&mut self) -> &mut Self {
        self.validation_result = true;
        self
    }
}

/// A command property populated from a feed document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBinding {
    pub name: String,
    pub store_name: String,
}

/// Change-feed trigger of one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFeedBinding {
    pub connection: String,
    pub database: String,
    pub collection: String,
    pub shape: CommandShape,
    pub lease_collection: String,
    pub lease_connection: Option<String>,
    pub lease_database: Option<String>,
    pub lease_collection_prefix: Option<String>,
    pub create_lease_collection_if_not_exists: bool,
    pub start_from_beginning: bool,
    pub convert_to_pascal_case: bool,
    /// Numeric trigger knobs, e.g. `feed_poll_delay`.
    pub settings: BTreeMap<String, u32>,
    pub error_handler: Option<String>,
    pub properties: Vec<PropertyBinding>,
}

impl EventFeedBinding {
    pub fn new(connection: &str, database: &str, collection: &str) -> Self {
        Self {
            connection: connection.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            shape: CommandShape::Plain,
            lease_collection: "leases".to_string(),
            lease_connection: None,
            lease_database: None,
            lease_collection_prefix: None,
            create_lease_collection_if_not_exists: true,
            start_from_beginning: false,
            convert_to_pascal_case: false,
            settings: BTreeMap::new(),
            error_handler: None,
            properties: Vec::new(),
        }
    }

    pub fn shape(&mut self, shape: CommandShape) -> &mut Self {
        self.shape = shape;
        self
    }

    pub fn lease_collection(&mut self, name: &str) -> &mut Self {
        self.lease_collection = name.to_string();
        self
    }

    pub fn lease_connection(&mut self, name: &str) -> &mut Self {
        self.lease_connection = Some(name.to_string());
        self
    }

    pub fn lease_database(&mut self, name: &str) -> &mut Self {
        self.lease_database = Some(name.to_string());
        self
    }

    pub fn lease_collection_prefix(&mut self, prefix: &str) -> &mut Self {
        self.lease_collection_prefix = Some(prefix.to_string());
        self
    }

    pub fn create_lease_collection_if_not_exists(&mut self, create: bool) -> &mut Self {
        self.create_lease_collection_if_not_exists = create;
        self
    }

    pub fn start_from_beginning(&mut self, start: bool) -> &mut Self {
        self.start_from_beginning = start;
        self
    }

    pub fn convert_to_pascal_case(&mut self, convert: bool) -> &mut Self {
        self.convert_to_pascal_case = convert;
        self
    }

    pub fn setting(&mut self, name: &str, value: u32) -> &mut Self {
        self.settings.insert(name.to_string(), value);
        self
    }

    pub fn error_handler(&mut self, handler: &str) -> &mut Self {
        self.error_handler = Some(handler.to_string());
        self
    }

    pub fn property(&mut self, name: &str, store_name: &str) -> &mut Self {
        self.properties.push(PropertyBinding {
            name: name.to_string(),
            store_name: store_name.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerBinding {
    Http(HttpBinding),
    EventFeed(EventFeedBinding),
}

/// One function as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRegistration {
    pub name: String,
    pub command_type: String,
    pub trigger: TriggerBinding,
    pub result_type: Option<String>,
    pub deserializer: Option<String>,
    pub validated: bool,
}

impl FunctionRegistration {
    fn new(name: &str, command_type: &str, trigger: TriggerBinding) -> Self {
        Self {
            name: name.to_string(),
            command_type: command_type.to_string(),
            trigger,
            result_type: None,
            deserializer: None,
            validated: false,
        }
    }

    pub fn http(name: &str, command_type: &str, binding: HttpBinding) -> Self {
        Self::new(name, command_type, TriggerBinding::Http(binding))
    }

    pub fn event_feed(name: &str, command_type: &str, binding: EventFeedBinding) -> Self {
        Self::new(name, command_type, TriggerBinding::EventFeed(binding))
    }

    pub fn returns(&mut self, result_type: &str) -> &mut Self {
        self.result_type = Some(result_type.to_string());
        self
    }

    pub fn deserializer(&mut self, deserializer: &str) -> &mut Self {
        self.deserializer = Some(deserializer.to_string());
        self
    }

    /// Commands are run through the registered validator first.
    pub fn validated(&mut self) -> &mut Self {
        self.validated = true;
        self
    }
}

/// A dependency-injection registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub service: String,
    pub implementation: Option<String>,
    pub lifetime: ServiceLifetime,
}

/// A GET route answered from an embedded resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub path: String,
    pub resource: String,
}

impl StaticRoute {
    pub fn new(path: &str, resource: &str) -> Self {
        Self {
            path: path.to_string(),
            resource: resource.to_string(),
        }
    }
}

/// Everything a compiled module exposes to its host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionIndex {
    pub namespace: String,
    pub functions: Vec<FunctionRegistration>,
    pub services: Vec<ServiceEntry>,
    pub static_routes: Vec<StaticRoute>,
}

impl FunctionIndex {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            ..Self::default()
        }
    }

    pub fn register(&mut self, registration: FunctionRegistration) -> &mut Self {
        self.functions.push(registration);
        self
    }

    /// An empty `implementation` registers the service as its own implementation.
    pub fn service(&mut self, service: &str, implementation: &str, lifetime: ServiceLifetime) -> &mut Self {
        self.services.push(ServiceEntry {
            service: service.to_string(),
            implementation: (!implementation.is_empty()).then(|| implementation.to_string()),
            lifetime,
        });
        self
    }

    pub fn static_route(&mut self, route: StaticRoute) -> &mut Self {
        self.static_routes.push(route);
        self
    }

    pub fn functions(&self) -> &[FunctionRegistration] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&FunctionRegistration> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn to_json(&self) -> String {
        // Only strings, numbers and string-keyed maps: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FunctionIndex {
        let mut http = HttpBinding::new("widgets/{id}", Authorization::named("anonymous"));
        http.verb("get").route_parameter("Id", "id", false);

        let mut feed = EventFeedBinding::new("CosmosConnection", "shop", "widgets");
        feed.shape(CommandShape::named("single_document"))
            .setting("feed_poll_delay", 500);

        let mut get = FunctionRegistration::http("GetWidget", "shop::GetWidget", http);
        get.returns("shop::Widget");

        let mut index = FunctionIndex::new("shop_functions");
        index
            .register(get)
            .register(FunctionRegistration::event_feed(
                "WidgetChanged",
                "shop::WidgetChanged",
                feed,
            ))
            .service("shop::WidgetStore", "", ServiceLifetime::named("singleton"))
            .static_route(StaticRoute::new(
                "/api/openapi/openapi.yaml",
                "shop_functions.OpenApi.openapi.yaml",
            ));
        index
    }

    #[test]
    fn test_index_survives_json() {
        let index = sample_index();

        let read = FunctionIndex::from_json(&index.to_json()).unwrap();

        assert_eq!(read, index);
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample_index().to_json()).unwrap();

        assert_eq!(json["functions"][0]["trigger"]["kind"], "http");
        assert_eq!(json["functions"][0]["trigger"]["authorization"], "anonymous");
        assert_eq!(json["functions"][1]["trigger"]["shape"], "single_document");
        assert_eq!(json["functions"][1]["trigger"]["settings"]["feed_poll_delay"], 500);
        assert_eq!(json["services"][0]["implementation"], serde_json::Value::Null);
        assert_eq!(json["services"][0]["lifetime"], "singleton");
    }

    #[test]
    fn test_unknown_names_fall_back() {
        assert_eq!(Authorization::named("function"), Authorization::Function);
        assert_eq!(Authorization::named("bogus"), Authorization::Function);
        assert_eq!(ServiceLifetime::named(""), ServiceLifetime::Transient);
        assert_eq!(CommandShape::named("plain"), CommandShape::Plain);
    }

    #[test]
    fn test_lookup_by_name() {
        let index = sample_index();

        assert_eq!(
            index.function("GetWidget").and_then(|f| f.result_type.as_deref()),
            Some("shop::Widget")
        );
        assert!(index.function("Missing").is_none());
    }
}
