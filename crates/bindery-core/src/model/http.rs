//! HTTP trigger model.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize, Serializer};

use crate::describe::TypeRef;

/// HTTP verbs a function can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[serde(alias = "GET", alias = "Get")]
    Get,
    #[serde(alias = "POST", alias = "Post")]
    Post,
    #[serde(alias = "PUT", alias = "Put")]
    Put,
    #[serde(alias = "PATCH", alias = "Patch")]
    Patch,
    #[serde(alias = "DELETE", alias = "Delete")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }

    /// Verbs whose command is bound from the query string.
    pub fn binds_query(&self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }

    /// Verbs whose command is bound from the request body.
    pub fn binds_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// How callers of an HTTP function are authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationKind {
    Anonymous,
    /// Host-level function key (`code` query parameter).
    Function,
    /// Bearer token checked by a registered token validator.
    TokenValidation,
}

/// Configuration shared by every function on one route template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteConfiguration {
    pub route: String,
    pub openapi_name: Option<String>,
    pub openapi_description: Option<String>,
    /// Authorization applied to family members that declare none.
    pub authorization: Option<AuthorizationKind>,
    pub claims_principal_authorization: Option<String>,
}

/// Handle to a [`RouteConfiguration`] shared across a route family.
///
/// Cloning the handle shares the allocation: a change made through any
/// definition is seen by every definition on the route.
#[derive(Clone, Default)]
pub struct SharedRoute(Rc<RefCell<RouteConfiguration>>);

impl SharedRoute {
    pub fn new(route: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(RouteConfiguration {
            route: route.into(),
            ..Default::default()
        })))
    }

    pub fn borrow(&self) -> Ref<'_, RouteConfiguration> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, RouteConfiguration> {
        self.0.borrow_mut()
    }

    /// Whether both handles refer to the same family.
    pub fn ptr_eq(&self, other: &SharedRoute) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the family, stable for the lifetime of the handle.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for SharedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedRoute").field(&*self.0.borrow()).finish()
    }
}

impl Serialize for SharedRoute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.borrow().serialize(serializer)
    }
}

/// A command property bound from the route, query string or form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpParameter {
    /// Property name on the command type.
    pub name: String,
    /// Token as written in the route template (route parameters only).
    pub route_name: Option<String>,
    /// Name used on the wire.
    pub wire_name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Rust spelling of the property type, for templates.
    pub type_name: String,
    pub is_optional: bool,
}

/// Command properties populated from request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBindingConfiguration {
    /// Command property name → header name.
    pub property_from_header_mappings: IndexMap<String, String>,
}

/// An explicitly declared response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseConfiguration {
    pub description: String,
    #[serde(default)]
    pub response_type: Option<TypeRef>,
}

/// HTTP-specific part of a function definition.
#[derive(Debug, Clone, Serialize)]
pub struct HttpTrigger {
    /// Route template without leading slash, e.g. `widgets/{id}`.
    pub route: Option<String>,
    pub verbs: IndexSet<HttpMethod>,
    pub authorization: Option<AuthorizationKind>,
    pub route_configuration: SharedRoute,
    pub claims_principal_authorization: Option<String>,
    pub header_binding: Option<HeaderBindingConfiguration>,
    pub response_handler: Option<String>,
    pub token_header: Option<String>,
    pub token_validator: Option<String>,
    pub openapi_description: Option<String>,
    pub openapi_summary: Option<String>,
    pub openapi_ignore: bool,
    pub openapi_responses: BTreeMap<u16, ResponseConfiguration>,

    // Populated by the normalizer.
    pub route_parameters: Vec<HttpParameter>,
    pub query_parameters: Vec<HttpParameter>,
    pub form_parameters: Vec<HttpParameter>,
    pub validates_token: bool,
    pub is_validation_result: bool,
    pub is_stream_command: bool,
}

impl HttpTrigger {
    pub fn new(route_configuration: SharedRoute, route: Option<String>) -> Self {
        Self {
            route,
            verbs: IndexSet::new(),
            authorization: None,
            route_configuration,
            claims_principal_authorization: None,
            header_binding: None,
            response_handler: None,
            token_header: None,
            token_validator: None,
            openapi_description: None,
            openapi_summary: None,
            openapi_ignore: false,
            openapi_responses: BTreeMap::new(),
            route_parameters: Vec::new(),
            query_parameters: Vec::new(),
            form_parameters: Vec::new(),
            validates_token: false,
            is_validation_result: false,
            is_stream_command: false,
        }
    }

    /// Resolved authorization; `Function` until the normalizer has run.
    pub fn authorization(&self) -> AuthorizationKind {
        self.authorization.unwrap_or(AuthorizationKind::Function)
    }
}

/// Join a family route and a function sub-route into a template without
/// leading or trailing slashes.
pub fn join_route(base: &str, sub: Option<&str>) -> String {
    let base = base.trim_matches('/');
    match sub.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()) {
        Some(sub) if base.is_empty() => sub.to_string(),
        Some(sub) => format!("{base}/{sub}"),
        None => base.to_string(),
    }
}

/// Tokens of a route template: `widgets/{id}/{rev?}` → `["id", "rev?"]`.
pub fn route_tokens(route: &str) -> impl Iterator<Item = &str> {
    route.split('/').filter_map(|segment| {
        segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .filter(|s| !s.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_route_mutation_is_visible() {
        let a = SharedRoute::new("widgets");
        let b = a.clone();

        a.borrow_mut().openapi_name = Some("Widgets".to_string());

        assert!(a.ptr_eq(&b));
        assert_eq!(b.borrow().openapi_name.as_deref(), Some("Widgets"));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_join_route() {
        assert_eq!(join_route("/widgets/", Some("/{id}")), "widgets/{id}");
        assert_eq!(join_route("widgets", None), "widgets");
        assert_eq!(join_route("", Some("health")), "health");
        assert_eq!(join_route("widgets", Some("")), "widgets");
    }

    #[test]
    fn test_route_tokens() {
        let tokens: Vec<_> = route_tokens("shops/{shopId}/widgets/{id:int}/{rev?}").collect();
        assert_eq!(tokens, vec!["shopId", "id:int", "rev?"]);
    }

    #[test]
    fn test_method_serializes_lowercase() {
        let json = serde_json::to_string(&HttpMethod::Patch).unwrap();
        assert_eq!(json, "\"patch\"");
        let parsed: HttpMethod = serde_json::from_str("\"DELETE\"").unwrap();
        assert_eq!(parsed, HttpMethod::Delete);
    }
}
