//! Definition normalizer.
//!
//! Completes builder-populated definitions in place. Every optional field is
//! resolved in this order: the definition's own value, the route family's
//! value, the global default, then a built-in fallback.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::describe::{Capability, PropertyDescriptor, TypeCatalog, TypeDescriptor, TypeKind, TypeRef};
use crate::error::{Error, Result};
use crate::model::builder::HostDefaults;
use crate::model::{
    AuthorizationKind, CommandProperty, CommandShape, EventFeedTrigger, FunctionDefinition,
    HttpMethod, HttpParameter, HttpTrigger, Trigger, route_tokens,
};

const DEFAULT_TOKEN_HEADER: &str = "Authorization";

/// Fills defaults and derived fields of a set of definitions.
pub struct Normalizer<'a> {
    catalog: &'a TypeCatalog,
    defaults: &'a HostDefaults,
    namespace: &'a str,
}

impl<'a> Normalizer<'a> {
    pub fn new(catalog: &'a TypeCatalog, defaults: &'a HostDefaults, namespace: &'a str) -> Self {
        Self {
            catalog,
            defaults,
            namespace,
        }
    }

    /// Normalize every definition. Fails on the first configuration error.
    pub fn normalize(&self, definitions: &mut [FunctionDefinition]) -> Result<()> {
        let mut names = FxHashSet::default();
        for definition in definitions.iter() {
            if !names.insert(definition.name.as_str()) {
                return Err(Error::configuration(format!(
                    "more than one function is named {}",
                    definition.name
                )));
            }
        }

        for definition in definitions.iter_mut() {
            self.normalize_definition(definition)?;
        }
        Ok(())
    }

    fn normalize_definition(&self, definition: &mut FunctionDefinition) -> Result<()> {
        let command = self.catalog.require(&definition.command_type)?;
        check_exclusive_capabilities(command)?;

        definition.namespace = self.namespace.to_string();
        definition.is_using_validator = self.defaults.validator.is_some();
        if definition.command_deserializer.is_none() {
            definition.command_deserializer = self.defaults.command_deserializer.clone();
        }
        definition.result_type_name = definition
            .command_result_type
            .as_ref()
            .map(TypeRef::display_name);

        let is_validation_result = definition
            .command_result_type
            .as_ref()
            .and_then(|ty| self.named_descriptor(ty))
            .is_some_and(|d| d.has_capability(Capability::ValidationResult));

        match &mut definition.trigger {
            Trigger::Http(http) => {
                http.is_validation_result = is_validation_result;
                self.complete_http(&definition.command_type, command, http)
            }
            Trigger::EventFeed(feed) => {
                complete_event_feed(command, feed);
                Ok(())
            }
        }
    }

    fn named_descriptor(&self, ty: &TypeRef) -> Option<&'a TypeDescriptor> {
        match ty.unwrap_optional() {
            TypeRef::Named(path) => self.catalog.get(path),
            _ => None,
        }
    }

    fn complete_http(
        &self,
        command_type: &str,
        command: &TypeDescriptor,
        http: &mut HttpTrigger,
    ) -> Result<()> {
        let family = http.route_configuration.clone();

        let authorization = http
            .authorization
            .or(family.borrow().authorization)
            .or(self.defaults.authorization)
            .unwrap_or(AuthorizationKind::Function);
        http.authorization = Some(authorization);
        http.validates_token = authorization == AuthorizationKind::TokenValidation;

        if http.verbs.is_empty() {
            http.verbs.insert(HttpMethod::Get);
        }

        if http.claims_principal_authorization.is_none() {
            http.claims_principal_authorization = family
                .borrow()
                .claims_principal_authorization
                .clone()
                .or_else(|| self.defaults.claims_principal_authorization.clone());
        }
        if http.header_binding.is_none() {
            http.header_binding = self.defaults.header_binding.clone();
        }
        if http.response_handler.is_none() {
            http.response_handler = self.defaults.response_handler.clone();
        }
        if http.token_header.is_none() {
            http.token_header = Some(
                self.defaults
                    .token_header
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TOKEN_HEADER.to_string()),
            );
        }
        if http.token_validator.is_none() {
            http.token_validator = self.defaults.token_validator.clone();
        }
        if http.validates_token && http.token_validator.is_none() {
            return Err(Error::configuration(format!(
                "command {command_type} expects to be authenticated with token validation but no token validator is registered"
            )));
        }

        http.is_stream_command = command.has_capability(Capability::Stream);

        self.extract_parameters(command, http);
        name_route_family(http);

        debug!(
            "Normalized {} {:?} with {} route / {} query parameter(s)",
            command_type,
            http.route,
            http.route_parameters.len(),
            http.query_parameters.len()
        );
        Ok(())
    }

    fn extract_parameters(&self, command: &TypeDescriptor, http: &mut HttpTrigger) {
        let route = http.route.clone().unwrap_or_default();
        let tokens: Vec<RouteToken> = route_tokens(&route).map(RouteToken::parse).collect();
        let header_bound: FxHashSet<&str> = http
            .header_binding
            .iter()
            .flat_map(|b| b.property_from_header_mappings.keys().map(String::as_str))
            .collect();

        let mut route_parameters = Vec::new();
        let mut query_parameters = Vec::new();
        let mut form_parameters = Vec::new();

        for property in bindable_properties(command) {
            if let Some(token) = tokens
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(&property.name))
            {
                route_parameters.push(HttpParameter {
                    name: property.name.clone(),
                    route_name: Some(token.name.clone()),
                    wire_name: token.name.clone(),
                    ty: property.ty.clone(),
                    type_name: property.ty.display_name(),
                    is_optional: token.optional || property.ty.is_optional(),
                });
                continue;
            }

            if header_bound.contains(property.name.as_str()) {
                continue;
            }

            let parameter = || HttpParameter {
                name: property.name.clone(),
                route_name: None,
                wire_name: property.wire_name(),
                ty: property.ty.clone(),
                type_name: property.ty.display_name(),
                is_optional: !property.required,
            };
            if self.is_primitive_like(&property.ty) {
                query_parameters.push(parameter());
                form_parameters.push(parameter());
            } else if property.ty.unwrap_optional() == &TypeRef::FormCollection {
                form_parameters.push(parameter());
            }
        }

        http.route_parameters = route_parameters;
        http.query_parameters = query_parameters;
        http.form_parameters = form_parameters;
    }

    /// Scalars, fieldless enums, optionals of those and sequences of those.
    fn is_primitive_like(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Scalar(_) => true,
            TypeRef::Optional(inner) | TypeRef::Sequence(inner) => self.is_primitive_like(inner),
            TypeRef::Named(path) => self
                .catalog
                .get(path)
                .is_some_and(|d| matches!(d.kind, TypeKind::Enum(_))),
            TypeRef::Map(_) | TypeRef::FormCollection => false,
        }
    }
}

/// Public, settable properties not hidden from the payload.
fn bindable_properties(command: &TypeDescriptor) -> impl Iterator<Item = &PropertyDescriptor> {
    command
        .properties()
        .iter()
        .filter(|p| p.settable && !p.is_hidden())
}

fn check_exclusive_capabilities(command: &TypeDescriptor) -> Result<()> {
    if command.has_capability(Capability::SingleDocument)
        && command.has_capability(Capability::DocumentBatch)
    {
        return Err(Error::configuration(format!(
            "command {} implements both the single document and the document batch contracts; it can only implement one of them",
            command.path
        )));
    }
    Ok(())
}

fn complete_event_feed(command: &TypeDescriptor, feed: &mut EventFeedTrigger) {
    feed.command_properties = bindable_properties(command)
        .map(|p| CommandProperty {
            name: p.name.clone(),
            store_name: p
                .wire_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| p.name.clone()),
            ty: p.ty.clone(),
            type_name: p.ty.display_name(),
        })
        .collect();

    feed.command_shape = if command.has_capability(Capability::SingleDocument) {
        CommandShape::SingleDocument
    } else if command.has_capability(Capability::DocumentBatch) {
        CommandShape::DocumentBatch
    } else {
        CommandShape::Plain
    };
}

/// Name an unnamed route family after the last non-parameter segment of its
/// route. The family is shared, so this applies to every member.
fn name_route_family(http: &HttpTrigger) {
    let mut family = http.route_configuration.borrow_mut();
    if family
        .openapi_name
        .as_deref()
        .is_some_and(|n| !n.trim().is_empty())
    {
        return;
    }

    let name = family
        .route
        .split('/')
        .rev()
        .find(|segment| {
            !segment.trim().is_empty() && !(segment.starts_with('{') && segment.ends_with('}'))
        })
        .map(str::to_string);
    if name.is_some() {
        family.openapi_name = name;
    }
}

/// A `{token}` of a route template.
struct RouteToken {
    name: String,
    optional: bool,
}

impl RouteToken {
    /// Accepts `id`, `id?`, `id:int` and `id:int?`.
    fn parse(raw: &str) -> Self {
        let optional = raw.ends_with('?');
        let raw = raw.trim_end_matches('?');
        let name = raw.split(':').next().unwrap_or(raw);
        Self {
            name: name.trim_start_matches('*').to_string(),
            optional,
        }
    }
}
