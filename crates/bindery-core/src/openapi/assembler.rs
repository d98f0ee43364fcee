//! Route/operation assembler: normalized HTTP definitions to an [`ApiDocument`].

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use super::config::{DocumentInfo, OpenApiConfiguration};
use super::document::{
    ApiDocument, Info, Operation, Parameter, ParameterLocation, PathItem, RequestBody, Response,
    SecurityRequirement, Server, Tag, json_content,
};
use super::filter::{
    DocumentFilter, DocumentFilterContext, OperationFilterContext, ParameterFilterContext,
};
use crate::describe::{ScalarType, TypeCatalog, TypeRef};
use crate::error::{Error, Result};
use crate::model::{AuthorizationKind, FunctionDefinition, HttpMethod, HttpTrigger};
use crate::schema::{Schema, SchemaRegistry, camel_case};

const DEFAULT_RESPONSE: &str = "Successful API operation";

/// A definition selected for one document, with the verbs left after the
/// document's function filter.
struct Selected<'d> {
    definition: &'d FunctionDefinition,
    http: &'d HttpTrigger,
    verbs: IndexSet<HttpMethod>,
}

/// Builds one API document per call from the normalized definitions.
pub struct RouteAssembler<'c> {
    config: &'c OpenApiConfiguration,
    route_prefix: String,
}

impl<'c> RouteAssembler<'c> {
    /// `route_prefix` is prepended to every route; empty means none.
    pub fn new(config: &'c OpenApiConfiguration, route_prefix: impl Into<String>) -> Self {
        Self {
            config,
            route_prefix: route_prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Path of a route template in the document.
    pub fn path_for(&self, route: &str) -> String {
        let route = route.trim_matches('/');
        if self.route_prefix.is_empty() {
            format!("/{route}")
        } else {
            format!("/{}/{route}", self.route_prefix)
        }
    }

    /// Assemble the document described by `info`. Document filters have run
    /// on the result; a document without paths is returned as such.
    pub fn assemble(
        &self,
        definitions: &[FunctionDefinition],
        catalog: &TypeCatalog,
        info: &DocumentInfo,
    ) -> Result<ApiDocument> {
        let mut registry =
            SchemaRegistry::new(catalog).with_selector(self.config.schema_id_selector.as_deref());
        let selected = self.select(definitions, info);

        let mut document = ApiDocument::new(Info {
            title: info.title.clone().or_else(|| self.config.title.clone()).unwrap_or_default(),
            version: info
                .version
                .clone()
                .or_else(|| self.config.version.clone())
                .unwrap_or_default(),
            description: info
                .description
                .clone()
                .or_else(|| self.config.description.clone()),
        });
        document.servers = self
            .config
            .servers
            .iter()
            .map(|url| Server { url: url.clone() })
            .collect();

        document.tags = create_tags(&selected);
        create_schemas(&selected, &mut registry)?;
        document.paths = self.create_paths(&selected, &mut registry)?;
        document.components.schemas = registry.into_schemas();

        for (name, scheme) in &self.config.security_schemes {
            document
                .components
                .security_schemes
                .insert(name.clone(), scheme.clone());
            document
                .security
                .push(SecurityRequirement::from([(name.clone(), Vec::new())]));
        }

        apply_document_filters(&self.config.document_filters, &mut document, &info.route);

        debug!(
            "Assembled document {} with {} path(s) and {} schema(s)",
            info.route,
            document.paths.len(),
            document.components.schemas.len()
        );
        Ok(document)
    }

    fn select<'d>(&self, definitions: &'d [FunctionDefinition], info: &DocumentInfo) -> Vec<Selected<'d>> {
        definitions
            .iter()
            .filter_map(|definition| {
                let http = definition.http()?;
                if http.openapi_ignore || http.route.is_none() {
                    return None;
                }
                let mut verbs = http.verbs.clone();
                if let Some(filter) = &info.function_filter {
                    filter.apply(definition, &mut verbs);
                }
                (!verbs.is_empty()).then_some(Selected {
                    definition,
                    http,
                    verbs,
                })
            })
            .collect()
    }

    fn create_paths(
        &self,
        selected: &[Selected<'_>],
        registry: &mut SchemaRegistry<'_>,
    ) -> Result<IndexMap<String, PathItem>> {
        let mut paths: IndexMap<String, PathItem> = IndexMap::new();

        for entry in selected {
            let path = self.path_for(entry.http.route.as_deref().unwrap_or_default());
            for &method in &entry.verbs {
                let operation = self.create_operation(entry, method, &path, registry)?;

                let item = paths.entry(path.clone()).or_default();
                if item.operations.contains_key(&method) {
                    return Err(Error::configuration(format!(
                        "more than one function is bound to {method} {path}"
                    )));
                }
                item.operations.insert(method, operation);
            }
        }

        Ok(paths)
    }

    fn create_operation(
        &self,
        entry: &Selected<'_>,
        method: HttpMethod,
        path: &str,
        registry: &mut SchemaRegistry<'_>,
    ) -> Result<Operation> {
        let definition = entry.definition;
        let http = entry.http;

        let mut operation = Operation {
            tags: family_name(http).into_iter().collect(),
            summary: http.openapi_summary.clone(),
            description: http.openapi_description.clone(),
            operation_id: Some(operation_id(definition, method, entry.verbs.len())),
            ..Default::default()
        };

        for (status, configured) in &http.openapi_responses {
            let content = match &configured.response_type {
                Some(ty) => json_content(registry.resolve(ty)?),
                None => IndexMap::new(),
            };
            operation.responses.insert(
                status.to_string(),
                Response {
                    description: configured.description.clone(),
                    content,
                },
            );
        }
        if !operation.responses.keys().any(|status| status.starts_with('2')) {
            let content = match &definition.command_result_type {
                Some(ty) => json_content(registry.resolve(ty)?),
                None => IndexMap::new(),
            };
            operation.responses.insert(
                "200".to_string(),
                Response {
                    description: DEFAULT_RESPONSE.to_string(),
                    content,
                },
            );
        }

        if method.binds_query() && !http.query_parameters.is_empty() {
            let body = registry.object_schema(&definition.command_type)?.clone();
            for property in &http.query_parameters {
                let schema = body.properties.get(&property.wire_name).cloned().ok_or_else(|| {
                    Error::schema(
                        &definition.command_type,
                        format!("property {} is missing from the schema", property.wire_name),
                    )
                })?;
                let mut parameter = Parameter {
                    name: property.wire_name.clone(),
                    location: ParameterLocation::Query,
                    description: schema.description.clone(),
                    required: !property.is_optional,
                    schema,
                };
                self.filter_parameter(&mut parameter, path, method, Some(&property.name));
                operation.parameters.push(parameter);
            }
        }

        match http.authorization() {
            AuthorizationKind::Function if method.binds_query() => {
                operation.parameters.push(Parameter {
                    name: "code".to_string(),
                    location: ParameterLocation::Query,
                    description: None,
                    required: true,
                    schema: Schema::scalar(ScalarType::String),
                });
            }
            AuthorizationKind::Anonymous => operation.security = Some(Vec::new()),
            _ => {}
        }

        for property in &http.route_parameters {
            let route_name = property.route_name.as_deref().unwrap_or(&property.name);
            let mut parameter = Parameter {
                name: camel_case(route_name),
                location: ParameterLocation::Path,
                description: None,
                required: !property.is_optional,
                schema: registry.resolve(property.ty.unwrap_optional())?,
            };
            self.filter_parameter(&mut parameter, path, method, Some(&property.name));
            operation.parameters.push(parameter);
        }

        if method.binds_body() {
            let schema = registry.resolve(&TypeRef::named(definition.command_type.as_str()))?;
            operation.request_body = Some(RequestBody {
                description: None,
                content: json_content(schema),
            });
        }

        let context = OperationFilterContext {
            path,
            method,
            definition,
        };
        for filter in &self.config.operation_filters {
            filter.apply(&mut operation, &context);
        }

        Ok(operation)
    }

    fn filter_parameter(
        &self,
        parameter: &mut Parameter,
        path: &str,
        method: HttpMethod,
        property: Option<&str>,
    ) {
        let context = ParameterFilterContext {
            path,
            method,
            property,
        };
        for filter in &self.config.parameter_filters {
            filter.apply(parameter, &context);
        }
    }
}

/// Run document filters in registration order.
pub fn apply_document_filters(
    filters: &[Box<dyn DocumentFilter>],
    document: &mut ApiDocument,
    document_route: &str,
) {
    let context = DocumentFilterContext { document_route };
    for filter in filters {
        filter.apply(document, &context);
    }
}

fn family_name(http: &HttpTrigger) -> Option<String> {
    http.route_configuration
        .borrow()
        .openapi_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// One tag per distinct family name, in first-seen order. The first
/// non-empty description among same-named families wins.
fn create_tags(selected: &[Selected<'_>]) -> Vec<Tag> {
    let mut tags: IndexMap<String, Option<String>> = IndexMap::new();
    for entry in selected {
        let family = entry.http.route_configuration.borrow();
        let Some(name) = family.openapi_name.as_deref().map(str::trim).filter(|n| !n.is_empty())
        else {
            continue;
        };
        let description = family
            .openapi_description
            .clone()
            .filter(|d| !d.trim().is_empty());
        let slot = tags.entry(name.to_string()).or_default();
        if slot.is_none() {
            *slot = description;
        }
    }
    tags.into_iter()
        .map(|(name, description)| Tag { name, description })
        .collect()
}

/// Register body command types and result types up front so that every
/// schema the document refers to appears under `components`.
fn create_schemas(selected: &[Selected<'_>], registry: &mut SchemaRegistry<'_>) -> Result<()> {
    for entry in selected {
        if entry.verbs.iter().any(HttpMethod::binds_body) {
            registry.resolve(&TypeRef::named(entry.definition.command_type.as_str()))?;
        }
        if let Some(result) = &entry.definition.command_result_type {
            registry.resolve(result)?;
        }
    }
    Ok(())
}

fn operation_id(definition: &FunctionDefinition, method: HttpMethod, verb_count: usize) -> String {
    if verb_count == 1 {
        return definition.name.clone();
    }
    let verb = method.as_str();
    let mut chars = verb.chars();
    let pascal: String = chars
        .next()
        .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
        .unwrap_or_default();
    format!("{}{}", definition.name, pascal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{PropertyDescriptor, TypeDescriptor};
    use crate::model::builder::{FunctionApp, FunctionHostBuilder};
    use crate::normalize::Normalizer;

    fn app(configure: impl FnOnce(&mut FunctionHostBuilder)) -> FunctionApp {
        let mut host = FunctionHostBuilder::new();
        host.types(|c| {
            c.insert(
                TypeDescriptor::object("shop::GetWidget")
                    .property(PropertyDescriptor::new("Id", TypeRef::string()))
                    .property(PropertyDescriptor::new("Filter", TypeRef::string())),
            );
            c.insert(
                TypeDescriptor::object("shop::SaveWidget")
                    .property(PropertyDescriptor::new("Name", TypeRef::string()).required()),
            );
            c.insert(
                TypeDescriptor::object("shop::Widget")
                    .property(PropertyDescriptor::new("Id", TypeRef::string())),
            );
        })
        .openapi(|o| {
            o.title("Widgets").version("1.0.0");
        });
        configure(&mut host);

        let mut app = host.build();
        Normalizer::new(&app.catalog, &app.defaults, "shop_functions")
            .normalize(&mut app.definitions)
            .unwrap();
        app
    }

    fn assemble(app: &FunctionApp, prefix: &str) -> Result<ApiDocument> {
        RouteAssembler::new(&app.openapi, prefix).assemble(
            &app.definitions,
            &app.catalog,
            &DocumentInfo::new("openapi.yaml"),
        )
    }

    #[test]
    fn test_get_with_route_and_query_parameters() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::GetWidget")
                        .route("{id}")
                        .authorization(AuthorizationKind::Anonymous)
                        .returns(TypeRef::named("shop::Widget"));
                });
            });
        });

        let document = assemble(&app, "api").unwrap();

        assert_eq!(document.paths.len(), 1);
        let item = &document.paths["/api/widgets/{id}"];
        assert_eq!(item.operations.len(), 1);
        let get = &item.operations[&HttpMethod::Get];

        let params: Vec<_> = get
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.location, p.required))
            .collect();
        assert_eq!(
            params,
            vec![
                ("filter", ParameterLocation::Query, false),
                ("id", ParameterLocation::Path, true)
            ]
        );
        assert_eq!(get.security, Some(Vec::new()));
        assert_eq!(
            get.responses["200"].content["application/json"].schema.reference_key(),
            Some("shop.Widget")
        );
        assert_eq!(get.tags, vec!["widgets".to_string()]);
    }

    #[test]
    fn test_query_parameter_schema_matches_property_schema() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::GetWidget");
                });
            });
        });

        let document = assemble(&app, "").unwrap();

        let get = &document.paths["/widgets"].operations[&HttpMethod::Get];
        let body = &document.components.schemas["shop.GetWidget"];
        assert_eq!(get.parameters[0].schema, body.properties["id"]);
        assert_eq!(get.parameters[1].schema, body.properties["filter"]);
    }

    #[test]
    fn test_function_authorization_adds_code_parameter() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::SaveWidget")
                        .verbs([HttpMethod::Delete, HttpMethod::Post]);
                });
            });
        });

        let document = assemble(&app, "api").unwrap();
        let item = &document.paths["/api/widgets"];

        let delete = &item.operations[&HttpMethod::Delete];
        let code = delete.parameters.last().unwrap();
        assert_eq!(code.name, "code");
        assert!(code.required);
        assert!(delete.security.is_none());

        let post = &item.operations[&HttpMethod::Post];
        assert!(post.parameters.iter().all(|p| p.name != "code"));
        let body = post.request_body.as_ref().unwrap();
        assert_eq!(
            body.content["application/json"].schema.reference_key(),
            Some("shop.SaveWidget")
        );
        assert_eq!(post.operation_id.as_deref(), Some("SaveWidgetPost"));
    }

    #[test]
    fn test_duplicate_path_and_verb_is_rejected() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::GetWidget");
                    r.http_function("shop::SaveWidget");
                });
            });
        });

        let err = assemble(&app, "api").unwrap_err();
        assert!(err.to_string().contains("GET /api/widgets"));
    }

    #[test]
    fn test_tags_one_per_family() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.openapi_name("Widgets").openapi_description("Widget store");
                    r.http_function("shop::GetWidget").route("{id}");
                    r.http_function("shop::SaveWidget").verb(HttpMethod::Post);
                });
                f.http_route("gadgets", |r| {
                    r.http_function("shop::GetWidget").name("GetGadget");
                });
            });
        });

        let document = assemble(&app, "api").unwrap();

        let names: Vec<_> = document.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Widgets", "gadgets"]);
        assert_eq!(document.tags[0].description.as_deref(), Some("Widget store"));
    }

    #[test]
    fn test_same_named_families_share_one_tag() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::GetWidget").route("{id}");
                });
                f.http_route("widgets", |r| {
                    r.openapi_description("Widget store");
                    r.http_function("shop::SaveWidget").verb(HttpMethod::Post);
                });
            });
        });

        let document = assemble(&app, "api").unwrap();

        let names: Vec<_> = document.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["widgets"]);
        assert_eq!(document.tags[0].description.as_deref(), Some("Widget store"));
    }

    #[test]
    fn test_ignored_and_filtered_functions_are_skipped() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::GetWidget").openapi_ignore();
                    r.http_function("shop::SaveWidget")
                        .verbs([HttpMethod::Post, HttpMethod::Put]);
                });
            });
        });
        let info = DocumentInfo::new("openapi.yaml").function_filter(
            |_: &FunctionDefinition, verbs: &mut IndexSet<HttpMethod>| {
                verbs.shift_remove(&HttpMethod::Put);
            },
        );

        let document = RouteAssembler::new(&app.openapi, "api")
            .assemble(&app.definitions, &app.catalog, &info)
            .unwrap();

        let item = &document.paths["/api/widgets"];
        let verbs: Vec<_> = item.operations.keys().copied().collect();
        assert_eq!(verbs, vec![HttpMethod::Post]);
        assert!(!document.components.schemas.contains_key("shop.GetWidget"));
    }

    #[test]
    fn test_configured_responses_replace_default() {
        let app = app(|h| {
            h.functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::SaveWidget")
                        .verb(HttpMethod::Post)
                        .openapi_response(201, "Created", Some(TypeRef::named("shop::Widget")))
                        .openapi_response(400, "Invalid widget", None);
                });
            });
        });

        let document = assemble(&app, "api").unwrap();
        let post = &document.paths["/api/widgets"].operations[&HttpMethod::Post];

        let statuses: Vec<_> = post.responses.keys().cloned().collect();
        assert_eq!(statuses, vec!["201".to_string(), "400".to_string()]);
        assert!(document.components.schemas.contains_key("shop.Widget"));
    }

    #[test]
    fn test_filters_run_in_order() {
        let app = app(|h| {
            h.openapi(|o| {
                o.operation_filter(|op: &mut Operation, _: &OperationFilterContext<'_>| {
                    op.summary = Some("first".to_string());
                })
                .operation_filter(|op: &mut Operation, _: &OperationFilterContext<'_>| {
                    let summary = op.summary.take().unwrap_or_default();
                    op.summary = Some(format!("{summary} second"));
                })
                .parameter_filter(|p: &mut Parameter, _: &ParameterFilterContext<'_>| {
                    p.description = Some(format!("bound to {}", p.name));
                })
                .document_filter(|d: &mut ApiDocument, c: &DocumentFilterContext<'_>| {
                    d.info.description = Some(c.document_route.to_string());
                });
            })
            .functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::GetWidget")
                        .route("{id}")
                        .authorization(AuthorizationKind::Anonymous);
                });
            });
        });

        let document = assemble(&app, "api").unwrap();
        let get = &document.paths["/api/widgets/{id}"].operations[&HttpMethod::Get];

        assert_eq!(get.summary.as_deref(), Some("first second"));
        assert_eq!(get.parameters[0].description.as_deref(), Some("bound to filter"));
        assert_eq!(document.info.description.as_deref(), Some("openapi.yaml"));
    }

    #[test]
    fn test_security_schemes_become_requirements() {
        let app = app(|h| {
            h.openapi(|o| {
                o.security_scheme("Bearer", crate::openapi::SecurityScheme::bearer("JWT"));
            })
            .functions(|f| {
                f.http_route("widgets", |r| {
                    r.http_function("shop::GetWidget");
                });
            });
        });

        let document = assemble(&app, "api").unwrap();

        assert!(document.components.security_schemes.contains_key("Bearer"));
        assert_eq!(document.security.len(), 1);
        assert!(document.security[0]["Bearer"].is_empty());
    }

    #[test]
    fn test_path_for_prefix() {
        let config = OpenApiConfiguration::default();
        assert_eq!(RouteAssembler::new(&config, "/api/").path_for("/widgets"), "/api/widgets");
        assert_eq!(RouteAssembler::new(&config, "").path_for("widgets/{id}"), "/widgets/{id}");
    }
}
