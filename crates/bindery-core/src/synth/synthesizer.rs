//! One source unit per definition plus the startup and explorer units.

use std::fs;
use std::path::{Path, PathBuf};

use heck::ToSnakeCase;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::template::{TemplateProvider, TemplateRenderer};
use crate::error::{Error, Result};
use crate::model::FunctionDefinition;
use crate::model::builder::{ServiceCollection, ServiceRegistration};
use crate::openapi::OpenApiOutput;

/// Name of the explorer unit.
pub const OPENAPI_UI_UNIT: &str = "OpenApiUi";

/// Module names the backend uses for its own files.
const RESERVED_MODULES: &[&str] = &["lib", "resources"];

/// Generated source text for one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub name: String,
    pub text: String,
    /// Copy on disk that diagnostics should point at.
    pub diagnostic_path: Option<PathBuf>,
}

impl SourceUnit {
    /// Rust module the unit is compiled as.
    pub fn module_name(&self) -> String {
        module_name(&self.name)
    }
}

fn module_name(unit: &str) -> String {
    unit.to_snake_case()
}

/// What the synthesizer needs from one pipeline run.
pub struct SynthesisInput<'a> {
    pub namespace: &'a str,
    pub definitions: &'a [FunctionDefinition],
    pub services: &'a ServiceCollection,
    pub openapi: Option<&'a OpenApiOutput>,
    pub output_source_folder: Option<&'a Path>,
}

#[derive(Serialize)]
struct FunctionEntry<'a> {
    name: &'a str,
    module: String,
}

#[derive(Serialize)]
struct StartupContext<'a> {
    namespace: &'a str,
    functions: Vec<FunctionEntry<'a>>,
    services: Vec<&'a ServiceRegistration>,
    has_openapi_ui: bool,
    openapi_ui_module: String,
}

#[derive(Serialize)]
struct StaticFile {
    route: String,
    path: String,
    url: String,
    resource: String,
}

#[derive(Serialize)]
struct OpenApiUiContext {
    files: Vec<StaticFile>,
}

/// Renders source units through a template provider and renderer.
pub struct SourceSynthesizer<'a> {
    provider: &'a dyn TemplateProvider,
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> SourceSynthesizer<'a> {
    pub fn new(provider: &'a dyn TemplateProvider, renderer: &'a dyn TemplateRenderer) -> Self {
        Self { provider, renderer }
    }

    /// Render one template against a serializable context.
    pub fn render<C: Serialize + ?Sized>(&self, template_id: &str, context: &C) -> Result<String> {
        let context = serde_json::to_value(context)?;
        let template = self.provider.template(template_id)?;
        self.renderer
            .render(&template, &context)
            .map_err(|e| match e {
                Error::Template(message) => Error::Template(format!("{template_id}: {message}")),
                other => other,
            })
    }

    /// Produce every unit of the run, writing them to the output-source
    /// folder when one is configured.
    pub fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<Vec<SourceUnit>> {
        let mut units = Vec::with_capacity(input.definitions.len() + 2);

        for definition in input.definitions {
            debug!("Rendering {} ({})", definition.name, definition.template_id());
            units.push(SourceUnit {
                name: definition.name.clone(),
                text: self.render(definition.template_id(), definition)?,
                diagnostic_path: None,
            });
        }

        let explorer = input.openapi.and_then(|output| self.explorer_context(input.namespace, output));
        let startup = StartupContext {
            namespace: input.namespace,
            functions: input
                .definitions
                .iter()
                .map(|d| FunctionEntry {
                    name: &d.name,
                    module: module_name(&d.name),
                })
                .collect(),
            services: input.services.iter().collect(),
            has_openapi_ui: explorer.is_some(),
            openapi_ui_module: module_name(OPENAPI_UI_UNIT),
        };
        units.push(SourceUnit {
            name: input.namespace.to_string(),
            text: self.render("startup", &startup)?,
            diagnostic_path: None,
        });

        if let Some(context) = explorer {
            units.push(SourceUnit {
                name: OPENAPI_UI_UNIT.to_string(),
                text: self.render("openapi_ui", &context)?,
                diagnostic_path: None,
            });
        }

        check_module_names(&units)?;

        if let Some(folder) = input.output_source_folder {
            write_units(folder, &mut units)?;
        }

        info!("Synthesized {} source unit(s)", units.len());
        Ok(units)
    }

    fn explorer_context(&self, namespace: &str, output: &OpenApiOutput) -> Option<OpenApiUiContext> {
        if output.user_interface_route.is_none() && output.redoc_user_interface_route.is_none() {
            return None;
        }

        let routes = [
            ("OpenApi.", output.user_interface_route.as_deref()),
            ("ReDoc.", output.redoc_user_interface_route.as_deref()),
        ];
        let files = output
            .files
            .iter()
            .filter_map(|file| {
                routes.iter().find_map(|(prefix, route)| {
                    let path = file.filename.strip_prefix(prefix)?;
                    let route = (*route)?;
                    Some(StaticFile {
                        route: route.to_string(),
                        path: path.to_string(),
                        url: format!("/{route}/{path}"),
                        resource: format!("{namespace}.{}", file.filename),
                    })
                })
            })
            .collect();

        Some(OpenApiUiContext { files })
    }
}

fn check_module_names(units: &[SourceUnit]) -> Result<()> {
    let mut seen = FxHashSet::default();
    for unit in units {
        let module = unit.module_name();
        if module.is_empty() || RESERVED_MODULES.contains(&module.as_str()) || !seen.insert(module.clone()) {
            return Err(Error::configuration(format!(
                "unit {} maps to module name {module:?}, which is empty, reserved or already used",
                unit.name
            )));
        }
    }
    Ok(())
}

fn write_units(folder: &Path, units: &mut [SourceUnit]) -> Result<()> {
    if !folder.is_dir() {
        warn!(
            "Output source folder {} does not exist, synthesized source is not written",
            folder.display()
        );
        return Ok(());
    }

    for unit in units.iter_mut() {
        let path = folder.join(format!("{}.rs", unit.name));
        fs::write(&path, &unit.text)?;
        unit.diagnostic_path = Some(path);
    }
    info!("Wrote synthesized source to {}", folder.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{PropertyDescriptor, TypeDescriptor, TypeRef};
    use crate::model::AuthorizationKind;
    use crate::model::builder::{FunctionApp, FunctionHostBuilder};
    use crate::normalize::Normalizer;
    use crate::openapi::OpenApiFile;
    use crate::synth::{BuiltinTemplates, PlaceholderRenderer};
    use tempfile::TempDir;

    fn app() -> FunctionApp {
        let mut host = FunctionHostBuilder::new();
        host.describe(
            TypeDescriptor::object("shop::GetWidget")
                .property(PropertyDescriptor::new("Id", TypeRef::string()))
                .property(PropertyDescriptor::new("Filter", TypeRef::string())),
        )
        .describe(TypeDescriptor::object("shop::Widget"))
        .describe(TypeDescriptor::object("shop::WidgetChanged"))
        .setup(|services| {
            services.add_singleton("shop::WidgetStore", "shop::MemoryWidgetStore");
        })
        .functions(|f| {
            f.http_route("widgets", |r| {
                r.http_function("shop::GetWidget")
                    .route("{id}")
                    .authorization(AuthorizationKind::Anonymous)
                    .returns(TypeRef::named("shop::Widget"))
                    .header("Filter", "x-filter");
            });
            f.event_feed("cosmos", "shop", |feed| {
                feed.change_feed_function("shop::WidgetChanged", "widgets")
                    .max_items_per_invocation(50);
            });
        });
        let mut app = host.build();
        Normalizer::new(&app.catalog, &app.defaults, "shop_functions")
            .normalize(&mut app.definitions)
            .unwrap();
        app
    }

    fn input<'a>(app: &'a FunctionApp, openapi: Option<&'a OpenApiOutput>) -> SynthesisInput<'a> {
        SynthesisInput {
            namespace: "shop_functions",
            definitions: &app.definitions,
            services: &app.services,
            openapi,
            output_source_folder: None,
        }
    }

    #[test]
    fn test_unit_per_definition_plus_startup() {
        let app = app();
        let synthesizer = SourceSynthesizer::new(&BuiltinTemplates, &PlaceholderRenderer);

        let units = synthesizer.synthesize(&input(&app, None)).unwrap();

        let names: Vec<_> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["GetWidget", "WidgetChanged", "shop_functions"]);

        let http = &units[0].text;
        assert!(http.contains("pub type Command = shop::GetWidget;"));
        assert!(http.contains("HttpBinding::new(\"widgets/{id}\", Authorization::named(\"anonymous\"))"));
        assert!(http.contains("http.verb(\"get\");"));
        assert!(http.contains("http.route_parameter(\"Id\", \"id\", false);"));
        assert!(http.contains("http.header(\"Filter\", \"x-filter\");"));
        assert!(http.contains("registration.returns(\"shop::Widget\");"));
        assert!(!http.contains("query_parameter(\"Filter\""));

        let feed = &units[1].text;
        assert!(feed.contains("EventFeedBinding::new(\n        \"cosmos\",\n        \"shop\",\n        \"widgets\","));
        assert!(feed.contains("feed.setting(\"max_items_per_invocation\", 50);"));
        assert!(feed.contains("CommandShape::named(\"plain\")"));

        let startup = &units[2].text;
        assert!(startup.contains("index.register(crate::get_widget::registration());"));
        assert!(startup.contains("index.register(crate::widget_changed::registration());"));
        assert!(startup.contains(
            "index.service(\"shop::WidgetStore\", \"shop::MemoryWidgetStore\", bindery::runtime::ServiceLifetime::named(\"singleton\"));"
        ));
        assert!(!startup.contains("add_routes"));
    }

    #[test]
    fn test_string_inputs_are_escaped() {
        let mut host = FunctionHostBuilder::new();
        host.describe(
            TypeDescriptor::object("shop::GetWidget")
                .property(PropertyDescriptor::new("Filter", TypeRef::string())),
        )
        .functions(|f| {
            f.http_route("widgets", |r| {
                r.http_function("shop::GetWidget")
                    .header("Filter", r#"x-"filter"\raw"#);
            });
        });
        let mut app = host.build();
        Normalizer::new(&app.catalog, &app.defaults, "shop_functions")
            .normalize(&mut app.definitions)
            .unwrap();
        let synthesizer = SourceSynthesizer::new(&BuiltinTemplates, &PlaceholderRenderer);

        let units = synthesizer.synthesize(&input(&app, None)).unwrap();

        assert!(units[0].text.contains(r#"http.header("Filter", "x-\"filter\"\\raw");"#));
    }

    #[test]
    fn test_explorer_unit_when_requested() {
        let app = app();
        let output = OpenApiOutput {
            files: vec![
                OpenApiFile {
                    filename: "OpenApi.openapi.yaml".to_string(),
                    content: Vec::new(),
                },
                OpenApiFile {
                    filename: "OpenApi.index.html".to_string(),
                    content: Vec::new(),
                },
            ],
            user_interface_route: Some("openapi".to_string()),
            redoc_user_interface_route: None,
        };
        let synthesizer = SourceSynthesizer::new(&BuiltinTemplates, &PlaceholderRenderer);

        let units = synthesizer.synthesize(&input(&app, Some(&output))).unwrap();

        let ui = units.last().unwrap();
        assert_eq!(ui.name, OPENAPI_UI_UNIT);
        assert!(ui.text.contains(
            "StaticRoute::new(\"/openapi/index.html\", \"shop_functions.OpenApi.index.html\")"
        ));
        let startup = &units[units.len() - 2];
        assert!(startup.text.contains("crate::open_api_ui::add_routes(&mut index);"));
    }

    #[test]
    fn test_no_explorer_unit_without_ui_route() {
        let app = app();
        let output = OpenApiOutput {
            files: vec![OpenApiFile {
                filename: "OpenApi.openapi.yaml".to_string(),
                content: Vec::new(),
            }],
            ..Default::default()
        };
        let synthesizer = SourceSynthesizer::new(&BuiltinTemplates, &PlaceholderRenderer);

        let units = synthesizer.synthesize(&input(&app, Some(&output))).unwrap();

        assert!(units.iter().all(|u| u.name != OPENAPI_UI_UNIT));
    }

    #[test]
    fn test_units_written_to_output_folder() {
        let app = app();
        let dir = TempDir::new().unwrap();
        let synthesizer = SourceSynthesizer::new(&BuiltinTemplates, &PlaceholderRenderer);
        let input = SynthesisInput {
            output_source_folder: Some(dir.path()),
            ..input(&app, None)
        };

        let units = synthesizer.synthesize(&input).unwrap();

        let written = dir.path().join("GetWidget.rs");
        assert_eq!(units[0].diagnostic_path.as_deref(), Some(written.as_path()));
        assert_eq!(fs::read_to_string(written).unwrap(), units[0].text);
    }

    #[test]
    fn test_missing_output_folder_is_skipped() {
        let app = app();
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let synthesizer = SourceSynthesizer::new(&BuiltinTemplates, &PlaceholderRenderer);
        let input = SynthesisInput {
            output_source_folder: Some(&missing),
            ..input(&app, None)
        };

        let units = synthesizer.synthesize(&input).unwrap();

        assert!(units.iter().all(|u| u.diagnostic_path.is_none()));
        assert!(!missing.exists());
    }

    #[test]
    fn test_module_name_collision() {
        let app = app();
        let synthesizer = SourceSynthesizer::new(&BuiltinTemplates, &PlaceholderRenderer);
        let input = SynthesisInput {
            namespace: "get_widget",
            ..input(&app, None)
        };

        let err = synthesizer.synthesize(&input).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_template_errors_name_the_template() {
        struct Broken;
        impl TemplateProvider for Broken {
            fn template(&self, _id: &str) -> Result<std::borrow::Cow<'_, str>> {
                Ok("{{#if name}}".into())
            }
        }
        let synthesizer = SourceSynthesizer::new(&Broken, &PlaceholderRenderer);

        let err = synthesizer.render("http", &serde_json::json!({})).unwrap_err();
        assert!(err.to_string().contains("http: unclosed"));
    }
}
