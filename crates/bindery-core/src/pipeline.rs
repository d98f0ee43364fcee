//! One compilation run, all or nothing.
//!
//! ```text
//! FunctionApp ──► Normalizer ──► visibility check ──► dependency closure
//!                                                          │
//!     compile_module ◄── SourceSynthesizer ◄── OpenApiCompiler
//!          │
//!          └──► CompilationOutput (+ OpenAPI files when requested)
//! ```
//!
//! Nothing is written to the output directory unless every stage succeeds.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use tracing::info;

use crate::compile::{
    BackendRequest, CompiledModule, CompilerBackend, CompilerConfig, EmbeddedResource,
    ModuleCatalog, ModuleRef, ModuleRegistry, compile_module, resolve_dependency_closure,
};
use crate::describe::TypeCatalog;
use crate::error::{Error, Result};
use crate::log::CompilerLog;
use crate::model::FunctionDefinition;
use crate::model::builder::FunctionApp;
use crate::normalize::Normalizer;
use crate::openapi::{OpenApiCompiler, OpenApiOutput};
use crate::synth::{
    BuiltinTemplates, PlaceholderRenderer, SourceSynthesizer, SourceUnit, SynthesisInput,
    TemplateProvider, TemplateRenderer,
};

/// Everything a successful run produced.
#[derive(Debug)]
pub struct CompilationOutput {
    pub definitions: Vec<FunctionDefinition>,
    pub modules: Vec<ModuleRef>,
    pub units: Vec<SourceUnit>,
    pub openapi: Option<OpenApiOutput>,
    pub module: CompiledModule,
}

/// Compiles function apps into loadable modules.
pub struct FunctionCompiler {
    namespace: String,
    output_dir: PathBuf,
    config: CompilerConfig,
    backend: Box<dyn CompilerBackend>,
    module_catalog: Box<dyn ModuleCatalog>,
    templates: Box<dyn TemplateProvider>,
    renderer: Box<dyn TemplateRenderer>,
    project_dir: Option<PathBuf>,
    openapi_output_dir: Option<PathBuf>,
}

impl FunctionCompiler {
    /// A compiler writing `namespace` into `output_dir` through `backend`,
    /// with the built-in templates and no module metadata.
    pub fn new(
        namespace: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        backend: impl CompilerBackend + 'static,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            output_dir: output_dir.into(),
            config: CompilerConfig::default(),
            backend: Box::new(backend),
            module_catalog: Box::new(ModuleRegistry::new()),
            templates: Box::new(BuiltinTemplates),
            renderer: Box::new(PlaceholderRenderer),
            project_dir: None,
            openapi_output_dir: None,
        }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_module_catalog(mut self, catalog: impl ModuleCatalog + 'static) -> Self {
        self.module_catalog = Box::new(catalog);
        self
    }

    pub fn with_templates(mut self, templates: impl TemplateProvider + 'static) -> Self {
        self.templates = Box::new(templates);
        self
    }

    pub fn with_renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Directory searched for `host.json`.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Also write the OpenAPI files to `dir` after a successful compile.
    pub fn with_openapi_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.openapi_output_dir = Some(dir.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run every stage. Failures are recorded in `log` before being returned.
    pub fn compile(&self, app: FunctionApp, log: &mut CompilerLog) -> Result<CompilationOutput> {
        let result = self.run(app, log);
        if let Err(e) = &result {
            log.record(e);
        }
        result
    }

    /// Normalize and emit the OpenAPI output only; no module is compiled.
    pub fn openapi(&self, app: FunctionApp, log: &mut CompilerLog) -> Result<Option<OpenApiOutput>> {
        generate_openapi(app, &self.namespace, self.project_dir.as_deref(), log)
    }

    fn run(&self, mut app: FunctionApp, log: &mut CompilerLog) -> Result<CompilationOutput> {
        info!(
            "Compiling {} function(s) into {}",
            app.definitions.len(),
            self.namespace
        );
        prepare(&mut app, &self.namespace)?;

        let modules = resolve_dependency_closure(
            &app.definitions,
            &app.catalog,
            &app.services,
            &self.config,
            self.module_catalog.as_ref(),
        )?;
        info!("Resolved {} module(s)", modules.len());

        let openapi = OpenApiCompiler::new(&app.openapi).compile(
            &app.definitions,
            &app.catalog,
            self.project_dir.as_deref(),
        )?;

        let synthesizer = SourceSynthesizer::new(self.templates.as_ref(), self.renderer.as_ref());
        let units = synthesizer.synthesize(&SynthesisInput {
            namespace: &self.namespace,
            definitions: &app.definitions,
            services: &app.services,
            openapi: openapi.as_ref(),
            output_source_folder: app.output_source_folder.as_deref(),
        })?;

        let resources = embedded_resources(&self.namespace, openapi.as_ref());
        let module = compile_module(
            self.backend.as_ref(),
            &BackendRequest {
                module_name: &self.namespace,
                units: &units,
                modules: &modules,
                resources: &resources,
                output_dir: &self.output_dir,
            },
        )?;
        for warning in &module.warnings {
            log.warning(warning.to_string());
        }

        if let (Some(dir), Some(openapi)) = (&self.openapi_output_dir, &openapi) {
            openapi.write_to(dir)?;
        }

        log.info(format!(
            "compiled {} function(s) into {}",
            app.definitions.len(),
            module.path.display()
        ));

        Ok(CompilationOutput {
            definitions: app.definitions,
            modules,
            units,
            openapi,
            module,
        })
    }
}

/// The OpenAPI half of a run, without a backend. Failures are recorded in `log`.
pub fn generate_openapi(
    mut app: FunctionApp,
    namespace: &str,
    project_dir: Option<&Path>,
    log: &mut CompilerLog,
) -> Result<Option<OpenApiOutput>> {
    let result = prepare(&mut app, namespace).and_then(|()| {
        OpenApiCompiler::new(&app.openapi).compile(&app.definitions, &app.catalog, project_dir)
    });
    if let Err(e) = &result {
        log.record(e);
    }
    result
}

fn prepare(app: &mut FunctionApp, namespace: &str) -> Result<()> {
    Normalizer::new(&app.catalog, &app.defaults, namespace).normalize(&mut app.definitions)?;
    check_visibility(&app.definitions, &app.catalog)
}

/// OpenAPI files as module resources, named `{namespace}.{filename}`.
pub fn embedded_resources(namespace: &str, openapi: Option<&OpenApiOutput>) -> Vec<EmbeddedResource> {
    openapi
        .map(|output| {
            output
                .files
                .iter()
                .map(|file| EmbeddedResource {
                    name: format!("{namespace}.{}", file.filename),
                    content: file.content.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fail with every command or result type that generated code cannot name.
pub fn check_visibility(definitions: &[FunctionDefinition], catalog: &TypeCatalog) -> Result<()> {
    let mut seen = FxHashSet::default();
    let mut offenders = Vec::new();

    for definition in definitions {
        let result_paths = definition
            .command_result_type
            .as_ref()
            .map(|result| result.named_paths())
            .unwrap_or_default();
        let paths = std::iter::once(definition.command_type.as_str()).chain(result_paths);

        for path in paths {
            let Some(descriptor) = catalog.get(path) else {
                continue;
            };
            if !descriptor.is_public() && seen.insert(path) {
                offenders.push(path.to_string());
            }
        }
    }

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(Error::Visibility { types: offenders })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{PropertyDescriptor, TypeDescriptor, TypeRef};
    use crate::model::{HttpTrigger, SharedRoute, Trigger};
    use crate::openapi::OpenApiFile;

    fn definition(command: &str, result: Option<TypeRef>) -> FunctionDefinition {
        let trigger = HttpTrigger::new(SharedRoute::new("widgets"), None);
        let mut definition = FunctionDefinition::new(command, Trigger::Http(trigger));
        definition.command_result_type = result;
        definition
    }

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(
                TypeDescriptor::object("shop::GetWidget")
                    .property(PropertyDescriptor::new("Id", TypeRef::string())),
            )
            .with(TypeDescriptor::object("shop::Widget"))
            .with(TypeDescriptor::object("shop::internal::Secret").restricted())
            .with(TypeDescriptor::object("shop::internal::Hidden").restricted())
    }

    #[test]
    fn test_public_types_pass() {
        let definitions = [definition(
            "shop::GetWidget",
            Some(TypeRef::sequence(TypeRef::named("shop::Widget"))),
        )];

        assert!(check_visibility(&definitions, &catalog()).is_ok());
    }

    #[test]
    fn test_every_restricted_type_is_reported_once() {
        let definitions = [
            definition("shop::internal::Secret", None),
            definition(
                "shop::GetWidget",
                Some(TypeRef::optional(TypeRef::named("shop::internal::Hidden"))),
            ),
            definition("shop::internal::Secret", None),
        ];

        let err = check_visibility(&definitions, &catalog()).unwrap_err();

        let Error::Visibility { types } = err else {
            panic!("expected a visibility error");
        };
        assert_eq!(types, ["shop::internal::Secret", "shop::internal::Hidden"]);
    }

    #[test]
    fn test_resources_are_namespaced() {
        let output = OpenApiOutput {
            files: vec![OpenApiFile {
                filename: "OpenApi.openapi.yaml".to_string(),
                content: b"openapi: 3.0.1".to_vec(),
            }],
            ..OpenApiOutput::default()
        };

        let resources = embedded_resources("shop_functions", Some(&output));

        assert_eq!(resources[0].name, "shop_functions.OpenApi.openapi.yaml");
        assert!(embedded_resources("shop_functions", None).is_empty());
    }
}
