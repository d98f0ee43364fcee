//! Serialized OpenAPI documents and the API-explorer asset bundle.

use std::fs;
use std::path::Path;

use rust_embed::Embed;
use serde::Serialize;
use tracing::{debug, info};

use super::assembler::{RouteAssembler, apply_document_filters};
use super::config::{DocumentInfo, InjectedAsset, OpenApiConfiguration, OutputFormat};
use super::document::ApiDocument;
use crate::describe::TypeCatalog;
use crate::error::Result;
use crate::model::FunctionDefinition;

/// Route prefix used when neither the configuration nor `host.json` sets one.
pub const DEFAULT_ROUTE_PREFIX: &str = "api";

const SWAGGER_PREFIX: &str = "OpenApi";
const REDOC_PREFIX: &str = "ReDoc";

#[derive(Embed)]
#[folder = "assets/openapi/"]
struct SwaggerAssets;

#[derive(Embed)]
#[folder = "assets/redoc/"]
struct ReDocAssets;

/// One output file, named by its logical resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenApiFile {
    /// e.g. `OpenApi.openapi.yaml` or `OpenApi.index.html`.
    pub filename: String,
    pub content: Vec<u8>,
}

impl OpenApiFile {
    fn new(prefix: &str, name: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: format!("{prefix}.{name}"),
            content: content.into(),
        }
    }
}

/// Everything the OpenAPI stage produced.
#[derive(Debug, Clone, Default)]
pub struct OpenApiOutput {
    pub files: Vec<OpenApiFile>,
    pub user_interface_route: Option<String>,
    pub redoc_user_interface_route: Option<String>,
}

impl OpenApiOutput {
    pub fn file(&self, filename: &str) -> Option<&OpenApiFile> {
        self.files.iter().find(|f| f.filename == filename)
    }

    /// Write every file into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for file in &self.files {
            fs::write(dir.join(&file.filename), &file.content)?;
        }
        info!("Wrote {} OpenAPI file(s) to {}", self.files.len(), dir.display());
        Ok(())
    }
}

/// Entry of `openapi-documents-spec.json`, read by the explorer's picker.
#[derive(Debug, Serialize)]
struct DocumentsSpecEntry {
    title: String,
    selected: bool,
    path: String,
}

/// Produces the OpenAPI output of a function app.
pub struct OpenApiCompiler<'c> {
    config: &'c OpenApiConfiguration,
}

impl<'c> OpenApiCompiler<'c> {
    pub fn new(config: &'c OpenApiConfiguration) -> Self {
        Self { config }
    }

    /// Assemble and serialize every configured document.
    ///
    /// Returns `None` when OpenAPI output is not configured or nothing was
    /// produced. `project_dir` is searched for `host.json`.
    pub fn compile(
        &self,
        definitions: &[FunctionDefinition],
        catalog: &TypeCatalog,
        project_dir: Option<&Path>,
    ) -> Result<Option<OpenApiOutput>> {
        self.config.validate()?;
        if !self.config.is_enabled() || !definitions.iter().any(|d| d.http().is_some()) {
            return Ok(None);
        }

        let assembler = RouteAssembler::new(self.config, route_prefix(self.config, project_dir)?);
        let default_document;
        let documents: Vec<&DocumentInfo> = if self.config.documents.is_empty() {
            default_document = DocumentInfo::new(self.config.default_document_route());
            vec![&default_document]
        } else {
            self.config.documents.iter().collect()
        };

        let swagger_route = self.config.user_interface_route.as_deref();
        let redoc_route = self.config.redoc_user_interface_route.as_deref();
        let mut output = OpenApiOutput {
            user_interface_route: swagger_route.map(str::to_string),
            redoc_user_interface_route: redoc_route.map(str::to_string),
            ..Default::default()
        };
        let mut swagger_specs = Vec::new();
        let mut redoc_specs = Vec::new();

        for info in &documents {
            let mut document = assembler.assemble(definitions, catalog, info)?;
            if document.paths.is_empty() {
                debug!("Document {} has no paths and is not emitted", info.route);
                continue;
            }
            let name = info.route.replace('/', ".");

            output.files.push(OpenApiFile::new(
                SWAGGER_PREFIX,
                &name,
                self.serialize(&document)?,
            ));
            swagger_specs.push(DocumentsSpecEntry {
                title: document.info.title.clone(),
                selected: info.selected,
                path: format!("/{}/{}", swagger_route.unwrap_or("openapi"), info.route),
            });

            if let Some(redoc_route) = redoc_route {
                apply_document_filters(&self.config.redoc_document_filters, &mut document, &info.route);
                output
                    .files
                    .push(OpenApiFile::new(REDOC_PREFIX, &name, self.serialize(&document)?));
                redoc_specs.push(DocumentsSpecEntry {
                    title: document.info.title.clone(),
                    selected: info.selected,
                    path: format!("/{redoc_route}/{}", info.route),
                });
            }
        }

        if output.files.is_empty() {
            return Ok(None);
        }

        let selected_route = documents
            .iter()
            .find(|d| d.selected)
            .or(documents.first())
            .map(|d| d.route.as_str())
            .unwrap_or_default();

        if let Some(route) = swagger_route {
            output.files.push(OpenApiFile::new(
                SWAGGER_PREFIX,
                "openapi-documents-spec.json",
                serde_json::to_vec(&swagger_specs)?,
            ));
            self.bundle::<SwaggerAssets>(SWAGGER_PREFIX, route, selected_route, &mut output.files);
        }
        if let Some(route) = redoc_route {
            output.files.push(OpenApiFile::new(
                REDOC_PREFIX,
                "redoc-documents-spec.json",
                serde_json::to_vec(&redoc_specs)?,
            ));
            self.bundle::<ReDocAssets>(REDOC_PREFIX, route, selected_route, &mut output.files);
        }

        info!("Produced {} OpenAPI file(s)", output.files.len());
        Ok(Some(output))
    }

    fn serialize(&self, document: &ApiDocument) -> Result<Vec<u8>> {
        Ok(match self.config.output_format {
            OutputFormat::Yaml => serde_yaml::to_string(document)?.into_bytes(),
            OutputFormat::Json => serde_json::to_vec_pretty(document)?,
        })
    }

    /// Add the explorer shell, its scripts and the injected assets.
    fn bundle<A: Embed>(
        &self,
        prefix: &str,
        route: &str,
        document_route: &str,
        files: &mut Vec<OpenApiFile>,
    ) {
        let mut links = String::new();
        for asset in &self.config.injected_stylesheets {
            links.push_str(&format!(
                "    <link rel='stylesheet' type='text/css' href='/{route}/{}' media='{}' />\n",
                asset.name,
                asset.media.as_deref().unwrap_or("screen")
            ));
            files.push(OpenApiFile::new(prefix, &asset.name, asset.content.clone()));
        }

        for asset in &self.config.injected_resources {
            files.push(OpenApiFile::new(prefix, &asset.name, asset.content.clone()));
        }

        if let Some(logo) = &self.config.injected_logo {
            files.push(OpenApiFile::new(prefix, &logo_name(logo), logo.content.clone()));
        }

        let mut scripts = String::new();
        for asset in &self.config.injected_scripts {
            scripts.push_str(&format!("    <script src=\"/{route}/{}\"></script>\n", asset.name));
            files.push(OpenApiFile::new(prefix, &asset.name, asset.content.clone()));
        }
        scripts.push_str(&format!(
            "    <script src=\"/{route}/topbar-multiple-specs.js\"></script>\n"
        ));

        let mut names: Vec<String> = A::iter().map(|name| name.to_string()).collect();
        names.sort();
        for name in names {
            let Some(asset) = A::get(&name) else {
                continue;
            };
            let content = if name == "index.html" {
                String::from_utf8_lossy(&asset.data)
                    .replace("./openapi.yaml", &format!("/{route}/{document_route}"))
                    .replace("href=\"./", &format!("href=\"/{route}/"))
                    .replace("</head>", &format!("{links}  </head>"))
                    .replace("</body>", &format!("{scripts}  </body>"))
                    .into_bytes()
            } else {
                asset.data.into_owned()
            };
            files.push(OpenApiFile::new(prefix, &name, content));
        }
    }
}

fn logo_name(logo: &InjectedAsset) -> String {
    match Path::new(&logo.name).extension().and_then(|e| e.to_str()) {
        Some(extension) => format!("logo.{extension}"),
        None => "logo".to_string(),
    }
}

/// Route prefix: configuration, then `extensions.http.routePrefix` of
/// `host.json` in `project_dir`, then [`DEFAULT_ROUTE_PREFIX`].
pub fn route_prefix(config: &OpenApiConfiguration, project_dir: Option<&Path>) -> Result<String> {
    if let Some(prefix) = &config.route_prefix {
        return Ok(prefix.clone());
    }

    if let Some(host_json) = project_dir.map(|dir| dir.join("host.json")) {
        if host_json.is_file() {
            let host: serde_json::Value = serde_json::from_str(&fs::read_to_string(&host_json)?)?;
            if let Some(prefix) = host
                .pointer("/extensions/http/routePrefix")
                .and_then(serde_json::Value::as_str)
            {
                debug!("Using route prefix {:?} from {}", prefix, host_json.display());
                return Ok(prefix.to_string());
            }
        }
    }

    Ok(DEFAULT_ROUTE_PREFIX.to_string())
}
