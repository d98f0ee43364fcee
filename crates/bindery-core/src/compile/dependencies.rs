//! Dependency closure of the synthesized units.
//!
//! The closure starts from the base modules every unit needs, adds the
//! modules defining each command and result type and the contracts they
//! implement, adds every module behind a registered service, then expands
//! one level over each collected module's direct dependencies.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use super::manifest_parser::read_manifest_dependencies;
use super::types::{CORE_MODULES, CompilerConfig};
use crate::describe::TypeCatalog;
use crate::error::Result;
use crate::model::FunctionDefinition;
use crate::model::builder::ServiceCollection;

/// A module (crate) the generated library links against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    /// Crate name
    pub name: String,

    /// Version requirement (e.g., "1.0", "^2.0")
    pub version: Option<String>,

    /// Features to enable
    pub features: Vec<String>,

    /// Local crate directory
    pub path: Option<PathBuf>,
}

impl ModuleRef {
    /// A module with no location; resolved by cargo from the registry.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            features: Vec::new(),
            path: None,
        }
    }

    pub fn version(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::named(name)
        }
    }

    pub fn path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::named(name)
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    fn is_core(&self) -> bool {
        is_core_module(&self.name)
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, &self.version) {
            (Some(path), _) => write!(f, "{} ({})", self.name, path.display()),
            (None, Some(version)) => write!(f, "{} {}", self.name, version),
            (None, None) => f.write_str(&self.name),
        }
    }
}

fn is_core_module(name: &str) -> bool {
    CORE_MODULES.contains(&name)
}

/// Locates modules and their direct dependencies.
pub trait ModuleCatalog {
    /// Location of a module by crate name; `None` when unknown.
    fn locate(&self, name: &str) -> Option<ModuleRef>;

    /// Direct dependencies of a located module.
    fn direct_dependencies(&self, module: &ModuleRef) -> Result<Vec<ModuleRef>>;
}

/// In-memory module catalog.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, (ModuleRef, Vec<ModuleRef>)>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: ModuleRef, dependencies: Vec<ModuleRef>) -> &mut Self {
        self.modules
            .insert(module.name.clone(), (module, dependencies));
        self
    }
}

impl ModuleCatalog for ModuleRegistry {
    fn locate(&self, name: &str) -> Option<ModuleRef> {
        self.modules.get(name).map(|(module, _)| module.clone())
    }

    fn direct_dependencies(&self, module: &ModuleRef) -> Result<Vec<ModuleRef>> {
        Ok(self
            .modules
            .get(&module.name)
            .map(|(_, deps)| deps.clone())
            .unwrap_or_default())
    }
}

/// Module catalog backed by a project's `Cargo.toml`.
///
/// Modules are located through the project's `[dependencies]`; the direct
/// dependencies of a path module are read from its own manifest. Registry
/// modules report none, cargo resolves those itself.
#[derive(Debug)]
pub struct CargoModuleCatalog {
    project_dir: PathBuf,
    dependencies: IndexMap<String, ModuleRef>,
}

impl CargoModuleCatalog {
    /// Read `project_dir/Cargo.toml`. A missing manifest yields an empty catalog.
    pub fn from_project_dir(project_dir: &Path) -> Result<Self> {
        let manifest = project_dir.join("Cargo.toml");
        let dependencies = if manifest.is_file() {
            read_manifest_dependencies(&manifest)?
        } else {
            Vec::new()
        };
        debug!(
            "Loaded {} project dependencies from {}",
            dependencies.len(),
            manifest.display()
        );

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            dependencies: dependencies
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
        })
    }

    fn absolute(&self, module: &ModuleRef) -> ModuleRef {
        let mut module = module.clone();
        if let Some(path) = module.path.as_mut() {
            if path.is_relative() {
                *path = self.project_dir.join(&*path);
            }
        }
        module
    }
}

impl ModuleCatalog for CargoModuleCatalog {
    fn locate(&self, name: &str) -> Option<ModuleRef> {
        self.dependencies.get(name).map(|m| self.absolute(m))
    }

    fn direct_dependencies(&self, module: &ModuleRef) -> Result<Vec<ModuleRef>> {
        let Some(dir) = &module.path else {
            return Ok(Vec::new());
        };
        let manifest = dir.join("Cargo.toml");
        if !manifest.is_file() {
            return Ok(Vec::new());
        }
        Ok(read_manifest_dependencies(&manifest)?
            .into_iter()
            .map(|dep| match dep.path {
                Some(path) if path.is_relative() => ModuleRef {
                    path: Some(dir.join(path)),
                    ..dep
                },
                _ => dep,
            })
            .collect())
    }
}

/// Module that defines `path`: the catalog's record, else the first segment.
fn module_of(catalog: &TypeCatalog, path: &str) -> Option<String> {
    match catalog.get(path) {
        Some(descriptor) => Some(descriptor.module.clone()),
        None => path
            .split_once("::")
            .map(|(module, _)| module.to_string()),
    }
}

/// Ordered set of modules, first insertion wins.
#[derive(Default)]
struct Closure {
    modules: IndexMap<String, ModuleRef>,
}

impl Closure {
    fn add(&mut self, name: &str, catalog: &dyn ModuleCatalog) {
        if is_core_module(name) || self.modules.contains_key(name) {
            return;
        }
        let module = catalog
            .locate(name)
            .unwrap_or_else(|| ModuleRef::named(name));
        self.modules.insert(name.to_string(), module);
    }

    fn add_type(&mut self, types: &TypeCatalog, path: &str, catalog: &dyn ModuleCatalog) {
        if let Some(module) = module_of(types, path) {
            self.add(&module, catalog);
        }
        if let Some(descriptor) = types.get(path) {
            for contract in &descriptor.contracts {
                self.add(&contract.module, catalog);
            }
        }
    }
}

/// Resolve the modules the synthesized units must be compiled against.
pub fn resolve_dependency_closure(
    definitions: &[FunctionDefinition],
    types: &TypeCatalog,
    services: &ServiceCollection,
    config: &CompilerConfig,
    catalog: &dyn ModuleCatalog,
) -> Result<Vec<ModuleRef>> {
    let mut closure = Closure::default();

    for name in config.base_modules.iter().chain(&config.binding_modules) {
        closure.add(name, catalog);
    }

    for definition in definitions {
        closure.add_type(types, &definition.command_type, catalog);
        if let Some(result) = &definition.command_result_type {
            for path in result.named_paths() {
                closure.add_type(types, path, catalog);
            }
        }
    }

    for path in services.type_paths() {
        closure.add_type(types, path, catalog);
    }

    if let Some(module) = &config.configuration_module {
        closure.add(module, catalog);
    }

    // One level only: modules found here are not expanded further
    let direct: Vec<ModuleRef> = closure.modules.values().cloned().collect();
    for module in &direct {
        for dependency in catalog.direct_dependencies(module)? {
            if dependency.is_core() || closure.modules.contains_key(&dependency.name) {
                continue;
            }
            debug!("{} pulls in {}", module.name, dependency);
            closure.modules.insert(dependency.name.clone(), dependency);
        }
    }

    Ok(closure.modules.into_values().collect())
}
