//! `[dependencies]` reading for Cargo manifests.
//!
//! Manifests are deserialized with `toml`, so every form cargo accepts is
//! understood: plain version strings, inline and dotted tables
//! (`[dependencies.foo]`), multi-line arrays and `workspace = true`
//! inheritance. Target-specific tables are not read.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use super::dependencies::ModuleRef;
use crate::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
struct CargoManifest {
    #[serde(default)]
    dependencies: IndexMap<String, DependencySpec>,
    #[serde(default)]
    workspace: Option<WorkspaceTable>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspaceTable {
    #[serde(default)]
    dependencies: IndexMap<String, DependencySpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependencySpec {
    Version(String),
    Detailed(DetailedDependency),
}

#[derive(Debug, Default, Deserialize)]
struct DetailedDependency {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    workspace: bool,
}

impl DependencySpec {
    fn inherits_workspace(&self) -> bool {
        matches!(self, Self::Detailed(detail) if detail.workspace)
    }

    fn into_module(self, name: &str) -> ModuleRef {
        match self {
            Self::Version(version) => ModuleRef::version(name, version),
            Self::Detailed(detail) => ModuleRef {
                name: name.to_string(),
                version: detail.version,
                features: detail.features,
                path: detail.path,
            },
        }
    }
}

fn parse(content: &str) -> std::result::Result<CargoManifest, toml::de::Error> {
    toml::from_str(content)
}

/// Parse the `[dependencies]` table of a manifest.
///
/// `workspace = true` entries are returned by name with their own features;
/// [`read_manifest_dependencies`] resolves them.
pub fn parse_manifest_dependencies(manifest: &str) -> Result<Vec<ModuleRef>> {
    let manifest = parse(manifest).map_err(|e| Error::Manifest(e.to_string()))?;
    Ok(manifest
        .dependencies
        .into_iter()
        .map(|(name, spec)| spec.into_module(&name))
        .collect())
}

/// Read the `[dependencies]` of the manifest at `path`, resolving
/// `workspace = true` entries against the enclosing workspace.
///
/// Paths declared by the manifest stay relative to its directory; paths
/// inherited from the workspace are made absolute.
pub fn read_manifest_dependencies(path: &Path) -> Result<Vec<ModuleRef>> {
    let mut manifest = read_manifest(path)?;
    let own_workspace = manifest.workspace.take();
    let inherits = manifest
        .dependencies
        .values()
        .any(DependencySpec::inherits_workspace);

    let workspace = if inherits {
        find_workspace(path, own_workspace)?
    } else {
        None
    };

    Ok(manifest
        .dependencies
        .into_iter()
        .map(|(name, spec)| match spec {
            DependencySpec::Detailed(detail) if detail.workspace => {
                inherit(&name, detail.features, workspace.as_ref())
            }
            spec => spec.into_module(&name),
        })
        .collect())
}

fn read_manifest(path: &Path) -> Result<CargoManifest> {
    let content = std::fs::read_to_string(path)?;
    parse(&content).map_err(|e| Error::Manifest(format!("{}: {}", path.display(), e)))
}

/// `[workspace.dependencies]` of the workspace a manifest belongs to.
struct Workspace {
    root: PathBuf,
    dependencies: IndexMap<String, DependencySpec>,
}

fn find_workspace(path: &Path, own: Option<WorkspaceTable>) -> Result<Option<Workspace>> {
    let dir = std::path::absolute(path)?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    if let Some(table) = own {
        return Ok(Some(Workspace {
            root: dir,
            dependencies: table.dependencies,
        }));
    }

    for ancestor in dir.ancestors().skip(1) {
        let candidate = ancestor.join("Cargo.toml");
        if !candidate.is_file() {
            continue;
        }
        if let Some(table) = read_manifest(&candidate)?.workspace {
            debug!("Resolving workspace dependencies from {}", candidate.display());
            return Ok(Some(Workspace {
                root: ancestor.to_path_buf(),
                dependencies: table.dependencies,
            }));
        }
    }

    debug!("No workspace found above {}", dir.display());
    Ok(None)
}

/// A `workspace = true` entry: the workspace's location plus both feature lists.
fn inherit(name: &str, features: Vec<String>, workspace: Option<&Workspace>) -> ModuleRef {
    let Some(workspace) = workspace else {
        return ModuleRef::named(name).with_features(features);
    };
    let mut module = match workspace.dependencies.get(name) {
        Some(DependencySpec::Version(version)) => ModuleRef::version(name, version.clone()),
        Some(DependencySpec::Detailed(detail)) => ModuleRef {
            name: name.to_string(),
            version: detail.version.clone(),
            features: detail.features.clone(),
            path: detail.path.as_ref().map(|p| workspace.root.join(p)),
        },
        None => ModuleRef::named(name),
    };
    for feature in features {
        if !module.features.contains(&feature) {
            module.features.push(feature);
        }
    }
    module
}
