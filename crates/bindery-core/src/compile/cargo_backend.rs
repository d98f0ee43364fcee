//! Compiler backend that builds a standalone cargo crate.
//!
//! ```text
//! .bindery/build/<module>/
//! ├── Cargo.toml      # one [dependencies] entry per resolved module
//! ├── resources/      # embedded resource payloads
//! └── src/
//!     ├── lib.rs      # `pub mod` per unit
//!     ├── resources.rs
//!     └── <unit>.rs
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::backend::{BackendOutput, BackendRequest, CompilerBackend, EmbeddedResource};
use super::cargo_generator::{ManifestConfig, ReleaseProfile, generate_cargo_toml};
use super::dependencies::ModuleRef;
use super::diagnostics::{Diagnostic, DiagnosticMapper};
use super::toolchain::Toolchain;
use super::types::{CompilerConfig, dylib_extension, dylib_prefix};
use crate::error::{Error, Result};

pub struct CargoBackend {
    config: CompilerConfig,
    toolchain: Toolchain,
}

impl CargoBackend {
    pub fn new(config: CompilerConfig, toolchain: Toolchain) -> Self {
        Self { config, toolchain }
    }

    /// Backend using the cargo found on this machine.
    pub fn detect(config: CompilerConfig) -> Result<Self> {
        Ok(Self::new(config, Toolchain::detect()?))
    }

    fn crate_dir(&self, module_name: &str) -> PathBuf {
        self.config.build_dir.join(module_name)
    }

    /// Point an unlocated `bindery` module at the local checkout, if any.
    fn locate_modules(&self, modules: &[ModuleRef]) -> Vec<ModuleRef> {
        modules
            .iter()
            .map(|module| match &self.config.bindery_crate_path {
                Some(path)
                    if module.name == "bindery"
                        && module.path.is_none()
                        && module.version.is_none() =>
                {
                    ModuleRef::path("bindery", path)
                }
                _ => module.clone(),
            })
            .collect()
    }

    /// Write the crate and return the mapper for its unit files.
    fn write_crate(&self, crate_dir: &Path, request: &BackendRequest<'_>) -> Result<DiagnosticMapper> {
        let src_dir = crate_dir.join("src");
        let resources_dir = crate_dir.join("resources");
        // Units from a previous run must not be compiled again
        for dir in [&src_dir, &resources_dir] {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
            fs::create_dir_all(dir)?;
        }

        let manifest = ManifestConfig {
            name: request.module_name,
            release_profile: self.config.release.then(ReleaseProfile::deployment),
            ..Default::default()
        };
        let modules = self.locate_modules(request.modules);
        fs::write(crate_dir.join("Cargo.toml"), generate_cargo_toml(&manifest, &modules))?;

        let mut mapper = DiagnosticMapper::new();
        let mut lib_rs = String::from("// Generated by bindery. Do not edit.\n\n");
        for unit in request.units {
            let module = unit.module_name();
            let file = format!("src/{module}.rs");
            fs::write(crate_dir.join(&file), &unit.text)?;
            if let Some(path) = &unit.diagnostic_path {
                mapper.add_file(file, path);
            }
            lib_rs.push_str(&format!("pub mod {module};\n"));
        }
        lib_rs.push_str("pub mod resources;\n");
        fs::write(src_dir.join("lib.rs"), lib_rs)?;

        fs::write(
            src_dir.join("resources.rs"),
            generate_resources_rs(request.resources, &resources_dir)?,
        )?;

        Ok(mapper)
    }

    fn cargo_build(&self, crate_dir: &Path) -> Result<std::process::Output> {
        let mut cmd = self.toolchain.cargo();
        cmd.current_dir(crate_dir)
            .args(["build", "--lib", "--message-format=json"]);
        if self.config.release {
            cmd.arg("--release");
        }
        if self.config.offline {
            cmd.arg("--offline");
        }

        let mut rustflags = self.config.extra_rustc_flags.clone();
        if self.config.deny_warnings {
            rustflags.extend(["-D".to_string(), "warnings".to_string()]);
        }
        if !rustflags.is_empty() {
            cmd.env("RUSTFLAGS", rustflags.join(" "));
        }

        debug!("Running {:?}", cmd);
        cmd.output().map_err(|e| {
            Error::Toolchain(format!(
                "Failed to run cargo (working dir: {}): {}",
                crate_dir.display(),
                e
            ))
        })
    }
}

impl CompilerBackend for CargoBackend {
    fn compile(&self, request: &BackendRequest<'_>) -> Result<BackendOutput> {
        let crate_dir = self.crate_dir(request.module_name);
        let mapper = self.write_crate(&crate_dir, request)?;
        info!("Building {} with {}", crate_dir.display(), self.toolchain.version());

        let output = self.cargo_build(&crate_dir)?;
        let mut diagnostics = mapper.parse(&String::from_utf8_lossy(&output.stdout));
        let success = output.status.success();

        if !success && !diagnostics.iter().any(Diagnostic::is_failure) {
            // Manifest and resolution errors are only printed to stderr
            let stderr = String::from_utf8_lossy(&output.stderr);
            diagnostics.push(Diagnostic::error(stderr.trim()));
        }

        if !success {
            return Ok(BackendOutput {
                success,
                diagnostics,
                artifact: None,
            });
        }

        let library = format!(
            "{}{}.{}",
            dylib_prefix(),
            request.module_name.replace('-', "_"),
            dylib_extension()
        );
        let built = crate_dir
            .join("target")
            .join(self.config.profile())
            .join(&library);
        fs::create_dir_all(request.output_dir)?;
        let artifact = request.output_dir.join(&library);
        fs::copy(&built, &artifact)?;

        Ok(BackendOutput {
            success,
            diagnostics,
            artifact: Some(artifact),
        })
    }
}

/// Write each payload under `resources_dir` and index them by name.
fn generate_resources_rs(resources: &[EmbeddedResource], resources_dir: &Path) -> Result<String> {
    let mut source = String::from("// Generated by bindery. Do not edit.\n\n");
    source.push_str("pub static RESOURCES: &[(&str, &[u8])] = &[\n");
    for (index, resource) in resources.iter().enumerate() {
        fs::write(resources_dir.join(index.to_string()), &resource.content)?;
        source.push_str(&format!(
            "    ({:?}, include_bytes!(\"../resources/{index}\")),\n",
            resource.name
        ));
    }
    source.push_str("];\n\n");
    source.push_str(
        "pub fn get(name: &str) -> Option<&'static [u8]> {\n    \
         RESOURCES.iter().find(|(n, _)| *n == name).map(|(_, content)| *content)\n}\n",
    );
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SourceUnit;
    use tempfile::TempDir;

    fn backend(build_dir: &Path) -> CargoBackend {
        let config = CompilerConfig {
            build_dir: build_dir.to_path_buf(),
            bindery_crate_path: Some(PathBuf::from("/src/bindery/crates/bindery")),
            ..CompilerConfig::default()
        };
        let toolchain = Toolchain {
            cargo_path: PathBuf::from("cargo"),
            version: "cargo 1.85.0".to_string(),
        };
        CargoBackend::new(config, toolchain)
    }

    #[test]
    fn test_write_crate_layout() {
        let temp = TempDir::new().unwrap();
        let backend = backend(temp.path());
        let units = [
            SourceUnit {
                name: "GetWidget".to_string(),
                text: "pub type Command = shop::GetWidget;\n".to_string(),
                diagnostic_path: Some(PathBuf::from("/out/GetWidget.rs")),
            },
            SourceUnit {
                name: "shop_functions".to_string(),
                text: "// startup\n".to_string(),
                diagnostic_path: None,
            },
        ];
        let modules = [ModuleRef::named("bindery"), ModuleRef::version("serde", "1.0")];
        let resources = [EmbeddedResource {
            name: "shop_functions.OpenApi.openapi.yaml".to_string(),
            content: b"openapi: 3.0.1\n".to_vec(),
        }];
        let request = BackendRequest {
            module_name: "shop_functions",
            units: &units,
            modules: &modules,
            resources: &resources,
            output_dir: temp.path(),
        };
        let crate_dir = backend.crate_dir("shop_functions");

        let mapper = backend.write_crate(&crate_dir, &request).unwrap();

        let manifest = fs::read_to_string(crate_dir.join("Cargo.toml")).unwrap();
        assert!(manifest.contains("bindery = { path = \"/src/bindery/crates/bindery\" }"));
        assert!(manifest.contains("serde = \"1.0\""));

        let lib_rs = fs::read_to_string(crate_dir.join("src/lib.rs")).unwrap();
        assert!(lib_rs.contains("pub mod get_widget;\npub mod shop_functions;\npub mod resources;"));
        assert!(crate_dir.join("src/get_widget.rs").is_file());

        let resources_rs = fs::read_to_string(crate_dir.join("src/resources.rs")).unwrap();
        assert!(resources_rs.contains(
            "(\"shop_functions.OpenApi.openapi.yaml\", include_bytes!(\"../resources/0\"))"
        ));
        assert_eq!(
            fs::read(crate_dir.join("resources/0")).unwrap(),
            b"openapi: 3.0.1\n"
        );

        let json = r#"{"reason":"compiler-message","message":{"message":"boom","code":null,"level":"error","spans":[{"file_name":"src/get_widget.rs","line_start":1,"line_end":1,"column_start":1,"column_end":2,"is_primary":true}],"children":[]}}"#;
        let diagnostics = mapper.parse(json);
        assert_eq!(
            diagnostics[0].location.as_ref().unwrap().file,
            PathBuf::from("/out/GetWidget.rs")
        );
    }

    #[test]
    fn test_stale_units_are_removed() {
        let temp = TempDir::new().unwrap();
        let backend = backend(temp.path());
        let crate_dir = backend.crate_dir("shop_functions");
        fs::create_dir_all(crate_dir.join("src")).unwrap();
        fs::write(crate_dir.join("src/removed_function.rs"), "").unwrap();
        let request = BackendRequest {
            module_name: "shop_functions",
            units: &[],
            modules: &[],
            resources: &[],
            output_dir: temp.path(),
        };

        backend.write_crate(&crate_dir, &request).unwrap();

        assert!(!crate_dir.join("src/removed_function.rs").exists());
        assert!(crate_dir.join("src/lib.rs").is_file());
    }

    #[test]
    fn test_explicit_bindery_version_is_kept() {
        let temp = TempDir::new().unwrap();
        let backend = backend(temp.path());

        let modules = backend.locate_modules(&[ModuleRef::version("bindery", "0.3")]);

        assert_eq!(modules, [ModuleRef::version("bindery", "0.3")]);
    }
}
