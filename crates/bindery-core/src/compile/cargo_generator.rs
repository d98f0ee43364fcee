//! Cargo manifest generation for the generated function library.

use super::dependencies::ModuleRef;

/// Options for the release profile in Cargo.toml.
#[derive(Debug, Clone)]
pub struct ReleaseProfile {
    /// Optimization level (0-3).
    pub opt_level: u8,
    /// Enable Link-Time Optimization.
    pub lto: bool,
    /// Number of codegen units.
    pub codegen_units: u32,
}

impl Default for ReleaseProfile {
    fn default() -> Self {
        Self {
            opt_level: 3,
            lto: false,
            codegen_units: 16,
        }
    }
}

impl ReleaseProfile {
    /// Profile for libraries that are deployed.
    pub fn deployment() -> Self {
        Self {
            opt_level: 3,
            lto: true,
            codegen_units: 1,
        }
    }
}

/// Configuration for generating a Cargo manifest.
#[derive(Debug, Clone)]
pub struct ManifestConfig<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub edition: &'a str,
    /// Library crate types.
    pub lib_crate_types: &'a [&'a str],
    pub release_profile: Option<ReleaseProfile>,
    /// Add an empty [workspace] table so a parent workspace is not picked up.
    pub standalone_workspace: bool,
}

impl Default for ManifestConfig<'_> {
    fn default() -> Self {
        Self {
            name: "functions",
            version: "0.1.0",
            edition: "2024",
            lib_crate_types: &["cdylib", "rlib"],
            release_profile: None,
            standalone_workspace: true,
        }
    }
}

/// Generate a Cargo.toml with one dependency entry per module.
///
/// Modules with neither a path nor a version are emitted as `"*"`.
pub fn generate_cargo_toml(config: &ManifestConfig<'_>, modules: &[ModuleRef]) -> String {
    let mut toml = String::new();

    toml.push_str("[package]\n");
    toml.push_str(&format!("name = \"{}\"\n", config.name));
    toml.push_str(&format!("version = \"{}\"\n", config.version));
    toml.push_str(&format!("edition = \"{}\"\n", config.edition));
    toml.push_str("publish = false\n");
    toml.push('\n');

    if !config.lib_crate_types.is_empty() {
        toml.push_str("[lib]\n");
        let types: Vec<_> = config
            .lib_crate_types
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect();
        toml.push_str(&format!("crate-type = [{}]\n", types.join(", ")));
        toml.push('\n');
    }

    if let Some(profile) = &config.release_profile {
        toml.push_str("[profile.release]\n");
        toml.push_str(&format!("opt-level = {}\n", profile.opt_level));
        if profile.lto {
            toml.push_str("lto = true\n");
        }
        toml.push_str(&format!("codegen-units = {}\n", profile.codegen_units));
        toml.push('\n');
    }

    toml.push_str("[dependencies]\n");
    for module in modules {
        format_dependency(&mut toml, module);
    }

    if config.standalone_workspace {
        toml.push('\n');
        toml.push_str("[workspace]\n");
    }

    toml
}

fn format_dependency(toml: &mut String, module: &ModuleRef) {
    let mut fields = Vec::new();
    if let Some(path) = &module.path {
        // TOML basic strings treat backslashes as escapes
        fields.push(format!(
            "path = \"{}\"",
            path.display().to_string().replace('\\', "/")
        ));
    }
    if let Some(version) = &module.version {
        fields.push(format!("version = \"{version}\""));
    }
    if !module.features.is_empty() {
        let features: Vec<_> = module.features.iter().map(|f| format!("\"{f}\"")).collect();
        fields.push(format!("features = [{}]", features.join(", ")));
    }

    match fields.as_slice() {
        [] => toml.push_str(&format!("{} = \"*\"\n", module.name)),
        [only] if module.path.is_none() && module.features.is_empty() => {
            let version = only.trim_start_matches("version = ");
            toml.push_str(&format!("{} = {}\n", module.name, version));
        }
        _ => toml.push_str(&format!("{} = {{ {} }}\n", module.name, fields.join(", "))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_manifest() {
        let config = ManifestConfig {
            name: "shop_functions",
            ..Default::default()
        };
        let modules = [
            ModuleRef::version("serde", "1.0").with_features(vec!["derive".to_string()]),
            ModuleRef::version("tracing", "0.1"),
            ModuleRef::named("http"),
        ];
        let toml = generate_cargo_toml(&config, &modules);

        assert!(toml.contains("name = \"shop_functions\""));
        assert!(toml.contains("crate-type = [\"cdylib\", \"rlib\"]"));
        assert!(toml.contains("serde = { version = \"1.0\", features = [\"derive\"] }"));
        assert!(toml.contains("tracing = \"0.1\""));
        assert!(toml.contains("http = \"*\""));
        assert!(toml.contains("[workspace]"));
    }

    #[test]
    fn test_path_dependency() {
        let modules = [ModuleRef::path("shop_model", "/absolute/path/to/model")];
        let toml = generate_cargo_toml(&ManifestConfig::default(), &modules);

        assert!(toml.contains("shop_model = { path = \"/absolute/path/to/model\" }"));
    }

    #[test]
    fn test_with_release_profile() {
        let config = ManifestConfig {
            release_profile: Some(ReleaseProfile::deployment()),
            ..Default::default()
        };
        let toml = generate_cargo_toml(&config, &[]);

        assert!(toml.contains("[profile.release]"));
        assert!(toml.contains("opt-level = 3"));
        assert!(toml.contains("lto = true"));
        assert!(toml.contains("codegen-units = 1"));
    }

    #[test]
    fn test_not_standalone() {
        let config = ManifestConfig {
            standalone_workspace: false,
            ..Default::default()
        };
        let toml = generate_cargo_toml(&config, &[]);

        assert!(!toml.contains("[workspace]"));
    }
}
