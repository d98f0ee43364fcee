//! Common types for the compilation pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Modules every synthesized unit needs, whatever the definitions contain.
pub const BASE_MODULES: &[&str] = &["serde", "serde_json", "http", "tracing"];

/// Modules that are always implicitly available and never resolved.
pub const CORE_MODULES: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

/// Configuration for the module compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Directory for generated crates (.bindery/build/)
    pub build_dir: PathBuf,

    /// Fail on warnings (`-D warnings`)
    pub deny_warnings: bool,

    /// Build with optimizations
    pub release: bool,

    /// Pass `--offline` to cargo
    pub offline: bool,

    /// Additional rustc flags
    pub extra_rustc_flags: Vec<String>,

    /// Modules always added to the dependency closure
    pub base_modules: Vec<String>,

    /// Crates providing the trigger and binding contracts the units implement
    pub binding_modules: Vec<String>,

    /// Module the generated startup unit reads host configuration from
    pub configuration_module: Option<String>,

    /// Path to the bindery crate. If None, the crates.io release is used.
    pub bindery_crate_path: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from(".bindery/build"),
            deny_warnings: false,
            release: false,
            offline: false,
            extra_rustc_flags: Vec::new(),
            base_modules: BASE_MODULES.iter().map(|m| m.to_string()).collect(),
            binding_modules: vec!["bindery".to_string()],
            configuration_module: None,
            bindery_crate_path: Self::detect_bindery_crate_path(),
        }
    }
}

impl CompilerConfig {
    /// Find `crates/bindery` when running from inside the bindery workspace.
    fn detect_bindery_crate_path() -> Option<PathBuf> {
        if let Ok(exe_path) = std::env::current_exe() {
            // target/{debug,release}/bindery
            let workspace_root = exe_path
                .parent()
                .and_then(|p| p.parent())
                .and_then(|p| p.parent());
            if let Some(root) = workspace_root {
                let crate_dir = root.join("crates").join("bindery");
                if crate_dir.join("Cargo.toml").exists() {
                    return Some(crate_dir);
                }
            }
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            if let Some(root) = Path::new(&manifest_dir)
                .ancestors()
                .find(|p| p.join("crates").join("bindery").join("Cargo.toml").exists())
            {
                return Some(root.join("crates").join("bindery"));
            }
        }

        None
    }

    /// Config for fast development builds.
    pub fn development() -> Self {
        Self::default()
    }

    /// Config for optimized builds that fail on warnings.
    pub fn release() -> Self {
        Self {
            release: true,
            deny_warnings: true,
            ..Default::default()
        }
    }

    /// Development config with paths from [`BuildDirs`].
    pub fn for_project(dirs: &BuildDirs) -> Self {
        Self {
            build_dir: dirs.build_dir.clone(),
            ..Self::development()
        }
    }

    /// Cargo profile directory name.
    pub fn profile(&self) -> &'static str {
        if self.release { "release" } else { "debug" }
    }
}

/// Directory structure of a function-app project.
///
/// ```text
/// project/
/// └── .bindery/
///     ├── build/    # Generated crates and cargo target dirs
///     ├── source/   # Synthesized source units, for inspection
///     └── openapi/  # Serialized documents and explorer assets
/// ```
#[derive(Debug, Clone)]
pub struct BuildDirs {
    /// The `.bindery` directory itself.
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub source_dir: PathBuf,
    pub openapi_dir: PathBuf,
}

impl BuildDirs {
    /// Create the directory structure under `project_dir`.
    pub fn from_project_dir(project_dir: &Path) -> Result<Self> {
        let root = project_dir.join(".bindery");
        let dirs = Self {
            build_dir: root.join("build"),
            source_dir: root.join("source"),
            openapi_dir: root.join("openapi"),
            root,
        };
        dirs.create()?;
        Ok(dirs)
    }

    fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.build_dir)?;
        fs::create_dir_all(&self.source_dir)?;
        fs::create_dir_all(&self.openapi_dir)?;
        Ok(())
    }

    /// Remove every artifact and recreate the empty structure.
    pub fn clean(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        self.create()
    }
}

/// Platform-specific dynamic library extension.
pub fn dylib_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dll"
    }
    #[cfg(target_os = "macos")]
    {
        "dylib"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "so"
    }
}

/// Platform-specific dynamic library prefix.
pub fn dylib_prefix() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ""
    }
    #[cfg(not(target_os = "windows"))]
    {
        "lib"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(!config.release);
        assert!(!config.deny_warnings);
        assert_eq!(config.profile(), "debug");
        assert_eq!(config.base_modules, ["serde", "serde_json", "http", "tracing"]);
    }

    #[test]
    fn test_release_config() {
        let config = CompilerConfig::release();
        assert!(config.release);
        assert!(config.deny_warnings);
        assert_eq!(config.profile(), "release");
    }

    #[test]
    fn test_build_dirs() {
        let temp = TempDir::new().expect("Failed to create temp dir");

        let dirs = BuildDirs::from_project_dir(temp.path()).expect("Failed to create dirs");

        assert!(dirs.root.ends_with(".bindery"));
        assert!(dirs.build_dir.exists());
        assert!(dirs.source_dir.exists());
        assert!(dirs.openapi_dir.exists());

        let config = CompilerConfig::for_project(&dirs);
        assert_eq!(config.build_dir, dirs.build_dir);
    }

    #[test]
    fn test_clean() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let dirs = BuildDirs::from_project_dir(temp.path()).expect("Failed to create dirs");
        let stale = dirs.source_dir.join("Stale.rs");
        fs::write(&stale, "// stale").expect("Failed to write test file");

        dirs.clean().expect("Failed to clean");

        assert!(!stale.exists());
        assert!(dirs.source_dir.exists());
    }

    #[test]
    fn test_dylib_extension() {
        let ext = dylib_extension();
        #[cfg(target_os = "linux")]
        assert_eq!(ext, "so");
        #[cfg(target_os = "macos")]
        assert_eq!(ext, "dylib");
        #[cfg(target_os = "windows")]
        assert_eq!(ext, "dll");
    }
}
