//! Manifest loading shared by the subcommands.

use std::path::{Path, PathBuf};

use bindery_core::AppManifest;

/// A manifest and the project it belongs to.
pub struct Project {
    pub manifest: AppManifest,
    /// Directory holding `Cargo.toml`, `host.json` and `.bindery/`.
    pub dir: PathBuf,
    pub namespace: String,
}

impl Project {
    /// Load `manifest_path`. The project directory defaults to the
    /// manifest's directory; the namespace to the manifest's, then to the
    /// directory name.
    pub fn load(
        manifest_path: &str,
        project_dir: Option<&str>,
        namespace: Option<&str>,
    ) -> anyhow::Result<Self> {
        let path = Path::new(manifest_path);
        if !path.exists() {
            anyhow::bail!(
                "Manifest not found: {} (current directory: {})",
                manifest_path,
                std::env::current_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "<unknown>".to_string())
            );
        }
        let path = path.canonicalize()?;

        let dir = match project_dir {
            Some(dir) => Path::new(dir).canonicalize()?,
            None => path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let manifest = AppManifest::from_path(&path)?;
        let namespace = match namespace.map(str::to_string).or_else(|| manifest.namespace.clone()) {
            Some(namespace) => namespace,
            None => default_namespace(&dir)?,
        };

        Ok(Self {
            manifest,
            dir,
            namespace,
        })
    }
}

fn default_namespace(dir: &Path) -> anyhow::Result<String> {
    let name: String = dir
        .file_name()
        .map(|n| {
            n.to_string_lossy()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect()
        })
        .unwrap_or_default();
    let name = name.trim_matches('_').to_string();
    if name.is_empty() {
        anyhow::bail!(
            "cannot derive a namespace from {}; pass --namespace",
            dir.display()
        );
    }
    Ok(name)
}
