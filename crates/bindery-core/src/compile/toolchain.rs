//! Cargo discovery.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// The cargo installation used by [`CargoBackend`](super::CargoBackend).
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub(crate) cargo_path: PathBuf,
    pub(crate) version: String,
}

impl Toolchain {
    /// Find cargo: `$CARGO` first (set when running under cargo), then PATH.
    pub fn detect() -> Result<Self> {
        let cargo_path = match std::env::var_os("CARGO") {
            Some(path) if Path::new(&path).is_file() => PathBuf::from(path),
            _ => which::which("cargo")
                .map_err(|_| Error::Toolchain("cargo not found in PATH".to_string()))?,
        };
        let version = Self::cargo_version(&cargo_path)?;
        tracing::debug!("Using {} ({})", cargo_path.display(), version);

        Ok(Self {
            cargo_path,
            version,
        })
    }

    pub fn cargo_path(&self) -> &Path {
        &self.cargo_path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// A `cargo` command.
    pub fn cargo(&self) -> Command {
        Command::new(&self.cargo_path)
    }

    fn cargo_version(cargo: &Path) -> Result<String> {
        let output = Command::new(cargo)
            .arg("--version")
            .output()
            .map_err(|e| Error::Toolchain(format!("Failed to run cargo: {e}")))?;

        if !output.status.success() {
            return Err(Error::Toolchain("Failed to get cargo version".to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
