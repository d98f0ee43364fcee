//! OpenAPI command implementation.
//!
//! Normalizes the manifest and writes the OpenAPI documents without
//! compiling a module.

use std::path::{Path, PathBuf};

use bindery_core::{CompilerLog, generate_openapi};

use crate::colors;
use crate::project::Project;

/// Result type for CLI operations.
pub type CliResult = anyhow::Result<()>;

pub fn execute(manifest_path: &str, output_dir: Option<&str>, namespace: Option<&str>) -> CliResult {
    let project = Project::load(manifest_path, None, namespace)?;
    let app = project.manifest.into_app()?;

    let mut log = CompilerLog::new();
    let Some(output) = generate_openapi(app, &project.namespace, Some(&project.dir), &mut log)?
    else {
        println!(
            "{}No OpenAPI configuration in {}{}",
            colors::YELLOW,
            manifest_path,
            colors::RESET
        );
        return Ok(());
    };

    let dir = output_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| project.dir.join(".bindery").join("openapi"));
    output.write_to(&dir)?;

    println!(
        "{}Wrote{} {} file(s) to {}",
        colors::GREEN,
        colors::RESET,
        output.files.len(),
        dir.display()
    );
    for file in &output.files {
        println!(
            "{}  {}{}",
            colors::DIM,
            Path::new(&file.filename).display(),
            colors::RESET
        );
    }

    Ok(())
}
