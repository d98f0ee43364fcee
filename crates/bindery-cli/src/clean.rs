//! Clean command implementation.

use std::path::Path;

use bindery_core::compile::BuildDirs;

use crate::colors;

pub fn execute(project_dir: &str) -> anyhow::Result<()> {
    let dir = Path::new(project_dir);
    if !dir.is_dir() {
        anyhow::bail!("Project directory not found: {}", project_dir);
    }

    let dirs = BuildDirs::from_project_dir(dir)?;
    dirs.clean()?;

    println!(
        "{}Cleaned{} {}",
        colors::GREEN,
        colors::RESET,
        dirs.root.display()
    );
    Ok(())
}
