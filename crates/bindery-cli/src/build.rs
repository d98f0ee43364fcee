//! Build command implementation.
//!
//! Compiles a manifest into a loadable module and, when configured, its
//! OpenAPI documents. The compiler log is always written to
//! `.bindery/__bindery_errors.json` for build-task wrappers.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use bindery_core::compile::BuildDirs;
use bindery_core::{
    CargoBackend, CargoModuleCatalog, CompilerConfig, CompilerLog, FunctionCompiler,
};

use crate::colors;
use crate::project::Project;

/// Result type for CLI operations.
pub type CliResult = anyhow::Result<()>;

/// Flags of `bindery build`.
pub struct BuildOptions<'a> {
    pub project_dir: Option<&'a str>,
    pub namespace: Option<&'a str>,
    pub output: Option<&'a str>,
    pub openapi_output: Option<&'a str>,
    pub release: bool,
    pub offline: bool,
}

pub fn execute(manifest_path: &str, options: &BuildOptions<'_>) -> CliResult {
    let start = Instant::now();
    let project = Project::load(manifest_path, options.project_dir, options.namespace)?;

    println!(
        "\n{}bindery{} - Building {}{}{}\n",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        project.namespace,
        colors::RESET
    );

    let dirs = BuildDirs::from_project_dir(&project.dir)?;
    let mut config = CompilerConfig::for_project(&dirs);
    if options.release {
        config.release = true;
        config.deny_warnings = true;
    }
    config.offline = options.offline;

    let output_dir = options
        .output
        .map(PathBuf::from)
        .unwrap_or_else(|| project.dir.join("bin"));
    let openapi_dir = options
        .openapi_output
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs.openapi_dir.clone());

    let mut log = CompilerLog::new();
    let result = compile(project, &dirs, config, output_dir, openapi_dir, &mut log);
    let errors_file = log.write_errors_file(&dirs.root)?;
    tracing::debug!("Compiler log written to {}", errors_file.display());

    let module = match result {
        Ok(module) => module,
        Err(e) => {
            println!("{}✗{}", colors::RED, colors::RESET);
            return Err(e);
        }
    };
    println!("{}✓{}", colors::GREEN, colors::RESET);

    for warning in log.warnings() {
        println!("{}warning:{} {}", colors::YELLOW, colors::RESET, warning.message);
    }

    println!();
    println!("{}Built:{} {}", colors::GREEN, colors::RESET, module.display());
    println!(
        "{}Mode:{} {}",
        colors::DIM,
        colors::RESET,
        if options.release {
            "release (optimized)"
        } else {
            "debug"
        }
    );
    println!(
        "{}Time:{} {:.2}s",
        colors::DIM,
        colors::RESET,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn compile(
    project: Project,
    dirs: &BuildDirs,
    config: CompilerConfig,
    output_dir: PathBuf,
    openapi_dir: PathBuf,
    log: &mut CompilerLog,
) -> anyhow::Result<PathBuf> {
    let Project {
        manifest,
        dir,
        namespace,
    } = project;

    let app = match manifest.into_app() {
        Ok(app) => app,
        Err(e) => {
            log.record(&e);
            return Err(e.into());
        }
    };
    let backend = match CargoBackend::detect(config.clone()) {
        Ok(backend) => backend,
        Err(e) => {
            log.record(&e);
            return Err(e.into());
        }
    };
    let modules = CargoModuleCatalog::from_project_dir(&dir)?;

    print!(
        "{}  ◆ Compiling {} function(s){} ... ",
        colors::BLUE,
        app.definitions.len(),
        colors::RESET
    );
    colors::flush_stdout();

    let compiler = FunctionCompiler::new(namespace, output_dir, backend)
        .with_config(config)
        .with_module_catalog(modules)
        .with_project_dir(dir)
        .with_openapi_output_dir(openapi_dir);
    let output = compiler.compile(app, log)?;

    for unit in &output.units {
        fs::write(
            dirs.source_dir.join(format!("{}.rs", unit.module_name())),
            &unit.text,
        )?;
    }
    tracing::debug!(
        "Wrote {} source unit(s) to {}",
        output.units.len(),
        dirs.source_dir.display()
    );

    Ok(output.module.path)
}
