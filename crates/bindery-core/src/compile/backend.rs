//! Compiler backend contract.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::dependencies::ModuleRef;
use super::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::synth::SourceUnit;

/// A named payload bundled into the output module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedResource {
    /// Logical name, e.g. `shop_functions.OpenApi.openapi.yaml`.
    pub name: String,
    pub content: Vec<u8>,
}

/// Everything the backend needs for one module.
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    /// Name of the output module; also the crate name.
    pub module_name: &'a str,
    pub units: &'a [SourceUnit],
    pub modules: &'a [ModuleRef],
    pub resources: &'a [EmbeddedResource],
    /// Directory the module is written to.
    pub output_dir: &'a Path,
}

/// What the backend reported.
#[derive(Debug, Clone, Default)]
pub struct BackendOutput {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// The written module, when the backend produced one.
    pub artifact: Option<PathBuf>,
}

/// Turns source units into a loadable module.
pub trait CompilerBackend {
    fn compile(&self, request: &BackendRequest<'_>) -> Result<BackendOutput>;
}

/// A successfully compiled module.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub path: PathBuf,
    /// Warnings reported by the backend; they never fail the build.
    pub warnings: Vec<Diagnostic>,
}

/// Compile through `backend`, all or nothing.
///
/// Every error-severity diagnostic, escalated warnings included, is returned
/// in [`Error::Compilation`]. A backend that reports failure without any
/// error diagnostic still fails.
pub fn compile_module(backend: &dyn CompilerBackend, request: &BackendRequest<'_>) -> Result<CompiledModule> {
    info!(
        "Compiling module {} from {} unit(s) against {} module(s)",
        request.module_name,
        request.units.len(),
        request.modules.len()
    );

    let output = backend.compile(request)?;
    let (mut failures, warnings): (Vec<_>, Vec<_>) = output
        .diagnostics
        .into_iter()
        .partition(Diagnostic::is_failure);

    for warning in &warnings {
        warn!("{}", warning);
    }

    if output.success && failures.is_empty() {
        if let Some(path) = output.artifact {
            info!("Compiled module: {}", path.display());
            return Ok(CompiledModule { path, warnings });
        }
        failures.push(Diagnostic::error("the backend reported success but wrote no module"));
    } else if failures.is_empty() {
        failures.push(Diagnostic::error(
            "the backend reported failure without error diagnostics",
        ));
    }

    Err(Error::Compilation {
        diagnostics: failures,
    })
}
