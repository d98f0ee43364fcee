//! Module compilation for synthesized function apps.
//!
//! This module provides:
//! - Dependency closure (modules the generated units must link against)
//! - Cargo manifest generation for the output module
//! - The compiler backend seam and its cargo implementation
//! - Error mapping (rustc diagnostics → synthesized source locations)
//!
//! # Architecture
//!
//! ```text
//! Definitions + TypeCatalog + Services
//!     │
//!     ├── resolve_dependency_closure ──► Vec<ModuleRef> ──► generate_cargo_toml
//!     │
//!     └── SourceUnits ──► CompilerBackend ──► lib<namespace>.so
//!                               │
//!                               └── DiagnosticMapper ──► Error::Compilation
//! ```

mod backend;
mod cargo_backend;
mod cargo_generator;
mod dependencies;
mod diagnostics;
mod manifest_parser;
mod toolchain;
mod types;

pub use backend::{
    BackendOutput, BackendRequest, CompiledModule, CompilerBackend, EmbeddedResource,
    compile_module,
};
pub use cargo_backend::CargoBackend;
pub use cargo_generator::{ManifestConfig, ReleaseProfile, generate_cargo_toml};
pub use dependencies::{
    CargoModuleCatalog, ModuleCatalog, ModuleRef, ModuleRegistry, resolve_dependency_closure,
};
pub use diagnostics::{Diagnostic, DiagnosticLevel, DiagnosticMapper, SourceLocation};
pub use manifest_parser::{parse_manifest_dependencies, read_manifest_dependencies};
pub use toolchain::Toolchain;
pub use types::{
    BASE_MODULES, BuildDirs, CORE_MODULES, CompilerConfig, dylib_extension, dylib_prefix,
};
