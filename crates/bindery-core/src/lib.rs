//! Core pipeline of the bindery function-app compiler.
//!
//! This crate provides:
//! - Explicit type description (no runtime reflection)
//! - The definition model and its builder
//! - Defaults cascade and parameter classification
//! - Cycle-safe schema synthesis and OpenAPI route assembly
//! - Source synthesis through pluggable templates
//! - Dependency closure and module compilation

pub mod compile;
pub mod describe;
pub mod error;
pub mod log;
pub mod manifest;
pub mod model;
pub mod normalize;
pub mod openapi;
pub mod pipeline;
pub mod schema;
pub mod synth;

pub use compile::{
    BuildDirs, CargoBackend, CargoModuleCatalog, CompiledModule, CompilerBackend, CompilerConfig,
    Diagnostic, DiagnosticLevel, ModuleCatalog, ModuleRef, ModuleRegistry,
};
pub use describe::{
    Capability, Contract, Describe, PropertyDescriptor, ScalarType, TypeCatalog, TypeDescriptor,
    TypeKind, TypeRef, Visibility,
};
pub use error::{Error, Result};
pub use log::{CompilerLog, LogEntry, Severity};
pub use manifest::AppManifest;
pub use model::builder::{FunctionApp, FunctionHostBuilder, ServiceCollection, ServiceLifetime};
pub use model::{AuthorizationKind, FunctionDefinition, HttpMethod, Trigger};
pub use normalize::Normalizer;
pub use openapi::{OpenApiCompiler, OpenApiConfiguration, OpenApiOutput, OutputFormat};
pub use pipeline::{CompilationOutput, FunctionCompiler, generate_openapi};
pub use schema::{Schema, SchemaRegistry};
pub use synth::{SourceSynthesizer, SourceUnit};
