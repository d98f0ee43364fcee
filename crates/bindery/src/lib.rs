//! bindery: a build-time compiler for declarative function apps.
//!
//! bindery turns function definitions (HTTP routes and change-feed
//! subscriptions) into:
//! - **Synthesized Rust source** bound to your command types
//! - **A compiled module** exposing a function index to its host
//! - **OpenAPI 3.0 documents**, optionally with a Swagger UI or ReDoc explorer
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bindery::prelude::*;
//!
//! /// Look up one widget.
//! #[derive(Describe)]
//! pub struct GetWidget {
//!     pub id: String,
//! }
//!
//! let mut host = FunctionHostBuilder::new();
//! host.register::<GetWidget>();
//! host.functions(|functions| {
//!     functions.http_route("/widgets", |route| {
//!         route.http_function("shop::GetWidget").route("{id}").verb(HttpMethod::Get);
//!     });
//! });
//!
//! let compiler = FunctionCompiler::new("shop_functions", "bin", CargoBackend::detect(config)?);
//! compiler.compile(host.build(), &mut CompilerLog::new())?;
//! ```
//!
//! The pipeline itself lives in `bindery-core`; this crate adds the derive,
//! the capability contracts and the [`runtime`] types generated code uses.

/// Derive macro for [`Describe`](trait@Describe).
pub use bindery_macros::Describe;

pub use bindery_core::{
    compile, describe, error, log, manifest, model, normalize, openapi, pipeline, schema, synth,
};
pub use bindery_core::{
    AppManifest, AuthorizationKind, CargoBackend, CompilationOutput, CompilerBackend,
    CompilerConfig, CompilerLog, Describe, Error, FunctionApp, FunctionCompiler,
    FunctionHostBuilder, HttpMethod, Result, TypeCatalog, TypeDescriptor, TypeRef,
};

pub mod contracts;
pub mod runtime;

pub use contracts::{ChangeFeedBatch, ChangeFeedDocument, StreamCommand, ValidationResult};

pub mod prelude {
    //! Common imports for declaring a function app.
    //!
    //! ```rust,ignore
    //! use bindery::prelude::*;
    //! ```

    pub use crate::Describe;
    pub use crate::contracts::{ChangeFeedBatch, ChangeFeedDocument, StreamCommand, ValidationResult};
    pub use bindery_core::model::builder::{FunctionHostBuilder, header_mappings};
    pub use bindery_core::openapi::{DocumentInfo, OutputFormat, SecurityScheme};
    pub use bindery_core::{
        AuthorizationKind, CargoBackend, CompilerConfig, CompilerLog, FunctionCompiler, HttpMethod,
        TypeRef,
    };
}
