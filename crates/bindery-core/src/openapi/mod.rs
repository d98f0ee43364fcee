//! OpenAPI document generation.
//!
//! [`RouteAssembler`] turns normalized HTTP definitions into one
//! [`ApiDocument`] per configured document. [`OpenApiCompiler`] serializes
//! those documents and adds the optional explorer bundles.

mod assembler;
mod config;
mod document;
mod filter;
mod output;

pub use assembler::{RouteAssembler, apply_document_filters};
pub use config::{DocumentInfo, InjectedAsset, OpenApiConfiguration, OutputFormat};
pub use document::{
    ApiDocument, Components, Info, MediaType, Operation, Parameter, ParameterLocation, PathItem,
    RequestBody, Response, SecurityRequirement, SecurityScheme, SecuritySchemeType, Server, Tag,
    json_content,
};
pub use filter::{
    DocumentFilter, DocumentFilterContext, HttpFunctionFilter, OperationFilter,
    OperationFilterContext, ParameterFilter, ParameterFilterContext,
};
pub use output::{DEFAULT_ROUTE_PREFIX, OpenApiCompiler, OpenApiFile, OpenApiOutput, route_prefix};
