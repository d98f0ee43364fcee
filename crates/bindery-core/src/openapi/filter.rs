//! Extension points invoked while a document is assembled.
//!
//! Filters run in registration order. Each receives the artifact mutably
//! after it is built and before it is attached. Closures with the matching
//! signature implement the traits directly.

use indexmap::IndexSet;

use super::document::{ApiDocument, Operation, Parameter};
use crate::model::{FunctionDefinition, HttpMethod};

pub struct DocumentFilterContext<'r> {
    /// Route of the document being produced, e.g. `openapi.yaml`.
    pub document_route: &'r str,
}

pub struct OperationFilterContext<'r> {
    pub path: &'r str,
    pub method: HttpMethod,
    pub definition: &'r FunctionDefinition,
}

pub struct ParameterFilterContext<'r> {
    pub path: &'r str,
    pub method: HttpMethod,
    /// Command property the parameter is bound to, if any.
    pub property: Option<&'r str>,
}

pub trait DocumentFilter {
    fn apply(&self, document: &mut ApiDocument, context: &DocumentFilterContext<'_>);
}

pub trait OperationFilter {
    fn apply(&self, operation: &mut Operation, context: &OperationFilterContext<'_>);
}

pub trait ParameterFilter {
    fn apply(&self, parameter: &mut Parameter, context: &ParameterFilterContext<'_>);
}

/// Decides which verbs of a definition appear in one document.
pub trait HttpFunctionFilter {
    fn apply(&self, definition: &FunctionDefinition, verbs: &mut IndexSet<HttpMethod>);
}

impl<F> DocumentFilter for F
where
    F: Fn(&mut ApiDocument, &DocumentFilterContext<'_>),
{
    fn apply(&self, document: &mut ApiDocument, context: &DocumentFilterContext<'_>) {
        self(document, context)
    }
}

impl<F> OperationFilter for F
where
    F: Fn(&mut Operation, &OperationFilterContext<'_>),
{
    fn apply(&self, operation: &mut Operation, context: &OperationFilterContext<'_>) {
        self(operation, context)
    }
}

impl<F> ParameterFilter for F
where
    F: Fn(&mut Parameter, &ParameterFilterContext<'_>),
{
    fn apply(&self, parameter: &mut Parameter, context: &ParameterFilterContext<'_>) {
        self(parameter, context)
    }
}

impl<F> HttpFunctionFilter for F
where
    F: Fn(&FunctionDefinition, &mut IndexSet<HttpMethod>),
{
    fn apply(&self, definition: &FunctionDefinition, verbs: &mut IndexSet<HttpMethod>) {
        self(definition, verbs)
    }
}
