//! Capability contracts a command or result type can implement.
//!
//! Declaring one on a type's descriptor (`#[describe(contract = "...")]`)
//! changes how the pipeline binds it; implementing the trait is what lets the
//! generated code compile.

use serde_json::Value;

/// A change-feed command built from one document.
pub trait ChangeFeedDocument: Sized {
    fn from_document(document: Value) -> Self;
}

/// A change-feed command built from the whole batch of documents.
pub trait ChangeFeedBatch: Sized {
    fn from_documents(documents: Vec<Value>) -> Self;
}

/// An HTTP command whose response body is streamed.
pub trait StreamCommand {}

/// A result type carrying validation failures.
pub trait ValidationResult {
    fn is_valid(&self) -> bool;

    /// Messages describing each failure.
    fn errors(&self) -> Vec<String> {
        Vec::new()
    }
}
