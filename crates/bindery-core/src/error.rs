//! Error types for bindery-core.

use thiserror::Error;

use crate::compile::Diagnostic;

/// Result type for bindery-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling a function app.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or contradictory user configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One or more command/result types are not publicly visible.
    #[error("{} type(s) must be public: {}", types.len(), types.join(", "))]
    Visibility { types: Vec<String> },

    /// A type could not be converted into an API schema.
    #[error("schema synthesis failed for {type_name}: {message}")]
    SchemaSynthesis { type_name: String, message: String },

    /// The compiler backend reported error-severity diagnostics.
    #[error("compilation failed with {} error(s){}", diagnostics.len(), first_message(diagnostics))]
    Compilation { diagnostics: Vec<Diagnostic> },

    /// Template lookup or rendering failed.
    #[error("template error: {0}")]
    Template(String),

    /// A function-app manifest could not be read.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Toolchain discovery failed.
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn first_message(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .first()
        .map(|d| format!(": {}", d.message))
        .unwrap_or_default()
}

impl Error {
    /// Shorthand for [`Error::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Shorthand for [`Error::SchemaSynthesis`].
    pub fn schema(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaSynthesis {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Format the error together with a recovery hint, when one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Self::Configuration(_) => Some("check the function app builder or manifest"),
            Self::Visibility { .. } => {
                Some("mark the listed types `Visibility::Public` (or derive `Describe` on a `pub` type)")
            }
            Self::SchemaSynthesis { .. } => {
                Some("every named property type must be registered in the type catalog")
            }
            Self::Compilation { .. } => Some("the generated crate is kept under .bindery/build for inspection"),
            Self::Toolchain(_) => Some("make sure cargo is installed and on PATH"),
            _ => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}
