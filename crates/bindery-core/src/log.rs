//! Structured compiler log.
//!
//! Every failure of a run is recorded here as `{severity, message}` in
//! addition to being returned as an [`Error`]. Build-task wrappers read the
//! log back from [`ERRORS_FILE`] instead of parsing terminal output.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File the log is written to by [`CompilerLog::write_errors_file`].
pub const ERRORS_FILE: &str = "__bindery_errors.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

/// Ordered log of one compilation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerLog {
    entries: Vec<LogEntry>,
}

impl CompilerLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.push(Severity::Error, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.push(Severity::Warning, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.push(Severity::Info, message);
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.entries.push(LogEntry { severity, message });
    }

    /// Record an error returned by a pipeline stage.
    ///
    /// Backend failures are recorded one entry per diagnostic and visibility
    /// failures one entry per offending type.
    pub fn record(&mut self, error: &Error) {
        match error {
            Error::Compilation { diagnostics } => {
                for diagnostic in diagnostics {
                    if diagnostic.is_failure() {
                        self.error(diagnostic.to_string());
                    } else {
                        self.warning(diagnostic.to_string());
                    }
                }
            }
            Error::Visibility { types } => {
                for ty in types {
                    self.error(format!("type {ty} must be public"));
                }
            }
            other => self.error(other.to_string()),
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the log as a JSON array into `dir`.
    pub fn write_errors_file(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(ERRORS_FILE);
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }

    /// Read a log written by [`Self::write_errors_file`].
    pub fn read_errors_file(dir: &Path) -> Result<Self> {
        let content = fs::read_to_string(dir.join(ERRORS_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{Diagnostic, DiagnosticLevel};
    use tempfile::TempDir;

    #[test]
    fn test_error_entries_fail_the_run() {
        let mut log = CompilerLog::new();
        log.info("normalized 3 functions");
        log.warning("unused import");
        assert!(!log.has_errors());

        log.error("missing token validator");
        assert!(log.has_errors());
        assert_eq!(log.errors().count(), 1);
        assert_eq!(log.warnings().count(), 1);
    }

    #[test]
    fn test_record_compilation_diagnostics() {
        let mut log = CompilerLog::new();
        let error = Error::Compilation {
            diagnostics: vec![
                Diagnostic::new(DiagnosticLevel::Error, "mismatched types"),
                Diagnostic::new(DiagnosticLevel::Warning, "unused variable"),
            ],
        };

        log.record(&error);

        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].severity, Severity::Error);
        assert_eq!(log.entries()[1].severity, Severity::Warning);
    }

    #[test]
    fn test_record_visibility_names_every_type() {
        let mut log = CompilerLog::new();
        log.record(&Error::Visibility {
            types: vec!["shop::Hidden".to_string(), "shop::Secret".to_string()],
        });

        let messages: Vec<_> = log.errors().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            ["type shop::Hidden must be public", "type shop::Secret must be public"]
        );
    }

    #[test]
    fn test_errors_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut log = CompilerLog::new();
        log.error("a title and a version must be specified for OpenAPI output");

        let path = log.write_errors_file(dir.path()).unwrap();
        assert!(path.ends_with(ERRORS_FILE));

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"severity\": \"error\""));

        let read = CompilerLog::read_errors_file(dir.path()).unwrap();
        assert_eq!(read.entries(), log.entries());
    }
}
