//! Backend diagnostics and rustc JSON message parsing.

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Severity reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
            Self::Help => "help",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed.
    pub column: usize,
}

/// One diagnostic produced by a [`CompilerBackend`](super::CompilerBackend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    /// Lint or error code, e.g. `E0308` or `unused_variables`.
    pub code: Option<String>,
    pub location: Option<SourceLocation>,
    /// An error that was raised from a warning by a deny setting.
    pub is_warning_as_error: bool,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            code: None,
            location: None,
            is_warning_as_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    /// Whether this diagnostic fails the compilation.
    pub fn is_failure(&self) -> bool {
        self.level == DiagnosticLevel::Error || self.is_warning_as_error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}[{code}]: {}", self.level, self.message)?,
            None => write!(f, "{}: {}", self.level, self.message)?,
        }
        if let Some(location) = &self.location {
            write!(
                f,
                " at {}:{}:{}",
                location.file.display(),
                location.line,
                location.column
            )?;
        }
        Ok(())
    }
}

/// `cargo build --message-format=json` line.
#[derive(Debug, Deserialize)]
struct CargoMessage {
    reason: String,
    message: Option<RustcDiagnostic>,
}

/// Rustc JSON diagnostic format.
#[derive(Debug, Deserialize)]
struct RustcDiagnostic {
    message: String,
    code: Option<RustcCode>,
    level: String,
    #[serde(default)]
    spans: Vec<RustcSpan>,
    #[serde(default)]
    children: Vec<RustcDiagnostic>,
}

#[derive(Debug, Deserialize)]
struct RustcCode {
    code: String,
}

#[derive(Debug, Deserialize)]
struct RustcSpan {
    file_name: String,
    line_start: usize,
    column_start: usize,
    is_primary: bool,
}

/// Maps rustc diagnostics on generated files back to the units they came from.
#[derive(Debug, Default)]
pub struct DiagnosticMapper {
    /// Generated file (relative to the build crate) to diagnostic path.
    files: FxHashMap<String, PathBuf>,
}

impl DiagnosticMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report diagnostics on `generated` against `diagnostic_path`.
    pub fn add_file(&mut self, generated: impl Into<String>, diagnostic_path: impl Into<PathBuf>) {
        self.files.insert(generated.into(), diagnostic_path.into());
    }

    /// Parse cargo or rustc JSON output, one message per line.
    ///
    /// Lines that are not diagnostics (build-script output, artifact
    /// notifications, plain text) are skipped.
    pub fn parse(&self, json_output: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for line in json_output.lines() {
            let line = line.trim();
            if !line.starts_with('{') {
                continue;
            }

            let rustc = match serde_json::from_str::<CargoMessage>(line) {
                Ok(message) if message.reason == "compiler-message" => message.message,
                Ok(_) => None,
                Err(_) => match serde_json::from_str::<RustcDiagnostic>(line) {
                    Ok(diagnostic) => Some(diagnostic),
                    Err(e) => {
                        tracing::debug!(
                            "Failed to parse rustc JSON: {} (line: {})",
                            e,
                            line.chars().take(100).collect::<String>()
                        );
                        None
                    }
                },
            };

            if let Some(diagnostic) = rustc.and_then(|d| self.map_diagnostic(&d)) {
                diagnostics.push(diagnostic);
            }
        }

        diagnostics
    }

    fn map_diagnostic(&self, diagnostic: &RustcDiagnostic) -> Option<Diagnostic> {
        let level = match diagnostic.level.as_str() {
            "error" | "error: internal compiler error" => DiagnosticLevel::Error,
            "warning" => DiagnosticLevel::Warning,
            "note" => DiagnosticLevel::Note,
            "help" => DiagnosticLevel::Help,
            // "failure-note" and friends carry no information of their own
            _ => return None,
        };

        // `-D warnings` turns lints into errors and says so in a child note
        let is_warning_as_error = level == DiagnosticLevel::Error
            && diagnostic
                .children
                .iter()
                .any(|child| child.message.contains("implied by `-D warnings`"));

        let location = diagnostic
            .spans
            .iter()
            .find(|span| span.is_primary)
            .map(|span| SourceLocation {
                file: self
                    .files
                    .get(&span.file_name)
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from(&span.file_name)),
                line: span.line_start,
                column: span.column_start,
            });

        Some(Diagnostic {
            level,
            message: diagnostic.message.clone(),
            code: diagnostic.code.as_ref().map(|c| c.code.clone()),
            location,
            is_warning_as_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cargo_compiler_message() {
        let json = r#"{"reason":"compiler-message","package_id":"x","message":{"message":"mismatched types","code":{"code":"E0308"},"level":"error","spans":[{"file_name":"src/get_widget.rs","line_start":12,"line_end":12,"column_start":5,"column_end":9,"is_primary":true,"label":null}],"children":[],"rendered":"error[E0308]: mismatched types"}}
{"reason":"build-finished","success":false}"#;

        let mut mapper = DiagnosticMapper::new();
        mapper.add_file("src/get_widget.rs", "/tmp/out/GetWidget.rs");
        let diagnostics = mapper.parse(json);

        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.level, DiagnosticLevel::Error);
        assert_eq!(d.code.as_deref(), Some("E0308"));
        assert!(d.is_failure());
        let location = d.location.as_ref().unwrap();
        assert_eq!(location.file, PathBuf::from("/tmp/out/GetWidget.rs"));
        assert_eq!(location.line, 12);
    }

    #[test]
    fn test_warning_escalated_by_deny() {
        let json = r#"{"message":"unused variable: `x`","code":{"code":"unused_variables"},"level":"error","spans":[],"children":[{"message":"`-D unused-variables` implied by `-D warnings`","code":null,"level":"note","spans":[],"children":[]}]}"#;

        let diagnostics = DiagnosticMapper::new().parse(json);

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_warning_as_error);
        assert!(diagnostics[0].is_failure());
    }

    #[test]
    fn test_plain_warning_does_not_fail() {
        let json = r#"{"message":"unused import","code":null,"level":"warning","spans":[]}"#;

        let diagnostics = DiagnosticMapper::new().parse(json);

        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_failure());
    }

    #[test]
    fn test_skips_noise() {
        let output = "   Compiling widgets v0.1.0\n{\"reason\":\"compiler-artifact\"}\n{not json";
        assert!(DiagnosticMapper::new().parse(output).is_empty());
    }

    #[test]
    fn test_display() {
        let mut d = Diagnostic::error("expected type");
        d.code = Some("E0573".to_string());
        d.location = Some(SourceLocation {
            file: PathBuf::from("test.rs"),
            line: 10,
            column: 5,
        });
        assert_eq!(d.to_string(), "error[E0573]: expected type at test.rs:10:5");
    }
}
