//! End-to-end tests for the bindery CLI.
//!
//! These run the binary against manifests in temporary directories. None of
//! them reaches the cargo backend.

#![allow(deprecated)] // cargo_bin is deprecated but still works for standard builds

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

const SHOP_MANIFEST: &str = r#"
namespace: shop_functions
types:
  - path: shop::GetWidget
    kind:
      object:
        - { name: Id, type: { scalar: string } }
        - { name: Expand, type: { optional: { scalar: bool } } }
  - path: shop::Widget
    kind:
      object:
        - { name: Name, type: { scalar: string } }
authorization:
  default: anonymous
openapi:
  title: Shop
  version: 1.0.0
routes:
  - route: /widgets
    functions:
      - command: shop::GetWidget
        route: "{id}"
        verbs: [get]
        returns: { named: shop::Widget }
"#;

/// A project directory holding one manifest.
struct TestProject {
    _temp_dir: TempDir,
    dir: PathBuf,
    manifest: PathBuf,
}

impl TestProject {
    fn new(name: &str, content: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let manifest = dir.join(name);
        fs::write(&manifest, content).unwrap();
        Self {
            _temp_dir: temp_dir,
            dir,
            manifest,
        }
    }

    fn manifest(&self) -> &str {
        self.manifest.to_str().unwrap()
    }

    fn bindery_dir(&self) -> PathBuf {
        self.dir.join(".bindery")
    }
}

fn bindery() -> Command {
    Command::cargo_bin("bindery").unwrap()
}

// =============================================================================
// General
// =============================================================================

#[test]
fn test_help_lists_commands() {
    bindery()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("openapi"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn test_missing_manifest_fails() {
    bindery()
        .args(["openapi", "/nonexistent/bindery.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Manifest not found"));
}

// =============================================================================
// OpenAPI
// =============================================================================

#[test]
fn test_openapi_writes_document() {
    let project = TestProject::new("bindery.yaml", SHOP_MANIFEST);

    bindery()
        .args(["openapi", project.manifest()])
        .assert()
        .success()
        .stdout(predicate::str::contains("OpenApi.openapi.yaml"));

    let document =
        fs::read_to_string(project.bindery_dir().join("openapi/OpenApi.openapi.yaml")).unwrap();
    assert!(document.contains("/api/widgets/{id}"));
    assert!(document.contains("operationId: GetWidget"));
    assert!(document.contains("title: Shop"));
}

#[test]
fn test_openapi_honors_output_dir() {
    let project = TestProject::new("bindery.yaml", SHOP_MANIFEST);
    let output = project.dir.join("docs");

    bindery()
        .args(["openapi", project.manifest(), "--output", output.to_str().unwrap()])
        .assert()
        .success();

    assert!(output.join("OpenApi.openapi.yaml").is_file());
    assert!(!project.bindery_dir().join("openapi").exists());
}

#[test]
fn test_openapi_json_manifest() {
    let project = TestProject::new(
        "bindery.json",
        r#"{
            "types": [{ "path": "shop::Ping", "kind": { "object": [] } }],
            "openapi": { "title": "Ping", "version": "0.1.0", "output_format": "json" },
            "routes": [{ "route": "ping", "functions": [{ "command": "shop::Ping" }] }]
        }"#,
    );

    bindery()
        .args(["openapi", project.manifest()])
        .assert()
        .success();

    let content =
        fs::read_to_string(project.bindery_dir().join("openapi/OpenApi.openapi.json")).unwrap();
    let document: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(document["info"]["title"], "Ping");
    assert!(document["paths"]["/api/ping"].is_object());
}

#[test]
fn test_openapi_not_configured() {
    let project = TestProject::new(
        "bindery.yaml",
        "routes:\n  - route: ping\n    functions:\n      - command: shop::Ping\n",
    );

    bindery()
        .args(["openapi", project.manifest()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No OpenAPI configuration"));
}

#[test]
fn test_partial_openapi_configuration_fails_with_hint() {
    let project = TestProject::new(
        "bindery.yaml",
        r#"
types:
  - path: shop::Ping
    kind: { object: [] }
openapi:
  title: Shop
routes:
  - route: ping
    functions:
      - command: shop::Ping
"#,
    );

    bindery()
        .args(["openapi", project.manifest()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("a title and a version"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_unknown_manifest_field_fails() {
    let project = TestProject::new("bindery.yaml", "namespace: shop\nroutez: []\n");

    bindery()
        .args(["openapi", project.manifest()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest error"))
        .stderr(predicate::str::contains("routez"));
}

// =============================================================================
// Build
// =============================================================================

#[test]
fn test_build_rejects_restricted_command_and_writes_log() {
    let project = TestProject::new(
        "bindery.yaml",
        r#"
namespace: shop_functions
types:
  - path: shop::internal::Secret
    visibility: restricted
    kind: { object: [] }
routes:
  - route: secrets
    functions:
      - command: shop::internal::Secret
"#,
    );

    bindery()
        .args(["build", project.manifest()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("shop::internal::Secret"));

    let log = fs::read_to_string(project.bindery_dir().join("__bindery_errors.json")).unwrap();
    let entries: serde_json::Value = serde_json::from_str(&log).unwrap();
    assert_eq!(entries[0]["severity"], "error");
    assert!(
        entries[0]["message"]
            .as_str()
            .unwrap()
            .contains("shop::internal::Secret")
    );
    assert!(!project.dir.join("bin").exists());
}

#[test]
fn test_build_logs_duplicate_function_names() {
    let project = TestProject::new(
        "bindery.yaml",
        r#"
types:
  - path: shop::Ping
    kind: { object: [] }
routes:
  - route: a
    functions:
      - command: shop::Ping
  - route: b
    functions:
      - command: shop::Ping
"#,
    );

    bindery()
        .args(["build", project.manifest()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));

    let log = fs::read_to_string(project.bindery_dir().join("__bindery_errors.json")).unwrap();
    assert!(log.contains("\"error\""));
}

// =============================================================================
// Clean
// =============================================================================

#[test]
fn test_clean_resets_build_directory() {
    let project = TestProject::new("bindery.yaml", SHOP_MANIFEST);
    let stale = project.bindery_dir().join("build/stale.txt");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "old").unwrap();

    bindery()
        .args(["clean", project.dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned"));

    assert!(!stale.exists());
    assert!(project.bindery_dir().join("build").is_dir());
}
