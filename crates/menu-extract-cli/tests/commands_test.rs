//! Integration tests for the `extract`/`batch` CLI commands.
//!
//! These exercise the built binary's input validation, `--text-only` path,
//! and output formatting directly. They avoid depending on a real Tesseract
//! install by sticking to `--text-only` and error-path inputs, since OCR
//! output is inherently non-deterministic across environments.

use std::process::Command;

/// Get the path to the menu-extract binary.
fn get_binary_path() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{}/../../target/debug/menu-extract", manifest_dir)
}

/// Build the binary before running tests.
fn build_binary() {
    let status = Command::new("cargo")
        .args(["build", "--bin", "menu-extract"])
        .status()
        .expect("Failed to build menu-extract binary");

    assert!(status.success(), "Failed to build menu-extract binary");
}

#[test]
fn test_extract_text_only_file() {
    build_binary();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menu.txt");
    std::fs::write(&path, "PIZZA\nCheese Pizza .... $12.99\n").unwrap();

    let output = Command::new(get_binary_path())
        .args(["extract", path.to_str().unwrap(), "--text-only"])
        .output()
        .expect("Failed to execute extract command");

    assert!(output.status.success(), "Extract command failed: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.is_empty(), "Extract output should not be empty");
}

#[test]
fn test_extract_text_only_with_json_output() {
    build_binary();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menu.txt");
    std::fs::write(&path, "WINGS\nBuffalo Wings .... $9.99\n").unwrap();

    let output = Command::new(get_binary_path())
        .args(["extract", path.to_str().unwrap(), "--text-only", "--format", "json"])
        .output()
        .expect("Failed to execute extract command");

    assert!(output.status.success(), "Extract command failed: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Output should be valid JSON");
    assert!(json.get("sections").is_some(), "JSON should have 'sections' field");
    assert!(json["sections"].is_array());
}

#[test]
fn test_extract_file_not_found() {
    build_binary();

    let output = Command::new(get_binary_path())
        .args(["extract", "/nonexistent/menu.png"])
        .output()
        .expect("Failed to execute extract command");

    assert!(!output.status.success(), "Extract should fail for nonexistent path");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Path not found"), "Error should mention the path was not found, got: {}", stderr);
}

#[test]
fn test_batch_with_no_paths() {
    build_binary();

    let output = Command::new(get_binary_path()).args(["batch"]).output().expect("Failed to execute batch command");

    assert!(!output.status.success(), "Batch should fail with no inputs");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No inputs provided"), "Error should mention missing inputs, got: {}", stderr);
}

#[test]
fn test_batch_with_missing_file() {
    build_binary();

    let dir = tempfile::tempdir().unwrap();
    let valid_path = dir.path().join("menu.txt");
    std::fs::write(&valid_path, "SIDES\nFries .... $3.50\n").unwrap();

    let output = Command::new(get_binary_path())
        .args(["batch", valid_path.to_str().unwrap(), "/nonexistent/menu.png", "--text-only"])
        .output()
        .expect("Failed to execute batch command");

    assert!(!output.status.success(), "Batch should fail when one input is missing");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Path not found") || stderr.contains("Invalid input"), "got: {}", stderr);
}

#[test]
fn test_batch_multiple_text_only_files() {
    build_binary();

    let dir = tempfile::tempdir().unwrap();
    let file1 = dir.path().join("a.txt");
    let file2 = dir.path().join("b.txt");
    std::fs::write(&file1, "PIZZA\nCheese Pizza .... $12.99\n").unwrap();
    std::fs::write(&file2, "WINGS\nBuffalo Wings .... $9.99\n").unwrap();

    let output = Command::new(get_binary_path())
        .args(["batch", file1.to_str().unwrap(), file2.to_str().unwrap(), "--text-only", "--format", "json"])
        .output()
        .expect("Failed to execute batch command");

    assert!(output.status.success(), "Batch command failed: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Output should be valid JSON");
    assert!(json.is_array(), "Batch output should be a JSON array");
    assert_eq!(json.as_array().unwrap().len(), 2, "Should have 2 results");
}

#[test]
fn test_extract_help() {
    build_binary();

    let output =
        Command::new(get_binary_path()).args(["extract", "--help"]).output().expect("Failed to execute extract --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--text-only"));
}

#[test]
fn test_version_command() {
    build_binary();

    let output = Command::new(get_binary_path()).args(["version"]).output().expect("Failed to execute version command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("menu-extract"));
}
