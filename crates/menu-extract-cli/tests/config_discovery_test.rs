//! Integration tests for CLI config file discovery.
//!
//! Verifies that the CLI finds `menu-extract.{toml,yaml,yml,json}` in the
//! current directory and successfully loads it, using the `--text-only`
//! path so these tests don't require a real Tesseract install.

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn get_binary_path() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("{}/../../target/debug/menu-extract", manifest_dir)
}

fn build_binary() {
    let status = Command::new("cargo")
        .args(["build", "--bin", "menu-extract"])
        .status()
        .expect("Failed to build menu-extract binary");
    assert!(status.success(), "Failed to build menu-extract binary");
}

fn write_menu_file(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("menu.txt");
    fs::write(&path, "PIZZA\nCheese Pizza .... $12.99\n").unwrap();
    path
}

#[test]
fn discovers_toml_config_in_current_directory() {
    build_binary();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("menu-extract.toml"), "[ocr]\nconf_floor = 60.0\n").unwrap();
    let menu_file = write_menu_file(dir.path());

    let output = Command::new(get_binary_path())
        .current_dir(dir.path())
        .args(["extract", menu_file.to_str().unwrap(), "--text-only"])
        .output()
        .expect("Failed to execute menu-extract");

    assert!(output.status.success(), "Command failed: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn discovers_yaml_config_in_current_directory() {
    build_binary();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("menu-extract.yaml"), "ocr:\n  conf_floor: 60.0\n").unwrap();
    let menu_file = write_menu_file(dir.path());

    let output = Command::new(get_binary_path())
        .current_dir(dir.path())
        .args(["extract", menu_file.to_str().unwrap(), "--text-only"])
        .output()
        .expect("Failed to execute menu-extract");

    assert!(output.status.success(), "Command failed: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn discovers_json_config_in_current_directory() {
    build_binary();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("menu-extract.json"), r#"{"ocr": {"conf_floor": 60.0}}"#).unwrap();
    let menu_file = write_menu_file(dir.path());

    let output = Command::new(get_binary_path())
        .current_dir(dir.path())
        .args(["extract", menu_file.to_str().unwrap(), "--text-only"])
        .output()
        .expect("Failed to execute menu-extract");

    assert!(output.status.success(), "Command failed: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn explicit_config_flag_overrides_discovery() {
    build_binary();
    let dir = tempdir().unwrap();
    // A discoverable config with a bogus extension-adjacent name should be ignored
    // in favor of the explicit --config path.
    fs::write(dir.path().join("menu-extract.toml"), "[category]\nfallback = \"FromDiscovery\"\n").unwrap();
    let explicit_config = dir.path().join("explicit.toml");
    fs::write(&explicit_config, "[category]\nfallback = \"FromFlag\"\n").unwrap();
    let menu_file = write_menu_file(dir.path());

    let output = Command::new(get_binary_path())
        .current_dir(dir.path())
        .args(["extract", menu_file.to_str().unwrap(), "--text-only", "--config", explicit_config.to_str().unwrap()])
        .output()
        .expect("Failed to execute menu-extract");

    assert!(output.status.success(), "Command failed: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn unsupported_config_extension_is_rejected() {
    build_binary();
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.ini");
    fs::write(&config_path, "conf_floor=60").unwrap();
    let menu_file = write_menu_file(dir.path());

    let output = Command::new(get_binary_path())
        .args(["extract", menu_file.to_str().unwrap(), "--text-only", "--config", config_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute menu-extract");

    assert!(!output.status.success(), "Unsupported config extension should be rejected");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("extension"), "got: {}", stderr);
}
