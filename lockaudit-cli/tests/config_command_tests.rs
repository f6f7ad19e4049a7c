//! Integration tests for `lockaudit config` command.
//!
//! Tests config validation and display functionality with real TOML files.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

use lockaudit_core::config::LockauditConfig;

fn lockaudit(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lockaudit"));
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .env_remove("LOCKAUDIT_REGISTRY_MAX_DEPTH");
    cmd
}

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("lockaudit.toml");

    let valid_config = r#"
[general]
log_level = "info"
log_format = "json"

[advisory]
db_path = "/srv/osv"
batch_size = 500

[registry]
path = "/srv/registry"
max_depth = 4

[audit]
severities = ["high", "critical"]
local_only = true
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let config = LockauditConfig::from_file(&config_path)
        .await
        .expect("valid config should load successfully");

    // Then: Values are taken from the file
    assert_eq!(config.advisory.batch_size, 500);
    assert_eq!(config.registry.max_depth, 4);
    assert_eq!(config.audit.severities, vec!["high", "critical"]);
    assert!(config.audit.local_only);
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write bad config");

    let result = LockauditConfig::from_file(&config_path).await;
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let result = LockauditConfig::from_file("/nonexistent/lockaudit.toml").await;
    assert!(result.is_err(), "missing file should fail to load");
}

#[tokio::test]
async fn test_config_empty_file_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty file");

    let config = LockauditConfig::from_file(&config_path)
        .await
        .expect("empty file should load with defaults");
    assert_eq!(config.registry.max_depth, 6);
    assert!(config.audit.severities.is_empty());
}

#[tokio::test]
#[serial]
async fn test_config_env_override_beats_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("lockaudit.toml");
    fs::write(&config_path, "[registry]\nmax_depth = 4\n").expect("should write config");

    // SAFETY: serialized with the other env-mutating tests in this binary.
    unsafe { std::env::set_var("LOCKAUDIT_REGISTRY_MAX_DEPTH", "9") };
    let result = LockauditConfig::load(&config_path).await;
    unsafe { std::env::remove_var("LOCKAUDIT_REGISTRY_MAX_DEPTH") };

    let config = result.expect("config should load");
    assert_eq!(config.registry.max_depth, 9);
}

#[test]
#[serial]
fn test_config_validate_command_valid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("lockaudit.toml"), "[audit]\nlocal_only = true\n")
        .expect("should write config");

    lockaudit(&temp_dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Result: VALID"));
}

#[test]
#[serial]
fn test_config_validate_command_invalid_value_exits_2() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("lockaudit.toml"), "[registry]\nmax_depth = 0\n")
        .expect("should write config");

    lockaudit(&temp_dir)
        .args(["config", "validate"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("INVALID"))
        .stdout(predicate::str::contains("registry.max_depth"));
}

#[test]
#[serial]
fn test_config_validate_command_missing_file_exits_2() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    lockaudit(&temp_dir)
        .args(["--config", "absent.toml", "config", "validate"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("config file not found"));
}

#[test]
#[serial]
fn test_config_show_command_defaults_without_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    lockaudit(&temp_dir)
        .args(["--config", "absent.toml", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[general]"))
        .stdout(predicate::str::contains("[audit]"))
        .stdout(predicate::str::contains("max_depth = 6"));
}

#[test]
#[serial]
fn test_config_show_command_section_with_env_override() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("lockaudit.toml"), "[registry]\nmax_depth = 4\n")
        .expect("should write config");

    lockaudit(&temp_dir)
        .env("LOCKAUDIT_REGISTRY_MAX_DEPTH", "7")
        .args(["config", "show", "--section", "registry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration [registry]"))
        .stdout(predicate::str::contains("max_depth = 7"))
        .stdout(predicate::str::contains("log_level").not());
}

#[test]
#[serial]
fn test_config_show_command_unknown_section_exits_1() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    lockaudit(&temp_dir)
        .args(["--config", "absent.toml", "config", "show", "--section", "cache"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown section: cache"));
}
