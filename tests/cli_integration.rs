//! Binary-level tests for argument handling and startup validation

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;

use common::temp_config_file;

fn chatrelay() -> Command {
    let mut cmd = Command::cargo_bin("chatrelay").unwrap();
    for var in [
        "CHATRELAY_API_KEY",
        "GROQ_API_KEY",
        "CHATRELAY_PROVIDER",
        "CHATRELAY_SERVER_URL",
        "CHATRELAY_PORT",
        "PORT",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    chatrelay()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("health"));
}

#[test]
#[serial]
fn test_serve_without_api_key_fails() {
    let (_dir, path) = temp_config_file("server:\n  port: 38411\n");

    chatrelay()
        .args(["--config", path.to_str().unwrap(), "serve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
#[serial]
fn test_invalid_store_config_fails_fast() {
    let (_dir, path) = temp_config_file("store:\n  max_messages: 0\n");

    chatrelay()
        .args(["--config", path.to_str().unwrap(), "serve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_messages"));
}

#[test]
#[serial]
fn test_health_against_unreachable_server_fails() {
    chatrelay()
        .args(["health", "--server", "http://127.0.0.1:9/api/v1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unhealthy"));
}
