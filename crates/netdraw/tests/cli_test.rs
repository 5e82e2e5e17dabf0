//! Integration tests for the `netdraw` CLI binary.
//!
//! Argument parsing, help output, completions, the offline commands and
//! one inventory listing against a mock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// A `netdraw` command isolated from the user's config and environment.
fn netdraw_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("netdraw");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("NETDRAW_PROFILE")
        .env_remove("NETDRAW_SERVER")
        .env_remove("NETDRAW_INVENTORY")
        .env_remove("NETDRAW_TOKEN")
        .env_remove("NETDRAW_OUTPUT")
        .env_remove("NETDRAW_INSECURE")
        .env_remove("NETDRAW_TIMEOUT")
        .env_remove("NETDRAW_LOG_FILE");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

const PASSING_TEST: &str = r#"{
    "name": "empty stays empty",
    "pre": {"devices": []},
    "event_trace": [],
    "post": {"devices": []}
}"#;

const FAILING_TEST: &str = r#"{
    "name": "expects a router",
    "pre": {"devices": []},
    "event_trace": [],
    "post": {"devices": [{"id": 1, "name": "Router1", "x": 0, "y": 0, "type": "router"}]}
}"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = netdraw_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("connect")
            .and(predicate::str::contains("replay"))
            .and(predicate::str::contains("export"))
            .and(predicate::str::contains("inventory")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netdraw"));
}

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = netdraw_cmd(home.path()).arg("frobnicate").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("frobnicate"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_lives_under_config_home() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("netdraw").and(predicate::str::ends_with("config.toml\n")));
}

#[test]
fn test_config_show_defaults() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[defaults]").and(predicate::str::contains("timeout = 30")));
}

#[test]
fn test_set_token_rejects_empty_input() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path())
        .args(["config", "set-token", "--stdin"])
        .write_stdin("\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("token cannot be empty"));
}

// ── Replay ──────────────────────────────────────────────────────────

#[test]
fn test_replay_passing_case() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "ok.json", PASSING_TEST);
    netdraw_cmd(home.path())
        .args(["replay", "--output", "plain"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("empty stays empty\tpassed"));
}

#[test]
fn test_replay_failure_sets_exit_code() {
    let home = tempfile::tempdir().unwrap();
    let ok = write(home.path(), "ok.json", PASSING_TEST);
    let bad = write(home.path(), "bad.json", FAILING_TEST);
    netdraw_cmd(home.path())
        .args(["replay", "-o", "plain"])
        .args([&ok, &bad])
        .assert()
        .code(9)
        .stdout(predicate::str::contains("expects a router\tfailed"))
        .stderr(predicate::str::contains("1 of 2 test(s) did not pass"));
}

#[test]
fn test_replay_rejects_garbage() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "junk.json", "not json");
    netdraw_cmd(home.path())
        .arg("replay")
        .arg(&file)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("junk.json"));
}

// ── Export ──────────────────────────────────────────────────────────

#[test]
fn test_export_yaml_with_viewport() {
    let home = tempfile::tempdir().unwrap();
    let file = write(
        home.path(),
        "topo.json",
        r#"{"devices": [{"id": 1, "name": "spine1", "x": 10, "y": 20, "type": "switch"}]}"#,
    );
    netdraw_cmd(home.path())
        .arg("export")
        .arg(&file)
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("viewport:")
                .and(predicate::str::contains("name: spine1"))
                .and(predicate::str::contains("type: switch")),
        );
}

#[test]
fn test_export_json_without_viewport() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "topo.yaml", "devices:\n  - {id: 4, name: r4, x: 0, y: 0, type: router}\n");
    let output = netdraw_cmd(home.path())
        .args(["export", "--format", "json", "--no-viewport"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(doc.get("viewport").is_none());
    assert_eq!(doc["devices"][0]["id"], 4);
}

#[test]
fn test_export_rejects_malformed_yaml() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "topo.yml", "devices: [ {id: 1, name");
    netdraw_cmd(home.path())
        .arg("export")
        .arg(&file)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("topo.yml"));
}

// ── Inventory ───────────────────────────────────────────────────────

#[test]
fn test_inventory_without_server_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    netdraw_cmd(home.path())
        .args(["inventory", "hosts"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No server configured"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inventory_hosts_against_mock_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/inventories/7/hosts/"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "next": null,
            "results": [
                { "id": 1, "name": "spine1", "variables": "ansible_topology:\n  type: switch\n" },
                { "id": 2, "name": "web1", "variables": "" }
            ]
        })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        netdraw_cmd(home.path())
            .args(["inventory", "hosts", "-o", "json", "--inventory", "7", "--token", "t0ken"])
            .args(["--server", &uri])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let templates: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(templates[0]["name"], "spine1");
    assert_eq!(templates[0]["type"], "switch");
    assert_eq!(templates[0]["host_id"], 1);
    assert_eq!(templates[1]["type"], "host");
}
