//! E2E tests for the showroom binary.
//!
//! Runs the compiled CLI with an isolated config file and database and
//! checks exit codes, human output and `worker status --json`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use wiremock::MockServer;

mod common;

use common::fixtures::{dead_origin, mount_site};
use common::logger::TestLogger;
use showroom::{assert_contains, assert_not_contains};
use showroom::storage::config::DEFAULT_PRECACHE;
use showroom::test_utils::{TestDir, make_test_config_toml};

const ENV_VARS: &[&str] = &[
    "SHOWROOM_CONFIG",
    "SHOWROOM_ORIGIN",
    "SHOWROOM_CACHE_VERSION",
    "SHOWROOM_TIMEOUT",
    "SHOWROOM_SHEETS_URL",
    "SHOWROOM_EMAIL_API_KEY",
    "SHOWROOM_EMAIL_TO",
    "SHOWROOM_LOG",
    "SHOWROOM_LOG_FILE",
];

/// The binary, isolated from the caller's environment.
fn showroom_cmd(dir: &TestDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("showroom").expect("showroom binary");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--config")
        .arg(dir.file_path("config.toml"))
        .arg("--no-color");
    cmd
}

fn database_arg(dir: &TestDir) -> String {
    dir.file_path("worker.sqlite").display().to_string()
}

fn status_json(dir: &TestDir) -> Value {
    let output = showroom_cmd(dir)
        .args(["worker", "status", "--json", "--database", &database_arg(dir)])
        .output()
        .expect("run status");
    assert!(output.status.success(), "{output:?}");
    serde_json::from_slice(&output.stdout).expect("status JSON")
}

/// Run a command off the async runtime so the mock origin keeps serving.
async fn run_blocking(mut cmd: Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().expect("run command"))
        .await
        .expect("join")
}

#[test]
fn help_lists_commands() {
    let log = TestLogger::new("help_lists_commands");
    let dir = TestDir::new();

    showroom_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("edge"))
        .stdout(predicate::str::contains("worker"));

    log.finish_ok();
}

#[test]
fn status_of_empty_database() {
    let log = TestLogger::new("status_of_empty_database");
    let dir = TestDir::new();

    let status = status_json(&dir);
    assert_eq!(status["version"], "v1");
    assert_eq!(status["currentStore"], "showroom-v1");
    assert!(status["activeStore"].is_null());
    assert_eq!(status["stores"], Value::Array(Vec::new()));
    assert_eq!(status["pending"], Value::Array(Vec::new()));

    log.finish_ok();
}

#[test]
fn human_status_uses_config_file() {
    let log = TestLogger::new("human_status_uses_config_file");
    let dir = TestDir::new();
    dir.create_file("config.toml", &make_test_config_toml());

    let output = showroom_cmd(&dir)
        .args(["worker", "status", "--database", &database_arg(&dir)])
        .output()
        .expect("run status");
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains!(stdout.as_ref(), "Version: v3");
    assert_contains!(stdout.as_ref(), "Active store: none");
    assert_contains!(stdout.as_ref(), "Pending submissions: 0");
    assert_not_contains!(stdout.as_ref(), "Sync tags");

    log.finish_ok();
}

#[test]
fn malformed_config_is_a_parse_error() {
    let log = TestLogger::new("malformed_config_is_a_parse_error");
    let dir = TestDir::new();
    dir.create_file("config.toml", "[general\ntimeout_seconds = ");

    showroom_cmd(&dir)
        .args(["worker", "status"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("SHOW-C001"));

    log.finish_ok();
}

#[test]
fn non_http_origin_is_rejected() {
    let log = TestLogger::new("non_http_origin_is_rejected");
    let dir = TestDir::new();

    showroom_cmd(&dir)
        .args(["worker", "status", "--origin", "ftp://cars.example"])
        .args(["--database", &database_arg(&dir)])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("SHOW-C002"));

    log.finish_ok();
}

#[test]
fn activate_before_install_fails() {
    let log = TestLogger::new("activate_before_install_fails");
    let dir = TestDir::new();

    showroom_cmd(&dir)
        .args(["worker", "activate", "--database", &database_arg(&dir)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SHOW-S002"));

    log.finish_ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn install_activate_and_report() {
    let log = TestLogger::new("install_activate_and_report");

    log.phase("setup");
    let origin = MockServer::start().await;
    mount_site(&origin).await;
    let dir = TestDir::new();

    log.phase("install");
    let mut install = showroom_cmd(&dir);
    install.args(["worker", "install", "--origin", &origin.uri()]);
    install.args(["--database", &database_arg(&dir)]);
    let output = run_blocking(install).await;
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Installed showroom-v1"), "{stdout}");

    log.phase("activate");
    let mut activate = showroom_cmd(&dir);
    activate.args(["worker", "activate", "--origin", &origin.uri()]);
    activate.args(["--database", &database_arg(&dir)]);
    let output = run_blocking(activate).await;
    assert!(output.status.success(), "{output:?}");

    log.phase("verify");
    let status = status_json(&dir);
    assert_eq!(status["activeStore"], "showroom-v1");
    assert_eq!(status["stores"][0]["name"], "showroom-v1");
    assert_eq!(status["stores"][0]["entries"], DEFAULT_PRECACHE.len());

    log.finish_ok();
}

#[test]
fn install_against_unreachable_origin_exits_offline() {
    let log = TestLogger::new("install_against_unreachable_origin_exits_offline");
    let dir = TestDir::new();

    showroom_cmd(&dir)
        .args(["worker", "install", "--origin", &dead_origin()])
        .args(["--database", &database_arg(&dir)])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("SHOW-S001"));

    log.finish_ok();
}
