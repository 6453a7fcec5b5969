//! Binary-level tests: argument handling, configuration sources and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = "dGVzdC1hY2NvdW50LWtleQ==";

/// Command running in `dir` with no configuration leaking in from the environment
fn demo_command(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("queue-storage-demo").unwrap();
    cmd.current_dir(dir)
        .env_remove("QUEUE_DEMO_CONFIG")
        .env_remove("QUEUE_DEMO_CONNECTION_STRING")
        .env_remove("QUEUE_DEMO__CONNECTIONSTRING")
        .env("RUST_LOG", "error");
    cmd
}

fn connection_string(server: &MockServer) -> String {
    format!(
        "DefaultEndpointsProtocol=http;AccountName=testaccount;AccountKey={};QueueEndpoint={}",
        TEST_KEY,
        server.uri()
    )
}

fn auth_failure() -> ResponseTemplate {
    ResponseTemplate::new(403).insert_header("x-ms-error-code", "AuthenticationFailed")
}

async fn rejecting_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(auth_failure())
        .mount(&server)
        .await;
    server
}

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();

    demo_command(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("basic"))
        .stdout(predicate::str::contains("advanced"));
}

#[test]
fn test_completions() {
    let dir = tempfile::tempdir().unwrap();

    demo_command(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue-storage-demo"));
}

#[test]
fn test_missing_connection_string_exits_with_configuration_code() {
    let dir = tempfile::tempdir().unwrap();

    demo_command(dir.path()).arg("basic").assert().code(1);
}

#[test]
fn test_invalid_connection_string_exits_with_configuration_code() {
    let dir = tempfile::tempdir().unwrap();

    demo_command(dir.path())
        .args(["--connection-string", "AccountName=myaccount", "basic"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Invalid storage account information",
        ));
}

/// Verify a rejected request ends the run with the step failure code
#[tokio::test(flavor = "multi_thread")]
async fn test_failed_step_exits_with_step_code() {
    let server = rejecting_server().await;
    let dir = tempfile::tempdir().unwrap();

    demo_command(dir.path())
        .args(["--connection-string", &connection_string(&server), "basic"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("1. Create a queue for the demo"))
        .stdout(predicate::str::contains("started the storage emulator"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_string_from_appsettings() {
    let server = rejecting_server().await;
    let dir = tempfile::tempdir().unwrap();
    let settings = serde_json::json!({ "ConnectionString": connection_string(&server) });
    std::fs::write(dir.path().join("appsettings.json"), settings.to_string()).unwrap();

    demo_command(dir.path())
        .arg("advanced")
        .assert()
        .code(3)
        .stdout(predicate::str::contains(
            "Creating queue with name demotest-",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_string_from_environment() {
    let server = rejecting_server().await;
    let dir = tempfile::tempdir().unwrap();

    demo_command(dir.path())
        .env("QUEUE_DEMO__CONNECTIONSTRING", connection_string(&server))
        .arg("basic")
        .assert()
        .code(3);
}

#[test]
fn test_explicit_config_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();

    demo_command(dir.path())
        .args(["--config", "absent.json", "basic"])
        .assert()
        .code(1);
}
