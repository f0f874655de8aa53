//! Smoke tests -- verify the binary runs against a simulated endpoint.

use std::io::Write;

use assert_cmd::Command;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[logging]
level = "warn"

[[endpoints]]
url = "opc.tcp://plc01:4840/"
namespaces = ["urn:plant"]

[[endpoints.read]]
id = "ns=1;s=Temperature"
interval = 10

[[endpoints.test]]
id = "i=2258"

[[endpoints.nodes]]
id = "nsu=urn:plant;s=Temperature"
value = 21.5

[[endpoints.nodes.history]]
value = 20.0
timestamp = "2024-05-01T06:00:00Z"

[[endpoints.nodes.history]]
value = 20.5
timestamp = "2024-05-01T07:00:00Z"

[[endpoints.nodes]]
id = "i=2258"
value = { year = 2024 }
"#;

fn config_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    file
}

fn opcreader() -> Command {
    Command::cargo_bin("opcreader").unwrap()
}

#[test]
fn test_cli_help() {
    opcreader()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Scheduled OPC UA node polling"));
}

#[test]
fn test_cli_version() {
    opcreader()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("opcreader"));
}

#[test]
fn test_subcommands_exist() {
    for sub in ["run", "read", "history-read", "test", "list"] {
        opcreader().args([sub, "--help"]).assert().success();
    }
}

#[test]
fn test_list_shows_configured_actions() {
    let config = config_file();
    opcreader()
        .arg("--config")
        .arg(config.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("ReadAction"))
        .stdout(predicates::str::contains("ns=1;s=Temperature"))
        .stdout(predicates::str::contains("once"));
}

#[test]
fn test_list_json() {
    let config = config_file();
    let output = opcreader()
        .arg("--config")
        .arg(config.path())
        .args(["list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["type"], "ReadAction");
    assert_eq!(entries[1]["type"], "TestAction");
    assert_eq!(entries[1]["interval"], 0);
}

#[test]
fn test_read_prints_value() {
    let config = config_file();
    opcreader()
        .arg("--config")
        .arg(config.path())
        .args(["read", "--endpoint", "opc.tcp://plc01:4840/", "--node", "ns=1;s=Temperature"])
        .assert()
        .success()
        .stdout(predicates::str::contains("21.5"));
}

#[test]
fn test_read_unknown_node_fails() {
    let config = config_file();
    opcreader()
        .arg("--config")
        .arg(config.path())
        .args(["read", "--endpoint", "opc.tcp://plc01:4840/", "--node", "ns=1;s=Missing"])
        .assert()
        .failure();
}

#[test]
fn test_history_read_prints_last_point() {
    let config = config_file();
    opcreader()
        .arg("--config")
        .arg(config.path())
        .args([
            "history-read",
            "--endpoint",
            "opc.tcp://plc01:4840/",
            "--node",
            "nsu=urn:plant;s=Temperature",
            "--start",
            "2024-05-01T00:00:00Z",
            "--end",
            "2024-05-02T00:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("last: 20.5"));
}

#[test]
fn test_test_reports_unrepresentable_value() {
    let config = config_file();
    opcreader()
        .arg("--config")
        .arg(config.path())
        .args(["test", "--endpoint", "opc.tcp://plc01:4840/", "--node", "i=2258"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Cannot convert type of read value."));
}

#[test]
fn test_unconfigured_endpoint_fails() {
    let config = config_file();
    opcreader()
        .arg("--config")
        .arg(config.path())
        .args(["read", "--endpoint", "opc.tcp://other:4840/", "--node", "i=2258"])
        .assert()
        .failure();
}
