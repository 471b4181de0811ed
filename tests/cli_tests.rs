//! Binary-level behaviour: argument parsing and configuration failures

use assert_cmd::Command;
use predicates::prelude::*;

fn agentmap(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("agentmap").unwrap();
    cmd.env_clear().current_dir(dir.path());
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    agentmap(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("agents"))
        .stdout(predicate::str::contains("knowledge-map"));
}

#[test]
fn test_agents_without_credentials_fails() {
    let dir = tempfile::tempdir().unwrap();
    agentmap(&dir)
        .arg("agents")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("AZURE_CLIENT_ID"))
        .stderr(predicate::str::contains("AZURE_TENANT_ID"))
        .stderr(predicate::str::contains("Error:"));

    assert!(!dir.path().join("entra_agents.json").exists());
}

#[test]
fn test_knowledge_map_reports_all_missing_variables() {
    let dir = tempfile::tempdir().unwrap();
    agentmap(&dir)
        .arg("knowledge-map")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "AZURE_CLIENT_ID, AZURE_CLIENT_SECRET, AZURE_TENANT_ID, DATAVERSE_URL",
        ));
}

#[test]
fn test_env_file_supplies_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join("test.env");
    std::fs::write(
        &env_file,
        "AZURE_CLIENT_ID=client\nAZURE_CLIENT_SECRET=secret\nAZURE_TENANT_ID=tenant\n",
    )
    .unwrap();

    // credentials are present, only DATAVERSE_URL is missing
    agentmap(&dir)
        .arg("--env-file")
        .arg(&env_file)
        .arg("knowledge-map")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required environment variables: DATAVERSE_URL"));
}

#[test]
fn test_missing_env_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    agentmap(&dir)
        .args(["--env-file", "does-not-exist.env", "agents"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.env"));
}

#[test]
fn test_invalid_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "max_pages = \"many\"\n").unwrap();

    agentmap(&dir)
        .arg("--config")
        .arg(&config)
        .arg("agents")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TOML parsing error"));
}

#[test]
fn test_unknown_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    agentmap(&dir)
        .env("AZURE_CLIENT_ID", "client")
        .env("AZURE_CLIENT_SECRET", "secret")
        .env("AZURE_TENANT_ID", "tenant")
        .args(["agents", "--format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown output format 'xml'"));
}
