use assert_cmd::Command;
use predicates::prelude::*;

fn commons() -> Command {
    let mut cmd = Command::cargo_bin("commons").unwrap();
    cmd.env_remove("COMMONS_CONFIG").env_remove("COMMONS_SEED");
    cmd
}

#[test]
fn config_prints_default_toml() {
    commons()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("turns_per_iteration = 10"))
        .stdout(predicate::str::contains("[policy]"));
}

#[test]
fn run_writes_turn_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.json");

    commons()
        .args(["run", "--iterations", "1", "--turns", "2", "--agents", "4", "--seed", "3"])
        .arg("--output")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Iteration 1:"));

    let log: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(log.as_array().unwrap().len(), 2);
}

#[test]
fn run_fails_on_missing_config() {
    commons()
        .args(["run", "--config", "/nonexistent/commons.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));
}
