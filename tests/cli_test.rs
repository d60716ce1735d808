use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_report_command() {
    Command::cargo_bin("crash-triage")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("report"));
}

#[test]
fn test_report_help_lists_flags() {
    Command::cargo_bin("crash-triage")
        .unwrap()
        .args(["report", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--days-back"))
        .stdout(predicate::str::contains("--sample-size"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("crash-triage")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("crash-triage"));
}

#[test]
fn test_rejects_unknown_subcommand() {
    Command::cargo_bin("crash-triage")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

#[test]
fn test_unreachable_endpoint_fails_cleanly() {
    Command::cargo_bin("crash-triage")
        .unwrap()
        .args([
            "report",
            "--endpoint",
            "http://127.0.0.1:1/api/SuperSearch/",
            "--days-back",
            "1",
            "--quiet",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
