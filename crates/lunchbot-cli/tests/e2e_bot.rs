//! E2E tests for `lb run`: the console control loop fed through stdin.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn lb_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lb"));
    cmd.current_dir(dir);
    cmd.env("LUNCHBOT_LOG", "error");
    cmd.env_remove("LUNCHBOT_FORMAT");
    cmd.env_remove("LUNCHBOT_DATA_DIR");
    cmd.env_remove("LUNCHBOT_GROUP_SIZE");
    cmd
}

fn console_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON object per line"))
        .collect()
}

#[test]
fn commands_are_acknowledged_in_text() {
    let dir = TempDir::new().expect("tempdir");
    lb_cmd(dir.path())
        .arg("run")
        .write_stdin("!setpayer ann true\n\n!bogus\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: set ann payer to true"))
        .stdout(predicate::str::contains("error: did not understand command"));
}

#[test]
fn malformed_history_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    lb_cmd(dir.path())
        .arg("run")
        .write_stdin("!history 03.04.2024 [[\"ann\"\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("error: failed to parse JSON"));
}

#[test]
fn history_over_the_console_reaches_the_ledger() {
    let dir = TempDir::new().expect("tempdir");
    lb_cmd(dir.path())
        .arg("run")
        .write_stdin("!setpayer ann false\n!setpayer bob false\n!history 03.04.2024 [[\"ann\",\"bob\"]]\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: updated history for 2024-04-03"));

    let ledger = std::fs::read_to_string(dir.path().join(".lunchbot/data/ledger.json")).expect("ledger");
    assert!(ledger.contains("2024-04-03"));
}

#[test]
fn fixup_over_the_console_rebuilds_the_pool() {
    let dir = TempDir::new().expect("tempdir");
    let output = lb_cmd(dir.path())
        .args(["run", "--json"])
        .write_stdin("!announce\n!fixup ann bob\n")
        .output()
        .expect("lb should not crash");
    assert!(output.status.success());

    let lines = console_lines(&output.stdout);
    let last = lines.last().expect("reply");
    assert_eq!(last["kind"], "ok");
    assert!(last["text"].as_str().expect("text").ends_with(": 2 signed up"));
}

#[test]
fn announce_then_reactions_sign_people_up() {
    let dir = TempDir::new().expect("tempdir");
    let output = lb_cmd(dir.path())
        .args(["run", "--json"])
        .write_stdin("!announce\n+ann\n+bob\n+cat :thumbsup:\n")
        .output()
        .expect("lb should not crash");
    assert!(output.status.success());

    let lines = console_lines(&output.stdout);
    assert_eq!(lines[0]["kind"], "post");
    assert!(lines[0]["topic"].as_str().expect("topic").ends_with(" Groups"));
    assert_eq!(lines[1]["kind"], "ok");
    assert!(
        lines[1]["text"]
            .as_str()
            .expect("text")
            .starts_with("announced lunch ")
    );

    let shown = lb_cmd(dir.path())
        .args(["show", "--json"])
        .output()
        .expect("lb should not crash");
    assert!(shown.status.success());
    let shown: Value = serde_json::from_slice(&shown.stdout).expect("json");
    assert_eq!(shown["pending"], serde_json::json!(["ann", "bob"]));
}

#[test]
fn announcing_twice_reports_schedule() {
    let dir = TempDir::new().expect("tempdir");
    lb_cmd(dir.path())
        .arg("run")
        .write_stdin("!announce\n!announce\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("already scheduled"));
}

#[test]
fn reactions_without_a_lunch_wait_for_one() {
    let dir = TempDir::new().expect("tempdir");
    lb_cmd(dir.path())
        .arg("run")
        .write_stdin("+ann\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("no lunch is open"));
}

#[test]
fn startup_folds_the_last_lunch_into_the_ledger() {
    let dir = TempDir::new().expect("tempdir");
    lb_cmd(dir.path())
        .args(["announce", "--date", "2024-04-17"])
        .assert()
        .success();
    lb_cmd(dir.path())
        .args(["add", "--date", "2024-04-17", "ann", "bob"])
        .assert()
        .success();
    lb_cmd(dir.path())
        .args(["organize", "--date", "2024-04-17"])
        .assert()
        .success();

    lb_cmd(dir.path())
        .arg("run")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: updated pairing ledger with the latest lunch"));

    // already folded in, so a second start is quiet
    lb_cmd(dir.path())
        .arg("run")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
