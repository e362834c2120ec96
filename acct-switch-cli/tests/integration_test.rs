use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Command isolated from the real home directory and saved accounts.
fn acct_switch(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("acct-switch").unwrap();
    cmd.env("HOME", home)
        .env("ACCT_SWITCH_DATA_DIR", home.join("data"))
        .env("RUST_LOG", "warn")
        .args(["--config", home.join("missing.toml").to_str().unwrap()]);
    cmd
}

#[cfg(target_os = "linux")]
fn set_claude_account(home: &Path, email: &str, uuid: &str, token: &str) {
    let config = serde_json::json!({
        "theme": "dark",
        "oauthAccount": {"emailAddress": email, "accountUuid": uuid}
    });
    fs::write(
        home.join(".claude.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
    fs::create_dir_all(home.join(".claude")).unwrap();
    fs::write(
        home.join(".claude/.credentials.json"),
        format!("{{\"claudeAiOauth\":{{\"accessToken\":\"{token}\"}}}}"),
    )
    .unwrap();
}

#[test]
fn test_help() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Back up and switch accounts"));
}

#[test]
fn test_version() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("acct-switch"));
}

#[test]
fn test_list_empty() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts saved for Antigravity"));
}

#[test]
fn test_list_json_empty() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_invalid_app() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .args(["list", "--app", "invalid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid app type"));
}

#[test]
fn test_switch_nonexistent() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .args(["switch", "nope", "--no-restart"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Account not found"));
}

#[test]
fn test_delete_nonexistent() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .args(["delete", "3", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Account not found"));
}

#[test]
fn test_claude_has_no_process_control() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .args(["--app", "claude", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no process to control"));
}

#[test]
fn test_add_without_signed_in_account_fails() {
    let temp = TempDir::new().unwrap();
    acct_switch(temp.path())
        .args(["--app", "claude", "add"])
        .assert()
        .failure();
}

#[cfg(target_os = "linux")]
#[test]
fn test_claude_add_switch_delete() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    set_claude_account(home, "alice@example.com", "uuid-a", "token-a");
    acct_switch(home)
        .args(["--app", "claude", "add"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved account: alice"));

    set_claude_account(home, "bob@example.com", "uuid-b", "token-b");
    acct_switch(home)
        .args(["--app", "claude", "add", "--name", "Work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved account: Work"));

    acct_switch(home)
        .args(["--app", "claude", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice@example.com"))
        .stdout(predicate::str::contains("bob@example.com"));

    acct_switch(home)
        .args(["--app", "claude", "switch", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to account: alice"));

    let credentials = fs::read_to_string(home.join(".claude/.credentials.json")).unwrap();
    assert!(credentials.contains("token-a"));
    let config: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.join(".claude.json")).unwrap()).unwrap();
    assert_eq!(config["oauthAccount"]["emailAddress"], "alice@example.com");
    assert_eq!(config["theme"], "dark");

    acct_switch(home)
        .args(["--app", "claude", "delete", "2", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted account: Work"));

    acct_switch(home)
        .args(["--app", "claude", "list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice@example.com"))
        .stdout(predicate::str::contains("bob@example.com").not());
}
