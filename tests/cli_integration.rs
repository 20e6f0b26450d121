//! CLI smoke tests.
//!
//! These spawn the real `sth` binary for the commands that need no
//! backend: help, completions, offline scheduling, and profile
//! inspection.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn sth() -> Command {
    Command::cargo_bin("sth").unwrap()
}

#[test]
fn help_lists_commands() {
    sth()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("order"))
        .stdout(predicate::str::contains("completion"));
}

#[test]
fn completion_generates_a_bash_script() {
    sth()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sth"));
}

#[test]
fn order_prints_dependency_order_without_a_backend() {
    let dir = assert_fs::TempDir::new().unwrap();
    let manifest = dir.child("objects.json");
    manifest
        .write_str(
            r#"{"schema":"flat","objects":[
                {"id":"cls","type":"class","name":"zcl_demo","dependsOn":["pkg"]},
                {"id":"pkg","type":"package","name":"z_demo"}]}"#,
        )
        .unwrap();

    let output = sth()
        .args(["order", "--manifest"])
        .arg(manifest.path())
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let pkg_pos = stdout.find("pkg").expect("pkg listed");
    let cls_pos = stdout.find("cls").expect("cls listed");
    assert!(pkg_pos < cls_pos, "package must be scheduled first");
}

#[test]
fn order_fails_cleanly_on_a_missing_manifest() {
    sth()
        .args(["order", "--manifest", "/nonexistent/objects.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest"));
}

#[test]
fn config_path_honors_the_env_override() {
    let dir = assert_fs::TempDir::new().unwrap();
    let profile = dir.child("config.toml");
    profile
        .write_str("base_url = \"http://localhost:50000\"\nuser = \"dev_user\"\n")
        .unwrap();

    sth()
        .env("STAGEHAND_CONFIG", profile.path())
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_shows_the_profile_without_secrets() {
    let dir = assert_fs::TempDir::new().unwrap();
    let profile = dir.child("config.toml");
    profile
        .write_str("base_url = \"http://localhost:50000\"\nuser = \"dev_user\"\n")
        .unwrap();

    sth()
        .args(["--config"])
        .arg(profile.path())
        .args(["config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dev_user"));
}

#[test]
fn unknown_object_kind_is_a_clean_error() {
    sth()
        .args(["read", "widget", "zcl_demo"])
        .env("STAGEHAND_PASSWORD", "pw")
        .env("STAGEHAND_CONFIG", "/nonexistent/config.toml")
        .assert()
        .failure();
}
