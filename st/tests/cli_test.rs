//! CLI tests for the `st` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `st` with an isolated home, config dir and working directory
fn st(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("st").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"));
    cmd
}

#[test]
fn test_check_accepts_valid_batch() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("stories.json");
    std::fs::write(
        &file,
        r#"[{"id": "STORY-1", "title": "Add export to PDF"}, {"title": "Send weekly digest"}]"#,
    )
    .unwrap();

    st(&home)
        .arg("check")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Add export to PDF (STORY-1)"))
        .stdout(predicate::str::contains("Batch is valid"));
}

#[test]
fn test_check_rejects_malformed_batch() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("stories.json");
    std::fs::write(&file, r#""just a string""#).unwrap();

    st(&home)
        .arg("check")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed batch input"));
}

#[test]
fn test_check_reports_invalid_story_fields() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("stories.json");
    std::fs::write(&file, r#"[{"title": 42}]"#).unwrap();

    st(&home).arg("check").arg(&file).assert().failure().stdout(predicate::str::contains("invalid"));
}

#[test]
fn test_config_prints_yaml_with_project_overrides() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join(".storytwin.yml"),
        "timeouts:\n  estimation-timeout-ms: 1234\n",
    )
    .unwrap();

    st(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("estimation-timeout-ms: 1234"))
        .stdout(predicate::str::contains("orchestrator: reasoner"));
}
