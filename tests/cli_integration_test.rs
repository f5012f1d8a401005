//! CLI integration tests.
//!
//! These run the maparchive binary against a temporary database via
//! std::process::Command.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_maparchive"))
}

fn run(db: &Path, args: &[&str]) -> Output {
    Command::new(binary())
        .arg("--db")
        .arg(db)
        .args(args)
        .env_remove("MAPARCHIVE_GUILD")
        .env_remove("MAPARCHIVE_CHANNEL")
        .output()
        .expect("Failed to execute maparchive")
}

const FIXTURE: &str = r#"[
  {"width": 8, "height": 8, "technique": "STAIRCASED", "palette": "FULLCOLOUR",
   "name": "Spawn Castle", "contributors": ["Jane Doe"], "source_message_id": 9001,
   "provenance": {"create_date": "2022-03-01T10:00:00Z"}},
  {"width": 6, "height": 6, "technique": "FLAT", "palette": "CARPETONLY",
   "name": "Carpet Flag", "contributors": ["Bob"], "source_message_id": 9002,
   "provenance": {"create_date": "2022-03-02T10:00:00Z"}},
  {"width": 2, "height": 1, "technique": "FLAT", "palette": "GREYSCALE",
   "name": "Small Sign", "contributors": ["Amy", "Bob"], "source_message_id": 9003,
   "notes": "first build", "provenance": {"create_date": "2022-03-03T10:00:00Z"}},
  {"width": 1, "height": 1, "technique": "STAIRCASED", "palette": "GREYSCALE",
   "name": "Tiny Tag", "contributors": ["Jane"], "source_message_id": 9004,
   "provenance": {"create_date": "2022-03-04T10:00:00Z"}}
]"#;

fn seeded_db(dir: &tempfile::TempDir) -> PathBuf {
    let db = dir.path().join("archive.db");
    let fixture = dir.path().join("entries.json");
    std::fs::write(&fixture, FIXTURE).unwrap();
    let output = run(&db, &["import", fixture.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "import failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    db
}

#[test]
fn test_missing_database_reports_error_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&dir.path().join("none.db"), &["search"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR [ARC-E001]"), "stderr: {}", stderr);
    assert!(stderr.contains("Hint:"));
}

#[test]
fn test_biggest_ranks_entries() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let output = run(&db, &["biggest"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# Biggest map-art in the archive:\n1. 8 x 8 (64 maps)"));
    assert!(stdout.contains("2. 6 x 6 (36 maps)"));
    assert!(stdout.contains("Page 1/1"));
}

#[test]
fn test_largest_alias_accepts_flags() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let output = run(&db, &["largest", "-c", "-f"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    // one match prints the detail view
    assert!(stdout.starts_with("# Spawn Castle\n"), "stdout: {}", stdout);
}

#[test]
fn test_search_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let output = run(&db, &["--output", "json", "search", "artist:bob"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["tool"], "maparchive");
    assert_eq!(value["data"]["total_count"], 2);
    assert_eq!(value["data"]["results"][0]["name"], "Carpet Flag");
    assert_eq!(value["data"]["results"][1]["contributors"][0], "Amy");
    assert_eq!(value["data"]["filters"]["included_contributor"][0], "bob");
}

#[test]
fn test_usage_error_in_json() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let output = run(&db, &["--output", "json", "search", "colour:red"]);
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["data"]["code"], "ARC-E102");
    assert_eq!(value["data"]["error"], "warning");
}

#[test]
fn test_no_results_message() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let output = run(&db, &["search", "submarine"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR [ARC-E201]: No results"));
}

#[test]
fn test_show_flag_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);

    let output = run(&db, &["show", "3"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# Small Sign"));
    assert!(stdout.contains("* Amy\n* Bob"));
    assert!(stdout.contains("> first build"));

    let output = run(&db, &["flag", "3"]);
    assert!(output.status.success());
    let output = run(&db, &["--output", "json", "show", "3"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["data"]["provenance"]["flagged"], true);

    let output = run(&db, &["delete", "3"]);
    assert!(output.status.success());
    let output = run(&db, &["show", "3"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ARC-E302"));
}

#[test]
fn test_import_rejects_invalid_entries() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("archive.db");
    let fixture = dir.path().join("bad.json");
    std::fs::write(
        &fixture,
        r#"[{"width": 0, "height": 2, "name": "Broken", "contributors": ["A"], "source_message_id": 1}]"#,
    )
    .unwrap();
    let output = run(&db, &["import", fixture.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ARC-E301"));
}

#[test]
fn test_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("fresh.db");
    let output = run(&db, &["init"]);
    assert!(output.status.success());
    assert!(db.exists());
    let output = run(&db, &["search"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("ARC-E201"));
}

#[test]
fn test_search_keeps_whitespace_inside_one_argument() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);

    // the shell already removed the quotes around "Jane Doe"
    let output = run(&db, &["--output", "json", "search", "artist:Jane Doe"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["data"]["total_count"], 1);
    assert_eq!(value["data"]["results"][0]["name"], "Spawn Castle");
    assert_eq!(value["data"]["filters"]["included_contributor"][0], "Jane Doe");

    let output = run(&db, &["--output", "json", "search", "artist:Jane"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["data"]["results"][0]["name"], "Tiny Tag");

    // one excluded phrase, not an exclusion plus a keyword
    let output = run(&db, &["--output", "json", "search", "-spawn castle"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["data"]["total_count"], 3);
    assert_eq!(value["data"]["filters"]["excluded_keyword"][0], "spawn castle");
}

#[test]
fn test_edit_single_match() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let output = run(
        &db,
        &[
            "edit", "--name", "Spawn Keep", "--artists", "Jane Doe, Amy", "--type", "semi",
            "spawn", "castle",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# Spawn Keep\n"), "stdout: {}", stdout);

    let output = run(&db, &["show", "1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("* Jane Doe\n* Amy"));
    assert!(stdout.contains("### Type\nsemi-staircased"));
}

#[test]
fn test_edit_multiple_matches_requires_all() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);
    let output = run(&db, &["edit", "--notes", "checked", "artist:bob"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR [ARC-E102]: multiple results"), "stderr: {}", stderr);

    let output = run(&db, &["--output", "json", "edit", "--all", "--notes", "checked", "artist:bob"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["data"].as_array().unwrap().len(), 2);
    assert_eq!(value["data"][1]["notes"], "checked");
}

#[test]
fn test_edit_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir);

    let output = run(&db, &["edit", "--width", "0", "spawn"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ARC-E301"));

    let output = run(&db, &["edit", "--type", "cubic", "spawn"]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("ARC-E102"));

    let output = run(&db, &["show", "1"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("### Size\n8 x 8 (64 maps)"));
}
