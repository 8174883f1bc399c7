//! End-to-end tests driving the `sqa` binary.
//!
//! These run with the embedding provider disabled, exercising the paths
//! that never reach an embedding call: initialization, dry-run ingestion,
//! empty-store search and question answering, resets, and input
//! validation errors.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sqa");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("schema.sql"),
        "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50) NOT NULL);\n\
         CREATE TABLE posts (id INT PRIMARY KEY, user_id INT, \
         FOREIGN KEY (user_id) REFERENCES users(id));\n",
    )
    .unwrap();
    fs::write(
        root.join("report.docx"),
        "not a supported format",
    )
    .unwrap();

    let config_content = format!(
        r#"[storage]
index_dir = "{}/data/index"
memory_dir = "{}/data/memory"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("sqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_stores() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    assert!(tmp.path().join("data/index/index.json").exists());
    assert!(tmp.path().join("data/index/schema/index.json").exists());
    assert!(tmp.path().join("data/memory/memory.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_sqa(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_sqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_dry_run_reports_parse_counts() {
    let (tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let schema = tmp.path().join("schema.sql");
    let (stdout, stderr, success) = run_sqa(
        &config_path,
        &["ingest", schema.to_str().unwrap(), "--dry-run"],
    );
    assert!(success, "dry-run failed: stderr={}", stderr);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("files processed: 1"));
    assert!(stdout.contains("tables parsed: 2"));
    assert!(stdout.contains("relationships parsed: 1"));
    // Two table units plus one relationships unit.
    assert!(stdout.contains("schema units: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_errors_when_embeddings_disabled() {
    let (tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let schema = tmp.path().join("schema.sql");
    let (_, stderr, success) = run_sqa(&config_path, &["ingest", schema.to_str().unwrap()]);
    assert!(!success, "ingest should fail with embeddings disabled");
    assert!(
        stderr.contains("disabled"),
        "Should mention disabled, got: {}",
        stderr
    );
}

#[test]
fn test_ingest_unsupported_extension() {
    let (tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let report = tmp.path().join("report.docx");
    let (_, stderr, success) = run_sqa(&config_path, &["ingest", report.to_str().unwrap()]);
    assert!(!success, "Unsupported extension should fail");
    assert!(
        stderr.contains("Unsupported file extension"),
        "Should mention the extension, got: {}",
        stderr
    );
}

#[test]
fn test_search_empty_store_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    for store in ["document", "schema", "memory"] {
        let (stdout, stderr, success) =
            run_sqa(&config_path, &["search", "anything", "--store", store]);
        assert!(success, "search {} failed: {}", store, stderr);
        assert!(stdout.contains("No results"));
    }
}

#[test]
fn test_search_invalid_store_class() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let (_, stderr, success) = run_sqa(&config_path, &["search", "q", "--store", "vector"]);
    assert!(!success, "Invalid store class should fail");
    assert!(
        stderr.contains("Invalid store class"),
        "Should mention invalid store class, got: {}",
        stderr
    );
}

#[test]
fn test_ask_empty_stores_returns_sentinel() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let (stdout, stderr, success) = run_sqa(&config_path, &["ask", "what tables exist?"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(
        stdout.contains("couldn't find specific information"),
        "Should print the no-answer sentinel, got: {}",
        stdout
    );
    assert!(stdout.contains("confidence: low"));
}

#[test]
fn test_reset_all() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let (stdout, stderr, success) = run_sqa(&config_path, &["reset"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("All stores reset successfully"));
}

#[test]
fn test_reset_single_store() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let (stdout, _, success) = run_sqa(&config_path, &["reset", "--store", "schema"]);
    assert!(success);
    assert!(stdout.contains("reset successfully"));
}

#[test]
fn test_reset_invalid_store_class() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let (_, stderr, success) = run_sqa(&config_path, &["reset", "--store", "everything"]);
    assert!(!success);
    assert!(stderr.contains("Invalid store class"));
}

#[test]
fn test_stats_empty_stores() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let (stdout, stderr, success) = run_sqa(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("document"));
    assert!(stdout.contains("schema"));
    assert!(stdout.contains("memory"));
}

#[test]
fn test_summary_empty_schema_store() {
    let (_tmp, config_path) = setup_test_env();

    run_sqa(&config_path, &["init"]);
    let (stdout, _, success) = run_sqa(&config_path, &["summary"]);
    assert!(success);
    assert!(stdout.contains("Tables: (none)"));
}

#[test]
fn test_missing_config_errors() {
    let (tmp, _) = setup_test_env();
    let bogus = tmp.path().join("config").join("nope.toml");

    let (_, stderr, success) = run_sqa(&bogus, &["init"]);
    assert!(!success, "Missing config should fail");
    assert!(
        stderr.contains("Failed to read config file"),
        "Should mention the config file, got: {}",
        stderr
    );
}
