//! CLI integration tests for leafid-cli.
//!
//! These tests run the actual binary against a temporary data directory
//! and check outputs, exit codes, and the persisted history.

use assert_cmd::Command;
use image::{ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const JWT_SECRET: &str = "cli-test-secret";

/// Get a Command for the leafid binary, isolated from the caller's env.
fn leafid(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("leafid").unwrap();
    for var in [
        "LEAFID_BACKEND",
        "LEAFID_API_KEY",
        "LEAFID_IDENTIFIER",
        "LEAFID_HISTORY_LIMIT",
        "DATABASE_URL",
        "DATABASE_ACQUIRE_TIMEOUT_SECS",
        "AUTH_JWT_SECRET",
        "STORAGE_URL",
        "STORAGE_API_KEY",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("LEAFID_MOCK_DELAY_MS", "0")
        .env("NO_COLOR", "1")
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

/// Write a small PNG photo into `dir`.
fn write_photo(dir: &Path, name: &str, shade: u8) -> PathBuf {
    let img = RgbImage::from_pixel(12, 9, Rgb([shade, 140, 70]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    let path = dir.join(name);
    fs::write(&path, out.into_inner()).unwrap();
    path
}

/// Identify a photo and return the JSON record.
fn identify_json(temp: &TempDir, name: &str, shade: u8) -> serde_json::Value {
    let photo = write_photo(temp.path(), name, shade);
    let output = leafid(temp.path())
        .args(["identify", "--json", "--api-key", "test-key"])
        .arg(&photo)
        .output()
        .unwrap();
    assert!(output.status.success(), "identify failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

fn history_json(temp: &TempDir) -> Vec<serde_json::Value> {
    let output = leafid(temp.path())
        .args(["history", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Identify plants from photos"))
        .stdout(predicate::str::contains("identify"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("login"));
}

#[test]
fn test_version_displays_version() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("leafid"));
}

#[test]
fn test_help_shows_exit_codes() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("77"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path()).arg("prune").assert().code(64);
}

// ============================================================================
// Identify
// ============================================================================

#[test]
fn test_identify_prints_result_and_records_it() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "leaf.png", 10);

    leafid(temp.path())
        .args(["identify", "--api-key", "test-key"])
        .arg(&photo)
        .assert()
        .success()
        .stdout(predicate::str::contains("Plant identified successfully!"))
        .stdout(predicate::str::contains("Scientific name:"))
        .stdout(predicate::str::contains("Care tips:"));

    assert_eq!(history_json(&temp).len(), 1);
    assert!(temp.path().join("plant-history.json").exists());
}

#[test]
fn test_identify_json_output() {
    let temp = TempDir::new().unwrap();
    let record = identify_json(&temp, "leaf.png", 20);

    let confidence = record["confidence"].as_f64().unwrap();
    assert!([95.0, 92.0, 89.0, 87.0, 94.0].contains(&confidence));
    assert!(!record["id"].as_str().unwrap().is_empty());
    assert!(record["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(record["careInfo"].as_array().unwrap().len(), 4);
}

#[test]
fn test_identify_reads_key_from_env() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "leaf.png", 30);

    leafid(temp.path())
        .env("LEAFID_API_KEY", "env-key")
        .args(["identify", "--quiet"])
        .arg(&photo)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_identify_without_key_is_usage_error() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "leaf.png", 40);

    leafid(temp.path())
        .arg("identify")
        .arg(&photo)
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Missing identification API key"));

    assert!(history_json(&temp).is_empty());
}

#[test]
fn test_missing_file_returns_input_error() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path())
        .args(["identify", "--api-key", "k", "nonexistent_file.jpg"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read image"));
}

#[test]
fn test_non_image_returns_invalid_image() {
    let temp = TempDir::new().unwrap();
    let fake = temp.path().join("leaf.jpg");
    fs::write(&fake, b"this is not a photo").unwrap();

    leafid(temp.path())
        .args(["identify", "--api-key", "k"])
        .arg(&fake)
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Invalid image"));
}

#[test]
fn test_oversized_image_returns_invalid_image() {
    let temp = TempDir::new().unwrap();
    let big = temp.path().join("big.png");
    fs::write(&big, vec![0u8; 2 * 1024 * 1024]).unwrap();

    leafid(temp.path())
        .env("LEAFID_MAX_IMAGE_MB", "1")
        .args(["identify", "--api-key", "k"])
        .arg(&big)
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Image too large"));
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_empty_history() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path())
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No identifications yet"));
}

#[test]
fn test_history_lists_newest_first() {
    let temp = TempDir::new().unwrap();
    let first = identify_json(&temp, "a.png", 1);
    let second = identify_json(&temp, "b.png", 2);

    let history = history_json(&temp);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["id"], second["id"]);
    assert_eq!(history[1]["id"], first["id"]);

    leafid(temp.path())
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 2 record(s)"));
}

#[test]
fn test_history_search() {
    let temp = TempDir::new().unwrap();
    let record = identify_json(&temp, "leaf.png", 5);
    let scientific = record["scientificName"].as_str().unwrap().to_uppercase();

    let output = leafid(temp.path())
        .args(["history", "list", "--json", "--search"])
        .arg(&scientific)
        .output()
        .unwrap();
    let found: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(found.len(), 1);

    leafid(temp.path())
        .args(["history", "list", "--search", "zz-no-match"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plants match 'zz-no-match'"));
}

#[test]
fn test_history_retention() {
    let temp = TempDir::new().unwrap();
    let oldest = identify_json(&temp, "first.png", 0);
    for n in 1..4u8 {
        identify_json(&temp, "next.png", n);
    }

    let mut cmd = leafid(temp.path());
    cmd.env("LEAFID_HISTORY_LIMIT", "3");
    let photo = write_photo(temp.path(), "last.png", 9);
    cmd.args(["identify", "-q", "--api-key", "k"])
        .arg(&photo)
        .assert()
        .success();

    let history = history_json(&temp);
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|r| r["id"] != oldest["id"]));
}

#[test]
fn test_history_show() {
    let temp = TempDir::new().unwrap();
    let record = identify_json(&temp, "leaf.png", 7);
    let id = record["id"].as_str().unwrap();

    leafid(temp.path())
        .args(["history", "show", id])
        .assert()
        .success()
        .stdout(predicate::str::contains(id))
        .stdout(predicate::str::contains(
            record["plantName"].as_str().unwrap(),
        ))
        .stdout(predicate::str::contains("inline image/png"));

    leafid(temp.path())
        .args(["history", "show", "0", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id));

    leafid(temp.path())
        .args(["history", "show", "no-such-id"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No identification found"));
}

#[test]
fn test_history_remove_by_index_and_id() {
    let temp = TempDir::new().unwrap();
    let first = identify_json(&temp, "a.png", 11);
    identify_json(&temp, "b.png", 12);
    identify_json(&temp, "c.png", 13);

    leafid(temp.path())
        .args(["history", "remove", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed from history"));
    assert_eq!(history_json(&temp).len(), 2);

    leafid(temp.path())
        .args(["history", "remove", first["id"].as_str().unwrap()])
        .assert()
        .success();
    let history = history_json(&temp);
    assert_eq!(history.len(), 1);
    assert!(history.iter().all(|r| r["id"] != first["id"]));
}

#[test]
fn test_history_remove_unknown_is_not_an_error() {
    let temp = TempDir::new().unwrap();
    identify_json(&temp, "a.png", 3);

    leafid(temp.path())
        .args(["history", "remove", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to remove"));
    assert_eq!(history_json(&temp).len(), 1);
}

#[test]
fn test_history_clear_requires_confirmation() {
    let temp = TempDir::new().unwrap();
    identify_json(&temp, "a.png", 4);

    leafid(temp.path())
        .args(["history", "clear"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("--yes"));
    assert_eq!(history_json(&temp).len(), 1);

    leafid(temp.path())
        .args(["history", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("History cleared"));
    assert!(history_json(&temp).is_empty());
}

#[test]
fn test_corrupt_history_reads_as_empty() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("plant-history.json"), b"[{broken").unwrap();

    leafid(temp.path())
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No identifications yet"));
}

// ============================================================================
// Session and hosted backend
// ============================================================================

fn token(sub: &str, email: &str) -> String {
    let exp = expiry_in_one_hour();
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &serde_json::json!({ "sub": sub, "email": email, "exp": exp, "aud": "authenticated" }),
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// One hour from now, in seconds since the epoch.
fn expiry_in_one_hour() -> i64 {
    (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp()
}

#[test]
fn test_login_requires_jwt_secret() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path())
        .args(["login", "--token", "whatever"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AUTH_JWT_SECRET"));
}

#[test]
fn test_login_whoami_logout() {
    let temp = TempDir::new().unwrap();
    let user_id = uuid::Uuid::new_v4().to_string();
    let jwt = token(&user_id, "grower@example.com");

    leafid(temp.path())
        .env("AUTH_JWT_SECRET", JWT_SECRET)
        .args(["login", "--token"])
        .arg(&jwt)
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as"))
        .stdout(predicate::str::contains("grower@example.com"));
    assert!(temp.path().join("session.jwt").exists());

    leafid(temp.path())
        .env("AUTH_JWT_SECRET", JWT_SECRET)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains(user_id.as_str()));

    leafid(temp.path())
        .env("AUTH_JWT_SECRET", JWT_SECRET)
        .arg("logout")
        .assert()
        .success();

    leafid(temp.path())
        .env("AUTH_JWT_SECRET", JWT_SECRET)
        .arg("whoami")
        .assert()
        .code(77);
}

#[test]
fn test_login_rejects_bad_token() {
    let temp = TempDir::new().unwrap();
    leafid(temp.path())
        .env("AUTH_JWT_SECRET", JWT_SECRET)
        .args(["login", "--token", "not.a.jwt"])
        .assert()
        .code(77);
    assert!(!temp.path().join("session.jwt").exists());
}

/// Hosted commands with nobody signed in never reach the database.
fn hosted(temp: &TempDir) -> Command {
    let mut cmd = leafid(temp.path());
    cmd.env("AUTH_JWT_SECRET", JWT_SECRET)
        .env("DATABASE_URL", "postgres://leafid@127.0.0.1:1/leafid")
        .args(["--backend", "hosted"]);
    cmd
}

#[test]
fn test_hosted_identify_requires_sign_in() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "leaf.png", 50);

    hosted(&temp)
        .args(["identify", "--api-key", "k"])
        .arg(&photo)
        .assert()
        .code(77)
        .stderr(predicate::str::contains("Not authenticated"));
}

#[test]
fn test_hosted_history_signed_out_is_empty() {
    let temp = TempDir::new().unwrap();
    hosted(&temp)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No identifications yet"));
}

#[test]
fn test_hosted_clear_signed_out_is_rejected() {
    let temp = TempDir::new().unwrap();
    hosted(&temp)
        .args(["history", "clear", "--yes"])
        .assert()
        .code(77);
}

/// Signed-in hosted commands against a database that refuses connections.
fn hosted_signed_in(temp: &TempDir) -> Command {
    let jwt = token(&uuid::Uuid::new_v4().to_string(), "grower@example.com");
    fs::write(temp.path().join("session.jwt"), jwt).unwrap();

    let mut cmd = hosted(temp);
    cmd.env("DATABASE_ACQUIRE_TIMEOUT_SECS", "1");
    cmd
}

#[test]
fn test_hosted_identify_survives_database_outage() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "leaf.png", 60);

    let output = hosted_signed_in(&temp)
        .args(["identify", "--json", "--api-key", "k"])
        .arg(&photo)
        .output()
        .unwrap();
    assert!(output.status.success(), "identify failed: {output:?}");

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(!record["plantName"].as_str().unwrap().is_empty());
    assert!(record["imageUrl"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[test]
fn test_hosted_history_degrades_to_empty_during_outage() {
    let temp = TempDir::new().unwrap();
    hosted_signed_in(&temp)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No identifications yet"));
}

#[test]
fn test_hosted_missing_key_reported_before_database() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "leaf.png", 70);

    hosted_signed_in(&temp)
        .arg("identify")
        .arg(&photo)
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Missing identification API key"));
}
