//! CLI integration tests for synd-post.
//!
//! Everything here runs offline: either no platforms end up targeted, or
//! the delivery points at an unroutable local endpoint and the failure
//! path is asserted.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use libsyndicate::{CrosspostTarget, Database, Platform, PlatformCredential, Vault};

const VAULT_SECRET: &str = "cli-test-secret";

struct TestEnv {
    _dir: TempDir,
    config_path: std::path::PathBuf,
    content_path: std::path::PathBuf,
    db_path: String,
}

fn setup(content_json: &str) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("deliveries.db").to_str().unwrap().to_string();

    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{db_path}\"\n\n[vault]\nsecret = \"{VAULT_SECRET}\"\n\n[publish]\ntimeout_secs = 5\n"
        ),
    )
    .unwrap();

    let content_path = dir.path().join("content.json");
    std::fs::write(&content_path, content_json).unwrap();

    TestEnv {
        _dir: dir,
        config_path,
        content_path,
        db_path,
    }
}

fn single_item() -> &'static str {
    r#"{"id": 1, "title": "Hello", "excerpt": "World", "url": "https://blog.example.com/hello", "tags": ["rust"], "author": "Alex"}"#
}

#[test]
fn test_no_targets_is_success_with_empty_results() {
    let env = setup(single_item());

    Command::cargo_bin("synd-post")
        .unwrap()
        .arg(&env.content_path)
        .args(["--config"])
        .arg(&env.config_path)
        .args(["--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""overall_success": true"#))
        .stdout(predicate::str::contains(r#""total": 0"#));
}

#[test]
fn test_unknown_platform_is_rejected() {
    let env = setup(single_item());

    Command::cargo_bin("synd-post")
        .unwrap()
        .arg(&env.content_path)
        .args(["--config"])
        .arg(&env.config_path)
        .args(["--platforms", "myspace"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported platform: myspace"));
}

#[test]
fn test_multi_item_document_requires_id() {
    let env = setup(
        r#"[{"id": 1, "title": "A", "url": "https://example.com/a", "author": "Alex"},
            {"id": 2, "title": "B", "url": "https://example.com/b", "author": "Alex"}]"#,
    );

    Command::cargo_bin("synd-post")
        .unwrap()
        .arg(&env.content_path)
        .args(["--config"])
        .arg(&env.config_path)
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("pass --id"));
}

#[test]
fn test_missing_content_file_is_invalid_input() {
    let env = setup(single_item());

    Command::cargo_bin("synd-post")
        .unwrap()
        .arg("/nonexistent/content.json")
        .args(["--config"])
        .arg(&env.config_path)
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("failed to read content file"));
}

#[tokio::test]
async fn test_unreachable_platform_records_failed_delivery() {
    let env = setup(single_item());

    // Seed a discord credential whose webhook points nowhere routable.
    let db = Database::new(&env.db_path).await.unwrap();
    let vault = Vault::new(VAULT_SECRET);
    db.upsert_credential(&PlatformCredential {
        platform: Platform::Discord,
        is_active: true,
        access_token: vault.encrypt("webhook-token").unwrap(),
        refresh_token: None,
        config: Some(r#"{"webhook_url": "http://127.0.0.1:9/hook"}"#.to_string()),
        token_expires_at: None,
        last_used_at: None,
    })
    .await
    .unwrap();
    db.upsert_target(&CrosspostTarget::new(1, Platform::Discord))
        .await
        .unwrap();

    // Every targeted platform failed, so the exit code is 1, but the
    // breakdown is still printed.
    let assert = Command::cargo_bin("synd-post")
        .unwrap()
        .arg(&env.content_path)
        .args(["--config"])
        .arg(&env.config_path)
        .args(["--format", "json"])
        .assert()
        .failure()
        .code(1);
    assert
        .stdout(predicate::str::contains(r#""overall_success": false"#))
        .stdout(predicate::str::contains(r#""failed": 1"#));

    let record = db
        .get_delivery(1, Platform::Discord)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, libsyndicate::DeliveryStatus::Failed);
    assert_eq!(record.retry_count, 1);
    assert!(record.error_message.is_some());
}
