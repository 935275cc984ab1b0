//! Integration tests for GitHub push ingestion.
//!
//! A mock HTTP server stands in for the raw-content host; an in-memory
//! fake records what reaches the memory backend. Tests cover dedup across
//! commits, skip-rule filtering, per-file failure tolerance, and the
//! "ignored" outcome.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Mutex;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use context_relay::db;
use context_relay::encryption;
use context_relay::github::{GithubIngestor, PushEvent};
use context_relay::memory::MemoryBackend;
use context_relay::migrate;
use context_relay::models::{IndexState, IndexStatus};
use context_relay::registry;

const TENANT: &str = "acme";

#[derive(Default)]
struct RecordingBackend {
    uploads: Mutex<Vec<(String, String)>>, // (title, body)
    reject: bool,
}

#[async_trait]
impl MemoryBackend for RecordingBackend {
    async fn create_assistant(&self, _api_key: &str, _name: &str, _desc: &str) -> Result<String> {
        Ok("asst-test".to_string())
    }

    async fn upload_document(
        &self,
        _api_key: &str,
        _assistant_id: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        if self.reject {
            return Err(anyhow!("rejected"));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((title.to_string(), body.to_string()));
        Ok(format!("artifact-{}", uploads.len()))
    }

    async fn index_status(&self, _api_key: &str, _artifact_id: &str) -> Result<IndexStatus> {
        Ok(IndexStatus {
            state: IndexState::Indexed,
            message: None,
        })
    }

    async fn send_message(&self, _api_key: &str, _assistant_id: &str, _content: &str) -> Result<String> {
        Ok("ok".to_string())
    }
}

async fn setup() -> (TempDir, sqlx::SqlitePool) {
    std::env::set_var("ENCRYPTION_KEY", BASE64.encode([7u8; 32]));

    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("relay.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let encrypted = encryption::encrypt_credential("sk-test-key").unwrap();
    registry::insert_tenant(&pool, TENANT, &encrypted, "asst-1")
        .await
        .unwrap();

    (tmp, pool)
}

fn push_payload(commits: serde_json::Value) -> PushEvent {
    let payload = serde_json::json!({
        "ref": "refs/heads/main",
        "repository": {
            "name": "widget",
            "owner": { "name": "acme" },
            "default_branch": "main"
        },
        "commits": commits
    });
    serde_json::from_value(payload).unwrap()
}

#[tokio::test]
async fn path_touched_by_two_commits_is_uploaded_once() {
    let (_tmp, pool) = setup().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/acme/widget/main/src/app.py"))
        .respond_with(ResponseTemplate::new(200).set_body_string("print('hi')"))
        .expect(1)
        .mount(&server)
        .await;

    let event = push_payload(serde_json::json!([
        { "added": ["src/app.py"], "modified": [], "removed": [] },
        { "added": [], "modified": ["src/app.py"], "removed": [] }
    ]));

    let backend = RecordingBackend::default();
    let ingestor = GithubIngestor::new(server.uri()).unwrap();
    let result = ingestor
        .ingest_push(&pool, &backend, TENANT, &event)
        .await
        .unwrap();

    assert_eq!(result.ingested, vec!["src/app.py".to_string()]);
    assert!(!result.is_ignored());

    let uploads = backend.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "src/app.py");
    assert!(uploads[0].1.contains("Source: GitHub"));
    assert!(uploads[0].1.contains("acme/widget@main"));
    assert!(uploads[0].1.ends_with("print('hi')"));
}

#[tokio::test]
async fn filtered_paths_are_never_fetched() {
    let (_tmp, pool) = setup().await;
    // No routes mounted: any fetch attempt would land in `failed`, so an
    // all-skipped result proves the filtered paths were never requested.
    let server = MockServer::start().await;

    let event = push_payload(serde_json::json!([
        { "added": ["vendor/lib/x.lock", "src/app.png"], "modified": [], "removed": [] }
    ]));

    let backend = RecordingBackend::default();
    let ingestor = GithubIngestor::new(server.uri()).unwrap();
    let result = ingestor
        .ingest_push(&pool, &backend, TENANT, &event)
        .await
        .unwrap();

    assert!(result.is_ignored());
    assert_eq!(result.skipped.len(), 2);
    assert!(result.failed.is_empty());
    assert!(backend.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fetch_failure_of_one_file_does_not_fail_the_batch() {
    let (_tmp, pool) = setup().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/acme/widget/main/docs/setup.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Setup"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/widget/main/src/gone.py"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let event = push_payload(serde_json::json!([
        { "added": ["docs/setup.md", "src/gone.py"], "modified": [], "removed": [] }
    ]));

    let backend = RecordingBackend::default();
    let ingestor = GithubIngestor::new(server.uri()).unwrap();
    let result = ingestor
        .ingest_push(&pool, &backend, TENANT, &event)
        .await
        .unwrap();

    assert_eq!(result.ingested, vec!["docs/setup.md".to_string()]);
    assert_eq!(result.failed, vec!["src/gone.py".to_string()]);
    assert!(!result.is_ignored());
}

#[tokio::test]
async fn push_with_only_removals_is_ignored() {
    let (_tmp, pool) = setup().await;
    let server = MockServer::start().await;

    let event = push_payload(serde_json::json!([
        { "added": [], "modified": [], "removed": ["src/old.py"] }
    ]));

    let backend = RecordingBackend::default();
    let ingestor = GithubIngestor::new(server.uri()).unwrap();
    let result = ingestor
        .ingest_push(&pool, &backend, TENANT, &event)
        .await
        .unwrap();

    assert!(result.is_ignored());
    assert!(result.skipped.is_empty());
    assert!(result.failed.is_empty());
}

#[tokio::test]
async fn unknown_tenant_is_a_config_error() {
    let (_tmp, pool) = setup().await;
    let server = MockServer::start().await;

    let event = push_payload(serde_json::json!([]));
    let backend = RecordingBackend::default();
    let ingestor = GithubIngestor::new(server.uri()).unwrap();

    let err = ingestor
        .ingest_push(&pool, &backend, "ghost", &event)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        context_relay::sync::SyncError::TenantNotFound(_)
    ));
}
