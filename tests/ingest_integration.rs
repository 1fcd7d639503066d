//! End-to-end ingestion through the public library API.
//!
//! Local tests run against real temporary directories; remote tests run
//! against a mock contents API.

use codebase_ingest::config::Config;
use codebase_ingest::error::{ErrorKind, FetchErrorKind};
use codebase_ingest::export::ConsumerPayload;
use codebase_ingest::ingest::{ingest, IngestRequest};
use codebase_ingest::models::{IngestionStatus, BINARY_PLACEHOLDER};
use codebase_ingest::traits::IngestContext;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file(server: &MockServer, path: &str) -> Value {
    json!({
        "type": "file",
        "path": path,
        "download_url": format!("{}/raw/{}", server.uri(), path),
    })
}

fn dir(path: &str) -> Value {
    json!({ "type": "dir", "path": path, "download_url": null })
}

fn remote_config(server: &MockServer, token_env: &str) -> Config {
    let mut config = Config::default();
    config.github.api_base = server.uri();
    config.github.token_env = token_env.to_string();
    config.github.max_retries = 0;
    config
}

async fn mount_raw(server: &MockServer, path_: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/raw/{}", path_)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn local_directory_flattens_in_name_order() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("my project");
    fs::create_dir_all(root.join("src/utils")).unwrap();
    fs::write(root.join("README.md"), "# Demo").unwrap();
    fs::write(root.join("src/main.py"), "print('hi')").unwrap();
    fs::write(root.join("src/utils/helpers.js"), "export {}").unwrap();
    fs::write(root.join("logo.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
    fs::write(root.join("src/my notes.txt"), "notes").unwrap();

    let config = Config::default();
    let request = IngestRequest::local_path(&root, &config).unwrap();
    let result = ingest(request, &config, &IngestContext::default()).await;

    assert!(result.is_success(), "{:?}", result.status);
    assert_eq!(result.label, "my project");
    let paths: Vec<&str> = result.records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "README.md",
            "logo.png",
            "src/main.py",
            "src/mynotes.txt",
            "src/utils/helpers.js",
        ]
    );
    assert_eq!(result.records[1].content, BINARY_PLACEHOLDER);
    assert!(result.records[1].is_binary);
    assert_eq!(result.records[2].content, "print('hi')");
    assert_eq!(result.stats.files, 5);
    assert_eq!(result.stats.binary_files, 1);
}

#[tokio::test]
async fn local_ingestion_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("b")).unwrap();
    fs::write(tmp.path().join("b/x.ts"), "let x = 1;").unwrap();
    fs::write(tmp.path().join("a.css"), "body {}").unwrap();

    let config = Config::default();
    let first = ingest(
        IngestRequest::local_path(tmp.path(), &config).unwrap(),
        &config,
        &IngestContext::default(),
    )
    .await;
    let second = ingest(
        IngestRequest::local_path(tmp.path(), &config).unwrap(),
        &config,
        &IngestContext::default(),
    )
    .await;

    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn remote_repository_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents"))
        .and(query_param("ref", "dev"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            file(&server, "README.md"),
            dir("src"),
            file(&server, "banner.png"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/src"))
        .and(query_param("ref", "dev"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            file(&server, "src/app.py"),
            file(&server, "src/lib.c"),
        ])))
        .mount(&server)
        .await;
    mount_raw(&server, "README.md", "# Widgets").await;
    mount_raw(&server, "src/app.py", "import os").await;
    mount_raw(&server, "src/lib.c", "int main;").await;

    let config = remote_config(&server, "CBI_IT_TOKEN_UNSET");
    let result = ingest(
        IngestRequest::remote("https://github.com/acme/widgets/tree/dev"),
        &config,
        &IngestContext::default(),
    )
    .await;

    assert!(result.is_success(), "{:?}", result.status);
    assert_eq!(result.label, "acme/widgets (branch: dev)");
    assert_eq!(
        result.status_message(),
        "widgets Fetched Successfully (branch: dev)."
    );

    let payload = ConsumerPayload::from_result(&result);
    let names: Vec<&str> = payload.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["README.md", "src/app.py", "src/lib.c", "banner.png"]
    );
    assert_eq!(payload.files[0].content, "# Widgets");
    assert_eq!(payload.files[3].content, BINARY_PLACEHOLDER);
}

#[tokio::test]
async fn failed_raw_download_degrades_but_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            file(&server, "ok.md"),
            file(&server, "flaky.md"),
        ])))
        .mount(&server)
        .await;
    mount_raw(&server, "ok.md", "fine").await;
    Mock::given(method("GET"))
        .and(path("/raw/flaky.md"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = remote_config(&server, "CBI_IT_TOKEN_UNSET");
    let result = ingest(
        IngestRequest::remote("https://github.com/acme/widgets"),
        &config,
        &IngestContext::default(),
    )
    .await;

    assert!(result.is_success());
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].content, "fine");
    assert_eq!(result.records[1].content, BINARY_PLACEHOLDER);
    assert_eq!(result.stats.degraded, 1);
}

#[tokio::test]
async fn missing_repository_fails_with_no_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/ghost/contents"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let config = remote_config(&server, "CBI_IT_TOKEN_UNSET");
    let result = ingest(
        IngestRequest::remote("https://github.com/acme/ghost"),
        &config,
        &IngestContext::default(),
    )
    .await;

    assert!(result.records.is_empty());
    match &result.status {
        IngestionStatus::Failed { kind, reason } => {
            assert_eq!(*kind, ErrorKind::Fetch(FetchErrorKind::NotFound));
            assert!(reason.contains("not found"), "{reason}");
        }
        IngestionStatus::Succeeded => panic!("expected failure"),
    }
}

#[tokio::test]
async fn token_is_read_from_configured_env_var() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents"))
        .and(header("authorization", "Bearer env-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    std::env::set_var("CBI_IT_TOKEN_SET", "  env-secret\n");
    let config = remote_config(&server, "CBI_IT_TOKEN_SET");
    let result = ingest(
        IngestRequest::remote("https://github.com/acme/widgets"),
        &config,
        &IngestContext::default(),
    )
    .await;

    assert!(result.is_success(), "{:?}", result.status);
    assert!(result.records.is_empty());
}

#[tokio::test]
async fn malformed_url_makes_no_requests() {
    let server = MockServer::start().await;
    let config = remote_config(&server, "CBI_IT_TOKEN_UNSET");

    for url in [
        "https://github.com/only-owner",
        "https://github.com/../widgets",
        "https://github.com/acme/..",
    ] {
        let result = ingest(IngestRequest::remote(url), &config, &IngestContext::default()).await;
        assert!(
            matches!(
                result.status,
                IngestionStatus::Failed {
                    kind: ErrorKind::Parse,
                    ..
                }
            ),
            "{url}: {:?}",
            result.status
        );
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}
