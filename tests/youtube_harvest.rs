//! End-to-end harvest against a mocked YouTube Data API.

use comment_harvester::error::AppError;
use comment_harvester::models::{Config, Credentials};
use comment_harvester::pipeline::{HarvestRequest, run_harvest};
use comment_harvester::source::SourceKind;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOM: &str = "\u{feff}";

fn credentials() -> Credentials {
    Credentials {
        api_key: Some("it-key".to_string()),
        username: None,
        password: None,
    }
}

fn config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.youtube.base_url = server.uri();
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 2;
    config
}

fn thread(id: &str, text: &str, published_at: &str) -> Value {
    json!({
        "id": id,
        "snippet": { "topLevelComment": {
            "id": id,
            "snippet": {
                "textDisplay": text,
                "publishedAt": published_at
            }
        }}
    })
}

async fn mount_channel(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "channel"))
        .and(query_param("q", "example_channel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": { "kind": "youtube#channel", "channelId": "UCexample" } }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_videos(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "video"))
        .and(query_param("channelId", "UCexample"))
        .and(query_param("order", "date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": { "videoId": "vidB" },
                  "snippet": { "title": "Second", "publishedAt": "2024-12-01T03:00:00Z" } },
                { "id": { "videoId": "vidA" },
                  "snippet": { "title": "First", "publishedAt": "2024-11-02T03:00:00Z" } }
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_comments(server: &MockServer, video: &str, texts: [&str; 3]) {
    let items: Vec<Value> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| thread(&format!("{video}-{i}"), text, "2024-12-02T16:00:00Z"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/commentThreads"))
        .and(query_param("videoId", video))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn harvests_six_rows_for_two_videos() {
    let server = MockServer::start().await;
    mount_channel(&server).await;
    mount_videos(&server).await;
    mount_comments(&server, "vidB", ["great video", "\"quoted\", with comma", "multi\nline"]).await;
    mount_comments(&server, "vidA", ["좋아요", "최고예요", "감사합니다"]).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out/comments.csv");
    let request = HarvestRequest::new("example_channel", "2024-10-28", "2024-12-11")
        .with_source(SourceKind::YouTube)
        .with_output(&output);

    let report = run_harvest(
        &config(&server),
        &credentials(),
        &request,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.comment_count, 6);
    assert_eq!(report.items_seen, 2);
    assert_eq!(report.items_failed, 0);
    assert_eq!(report.exported_path, output.canonicalize().unwrap());

    let content = std::fs::read_to_string(&output).unwrap();
    let body = content.strip_prefix(BOM).expect("export starts with a BOM");
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers: Vec<&str> = reader.headers().unwrap().iter().collect();
    assert_eq!(headers, ["published_at", "comment", "video_url"]);

    let rows: Vec<(String, String, String)> = reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[1].to_string(), r[2].to_string())
        })
        .collect();
    assert_eq!(rows.len(), 6);
    assert_eq!(
        rows[1],
        (
            "2024-12-03".to_string(),
            "\"quoted\", with comma".to_string(),
            "https://www.youtube.com/watch?v=vidB".to_string()
        )
    );
    assert_eq!(rows[2].1, "multi\nline");
    assert_eq!(rows[3].2, "https://www.youtube.com/watch?v=vidA");
}

#[tokio::test]
async fn identical_texts_from_distinct_threads_are_all_exported() {
    let server = MockServer::start().await;
    mount_channel(&server).await;
    mount_videos(&server).await;
    mount_comments(&server, "vidB", ["좋아요", "좋아요", "좋아요"]).await;
    mount_comments(&server, "vidA", ["좋아요", "좋아요", "좋아요"]).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("same.csv");
    let request = HarvestRequest::new("example_channel", "2024-10-28", "2024-12-11")
        .with_source(SourceKind::YouTube)
        .with_output(&output);

    let report = run_harvest(
        &config(&server),
        &credentials(),
        &request,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.comment_count, 6);
    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.matches("좋아요").count(), 6);
}

#[tokio::test]
async fn excluded_keywords_and_disabled_comments() {
    let server = MockServer::start().await;
    mount_channel(&server).await;
    mount_videos(&server).await;
    mount_comments(&server, "vidA", ["이벤트 참여합니다", "좋아요", "EVENT 참가 신청"]).await;
    Mock::given(method("GET"))
        .and(path("/commentThreads"))
        .and(query_param("videoId", "vidB"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "disabled comments",
                "errors": [{ "reason": "commentsDisabled" }]
            }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("comments.csv");
    let request =
        HarvestRequest::new("example_channel", "2024-10-28", "2024-12-11").with_output(&output);

    let report = run_harvest(
        &config(&server),
        &credentials(),
        &request,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.comment_count, 1);
    assert_eq!(report.comments_excluded, 2);
    assert_eq!(report.items_failed, 0);
}

#[tokio::test]
async fn unknown_channel_is_not_found_and_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "channel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "video"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("comments.csv");
    let request = HarvestRequest::new("nobody", "2024-10-28", "2024-12-11").with_output(&output);

    let err = run_harvest(
        &config(&server),
        &credentials(),
        &request,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::NotFound { .. }));
    assert!(!output.exists());
}

#[tokio::test]
async fn malformed_dates_make_no_requests() {
    let server = MockServer::start().await;
    let request = HarvestRequest::new("example_channel", "2024/10/28", "2024-12-11");

    let err = run_harvest(
        &config(&server),
        &credentials(),
        &request,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::InvalidWindow(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
