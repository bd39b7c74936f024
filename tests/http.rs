use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use hate_speech_detector::server::{router, AppState};
use hate_speech_detector::{Classifier, CsvFeedbackLog, Result, Scorer};

const BOUNDARY: &str = "hsd-test-boundary";

/// Treats "stupid" and "go back" as hateful, everything else as normal.
struct KeywordScorer;

impl Scorer for KeywordScorer {
    fn logits(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                if lower.contains("stupid") || lower.contains("go back") {
                    vec![-0.8, 1.9]
                } else {
                    vec![2.4, -1.1]
                }
            })
            .collect())
    }
}

fn app(log_path: &Path, max_upload_bytes: usize) -> Router {
    let state = AppState::new(
        Classifier::new(KeywordScorer),
        CsvFeedbackLog::new(log_path),
        max_upload_bytes,
    );
    router(Arc::new(state))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(field: &str, contents: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"input.txt\"\r\nContent-Type: text/plain\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::post("/api/classify/file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn index_serves_the_form() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(&dir.path().join("log.csv"), 1024)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Multilingual Hate Speech Detector"));
    assert!(html.contains("All [group] are stupid."));
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        app(&dir.path().join("log.csv"), 1024),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn classify_text_maps_both_labels() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log.csv");

    let (status, body) = send(
        app(&log, 1024),
        json_request("/api/classify", json!({ "text": "I love you." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "Normal");
    assert_eq!(body["display"], "✅ Normal");
    assert!(body["summary"].as_str().unwrap().contains("likely safe"));

    let (status, body) = send(
        app(&log, 1024),
        json_request("/api/classify", json!({ "text": "All [group] are stupid." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "HateSpeech");
    assert_eq!(body["display"], "🚨 Hate Speech");
    assert!(body["summary"].as_str().unwrap().contains("likely hate speech"));

    assert!(!log.exists(), "classification alone must not touch the log");
}

#[tokio::test]
async fn uploaded_text_is_classified() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        app(&dir.path().join("log.csv"), 1024),
        upload_request("file", "Go back to your country.".as_bytes()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "classified");
    assert_eq!(body["label"], "HateSpeech");
}

#[tokio::test]
async fn invalid_utf8_upload_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        app(&dir.path().join("log.csv"), 1024),
        upload_request("file", &[0xc3, 0x28, 0xa0, 0xa1]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "input_error");
    assert_eq!(body["display"], "⚠️ Error reading file.");
    assert!(body.get("label").is_none());
}

#[tokio::test]
async fn missing_file_field_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        app(&dir.path().join("log.csv"), 1024),
        upload_request("note", b"not the upload"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "input_error");
    assert_eq!(body["display"], "❌ No file uploaded.");
    assert_eq!(body["summary"], "Please upload a .txt or .csv file.");
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        app(&dir.path().join("log.csv"), 64),
        upload_request("file", &[b'a'; 4096]),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn flagging_appends_to_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("feedback_log.csv");

    for text in ["I love you.", "All [group] are stupid."] {
        let (status, body) = send(
            app(&log, 1024),
            json_request(
                "/api/flag",
                json!({
                    "text": text,
                    "prediction": "✅ Normal",
                    "summary": "This text is likely safe.",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Feedback recorded.");
    }

    let records = CsvFeedbackLog::new(&log).read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].text, "All [group] are stupid.");
    assert!(records.iter().all(|r| r.feedback_tag == "flagged"));

    let contents = std::fs::read_to_string(&log).unwrap();
    assert_eq!(contents.lines().count(), 3);
}

#[tokio::test]
async fn flag_write_failure_surfaces_as_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("no-such-dir").join("feedback_log.csv");
    let (status, body) = send(
        app(&log, 1024),
        json_request(
            "/api/flag",
            json!({
                "text": "I love you.",
                "prediction": "✅ Normal",
                "summary": "This text is likely safe.",
                "feedback": "wrong",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "failed to record feedback");
}

#[tokio::test]
async fn malformed_json_gets_a_json_error_body() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("feedback_log.csv");

    let request = Request::post("/api/classify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"text\": "))
        .unwrap();
    let (status, body) = send(app(&log, 1024), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(
        app(&log, 1024),
        json_request("/api/flag", json!({ "text": "I love you." })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("prediction"));
    assert!(!log.exists());
}
