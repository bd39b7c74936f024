use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::ServerError;
use super::AppState;
use crate::classifier::{ClassificationResult, Detection, Label};
use crate::feedback::{FeedbackRecord, DEFAULT_FEEDBACK_TAG};

const INDEX_HTML: &str = include_str!("index.html");
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub label: Label,
    pub display: &'static str,
    pub summary: String,
}

impl From<ClassificationResult> for ClassifyResponse {
    fn from(result: ClassificationResult) -> Self {
        Self {
            label: result.label,
            display: result.label.display(),
            summary: result.summary,
        }
    }
}

/// Outcome of a file upload. Both variants carry `display` and `summary` so
/// the page renders them the same way.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionResponse {
    Classified {
        label: Label,
        display: &'static str,
        summary: String,
    },
    InputError {
        display: &'static str,
        summary: String,
    },
}

impl From<Detection> for DetectionResponse {
    fn from(detection: Detection) -> Self {
        match detection {
            Detection::Classified(result) => Self::Classified {
                label: result.label,
                display: result.label.display(),
                summary: result.summary,
            },
            Detection::InputError(err) => Self::InputError {
                display: err.headline(),
                summary: err.message().to_owned(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub text: String,
    pub prediction: String,
    pub summary: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /api/classify`
pub async fn classify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, ServerError> {
    let Json(req) = payload?;
    let classifier = state.classifier.clone();
    let result = tokio::task::spawn_blocking(move || classifier.classify(&req.text)).await??;
    info!(label = ?result.label, "text classified");
    Ok(Json(result.into()))
}

/// `POST /api/classify/file` with a multipart `file` field.
pub async fn classify_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<DetectionResponse>, ServerError> {
    let mut upload: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await?;
        debug!(file_name = %file_name, size = bytes.len(), "received upload");
        // Browsers send an empty, unnamed part when no file was chosen.
        if !(file_name.is_empty() && bytes.is_empty()) {
            upload = Some(bytes.to_vec());
        }
    }

    let classifier = state.classifier.clone();
    let detection =
        tokio::task::spawn_blocking(move || classifier.classify_upload(upload.as_deref()))
            .await??;
    match &detection {
        Detection::Classified(result) => info!(label = ?result.label, "file classified"),
        Detection::InputError(err) => info!(reason = %err, "file rejected"),
    }
    Ok(Json(detection.into()))
}

/// `POST /api/flag`
pub async fn flag(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FlagRequest>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let Json(req) = payload?;
    let record = FeedbackRecord::now(
        req.text,
        req.prediction,
        req.summary,
        req.feedback.unwrap_or_else(|| DEFAULT_FEEDBACK_TAG.to_owned()),
    );
    let sink = Arc::clone(&state.feedback);
    tokio::task::spawn_blocking(move || sink.append(&record)).await??;
    Ok(Json(json!({ "message": "Feedback recorded." })))
}
