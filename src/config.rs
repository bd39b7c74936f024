//! Runtime settings, loaded from environment variables at startup.

use std::path::PathBuf;

use crate::model::ModelSource;

pub const DEFAULT_MODEL_ID: &str = "momoali23/finetuned-xlm-esaf-v4";
pub const DEFAULT_TOKENIZER_ID: &str = "FacebookAI/xlm-roberta-base";

/// Every field has a default, so the detector runs without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Settings {
    /// TCP address for the web UI (default: `"127.0.0.1:7860"`).
    pub bind_address: String,

    /// Hub repository of the fine-tuned checkpoint.
    pub model_id: String,

    pub model_revision: String,

    /// Local checkpoint directory. Takes precedence over `model_id`.
    pub model_dir: Option<PathBuf>,

    /// Hub repository providing `tokenizer.json` when the checkpoint lacks one.
    pub tokenizer_id: String,

    pub feedback_log: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("HSD_BIND", "127.0.0.1:7860"),
            model_id: env_or("HSD_MODEL_ID", DEFAULT_MODEL_ID),
            model_revision: env_or("HSD_MODEL_REVISION", "main"),
            model_dir: std::env::var_os("HSD_MODEL_DIR").map(PathBuf::from),
            tokenizer_id: env_or("HSD_TOKENIZER_ID", DEFAULT_TOKENIZER_ID),
            feedback_log: PathBuf::from(env_or("HSD_FEEDBACK_LOG", "feedback_log.csv")),
            log_level: env_or("HSD_LOG", "info"),
            log_json: std::env::var("HSD_LOG_JSON")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            max_upload_bytes: megabytes(parse_env("HSD_MAX_UPLOAD_MB", 10usize)),
        }
    }

    pub fn model_source(&self) -> ModelSource {
        match &self.model_dir {
            Some(dir) => ModelSource::Local(dir.clone()),
            None => ModelSource::Hub {
                model_id: self.model_id.clone(),
                revision: self.model_revision.clone(),
                tokenizer_id: self.tokenizer_id.clone(),
            },
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn megabytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
