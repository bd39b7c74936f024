use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tokenizer error: {0}")]
    TokenizerError(#[from] tokenizers::Error),
    #[error("candle error: {0}")]
    CandleError(#[from] candle_core::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("model download failed: {0}")]
    HubError(#[from] hf_hub::api::sync::ApiError),
    /// The model config does not describe a two-class classifier.
    #[error("invalid model config: {0}")]
    InvalidModelConfig(String),
    /// Logits that cannot be mapped onto a label.
    #[error("invalid model output: {0}")]
    InvalidModelOutput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
