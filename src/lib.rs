//! Multilingual hate speech detection over a fine-tuned XLM-RoBERTa model,
//! with a small web form and an append-only feedback log.

pub mod classifier;
pub mod config;
pub mod error;
pub mod feedback;
pub mod model;
pub mod server;

pub use classifier::{ClassificationResult, Classifier, Detection, InputError, Label, Scorer};
pub use error::{Error, Result};
pub use feedback::{CsvFeedbackLog, FeedbackRecord, FeedbackSink};
