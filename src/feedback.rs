//! Append-only CSV log of user-flagged classifications.

use chrono::{Local, SecondsFormat};
use csv::{Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::classifier::ClassificationResult;
use crate::error::{Error, Result};

pub const HEADER: [&str; 5] = ["timestamp", "text", "prediction", "summary", "feedback"];

pub const DEFAULT_FEEDBACK_TAG: &str = "flagged";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: String,
    pub text: String,
    #[serde(rename = "prediction")]
    pub label: String,
    pub summary: String,
    #[serde(rename = "feedback")]
    pub feedback_tag: String,
}

impl FeedbackRecord {
    /// Stamps a record with the current local time.
    pub fn now(
        text: impl Into<String>,
        label: impl Into<String>,
        summary: impl Into<String>,
        feedback_tag: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            text: text.into(),
            label: label.into(),
            summary: summary.into(),
            feedback_tag: feedback_tag.into(),
        }
    }

    pub fn for_result(
        text: impl Into<String>,
        result: &ClassificationResult,
        feedback_tag: impl Into<String>,
    ) -> Self {
        Self::now(
            text,
            result.label.display(),
            result.summary.as_str(),
            feedback_tag,
        )
    }
}

/// Destination for flagged results.
pub trait FeedbackSink: Send + Sync {
    fn append(&self, record: &FeedbackRecord) -> Result<()>;
}

/// CSV file sink. Appends from one process are serialized.
#[derive(Debug)]
pub struct CsvFeedbackLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvFeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record currently in the log, header excluded.
    pub fn read_all(&self) -> Result<Vec<FeedbackRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        reader
            .deserialize()
            .map(|row| row.map_err(Error::from))
            .collect()
    }
}

impl FeedbackSink for CsvFeedbackLog {
    fn append(&self, record: &FeedbackRecord) -> Result<()> {
        // Rows are written whole, so a poisoned lock leaves the file usable.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let fresh = file.metadata()?.len() == 0;

        file.write_all(&encode_row(record, fresh)?)?;
        file.flush()?;

        info!(
            path = %self.path.display(),
            prediction = %record.label,
            feedback = %record.feedback_tag,
            "feedback recorded"
        );
        Ok(())
    }
}

/// One CSV row, preceded by the header when `with_header` is set. Encoded up
/// front so the file sees a single write per append.
fn encode_row(record: &FeedbackRecord, with_header: bool) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    if with_header {
        writer.write_record(HEADER)?;
    }
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| Error::IOError(std::io::Error::new(e.error().kind(), e.to_string())))
}
