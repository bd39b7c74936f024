use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

/// Produces raw per-class scores for a batch of texts.
///
/// Row `i` of the output holds the logits for `texts[i]`.
pub trait Scorer: Send + Sync {
    fn logits(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Output space of the fine-tuned checkpoint. Index 0 is `Normal`, index 1 is
/// `HateSpeech`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Normal,
    HateSpeech,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Normal, Label::HateSpeech];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::HateSpeech => 1,
        }
    }

    /// Label as shown in the UI and written to the feedback log.
    pub fn display(self) -> &'static str {
        match self {
            Self::Normal => "✅ Normal",
            Self::HateSpeech => "🚨 Hate Speech",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Self::Normal => "This text is likely safe.",
            Self::HateSpeech => "This text is likely hate speech.",
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub summary: String,
}

impl From<Label> for ClassificationResult {
    fn from(label: Label) -> Self {
        Self {
            label,
            summary: label.summary().to_owned(),
        }
    }
}

/// Why an uploaded file could not be classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputError {
    NoFile,
    Unreadable(String),
}

impl InputError {
    pub fn headline(&self) -> &'static str {
        match self {
            Self::NoFile => "❌ No file uploaded.",
            Self::Unreadable(_) => "⚠️ Error reading file.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NoFile => "Please upload a .txt or .csv file.",
            Self::Unreadable(reason) => reason,
        }
    }
}

impl Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.headline(), self.message())
    }
}

/// Result of the file-input path: either a classification or a recoverable
/// input problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Detection {
    Classified(ClassificationResult),
    InputError(InputError),
}

/// Index of the largest score. Equal maxima resolve to the lowest index, the
/// way `torch.argmax` does. Non-finite scores are rejected.
pub fn argmax(scores: &[f32]) -> Result<usize> {
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(Error::InvalidModelOutput(format!(
            "non-finite logit {bad} in {scores:?}"
        )));
    }
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i)
        .ok_or_else(|| Error::InvalidModelOutput("empty logits".to_owned()))
}

/// Maps one row of logits onto a label.
pub fn label_for(logits: &[f32]) -> Result<Label> {
    if logits.len() != Label::ALL.len() {
        return Err(Error::InvalidModelOutput(format!(
            "expected {} logits, got {}",
            Label::ALL.len(),
            logits.len()
        )));
    }
    let index = argmax(logits)?;
    Label::from_index(index)
        .ok_or_else(|| Error::InvalidModelOutput(format!("unmapped class index {index}")))
}

/// Hate-speech classifier over an injected scorer.
#[derive(Clone)]
pub struct Classifier {
    scorer: Arc<dyn Scorer>,
}

impl Classifier {
    pub fn new(scorer: impl Scorer + 'static) -> Self {
        Self {
            scorer: Arc::new(scorer),
        }
    }

    pub fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let mut results = self.classify_batch(&[text])?;
        results
            .pop()
            .ok_or_else(|| Error::InvalidModelOutput("no logits returned".to_owned()))
    }

    pub fn classify_batch(&self, texts: &[&str]) -> Result<Vec<ClassificationResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.scorer.logits(texts)?;
        if rows.len() != texts.len() {
            return Err(Error::InvalidModelOutput(format!(
                "expected {} rows of logits, got {}",
                texts.len(),
                rows.len()
            )));
        }
        rows.iter()
            .map(|logits| {
                let label = label_for(logits)?;
                debug!(?logits, %label, "classified");
                Ok(label.into())
            })
            .collect()
    }

    /// Classifies an uploaded file. Missing or non-UTF-8 content becomes a
    /// [`Detection::InputError`]; model failures are still returned as `Err`.
    pub fn classify_upload(&self, bytes: Option<&[u8]>) -> Result<Detection> {
        let Some(bytes) = bytes else {
            return Ok(Detection::InputError(InputError::NoFile));
        };
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(Detection::Classified(self.classify(text)?)),
            Err(e) => Ok(Detection::InputError(InputError::Unreadable(
                e.to_string(),
            ))),
        }
    }
}
