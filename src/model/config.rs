use candle_transformers::models::xlm_roberta::Config as XlmRobertaConfig;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// RoBERTa position ids start after the padding index, so two positions of
/// `max_position_embeddings` are never usable by tokens.
const POSITION_OFFSET: usize = 2;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub xlm_roberta_config: XlmRobertaConfig,
    #[serde(flatten)]
    pub classifier_config: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub id2label: HashMap<String, String>,
    #[serde(default)]
    pub label2id: HashMap<String, u32>,
    #[serde(default)]
    pub problem_type: Option<String>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of output classes. Checkpoints without `id2label` default to
    /// two, as `transformers` does.
    pub fn num_labels(&self) -> usize {
        match self.classifier_config.id2label.len() {
            0 => 2,
            n => n,
        }
    }

    pub fn max_input_tokens(&self) -> usize {
        self.xlm_roberta_config
            .max_position_embeddings
            .saturating_sub(POSITION_OFFSET)
    }

    pub fn pad_token_id(&self) -> u32 {
        self.xlm_roberta_config.pad_token_id
    }

    /// Rejects checkpoints whose head is not the binary Normal/Hate Speech one.
    pub fn ensure_binary(&self) -> Result<()> {
        match self.num_labels() {
            2 => Ok(()),
            n => Err(Error::InvalidModelConfig(format!(
                "expected a 2-label classification head, found {n} labels"
            ))),
        }
    }
}
