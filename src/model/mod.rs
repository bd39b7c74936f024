//! Loading the fine-tuned XLM-RoBERTa checkpoint and running its forward pass.

pub mod config;

pub use candle_core::Device;
use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::XLMRobertaForSequenceClassification;
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use std::fs;
use std::path::{Path, PathBuf};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use crate::classifier::Scorer;
use crate::error::{Error, Result};
pub use config::Config;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";
const PAD_TOKEN: &str = "<pad>";

/// Where the checkpoint comes from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A directory holding `config.json`, `tokenizer.json` and the weights.
    Local(PathBuf),
    /// A Hugging Face Hub repository.
    Hub {
        model_id: String,
        revision: String,
        /// Repository to take `tokenizer.json` from when the model repository
        /// only ships the sentencepiece files.
        tokenizer_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Weights {
    SafeTensors(PathBuf),
    PyTorch(PathBuf),
}

/// Resolved paths of every artifact the classifier needs.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Weights,
}

impl ModelFiles {
    pub fn from_dir<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut dir = PathBuf::from(path.as_ref());

        dir.push(CONFIG_FILE);
        let config = existing(&dir)?;
        dir.pop();

        dir.push(TOKENIZER_FILE);
        let tokenizer = existing(&dir)?;
        dir.pop();

        dir.push(SAFETENSORS_FILE);
        let weights = if dir.is_file() {
            Weights::SafeTensors(dir.clone())
        } else {
            dir.pop();
            dir.push(PYTORCH_FILE);
            Weights::PyTorch(existing(&dir)?)
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    pub fn from_hub(model_id: &str, revision: &str, tokenizer_id: &str) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_owned(),
            RepoType::Model,
            revision.to_owned(),
        ));

        // Fallbacks follow the repository listing; download errors propagate.
        let listing: Vec<String> = repo
            .info()?
            .siblings
            .into_iter()
            .map(|s| s.rfilename)
            .collect();
        let plan = HubPlan::from_listing(&listing);

        let config = repo.get(CONFIG_FILE)?;
        let tokenizer = if plan.own_tokenizer {
            repo.get(TOKENIZER_FILE)?
        } else {
            warn!(
                model_id,
                tokenizer_id,
                "model repository has no tokenizer.json; using the base tokenizer"
            );
            api.model(tokenizer_id.to_owned()).get(TOKENIZER_FILE)?
        };
        let weights = if plan.safetensors {
            Weights::SafeTensors(repo.get(SAFETENSORS_FILE)?)
        } else {
            debug!(model_id, "no safetensors weights; falling back to pytorch_model.bin");
            Weights::PyTorch(repo.get(PYTORCH_FILE)?)
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    pub fn resolve(source: &ModelSource) -> Result<Self> {
        match source {
            ModelSource::Local(dir) => Self::from_dir(dir),
            ModelSource::Hub {
                model_id,
                revision,
                tokenizer_id,
            } => Self::from_hub(model_id, revision, tokenizer_id),
        }
    }
}

/// Which optional files a Hub repository actually ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HubPlan {
    own_tokenizer: bool,
    safetensors: bool,
}

impl HubPlan {
    fn from_listing(files: &[String]) -> Self {
        let has = |name: &str| files.iter().any(|f| f == name);
        Self {
            own_tokenizer: has(TOKENIZER_FILE),
            safetensors: has(SAFETENSORS_FILE),
        }
    }
}

fn existing(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(Error::IOError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("missing model file {}", path.display()),
        )))
    }
}

/// XLM-RoBERTa with a sequence-classification head, plus its tokenizer.
pub struct XlmRobertaScorer {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
}

impl XlmRobertaScorer {
    pub fn load(files: &ModelFiles, device: Device) -> Result<Self> {
        let config = Config::from_json(&fs::read_to_string(&files.config)?)?;
        config.ensure_binary()?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)?;
        tokenizer
            .with_padding(Some(PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                pad_id: config.pad_token_id(),
                pad_token: PAD_TOKEN.to_owned(),
                ..Default::default()
            }))
            .with_truncation(Some(TruncationParams {
                max_length: config.max_input_tokens(),
                ..Default::default()
            }))?;

        let model_builder = match &files.weights {
            Weights::SafeTensors(path) => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)?
            },
            Weights::PyTorch(path) => VarBuilder::from_pth(path, DType::F32, &device)?,
        };
        let model = XLMRobertaForSequenceClassification::new(
            config.num_labels(),
            &config.xlm_roberta_config,
            model_builder,
        )?;

        info!(
            weights = ?files.weights,
            max_input_tokens = config.max_input_tokens(),
            "classifier model loaded"
        );
        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    pub fn from_source(source: &ModelSource, device: Device) -> Result<Self> {
        let files = ModelFiles::resolve(source)?;
        Self::load(&files, device)
    }
}

impl Scorer for XlmRobertaScorer {
    fn logits(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let prompts: Vec<String> = texts.iter().map(|t| (*t).to_owned()).collect();
        let encodings = self.tokenizer.encode_batch(prompts, true)?;
        let mut input_ids = Vec::with_capacity(encodings.len());
        let mut attention_masks = Vec::with_capacity(encodings.len());
        for encoding in encodings {
            input_ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            attention_masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }
        let input_ids = Tensor::stack(input_ids.as_slice(), 0)?;
        let attention_mask = Tensor::stack(attention_masks.as_slice(), 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let xs = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids)?;
        Ok(xs.to_dtype(DType::F32)?.to_vec2()?)
    }
}
