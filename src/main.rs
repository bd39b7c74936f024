use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use hate_speech_detector::config::Settings;
use hate_speech_detector::feedback::DEFAULT_FEEDBACK_TAG;
use hate_speech_detector::model::{Device, XlmRobertaScorer};
use hate_speech_detector::server::{self, AppState};
use hate_speech_detector::{
    ClassificationResult, Classifier, CsvFeedbackLog, Detection, FeedbackRecord, FeedbackSink,
};

#[derive(Debug, Parser)]
#[command(version, about = "Multilingual hate speech detector")]
struct Cli {
    /// Local checkpoint directory (overrides HSD_MODEL_DIR).
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Hugging Face model id (overrides HSD_MODEL_ID).
    #[arg(long, global = true)]
    model_id: Option<String>,

    /// Feedback CSV path (overrides HSD_FEEDBACK_LOG).
    #[arg(long, global = true)]
    feedback_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the web UI.
    Serve {
        /// Address to bind (overrides HSD_BIND).
        #[arg(long)]
        bind: Option<String>,
    },
    /// Classify the given texts, or every stdin line when none are given.
    Classify {
        texts: Vec<String>,
        /// Append each result to the feedback log with this tag.
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = DEFAULT_FEEDBACK_TAG)]
        flag: Option<String>,
    },
    /// Classify the contents of a UTF-8 text file.
    ClassifyFile { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(dir) = cli.model_dir {
        settings.model_dir = Some(dir);
    }
    if let Some(id) = cli.model_id {
        settings.model_id = id;
    }
    if let Some(path) = cli.feedback_log {
        settings.feedback_log = path;
    }

    init_tracing(&settings);
    info!(version = env!("CARGO_PKG_VERSION"), "hate-speech-detector starting");

    let source = settings.model_source();
    let scorer = XlmRobertaScorer::from_source(&source, Device::Cpu)
        .with_context(|| format!("failed to load classifier model from {source:?}"))?;
    let classifier = Classifier::new(scorer);
    let feedback = CsvFeedbackLog::new(&settings.feedback_log);

    match cli.command {
        Command::Serve { bind } => {
            let addr: SocketAddr = bind
                .unwrap_or_else(|| settings.bind_address.clone())
                .parse()
                .context("invalid bind address")?;
            let state = Arc::new(AppState::new(classifier, feedback, settings.max_upload_bytes));
            tokio::runtime::Runtime::new()?.block_on(server::serve(addr, state))?;
        }
        Command::Classify { texts, flag } => {
            let texts = if texts.is_empty() {
                std::io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?
            } else {
                texts
            };
            for text in &texts {
                let result = classifier.classify(text)?;
                print_result(&result);
                if let Some(tag) = &flag {
                    let record = FeedbackRecord::for_result(text.as_str(), &result, tag.as_str());
                    feedback.append(&record)?;
                }
            }
        }
        Command::ClassifyFile { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match classifier.classify_upload(Some(bytes.as_slice()))? {
                Detection::Classified(result) => print_result(&result),
                Detection::InputError(err) => {
                    println!("{}\t{}", err.headline(), err.message());
                }
            }
        }
    }
    Ok(())
}

fn print_result(result: &ClassificationResult) {
    println!("{}\t{}", result.label, result.summary);
}

fn init_tracing(settings: &Settings) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match settings.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: HSD_LOG='{}' is not a valid tracing filter ({}); falling back to 'info'",
                    settings.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    // Logs go to stderr so `classify` output stays pipeable.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if settings.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
