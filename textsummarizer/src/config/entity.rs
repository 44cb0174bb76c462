//! Typed, immutable configuration records handed to each stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::ConfigurationError;

/// Parameters for fetching and unpacking the source archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIngestionConfig {
    /// Stage working directory.
    pub root_dir: PathBuf,
    /// Remote archive location.
    pub source_url: String,
    /// Where the archive is stored locally.
    pub local_data_file: PathBuf,
    /// Extraction destination.
    pub unzip_dir: PathBuf,
    /// Expected lowercase hex sha256 of the archive, if pinned.
    pub sha256: Option<String>,
}

/// Parameters for checking the extracted dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValidationConfig {
    /// Stage working directory.
    pub root_dir: PathBuf,
    /// Directory whose entries are checked.
    pub data_dir: PathBuf,
    /// Where the pass/fail status is written.
    pub status_file: PathBuf,
    /// Entry names that must be present in `data_dir`.
    pub required_files: Vec<String>,
    /// Whether a failed status stops the pipeline.
    pub gate_on_failure: bool,
}

/// Tokenization parameters shared by transformation, evaluation and prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingParams {
    /// Token budget for the dialogue, special tokens included.
    pub max_source_length: usize,
    /// Token budget for the reference summary.
    pub max_target_length: usize,
    /// Task prefix prepended to every dialogue.
    pub source_prefix: String,
    /// Name of the dialogue column in the raw dataset.
    pub text_column: String,
    /// Name of the summary column in the raw dataset.
    pub summary_column: String,
}

/// Parameters for encoding the raw dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTransformationConfig {
    /// Stage working directory.
    pub root_dir: PathBuf,
    /// Raw dataset directory.
    pub data_path: PathBuf,
    /// Encoded dataset destination.
    pub output_dir: PathBuf,
    /// Tokenizer hub id or local path.
    pub tokenizer_name: String,
    /// Splits to encode.
    pub splits: Vec<String>,
    /// Tokenization parameters.
    pub preprocessing: PreprocessingParams,
}

/// Fine-tuning hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
    /// Passes over the training split.
    pub num_train_epochs: usize,
    /// Optimizer steps of linear learning-rate warmup.
    pub warmup_steps: usize,
    /// Records per micro-batch.
    pub per_device_train_batch_size: usize,
    /// AdamW decoupled weight decay.
    pub weight_decay: f64,
    /// Peak learning rate.
    pub learning_rate: f64,
    /// Log every N optimizer steps.
    pub logging_steps: usize,
    /// Compute validation loss every N optimizer steps.
    pub eval_steps: usize,
    /// Validation batches per evaluation.
    pub eval_batches: usize,
    /// Micro-batches per optimizer step.
    pub gradient_accumulation_steps: usize,
    /// Hard cap on optimizer steps.
    pub max_steps: Option<usize>,
    /// Shuffle and device seed.
    pub seed: u64,
}

/// Parameters for fine-tuning the pretrained checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTrainerConfig {
    /// Stage working directory.
    pub root_dir: PathBuf,
    /// Encoded dataset directory.
    pub data_path: PathBuf,
    /// Pretrained checkpoint hub id or local directory.
    pub model_ckpt: String,
    /// Where the fine-tuned weights and model config are written.
    pub model_dir: PathBuf,
    /// Where the tokenizer is written.
    pub tokenizer_dir: PathBuf,
    /// Hyperparameters.
    pub training: TrainingParams,
    /// Compute device.
    pub device: DeviceChoice,
}

/// Beam-search decoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Beam width.
    pub num_beams: usize,
    /// Exponent applied to hypothesis length when ranking finished beams.
    pub length_penalty: f64,
    /// Maximum decoder length, decoder start token included.
    pub max_length: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            num_beams: 8,
            length_penalty: 0.8,
            max_length: 128,
        }
    }
}

/// Parameters for scoring the fine-tuned model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluationConfig {
    /// Stage working directory.
    pub root_dir: PathBuf,
    /// Raw dataset directory holding the held-out split.
    pub data_path: PathBuf,
    /// Fine-tuned model directory.
    pub model_path: PathBuf,
    /// Tokenizer directory.
    pub tokenizer_path: PathBuf,
    /// CSV report destination.
    pub metric_file_name: PathBuf,
    /// Held-out split name.
    pub split: String,
    /// Evaluate only the first N records.
    pub max_samples: Option<usize>,
    /// Row label in the report.
    pub model_name: String,
    /// Decoding parameters.
    pub generation: GenerationParams,
    /// Tokenization parameters.
    pub preprocessing: PreprocessingParams,
    /// Compute device.
    pub device: DeviceChoice,
}

/// Parameters for the interactive prediction path.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    /// Fine-tuned model directory.
    pub model_path: PathBuf,
    /// Tokenizer directory.
    pub tokenizer_path: PathBuf,
    /// Decoding parameters.
    pub generation: GenerationParams,
    /// Tokenization parameters.
    pub preprocessing: PreprocessingParams,
    /// Compute device.
    pub device: DeviceChoice,
}

/// Log output parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for the log file; `None` disables file output.
    pub dir: Option<PathBuf>,
    /// Log file name inside `dir`.
    pub file_name: String,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Stdout format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: Some(PathBuf::from("logs")),
            file_name: "running_logs.log".to_string(),
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Stdout log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigurationError::invalid(
                "logging.format",
                format!("expected 'text' or 'json', got '{other}'"),
            )),
        }
    }
}

/// Where tensors live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceChoice {
    /// CUDA, then Metal, then CPU.
    #[default]
    Auto,
    /// Always CPU.
    Cpu,
    /// First CUDA device.
    Cuda,
    /// First Metal device.
    Metal,
}

impl FromStr for DeviceChoice {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" => Ok(Self::Metal),
            other => Err(ConfigurationError::invalid(
                "Runtime.device",
                format!("unknown device '{other}'"),
            )),
        }
    }
}

impl fmt::Display for DeviceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::Metal => write!(f, "metal"),
        }
    }
}
