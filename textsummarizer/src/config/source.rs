//! Raw parameter documents as they appear on disk.
//!
//! Every field is optional here; [`ConfigurationManager`](super::ConfigurationManager)
//! decides which are required and which fall back to defaults.

use serde::Deserialize;

/// `config/config.yaml`: paths and URLs per stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    /// Root directory for every stage's artifacts.
    pub artifacts_root: Option<String>,
    /// Ingestion section.
    pub data_ingestion: Option<RawDataIngestion>,
    /// Validation section.
    pub data_validation: Option<RawDataValidation>,
    /// Transformation section.
    pub data_transformation: Option<RawDataTransformation>,
    /// Trainer section.
    pub model_trainer: Option<RawModelTrainer>,
    /// Evaluation section.
    pub model_evaluation: Option<RawModelEvaluation>,
    /// Logging section.
    pub logging: Option<RawLogging>,
}

/// Raw ingestion parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDataIngestion {
    pub root_dir: Option<String>,
    #[serde(alias = "source_URL")]
    pub source_url: Option<String>,
    pub local_data_file: Option<String>,
    pub unzip_dir: Option<String>,
    pub sha256: Option<String>,
}

/// Raw validation parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDataValidation {
    pub root_dir: Option<String>,
    pub data_dir: Option<String>,
    #[serde(alias = "STATUS_FILE")]
    pub status_file: Option<String>,
    #[serde(alias = "ALL_REQUIRED_FILES")]
    pub required_files: Option<Vec<String>>,
    pub gate_on_failure: Option<bool>,
}

/// Raw transformation parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDataTransformation {
    pub root_dir: Option<String>,
    pub data_path: Option<String>,
    pub tokenizer_name: Option<String>,
    pub output_dir: Option<String>,
    pub splits: Option<Vec<String>>,
}

/// Raw trainer parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawModelTrainer {
    pub root_dir: Option<String>,
    pub data_path: Option<String>,
    pub model_ckpt: Option<String>,
    pub model_dir: Option<String>,
    pub tokenizer_dir: Option<String>,
}

/// Raw evaluation parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawModelEvaluation {
    pub root_dir: Option<String>,
    pub data_path: Option<String>,
    pub model_path: Option<String>,
    pub tokenizer_path: Option<String>,
    pub metric_file_name: Option<String>,
}

/// Raw logging parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLogging {
    pub dir: Option<String>,
    pub file_name: Option<String>,
    pub level: Option<String>,
    pub format: Option<String>,
}

/// `params.yaml`: hyperparameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParamsDocument {
    #[serde(rename = "TrainingArguments")]
    pub training: RawTrainingArguments,
    #[serde(rename = "Preprocessing")]
    pub preprocessing: RawPreprocessing,
    #[serde(rename = "Generation")]
    pub generation: RawGeneration,
    #[serde(rename = "Evaluation")]
    pub evaluation: RawEvaluation,
    #[serde(rename = "Runtime")]
    pub runtime: RawRuntime,
}

/// Raw fine-tuning hyperparameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTrainingArguments {
    pub num_train_epochs: Option<usize>,
    pub warmup_steps: Option<usize>,
    pub per_device_train_batch_size: Option<usize>,
    pub weight_decay: Option<f64>,
    pub learning_rate: Option<f64>,
    pub logging_steps: Option<usize>,
    pub eval_steps: Option<usize>,
    pub eval_batches: Option<usize>,
    pub gradient_accumulation_steps: Option<usize>,
    pub max_steps: Option<usize>,
    pub seed: Option<u64>,
}

/// Raw tokenization parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPreprocessing {
    pub max_source_length: Option<usize>,
    pub max_target_length: Option<usize>,
    pub source_prefix: Option<String>,
    pub text_column: Option<String>,
    pub summary_column: Option<String>,
}

/// Raw decoding parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawGeneration {
    pub num_beams: Option<usize>,
    pub length_penalty: Option<f64>,
    pub max_length: Option<usize>,
}

/// Raw evaluation parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEvaluation {
    pub split: Option<String>,
    pub max_samples: Option<usize>,
    pub model_name: Option<String>,
}

/// Raw runtime parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRuntime {
    pub device: Option<String>,
}
