//! Configuration manager: reads the parameter files once and hands out
//! typed records per stage.

use std::fs;
use std::path::{Path, PathBuf};

use super::entity::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, DeviceChoice,
    GenerationParams, LoggingConfig, ModelEvaluationConfig, ModelTrainerConfig,
    PredictionConfig, PreprocessingParams, TrainingParams,
};
use super::source::{ConfigDocument, ParamsDocument};
use crate::errors::ConfigurationError;

type ConfigResult<T> = Result<T, ConfigurationError>;

const DEFAULT_SPLITS: [&str; 3] = ["train", "validation", "test"];

/// Immutable view over `config.yaml` and `params.yaml`.
///
/// Built once per process and shared by reference with every stage. The
/// accessors never touch the filesystem.
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config: ConfigDocument,
    params: ParamsDocument,
}

impl ConfigurationManager {
    /// Default location of the path/URL document.
    pub const DEFAULT_CONFIG_PATH: &'static str = "config/config.yaml";
    /// Default location of the hyperparameter document.
    pub const DEFAULT_PARAMS_PATH: &'static str = "params.yaml";

    /// Reads both parameter files and creates the artifacts root.
    pub fn from_files(
        config_path: impl AsRef<Path>,
        params_path: impl AsRef<Path>,
    ) -> ConfigResult<Self> {
        let config = read_yaml(config_path.as_ref())?;
        let params = read_yaml(params_path.as_ref())?;
        let manager = Self { config, params };

        let root = manager.artifacts_root();
        fs::create_dir_all(&root).map_err(|source| ConfigurationError::CreateDir {
            path: root.clone(),
            source,
        })?;
        tracing::debug!(
            config = %config_path.as_ref().display(),
            params = %params_path.as_ref().display(),
            artifacts_root = %root.display(),
            "Configuration loaded"
        );
        Ok(manager)
    }

    /// Parses both documents from strings. Nothing is created on disk.
    pub fn from_yaml_str(config: &str, params: &str) -> ConfigResult<Self> {
        Ok(Self {
            config: parse_yaml(config, Path::new("<config>"))?,
            params: parse_yaml(params, Path::new("<params>"))?,
        })
    }

    /// Root directory shared by all stage outputs.
    pub fn artifacts_root(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .artifacts_root
                .clone()
                .unwrap_or_else(|| "artifacts".to_string()),
        )
    }

    /// Record for the ingestion stage.
    pub fn get_data_ingestion_config(&self) -> ConfigResult<DataIngestionConfig> {
        let section = section(self.config.data_ingestion.as_ref(), "data_ingestion")?;

        let sha256 = match section.sha256.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(digest) => {
                if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ConfigurationError::invalid(
                        "data_ingestion.sha256",
                        "expected 64 hexadecimal characters",
                    ));
                }
                Some(digest.to_ascii_lowercase())
            }
        };

        Ok(DataIngestionConfig {
            root_dir: path(&section.root_dir, "data_ingestion.root_dir")?,
            source_url: string(&section.source_url, "data_ingestion.source_url")?,
            local_data_file: path(&section.local_data_file, "data_ingestion.local_data_file")?,
            unzip_dir: path(&section.unzip_dir, "data_ingestion.unzip_dir")?,
            sha256,
        })
    }

    /// Record for the validation stage.
    pub fn get_data_validation_config(&self) -> ConfigResult<DataValidationConfig> {
        let section = section(self.config.data_validation.as_ref(), "data_validation")?;

        let required_files = section
            .required_files
            .clone()
            .ok_or_else(|| ConfigurationError::missing("data_validation.required_files"))?;
        if required_files.is_empty() {
            return Err(ConfigurationError::invalid(
                "data_validation.required_files",
                "must list at least one entry",
            ));
        }

        Ok(DataValidationConfig {
            root_dir: path(&section.root_dir, "data_validation.root_dir")?,
            data_dir: path(&section.data_dir, "data_validation.data_dir")?,
            status_file: path(&section.status_file, "data_validation.status_file")?,
            required_files,
            gate_on_failure: section.gate_on_failure.unwrap_or(true),
        })
    }

    /// Record for the transformation stage.
    pub fn get_data_transformation_config(&self) -> ConfigResult<DataTransformationConfig> {
        let section = section(
            self.config.data_transformation.as_ref(),
            "data_transformation",
        )?;
        let root_dir = path(&section.root_dir, "data_transformation.root_dir")?;
        let output_dir = section
            .output_dir
            .as_ref()
            .map_or_else(|| root_dir.join("samsum_dataset"), PathBuf::from);

        let splits = section
            .splits
            .clone()
            .unwrap_or_else(|| DEFAULT_SPLITS.iter().map(ToString::to_string).collect());
        if splits.is_empty() {
            return Err(ConfigurationError::invalid(
                "data_transformation.splits",
                "must list at least one split",
            ));
        }

        Ok(DataTransformationConfig {
            data_path: path(&section.data_path, "data_transformation.data_path")?,
            tokenizer_name: string(&section.tokenizer_name, "data_transformation.tokenizer_name")?,
            root_dir,
            output_dir,
            splits,
            preprocessing: self.preprocessing()?,
        })
    }

    /// Record for the trainer stage.
    pub fn get_model_trainer_config(&self) -> ConfigResult<ModelTrainerConfig> {
        let section = section(self.config.model_trainer.as_ref(), "model_trainer")?;
        let root_dir = path(&section.root_dir, "model_trainer.root_dir")?;

        Ok(ModelTrainerConfig {
            data_path: path(&section.data_path, "model_trainer.data_path")?,
            model_ckpt: string(&section.model_ckpt, "model_trainer.model_ckpt")?,
            model_dir: section
                .model_dir
                .as_ref()
                .map_or_else(|| root_dir.join("summarizer-model"), PathBuf::from),
            tokenizer_dir: section
                .tokenizer_dir
                .as_ref()
                .map_or_else(|| root_dir.join("tokenizer"), PathBuf::from),
            root_dir,
            training: self.training()?,
            device: self.device()?,
        })
    }

    /// Record for the evaluation stage.
    pub fn get_model_evaluation_config(&self) -> ConfigResult<ModelEvaluationConfig> {
        let section = section(self.config.model_evaluation.as_ref(), "model_evaluation")?;
        let evaluation = &self.params.evaluation;

        let split = evaluation
            .split
            .clone()
            .unwrap_or_else(|| "test".to_string());
        if let Some(0) = evaluation.max_samples {
            return Err(ConfigurationError::invalid(
                "Evaluation.max_samples",
                "must be greater than 0",
            ));
        }

        Ok(ModelEvaluationConfig {
            root_dir: path(&section.root_dir, "model_evaluation.root_dir")?,
            data_path: path(&section.data_path, "model_evaluation.data_path")?,
            model_path: path(&section.model_path, "model_evaluation.model_path")?,
            tokenizer_path: path(&section.tokenizer_path, "model_evaluation.tokenizer_path")?,
            metric_file_name: path(
                &section.metric_file_name,
                "model_evaluation.metric_file_name",
            )?,
            split,
            max_samples: evaluation.max_samples,
            model_name: evaluation
                .model_name
                .clone()
                .unwrap_or_else(|| "summarizer".to_string()),
            generation: self.generation()?,
            preprocessing: self.preprocessing()?,
            device: self.device()?,
        })
    }

    /// Record for the interactive prediction path.
    ///
    /// Shares the model and tokenizer locations with evaluation.
    pub fn get_prediction_config(&self) -> ConfigResult<PredictionConfig> {
        let section = section(self.config.model_evaluation.as_ref(), "model_evaluation")?;
        Ok(PredictionConfig {
            model_path: path(&section.model_path, "model_evaluation.model_path")?,
            tokenizer_path: path(&section.tokenizer_path, "model_evaluation.tokenizer_path")?,
            generation: self.generation()?,
            preprocessing: self.preprocessing()?,
            device: self.device()?,
        })
    }

    /// Logging record; every field has a default.
    pub fn get_logging_config(&self) -> ConfigResult<LoggingConfig> {
        let defaults = LoggingConfig::default();
        let Some(section) = self.config.logging.as_ref() else {
            return Ok(defaults);
        };

        let dir = match section.dir.as_deref() {
            Some("") => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => defaults.dir,
        };

        Ok(LoggingConfig {
            dir,
            file_name: section.file_name.clone().unwrap_or(defaults.file_name),
            level: section.level.clone().unwrap_or(defaults.level),
            format: section
                .format
                .as_deref()
                .map_or(Ok(defaults.format), str::parse)?,
        })
    }

    fn training(&self) -> ConfigResult<TrainingParams> {
        let raw = &self.params.training;
        let learning_rate = raw.learning_rate.unwrap_or(5e-5);
        if learning_rate <= 0.0 {
            return Err(ConfigurationError::invalid(
                "TrainingArguments.learning_rate",
                "must be greater than 0",
            ));
        }
        let weight_decay = raw.weight_decay.unwrap_or(0.01);
        if weight_decay < 0.0 {
            return Err(ConfigurationError::invalid(
                "TrainingArguments.weight_decay",
                "must be >= 0",
            ));
        }
        if let Some(0) = raw.max_steps {
            return Err(ConfigurationError::invalid(
                "TrainingArguments.max_steps",
                "must be greater than 0",
            ));
        }

        Ok(TrainingParams {
            num_train_epochs: positive(raw.num_train_epochs, 1, "TrainingArguments.num_train_epochs")?,
            warmup_steps: raw.warmup_steps.unwrap_or(500),
            per_device_train_batch_size: positive(
                raw.per_device_train_batch_size,
                1,
                "TrainingArguments.per_device_train_batch_size",
            )?,
            weight_decay,
            learning_rate,
            logging_steps: positive(raw.logging_steps, 10, "TrainingArguments.logging_steps")?,
            eval_steps: positive(raw.eval_steps, 500, "TrainingArguments.eval_steps")?,
            eval_batches: positive(raw.eval_batches, 8, "TrainingArguments.eval_batches")?,
            gradient_accumulation_steps: positive(
                raw.gradient_accumulation_steps,
                16,
                "TrainingArguments.gradient_accumulation_steps",
            )?,
            max_steps: raw.max_steps,
            seed: raw.seed.unwrap_or(42),
        })
    }

    fn preprocessing(&self) -> ConfigResult<PreprocessingParams> {
        let raw = &self.params.preprocessing;
        Ok(PreprocessingParams {
            max_source_length: positive(raw.max_source_length, 1024, "Preprocessing.max_source_length")?,
            max_target_length: positive(raw.max_target_length, 128, "Preprocessing.max_target_length")?,
            source_prefix: raw
                .source_prefix
                .clone()
                .unwrap_or_else(|| "summarize: ".to_string()),
            text_column: raw
                .text_column
                .clone()
                .unwrap_or_else(|| "dialogue".to_string()),
            summary_column: raw
                .summary_column
                .clone()
                .unwrap_or_else(|| "summary".to_string()),
        })
    }

    fn generation(&self) -> ConfigResult<GenerationParams> {
        let raw = &self.params.generation;
        let defaults = GenerationParams::default();
        let max_length = positive(raw.max_length, defaults.max_length, "Generation.max_length")?;
        if max_length < 2 {
            return Err(ConfigurationError::invalid(
                "Generation.max_length",
                "must leave room for at least one generated token",
            ));
        }
        Ok(GenerationParams {
            num_beams: positive(raw.num_beams, defaults.num_beams, "Generation.num_beams")?,
            length_penalty: raw.length_penalty.unwrap_or(defaults.length_penalty),
            max_length,
        })
    }

    fn device(&self) -> ConfigResult<DeviceChoice> {
        self.params
            .runtime
            .device
            .as_deref()
            .map_or(Ok(DeviceChoice::Auto), str::parse)
    }
}

fn read_yaml<T>(path: &Path) -> ConfigResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_yaml(&contents, path)
}

fn parse_yaml<T>(contents: &str, path: &Path) -> ConfigResult<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    // An empty document means "all defaults".
    if contents.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(contents).map_err(|err| ConfigurationError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn section<'a, T>(value: Option<&'a T>, key: &str) -> ConfigResult<&'a T> {
    value.ok_or_else(|| ConfigurationError::missing(key))
}

fn string(value: &Option<String>, key: &str) -> ConfigResult<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigurationError::missing(key)),
    }
}

fn path(value: &Option<String>, key: &str) -> ConfigResult<PathBuf> {
    string(value, key).map(PathBuf::from)
}

fn positive(value: Option<usize>, default: usize, key: &str) -> ConfigResult<usize> {
    match value.unwrap_or(default) {
        0 => Err(ConfigurationError::invalid(key, "must be greater than 0")),
        v => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r"
artifacts_root: artifacts
data_ingestion:
  root_dir: artifacts/data_ingestion
  source_URL: https://example.com/summarizer-data.zip
  local_data_file: artifacts/data_ingestion/data.zip
  unzip_dir: artifacts/data_ingestion
data_validation:
  root_dir: artifacts/data_validation
  data_dir: artifacts/data_ingestion/samsum_dataset
  STATUS_FILE: artifacts/data_validation/status.txt
  ALL_REQUIRED_FILES: [train, test, validation]
data_transformation:
  root_dir: artifacts/data_transformation
  data_path: artifacts/data_ingestion/samsum_dataset
  tokenizer_name: google/flan-t5-small
model_trainer:
  root_dir: artifacts/model_trainer
  data_path: artifacts/data_transformation/samsum_dataset
  model_ckpt: google/flan-t5-small
model_evaluation:
  root_dir: artifacts/model_evaluation
  data_path: artifacts/data_ingestion/samsum_dataset
  model_path: artifacts/model_trainer/summarizer-model
  tokenizer_path: artifacts/model_trainer/tokenizer
  metric_file_name: artifacts/model_evaluation/metrics.csv
";

    const PARAMS: &str = r"
TrainingArguments:
  num_train_epochs: 2
  gradient_accumulation_steps: 4
Generation:
  num_beams: 4
";

    fn manager() -> ConfigurationManager {
        ConfigurationManager::from_yaml_str(CONFIG, PARAMS).unwrap()
    }

    #[test]
    fn test_ingestion_config_accepts_uppercase_key_aliases() {
        let config = manager().get_data_ingestion_config().unwrap();
        assert_eq!(config.source_url, "https://example.com/summarizer-data.zip");
        assert_eq!(config.local_data_file, PathBuf::from("artifacts/data_ingestion/data.zip"));
        assert_eq!(config.sha256, None);
    }

    #[test]
    fn test_validation_config_defaults_gate_on() {
        let config = manager().get_data_validation_config().unwrap();
        assert_eq!(config.required_files, vec!["train", "test", "validation"]);
        assert!(config.gate_on_failure);
    }

    #[test]
    fn test_derived_output_paths() {
        let manager = manager();
        let transformation = manager.get_data_transformation_config().unwrap();
        assert_eq!(
            transformation.output_dir,
            PathBuf::from("artifacts/data_transformation/samsum_dataset")
        );
        assert_eq!(transformation.splits, vec!["train", "validation", "test"]);

        let trainer = manager.get_model_trainer_config().unwrap();
        assert_eq!(trainer.model_dir, PathBuf::from("artifacts/model_trainer/summarizer-model"));
        assert_eq!(trainer.tokenizer_dir, PathBuf::from("artifacts/model_trainer/tokenizer"));
    }

    #[test]
    fn test_params_override_defaults() {
        let manager = manager();
        let trainer = manager.get_model_trainer_config().unwrap();
        assert_eq!(trainer.training.num_train_epochs, 2);
        assert_eq!(trainer.training.gradient_accumulation_steps, 4);
        assert_eq!(trainer.training.warmup_steps, 500);
        assert_eq!(trainer.training.seed, 42);

        let evaluation = manager.get_model_evaluation_config().unwrap();
        assert_eq!(evaluation.generation.num_beams, 4);
        assert_eq!(evaluation.generation.max_length, 128);
        assert_eq!(evaluation.split, "test");
        assert_eq!(evaluation.preprocessing.max_source_length, 1024);
    }

    #[test]
    fn test_accessors_are_pure() {
        let manager = manager();
        assert_eq!(
            manager.get_data_ingestion_config().unwrap(),
            manager.get_data_ingestion_config().unwrap()
        );
        assert_eq!(
            manager.get_model_evaluation_config().unwrap(),
            manager.get_model_evaluation_config().unwrap()
        );
    }

    #[test]
    fn test_missing_key_is_named() {
        let config = CONFIG.replace("  source_URL: https://example.com/summarizer-data.zip\n", "");
        let manager = ConfigurationManager::from_yaml_str(&config, PARAMS).unwrap();
        let err = manager.get_data_ingestion_config().unwrap_err();
        assert!(matches!(err, ConfigurationError::Missing { ref key } if key == "data_ingestion.source_url"));
    }

    #[test]
    fn test_missing_section_is_named() {
        let manager = ConfigurationManager::from_yaml_str("artifacts_root: out\n", "").unwrap();
        let err = manager.get_model_trainer_config().unwrap_err();
        assert!(matches!(err, ConfigurationError::Missing { ref key } if key == "model_trainer"));
        assert_eq!(manager.artifacts_root(), PathBuf::from("out"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let params = "TrainingArguments:\n  per_device_train_batch_size: 0\n";
        let manager = ConfigurationManager::from_yaml_str(CONFIG, params).unwrap();
        let err = manager.get_model_trainer_config().unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid { .. }));
    }

    #[test]
    fn test_bad_sha256_rejected() {
        let config = CONFIG.replace(
            "  unzip_dir: artifacts/data_ingestion\n",
            "  unzip_dir: artifacts/data_ingestion\n  sha256: abc\n",
        );
        let manager = ConfigurationManager::from_yaml_str(&config, PARAMS).unwrap();
        assert!(manager.get_data_ingestion_config().is_err());
    }

    #[test]
    fn test_logging_defaults_without_section() {
        let logging = manager().get_logging_config().unwrap();
        assert_eq!(logging, LoggingConfig::default());
    }

    #[test]
    fn test_unparsable_yaml_reports_parse_error() {
        let err = ConfigurationManager::from_yaml_str("data_ingestion: [unclosed", "").unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn test_from_files_reads_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let params_path = dir.path().join("params.yaml");
        let artifacts = dir.path().join("out/artifacts");
        let config = CONFIG.replace(
            "artifacts_root: artifacts\n",
            &format!("artifacts_root: {}\n", serde_json::to_string(&artifacts.display().to_string()).unwrap()),
        );
        fs::write(&config_path, config).unwrap();
        fs::write(&params_path, PARAMS).unwrap();

        let manager = ConfigurationManager::from_files(&config_path, &params_path).unwrap();
        assert_eq!(manager.get_prediction_config().unwrap().generation.num_beams, 4);
        assert_eq!(manager.artifacts_root(), artifacts);
        assert!(artifacts.is_dir());

        let err = ConfigurationManager::from_files(dir.path().join("absent.yaml"), &params_path)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::Read { .. }));
    }

    #[test]
    fn test_from_files_reports_uncreatable_artifacts_root() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let config_path = dir.path().join("config.yaml");
        let params_path = dir.path().join("params.yaml");
        let root = serde_json::to_string(&blocker.join("artifacts").display().to_string()).unwrap();
        fs::write(&config_path, format!("artifacts_root: {root}\n")).unwrap();
        fs::write(&params_path, "").unwrap();

        let err = ConfigurationManager::from_files(&config_path, &params_path).unwrap_err();
        assert!(matches!(err, ConfigurationError::CreateDir { .. }));
    }
}
