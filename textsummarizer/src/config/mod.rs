//! Static parameters and the typed per-stage records built from them.
//!
//! Two YAML documents feed the pipeline: `config/config.yaml` holds paths
//! and URLs, `params.yaml` holds hyperparameters. [`ConfigurationManager`]
//! reads both once; each `get_*_config` accessor validates its section and
//! returns an immutable record.

mod entity;
mod manager;
mod source;

pub use entity::{
    DataIngestionConfig, DataTransformationConfig, DataValidationConfig, DeviceChoice,
    GenerationParams, LogFormat, LoggingConfig, ModelEvaluationConfig, ModelTrainerConfig,
    PredictionConfig, PreprocessingParams, TrainingParams,
};
pub use manager::ConfigurationManager;
