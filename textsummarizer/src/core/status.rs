//! Stage identities, stage statuses and pipeline run states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SummarizerError;

/// One of the five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Fetch and unpack the source archive.
    DataIngestion,
    /// Check the unpacked dataset.
    DataValidation,
    /// Tokenize and persist the dataset.
    DataTransformation,
    /// Fine-tune the pretrained model.
    ModelTrainer,
    /// Score the fine-tuned model.
    ModelEvaluation,
}

impl StageKind {
    /// Every stage in execution order.
    pub const ALL: [Self; 5] = [
        Self::DataIngestion,
        Self::DataValidation,
        Self::DataTransformation,
        Self::ModelTrainer,
        Self::ModelEvaluation,
    ];

    /// Short identifier used on the command line and in events.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Self::DataIngestion => "data_ingestion",
            Self::DataValidation => "data_validation",
            Self::DataTransformation => "data_transformation",
            Self::ModelTrainer => "model_trainer",
            Self::ModelEvaluation => "model_evaluation",
        }
    }

    /// The run state while this stage executes.
    #[must_use]
    pub fn running_state(&self) -> PipelineState {
        match self {
            Self::DataIngestion => PipelineState::Ingesting,
            Self::DataValidation => PipelineState::Validating,
            Self::DataTransformation => PipelineState::Transforming,
            Self::ModelTrainer => PipelineState::Training,
            Self::ModelEvaluation => PipelineState::Evaluating,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataIngestion => write!(f, "Data Ingestion stage"),
            Self::DataValidation => write!(f, "Data Validation stage"),
            Self::DataTransformation => write!(f, "Data Transformation stage"),
            Self::ModelTrainer => write!(f, "Model Trainer stage"),
            Self::ModelEvaluation => write!(f, "Model Evaluation stage"),
        }
    }
}

impl FromStr for StageKind {
    type Err = SummarizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(StageKind::slug).collect();
                SummarizerError::Pipeline(format!(
                    "unknown stage '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

/// The execution status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Ok,
    /// Raised an error.
    Fail,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ok | Self::Fail)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, no stage started.
    #[default]
    Pending,
    /// Running the ingestion stage.
    Ingesting,
    /// Running the validation stage.
    Validating,
    /// Running the transformation stage.
    Transforming,
    /// Running the trainer stage.
    Training,
    /// Running the evaluation stage.
    Evaluating,
    /// Every stage succeeded.
    Completed,
    /// A stage failed; later stages were not run.
    Failed,
}

impl PipelineState {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Ingesting => "ingesting",
            Self::Validating => "validating",
            Self::Transforming => "transforming",
            Self::Training => "training",
            Self::Evaluating => "evaluating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
