//! The five pipeline stages.
//!
//! Each stage pulls its record from the shared configuration, resolves any
//! remote inputs asynchronously and runs the CPU-bound component work on the
//! blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::components::{
    ArchiveFetcher, DataIngestion, DataTransformation, DataValidation, HttpFetcher,
    ModelEvaluation, ModelTrainer,
};
use crate::core::{StageKind, StageOutput};
use crate::errors::{Result, SummarizerError};
use crate::model::{resolve_checkpoint, resolve_tokenizer};
use crate::stages::{Stage, StageContext};

/// Returns the default implementation of a stage.
#[must_use]
pub fn stage_for(kind: StageKind) -> Arc<dyn Stage> {
    match kind {
        StageKind::DataIngestion => Arc::new(DataIngestionStage::default()),
        StageKind::DataValidation => Arc::new(DataValidationStage),
        StageKind::DataTransformation => Arc::new(DataTransformationStage),
        StageKind::ModelTrainer => Arc::new(ModelTrainerStage),
        StageKind::ModelEvaluation => Arc::new(ModelEvaluationStage),
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SummarizerError::Pipeline(format!("stage task did not finish: {e}")))?
}

/// Downloads and extracts the dataset archive.
pub struct DataIngestionStage {
    fetcher: Arc<dyn ArchiveFetcher>,
}

impl DataIngestionStage {
    /// Creates the stage with a custom fetcher.
    #[must_use]
    pub fn with_fetcher(fetcher: Arc<dyn ArchiveFetcher>) -> Self {
        Self { fetcher }
    }
}

impl Default for DataIngestionStage {
    fn default() -> Self {
        Self::with_fetcher(Arc::new(HttpFetcher::new()))
    }
}

impl std::fmt::Debug for DataIngestionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataIngestionStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for DataIngestionStage {
    fn kind(&self) -> StageKind {
        StageKind::DataIngestion
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput> {
        let config = ctx.config().get_data_ingestion_config()?;
        let ingestion = Arc::new(DataIngestion::with_fetcher(config, Arc::clone(&self.fetcher)));

        let archive = ingestion.download().await?;
        let worker = Arc::clone(&ingestion);
        let corpus = blocking(move || worker.extract()).await?;

        Ok(StageOutput::new().with_artifact(archive).with_artifact(corpus))
    }
}

/// Checks the extracted dataset and applies the validation gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataValidationStage;

#[async_trait]
impl Stage for DataValidationStage {
    fn kind(&self) -> StageKind {
        StageKind::DataValidation
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput> {
        let validation = DataValidation::new(ctx.config().get_data_validation_config()?);
        let status = validation.validate_all_files_exist()?;

        if !status.passed {
            if validation.gate_on_failure() {
                return Err(SummarizerError::ValidationFailure {
                    missing: status.missing,
                });
            }
            tracing::warn!(missing = ?status.missing, "Continuing despite failed validation");
        }

        Ok(StageOutput::new()
            .with_artifact(validation.status_artifact(&status))
            .with_data("passed", json!(status.passed))
            .with_data("missing", json!(status.missing)))
    }
}

/// Tokenizes the raw dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataTransformationStage;

#[async_trait]
impl Stage for DataTransformationStage {
    fn kind(&self) -> StageKind {
        StageKind::DataTransformation
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput> {
        let transformation = DataTransformation::new(ctx.config().get_data_transformation_config()?);
        let tokenizer = resolve_tokenizer(&transformation.config().tokenizer_name).await?;

        let artifact = blocking(move || transformation.convert(&tokenizer)).await?;
        Ok(StageOutput::new().with_artifact(artifact))
    }
}

/// Fine-tunes the pretrained checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelTrainerStage;

#[async_trait]
impl Stage for ModelTrainerStage {
    fn kind(&self) -> StageKind {
        StageKind::ModelTrainer
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput> {
        let trainer = ModelTrainer::new(ctx.config().get_model_trainer_config()?);
        let checkpoint = resolve_checkpoint(&trainer.config().model_ckpt).await?;

        let artifact = blocking(move || trainer.train(&checkpoint)).await?;
        let steps = artifact.metadata.get("global_step").cloned();
        Ok(StageOutput::new()
            .with_artifact(artifact)
            .with_data("global_step", steps.unwrap_or_default()))
    }
}

/// Scores the fine-tuned model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelEvaluationStage;

#[async_trait]
impl Stage for ModelEvaluationStage {
    fn kind(&self) -> StageKind {
        StageKind::ModelEvaluation
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput> {
        let evaluation = ModelEvaluation::new(ctx.config().get_model_evaluation_config()?);

        let (evaluation, report) = blocking(move || {
            let report = evaluation.evaluate()?;
            Ok((evaluation, report))
        })
        .await?;
        Ok(StageOutput::new()
            .with_artifact(evaluation.report_artifact(&report))
            .with_data("rouge", json!(report)))
    }
}
