//! Pipeline building and execution.
//!
//! This module provides:
//! - The concrete stages wrapping each component
//! - A builder that validates stage order
//! - The sequential runner and its run record

mod builder;
mod runner;
mod stages;

pub use builder::PipelineBuilder;
pub use runner::{Pipeline, PipelineRun};
pub use stages::{
    stage_for, DataIngestionStage, DataTransformationStage, DataValidationStage,
    ModelEvaluationStage, ModelTrainerStage,
};
