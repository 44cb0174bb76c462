//! # textsummarizer
//!
//! A staged pipeline that fine-tunes a pretrained T5 model on the SAMSum
//! dialogue corpus and serves it for interactive summarization.
//!
//! The pipeline runs five stages in a fixed order:
//!
//! - **Data ingestion**: download the dataset archive and unpack it
//! - **Data validation**: check that every expected split is present
//! - **Data transformation**: tokenize dialogues and reference summaries
//! - **Model training**: fine-tune the pretrained checkpoint
//! - **Model evaluation**: score beam-search summaries with ROUGE
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use textsummarizer::prelude::*;
//!
//! let config = Arc::new(ConfigurationManager::from_files(
//!     "config/config.yaml",
//!     "params.yaml",
//! )?);
//! let run = PipelineBuilder::standard().build(config)?.run().await?;
//! assert_eq!(run.state, PipelineState::Completed);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod components;
pub mod config;
pub mod core;
pub mod data;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod predict;
pub mod stages;
pub mod web;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigurationManager, DeviceChoice, GenerationParams};
    pub use crate::core::{
        ArtifactKind, PipelineState, StageArtifact, StageKind, StageOutput, StageStatus,
    };
    pub use crate::errors::{ConfigurationError, FormatError, Result, SummarizerError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::metrics::{RougeReport, RougeScorer};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineRun};
    pub use crate::predict::{PredictionPipeline, Summarize};
    pub use crate::stages::{Stage, StageContext, StageResult};
    pub use std::sync::Arc;
}
