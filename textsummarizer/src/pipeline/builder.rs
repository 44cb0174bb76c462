//! Pipeline builder with validation.

use std::collections::HashSet;
use std::sync::Arc;

use super::stages::stage_for;
use super::Pipeline;
use crate::config::ConfigurationManager;
use crate::core::StageKind;
use crate::errors::{Result, SummarizerError};
use crate::events::{EventSink, LoggingEventSink};
use crate::stages::Stage;

/// Builder for creating validated pipelines.
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            sink: None,
        }
    }

    /// A builder holding all five stages in order.
    #[must_use]
    pub fn standard() -> Self {
        StageKind::ALL
            .into_iter()
            .fold(Self::new("textsummarizer"), |builder, kind| {
                builder.stage(stage_for(kind))
            })
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Routes lifecycle events to `sink` instead of the logging sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the pipeline.
    ///
    /// Fails when there are no stages, when a stage appears twice, or when
    /// stages are not in pipeline order.
    pub fn build(self, config: Arc<ConfigurationManager>) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(SummarizerError::Pipeline(format!(
                "pipeline '{}' has no stages",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        let mut previous: Option<StageKind> = None;
        for stage in &self.stages {
            let kind = stage.kind();
            if !seen.insert(kind) {
                return Err(SummarizerError::Pipeline(format!(
                    "stage '{}' is added more than once",
                    kind.slug()
                )));
            }
            if let Some(prev) = previous.filter(|prev| *prev > kind) {
                return Err(SummarizerError::Pipeline(format!(
                    "stage '{}' cannot run after '{}'",
                    kind.slug(),
                    prev.slug()
                )));
            }
            previous = Some(kind);
        }

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(LoggingEventSink::default()));
        Ok(Pipeline::new(self.name, self.stages, sink, config))
    }
}
