//! Pipeline lifecycle events and the sinks that receive them.
//!
//! The orchestrator emits one [`PipelineEvent`] per state transition. Sinks
//! decide what to do with them: [`LoggingEventSink`] forwards them to
//! `tracing`, [`CollectingEventSink`] keeps them in memory for assertions.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::StageKind;

/// Lifecycle transition being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// The run began.
    #[serde(rename = "pipeline.started")]
    PipelineStarted,
    /// A stage began.
    #[serde(rename = "stage.started")]
    StageStarted,
    /// A stage returned successfully.
    #[serde(rename = "stage.completed")]
    StageCompleted,
    /// A stage returned an error.
    #[serde(rename = "stage.failed")]
    StageFailed,
    /// Every stage succeeded.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
    /// The run stopped on a failed stage.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed,
}

impl EventType {
    /// Dotted event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::StageFailed => "stage.failed",
            Self::PipelineCompleted => "pipeline.completed",
            Self::PipelineFailed => "pipeline.failed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The transition.
    pub event_type: EventType,
    /// Run the event belongs to.
    pub run_id: Uuid,
    /// Stage concerned, for stage events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageKind>,
    /// Event-specific details (durations, errors, artifact paths).
    #[serde(default)]
    pub data: serde_json::Value,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    /// Creates a run-level event.
    #[must_use]
    pub fn pipeline(event_type: EventType, run_id: Uuid) -> Self {
        Self {
            event_type,
            run_id,
            stage: None,
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Creates a stage-level event.
    #[must_use]
    pub fn stage(event_type: EventType, run_id: Uuid, stage: StageKind) -> Self {
        Self {
            stage: Some(stage),
            ..Self::pipeline(event_type, run_id)
        }
    }

    /// Attaches event details.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}
