//! Per-stage outcome records kept by a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{StageArtifact, StageKind, StageOutput, StageStatus};

/// Outcome of one stage in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage.
    pub stage: StageKind,
    /// Final status.
    pub status: StageStatus,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Artifacts written by the stage.
    #[serde(default)]
    pub artifacts: Vec<StageArtifact>,
    /// Summary values reported by the stage.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    /// Creates a completed stage result from the stage's output.
    #[must_use]
    pub fn completed(stage: StageKind, started_at: DateTime<Utc>, output: StageOutput) -> Self {
        Self {
            stage,
            status: StageStatus::Ok,
            started_at,
            ended_at: Utc::now(),
            artifacts: output.artifacts,
            data: output.data,
            error: None,
        }
    }

    /// Creates a failed stage result.
    #[must_use]
    pub fn failed(stage: StageKind, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Fail,
            started_at,
            ended_at: Utc::now(),
            artifacts: Vec::new(),
            data: HashMap::new(),
            error: Some(error.into()),
        }
    }

    /// Gets a value reported by the stage.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
