//! The value a stage returns on success.

use super::{ArtifactKind, StageArtifact};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The output of a successful stage execution.
///
/// Failures travel as `Err(SummarizerError)`; an output only exists for
/// stages that completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Files and directories the stage wrote.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<StageArtifact>,

    /// Summary values (counts, scores, flags).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, serde_json::Value>,
}

impl StageOutput {
    /// Creates an empty output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an output carrying one artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: StageArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Adds a data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Returns the first artifact of the given kind.
    #[must_use]
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&StageArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}
