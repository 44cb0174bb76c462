//! Files and directories written by stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The downloaded source archive.
    Archive,
    /// The extracted raw dataset.
    Corpus,
    /// The validation status file.
    ValidationStatus,
    /// The tokenized dataset.
    EncodedDataset,
    /// Fine-tuned model weights and config.
    Model,
    /// Saved tokenizer.
    Tokenizer,
    /// Evaluation metrics report.
    Report,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Archive => "archive",
            Self::Corpus => "corpus",
            Self::ValidationStatus => "validation_status",
            Self::EncodedDataset => "encoded_dataset",
            Self::Model => "model",
            Self::Tokenizer => "tokenizer",
            Self::Report => "report",
        };
        f.write_str(label)
    }
}

/// An artifact produced by a stage.
///
/// Owned by the stage that writes it; downstream stages only read the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageArtifact {
    /// What the artifact holds.
    pub kind: ArtifactKind,

    /// Location on disk.
    pub path: PathBuf,

    /// Additional metadata (sizes, counts, digests).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// When the artifact was recorded.
    pub created_at: DateTime<Utc>,
}

impl StageArtifact {
    /// Creates a new stage artifact.
    #[must_use]
    pub fn new(kind: ArtifactKind, path: impl AsRef<Path>) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds metadata to the artifact.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_with_metadata() {
        let artifact = StageArtifact::new(ArtifactKind::Archive, "artifacts/data.zip")
            .with_metadata("bytes", serde_json::json!(1024))
            .with_metadata("downloaded", serde_json::json!(false));

        assert_eq!(artifact.kind, ArtifactKind::Archive);
        assert_eq!(artifact.path, PathBuf::from("artifacts/data.zip"));
        assert_eq!(artifact.metadata.len(), 2);
        assert_eq!(artifact.metadata.get("bytes"), Some(&serde_json::json!(1024)));
    }

    #[test]
    fn test_artifact_serialization() {
        let artifact = StageArtifact::new(ArtifactKind::ValidationStatus, "status.txt");
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "validation_status");

        let back: StageArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, artifact);
    }
}
