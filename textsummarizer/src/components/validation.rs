//! Checks that the extracted dataset holds every expected split.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::DataValidationConfig;
use crate::core::{ArtifactKind, StageArtifact};
use crate::errors::{Result, SummarizerError};

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    /// True when nothing is missing.
    pub passed: bool,
    /// Expected entries found.
    pub present: Vec<String>,
    /// Expected entries absent.
    pub missing: Vec<String>,
}

/// Validation worker.
#[derive(Debug, Clone)]
pub struct DataValidation {
    config: DataValidationConfig,
}

impl DataValidation {
    /// Creates a worker.
    #[must_use]
    pub fn new(config: DataValidationConfig) -> Self {
        Self { config }
    }

    /// Checks every required entry against the dataset directory and writes
    /// `Validation status: True` or `Validation status: False` to the
    /// status file.
    ///
    /// An entry counts as present when a file or directory with that name,
    /// or with that name plus an extension, exists. Absent entries and an
    /// absent dataset directory produce a failed status; only filesystem
    /// errors while listing are returned.
    pub fn validate_all_files_exist(&self) -> Result<ValidationStatus> {
        let entries = list_entries(&self.config.data_dir)?;

        let (present, missing): (Vec<String>, Vec<String>) = self
            .config
            .required_files
            .iter()
            .cloned()
            .partition(|name| entries.contains(name));
        let status = ValidationStatus {
            passed: missing.is_empty(),
            present,
            missing,
        };

        let status_dir = self.config.status_file.parent().filter(|p| !p.as_os_str().is_empty());
        for dir in [Some(self.config.root_dir.as_path()), status_dir].into_iter().flatten() {
            fs::create_dir_all(dir).map_err(|e| SummarizerError::io(dir, e))?;
        }
        let flag = if status.passed { "True" } else { "False" };
        fs::write(&self.config.status_file, format!("Validation status: {flag}"))
        .map_err(|e| SummarizerError::io(&self.config.status_file, e))?;

        if status.passed {
            tracing::info!(data_dir = %self.config.data_dir.display(), "All required files present");
        } else {
            tracing::warn!(
                data_dir = %self.config.data_dir.display(),
                missing = ?status.missing,
                "Required files missing"
            );
        }
        Ok(status)
    }

    /// Whether a failed status should stop the pipeline.
    #[must_use]
    pub fn gate_on_failure(&self) -> bool {
        self.config.gate_on_failure
    }

    /// Artifact describing the written status file.
    #[must_use]
    pub fn status_artifact(&self, status: &ValidationStatus) -> StageArtifact {
        StageArtifact::new(ArtifactKind::ValidationStatus, &self.config.status_file)
            .with_metadata("passed", serde_json::json!(status.passed))
            .with_metadata("missing", serde_json::json!(status.missing))
    }
}

/// Entry names in `dir`, each also registered under its stem.
fn list_entries(dir: &Path) -> Result<BTreeSet<String>> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(SummarizerError::io(dir, e)),
    };

    let mut names = BTreeSet::new();
    for entry in read {
        let path = entry.map_err(|e| SummarizerError::io(dir, e))?.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.insert(name.to_string());
        }
        if let Some(stem) = path.file_stem().and_then(|n| n.to_str()) {
            names.insert(stem.to_string());
        }
    }
    Ok(names)
}
