//! Error types for the summarization pipeline.
//!
//! Every stage reports failures through [`SummarizerError`]. The variants
//! separate configuration problems, filesystem and network failures, corrupt
//! inputs and model errors so callers can tell them apart without string
//! matching.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for pipeline and prediction operations.
#[derive(Debug, Error)]
pub enum SummarizerError {
    /// A configuration parameter is missing or invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A filesystem operation failed.
    #[error("IO error at '{}': {source}", path.display())]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The archive fetch failed.
    #[error("Download of '{url}' failed: {message}")]
    Download {
        /// The source URL.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// An input file is corrupt or malformed.
    #[error("{0}")]
    Format(#[from] FormatError),

    /// A downloaded file does not match its expected digest.
    #[error("Integrity check failed for '{}': expected sha256 {expected}, got {actual}", path.display())]
    Integrity {
        /// The checked file.
        path: PathBuf,
        /// The configured digest.
        expected: String,
        /// The computed digest.
        actual: String,
    },

    /// Dataset validation failed and the pipeline gate is enabled.
    #[error("Data validation failed; missing: {}", missing.join(", "))]
    ValidationFailure {
        /// The expected entries that were absent.
        missing: Vec<String>,
    },

    /// A tensor or model operation failed.
    #[error("Model error: {0}")]
    Model(String),

    /// Tokenizer loading, encoding or decoding failed.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// A pretrained checkpoint could not be resolved.
    #[error("Checkpoint '{name}' unavailable: {message}")]
    Checkpoint {
        /// Hub id or local path.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A pipeline stage failed.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// The failing stage name.
        stage: String,
        /// The stage's error.
        #[source]
        source: Box<SummarizerError>,
    },

    /// The pipeline definition is invalid.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SummarizerError {
    /// Creates an IO error bound to a path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a download error.
    pub fn download(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Download {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a tokenizer error from any displayable cause.
    pub fn tokenizer(message: impl std::fmt::Display) -> Self {
        Self::Tokenizer(message.to_string())
    }

    /// Creates a checkpoint error.
    pub fn checkpoint(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Checkpoint {
            name: name.into(),
            message: message.to_string(),
        }
    }

    /// Wraps an error with the name of the stage that raised it.
    #[must_use]
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// Returns a short machine-readable name for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Io { .. } => "io",
            Self::Download { .. } => "download",
            Self::Format(_) => "format",
            Self::Integrity { .. } => "integrity",
            Self::ValidationFailure { .. } => "validation",
            Self::Model(_) => "model",
            Self::Tokenizer(_) => "tokenizer",
            Self::Checkpoint { .. } => "checkpoint",
            Self::Stage { source, .. } => source.kind(),
            Self::Pipeline(_) => "pipeline",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<candle_core::Error> for SummarizerError {
    fn from(err: candle_core::Error) -> Self {
        Self::Model(err.to_string())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required parameter is absent.
    #[error("Missing required configuration parameter '{key}'")]
    Missing {
        /// Dotted parameter path.
        key: String,
    },

    /// A parameter is present but unusable.
    #[error("Invalid configuration parameter '{key}': {reason}")]
    Invalid {
        /// Dotted parameter path.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The parameter file could not be read.
    #[error("Cannot read configuration file '{}': {source}", path.display())]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The artifacts root could not be created.
    #[error("Cannot create artifacts root '{}': {source}", path.display())]
    CreateDir {
        /// The directory path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The parameter file is not valid YAML for the expected layout.
    #[error("Cannot parse configuration file '{}': {message}", path.display())]
    Parse {
        /// The file path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

impl ConfigurationError {
    /// Creates a missing-parameter error.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    /// Creates an invalid-parameter error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised for corrupt archives and malformed records.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The archive could not be opened or extracted.
    #[error("Malformed archive '{}': {message}", path.display())]
    Archive {
        /// The archive path.
        path: PathBuf,
        /// Reader message.
        message: String,
    },

    /// A record in a dataset file is malformed.
    #[error("Malformed record in '{}' (row {row}): {message}", path.display())]
    Record {
        /// The dataset file.
        path: PathBuf,
        /// Zero-based row or line number.
        row: usize,
        /// What is wrong with it.
        message: String,
    },

    /// A columnar dataset file could not be decoded.
    #[error("Cannot decode dataset file '{}': {message}", path.display())]
    Dataset {
        /// The dataset file.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// No data files were found for a split.
    #[error("No data files for split '{split}' under '{}'", dir.display())]
    MissingSplit {
        /// The dataset directory.
        dir: PathBuf,
        /// The split name.
        split: String,
    },
}

impl FormatError {
    /// Creates a record error.
    pub fn record(path: impl AsRef<Path>, row: usize, message: impl std::fmt::Display) -> Self {
        Self::Record {
            path: path.as_ref().to_path_buf(),
            row,
            message: message.to_string(),
        }
    }

    /// Creates a dataset decoding error.
    pub fn dataset(path: impl AsRef<Path>, message: impl std::fmt::Display) -> Self {
        Self::Dataset {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = SummarizerError> = std::result::Result<T, E>;
