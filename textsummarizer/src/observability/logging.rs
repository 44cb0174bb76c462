//! Process-wide tracing subscriber: stdout plus an append-only log file.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::{ConfigurationError, Result, SummarizerError};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Filter from `RUST_LOG`, falling back to `default_level`.
pub fn env_filter(default_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level)
        .map_err(|e| ConfigurationError::invalid("logging.level", e.to_string()).into())
}

/// Installs the global subscriber.
///
/// Returns the log file path when file output is enabled. Fails if a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<PathBuf>> {
    let stdout: BoxedLayer = match config.format {
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_filter(env_filter(&config.level)?)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_filter(env_filter(&config.level)?)
            .boxed(),
    };
    let mut layers = vec![stdout];

    let log_file = match &config.dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| SummarizerError::io(dir, e))?;
            let path = dir.join(&config.file_name);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| SummarizerError::io(&path, e))?;
            layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(env_filter(&config.level)?)
                    .boxed(),
            );
            Some(path)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| SummarizerError::Pipeline(format!("logging already initialized: {e}")))?;
    Ok(log_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_configuration_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = env_filter("textsummarizer=loud").unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(env_filter("debug").is_ok());
    }

    #[test]
    fn test_init_creates_log_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            dir: Some(dir.path().join("logs")),
            ..LoggingConfig::default()
        };

        let path = init_logging(&config).unwrap().unwrap();
        assert_eq!(path, dir.path().join("logs/running_logs.log"));
        assert!(path.is_file());

        assert!(init_logging(&config).is_err());
    }
}
