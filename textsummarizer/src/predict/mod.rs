//! Interactive prediction: one summary per request from a lazily loaded,
//! process-wide model handle.

use parking_lot::Mutex;

use crate::config::{ConfigurationManager, PredictionConfig};
use crate::errors::{Result, SummarizerError};
use crate::model::Seq2SeqSummarizer;

/// Message shown instead of a summary when the input is blank.
pub const EMPTY_INPUT_WARNING: &str = "Please enter some text to summarize.";

/// Returns true when `text` has nothing to summarize.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Turns dialogue text into a summary.
#[cfg_attr(test, mockall::automock)]
pub trait Summarize: Send + Sync {
    /// Summarizes `text`.
    fn predict(&self, text: &str) -> Result<String>;
}

/// Summarizer that loads the fine-tuned model on first use and keeps it
/// until [`unload`](Self::unload).
///
/// Calls are serialized on the model lock.
pub struct PredictionPipeline {
    config: PredictionConfig,
    model: Mutex<Option<Seq2SeqSummarizer>>,
}

impl std::fmt::Debug for PredictionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionPipeline")
            .field("model_path", &self.config.model_path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl PredictionPipeline {
    /// Creates an unloaded pipeline.
    #[must_use]
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            model: Mutex::new(None),
        }
    }

    /// Creates an unloaded pipeline from the shared configuration.
    pub fn from_manager(manager: &ConfigurationManager) -> Result<Self> {
        Ok(Self::new(manager.get_prediction_config()?))
    }

    /// Whether the model is currently in memory.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.lock().is_some()
    }

    /// Drops the model. Returns whether one was loaded.
    pub fn unload(&self) -> bool {
        let released = self.model.lock().take().is_some();
        if released {
            tracing::info!(model = %self.config.model_path.display(), "Unloaded summarization model");
        }
        released
    }

    fn load(&self) -> Result<Seq2SeqSummarizer> {
        Seq2SeqSummarizer::load(
            &self.config.model_path,
            &self.config.tokenizer_path,
            &self.config.generation,
            &self.config.preprocessing,
            self.config.device,
        )
    }
}

impl Summarize for PredictionPipeline {
    fn predict(&self, text: &str) -> Result<String> {
        let mut guard = self.model.lock();
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        let Some(summarizer) = guard.as_mut() else {
            return Err(SummarizerError::Model("summarization model not loaded".to_string()));
        };

        let summary = summarizer.summarize(text)?;
        tracing::info!(
            input_chars = text.len(),
            summary_chars = summary.len(),
            "Generated summary"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceChoice, GenerationParams, PreprocessingParams};
    use crate::testing::write_tiny_checkpoint;
    use std::path::{Path, PathBuf};

    const DIALOGUE: &str = "Amanda: I baked cookies. Jerry: Can I have some?";

    fn config(model_dir: &Path, generation: GenerationParams) -> PredictionConfig {
        PredictionConfig {
            model_path: model_dir.to_path_buf(),
            tokenizer_path: model_dir.to_path_buf(),
            generation,
            preprocessing: PreprocessingParams {
                max_source_length: 1024,
                max_target_length: 128,
                source_prefix: "summarize: ".to_string(),
                text_column: "dialogue".to_string(),
                summary_column: "summary".to_string(),
            },
            device: DeviceChoice::Cpu,
        }
    }

    fn small_generation() -> GenerationParams {
        GenerationParams {
            num_beams: 2,
            length_penalty: 0.8,
            max_length: 5,
        }
    }

    #[test]
    fn test_blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank("  \n\t"));
        assert!(!is_blank("Tom: hi"));
    }

    #[test]
    fn test_model_loads_lazily_and_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = write_tiny_checkpoint(&dir.path().join("model"));
        let pipeline = PredictionPipeline::new(config(&model_dir, small_generation()));
        assert!(!pipeline.is_loaded());

        let first = pipeline.predict(DIALOGUE).unwrap();
        assert!(pipeline.is_loaded());
        let second = pipeline.predict(DIALOGUE).unwrap();
        assert_eq!(first, second);

        assert!(pipeline.unload());
        assert!(!pipeline.is_loaded());
        assert!(!pipeline.unload());

        // Reloads transparently after teardown.
        assert_eq!(pipeline.predict(DIALOGUE).unwrap(), first);
    }

    #[test]
    fn test_missing_model_fails_and_stays_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            PredictionPipeline::new(config(&dir.path().join("absent"), small_generation()));

        assert!(pipeline.predict(DIALOGUE).is_err());
        assert!(!pipeline.is_loaded());
    }

    #[test]
    #[ignore = "needs a fine-tuned model under artifacts/model_trainer"]
    fn test_trained_model_summarizes_dialogue() {
        let root: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .to_path_buf();
        let manager = ConfigurationManager::from_files(
            root.join(ConfigurationManager::DEFAULT_CONFIG_PATH),
            root.join(ConfigurationManager::DEFAULT_PARAMS_PATH),
        )
        .unwrap();
        let mut config = manager.get_prediction_config().unwrap();
        config.model_path = root.join(&config.model_path);
        config.tokenizer_path = root.join(&config.tokenizer_path);
        assert_eq!(config.generation, GenerationParams::default());

        let summary = PredictionPipeline::new(config).predict(DIALOGUE).unwrap();
        assert!(!summary.trim().is_empty());
        assert!(summary.len() < DIALOGUE.len());
    }
}
