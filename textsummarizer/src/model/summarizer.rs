//! Dialogue summarization with a fine-tuned model.

use std::path::Path;

use candle_core::Tensor;

use super::beam::BeamSearch;
use super::device::select_device;
use super::hub::{local_weights, CONFIG_FILE, TOKENIZER_FILE};
use super::seq2seq::{load_model_config, load_tensors, ModelStepScorer, Seq2SeqModel};
use super::tokenizer::{load_tokenizer, TruncatingEncoder};
use crate::config::{DeviceChoice, GenerationParams, PreprocessingParams};
use crate::errors::Result;

/// Model, tokenizer and decoding settings bundled for summarization.
#[derive(Debug)]
pub struct Seq2SeqSummarizer {
    model: Seq2SeqModel,
    encoder: TruncatingEncoder,
    search: BeamSearch,
    source_prefix: String,
}

impl Seq2SeqSummarizer {
    /// Loads a saved model directory and tokenizer.
    ///
    /// `tokenizer_path` may point at a `tokenizer.json` or at the directory
    /// holding it.
    pub fn load(
        model_dir: &Path,
        tokenizer_path: &Path,
        generation: &GenerationParams,
        preprocessing: &PreprocessingParams,
        device: DeviceChoice,
    ) -> Result<Self> {
        let device = select_device(device)?;
        let config = load_model_config(&model_dir.join(CONFIG_FILE))?;

        let weights = local_weights(&model_dir.display().to_string(), model_dir)?;
        let tensors = load_tensors(&weights, &device)?;
        let model = Seq2SeqModel::from_tensors(tensors, config, &device)?;

        let tokenizer_file = if tokenizer_path.is_dir() {
            tokenizer_path.join(TOKENIZER_FILE)
        } else {
            tokenizer_path.to_path_buf()
        };
        let tokenizer = load_tokenizer(&tokenizer_file)?;

        tracing::info!(
            model = %model_dir.display(),
            tokenizer = %tokenizer_file.display(),
            device = ?model.device(),
            "Loaded summarization model"
        );
        Self::new(model, &tokenizer, generation, preprocessing)
    }

    /// Bundles an already loaded model and tokenizer.
    pub fn new(
        model: Seq2SeqModel,
        tokenizer: &tokenizers::Tokenizer,
        generation: &GenerationParams,
        preprocessing: &PreprocessingParams,
    ) -> Result<Self> {
        let encoder = TruncatingEncoder::new(tokenizer, preprocessing.max_source_length)?;
        let search = BeamSearch::new(
            generation,
            model.decoder_start_token_id(),
            model.eos_token_id(),
        )?;
        Ok(Self {
            model,
            encoder,
            search,
            source_prefix: preprocessing.source_prefix.clone(),
        })
    }

    /// Generates one summary for `dialogue`.
    pub fn summarize(&mut self, dialogue: &str) -> Result<String> {
        let text = format!("{}{}", self.source_prefix, dialogue);
        let ids = self.encoder.encode(&text)?;
        let len = ids.len();
        let input = Tensor::from_vec(ids, (1, len), self.model.device())?;

        let mut scorer = ModelStepScorer::new(&mut self.model, &input)?;
        let generated = self.search.generate(&mut scorer)?;
        tracing::debug!(source_tokens = len, summary_tokens = generated.len(), "Generated summary");

        self.encoder.decode(&generated)
    }
}
