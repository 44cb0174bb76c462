//! T5-family encoder-decoder wrapper used by both training and generation.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{ops, VarBuilder, VarMap};
use candle_transformers::models::t5::{Config, T5ForConditionalGeneration};

use super::beam::StepScorer;
use crate::data::BatchTensors;
use crate::errors::{Result, SummarizerError};

/// Reads and parses a model `config.json`.
///
/// The key-value cache is disabled: generation re-decodes full prefixes,
/// which keeps beams independent.
pub fn load_model_config(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path).map_err(|e| SummarizerError::io(path, e))?;
    let mut config: Config = serde_json::from_str(&text).map_err(|e| {
        SummarizerError::checkpoint(path.display().to_string(), format!("bad config: {e}"))
    })?;
    config.use_cache = false;
    Ok(config)
}

/// Loads every tensor from a set of safetensors files.
pub fn load_tensors(files: &[impl AsRef<Path>], device: &Device) -> Result<HashMap<String, Tensor>> {
    let mut tensors = HashMap::new();
    for file in files {
        let file = file.as_ref();
        let shard = candle_core::safetensors::load(file, device).map_err(|e| {
            SummarizerError::checkpoint(file.display().to_string(), e)
        })?;
        tensors.extend(shard);
    }
    Ok(tensors)
}

/// A loaded encoder-decoder model and its special token ids.
pub struct Seq2SeqModel {
    model: T5ForConditionalGeneration,
    config: Config,
    device: Device,
}

impl std::fmt::Debug for Seq2SeqModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seq2SeqModel")
            .field("d_model", &self.config.d_model)
            .field("vocab_size", &self.config.vocab_size)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl Seq2SeqModel {
    /// Builds a frozen model from loaded tensors.
    pub fn from_tensors(
        tensors: HashMap<String, Tensor>,
        config: Config,
        device: &Device,
    ) -> Result<Self> {
        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        Self::from_var_builder(vb, config, device)
    }

    /// Builds a trainable model whose parameters live in `varmap`, then
    /// overwrites them with the pretrained `tensors`.
    ///
    /// Every parameter must be present in the checkpoint.
    pub fn trainable(
        varmap: &VarMap,
        tensors: &HashMap<String, Tensor>,
        config: Config,
        device: &Device,
    ) -> Result<Self> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
        let model = Self::from_var_builder(vb, config, device)?;

        let vars = varmap
            .data()
            .lock()
            .map_err(|_| SummarizerError::Model("parameter store lock poisoned".to_string()))?;
        let mut missing = Vec::new();
        for (name, var) in vars.iter() {
            match tensors.get(name) {
                Some(tensor) => var.set(&tensor.to_dtype(var.dtype())?)?,
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            missing.sort();
            return Err(SummarizerError::checkpoint(
                "pretrained weights",
                format!("missing tensors: {}", missing.join(", ")),
            ));
        }
        tracing::debug!(parameters = vars.len(), "Initialized trainable parameters");
        drop(vars);

        Ok(model)
    }

    /// Builds a model from any variable source.
    pub fn from_var_builder(vb: VarBuilder<'_>, config: Config, device: &Device) -> Result<Self> {
        let model = T5ForConditionalGeneration::load(vb, &config)?;
        Ok(Self {
            model,
            config,
            device: device.clone(),
        })
    }

    /// The model configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Device holding the weights.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Padding token id.
    #[must_use]
    pub fn pad_token_id(&self) -> u32 {
        u32::try_from(self.config.pad_token_id).unwrap_or(0)
    }

    /// End-of-sequence token id.
    #[must_use]
    pub fn eos_token_id(&self) -> u32 {
        u32::try_from(self.config.eos_token_id).unwrap_or(1)
    }

    /// First decoder input token (the pad token for T5).
    #[must_use]
    pub fn decoder_start_token_id(&self) -> u32 {
        self.config
            .decoder_start_token_id
            .and_then(|id| u32::try_from(id).ok())
            .unwrap_or_else(|| self.pad_token_id())
    }

    /// Encoder hidden states for `[B, S]` input ids.
    pub fn encode(&mut self, input_ids: &Tensor) -> Result<Tensor> {
        Ok(self.model.encode(input_ids)?)
    }

    /// Logits `[B, V]` for the token following each `[B, T]` decoder prefix.
    pub fn next_token_logits(&mut self, decoder_ids: &Tensor, encoder_output: &Tensor) -> Result<Tensor> {
        Ok(self.model.decode(decoder_ids, encoder_output)?)
    }

    /// Mean token-level cross entropy over the non-padding targets of a
    /// teacher-forced batch.
    pub fn loss(&mut self, batch: &BatchTensors) -> Result<Tensor> {
        let encoder_output = self.encode(&batch.input_ids)?;
        let target_len = batch.labels.dim(1)?;

        let mut total = Tensor::zeros((), DType::F32, &self.device)?;
        for t in 0..target_len {
            let prefix = batch.decoder_input_ids.narrow(1, 0, t + 1)?.contiguous()?;
            let logits = self.next_token_logits(&prefix, &encoder_output)?;
            let log_probs = ops::log_softmax(&logits.to_dtype(DType::F32)?, D::Minus1)?;

            let targets = batch.labels.narrow(1, t, 1)?.contiguous()?;
            let nll = log_probs.gather(&targets, 1)?.squeeze(1)?.neg()?;
            let mask = batch.label_mask.narrow(1, t, 1)?.squeeze(1)?;
            total = (total + (nll * mask)?.sum_all()?)?;
        }

        let tokens = batch.label_mask.sum_all()?;
        Ok(total.broadcast_div(&tokens)?)
    }
}

/// Adapts a model and one encoded source to [`StepScorer`].
pub struct ModelStepScorer<'a> {
    model: &'a mut Seq2SeqModel,
    encoder_output: Tensor,
}

impl<'a> ModelStepScorer<'a> {
    /// Encodes `input_ids` (`[1, S]`) once for the whole search.
    pub fn new(model: &'a mut Seq2SeqModel, input_ids: &Tensor) -> Result<Self> {
        let encoder_output = model.encode(input_ids)?;
        Ok(Self {
            model,
            encoder_output,
        })
    }
}

impl StepScorer for ModelStepScorer<'_> {
    fn next_token_log_probs(&mut self, prefixes: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
        let beams = prefixes.len();
        let len = prefixes.first().map_or(0, Vec::len);
        let flat: Vec<u32> = prefixes.iter().flatten().copied().collect();
        if flat.len() != beams * len {
            return Err(SummarizerError::Model("prefixes differ in length".to_string()));
        }

        let decoder_ids = Tensor::from_vec(flat, (beams, len), self.model.device())?;
        let (_, source_len, hidden) = self.encoder_output.dims3()?;
        let encoder_output = self
            .encoder_output
            .broadcast_as((beams, source_len, hidden))?
            .contiguous()?;

        let logits = self.model.next_token_logits(&decoder_ids, &encoder_output)?;
        let log_probs = ops::log_softmax(&logits.to_dtype(DType::F32)?, D::Minus1)?;
        Ok(log_probs.to_vec2::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{collate, EncodedRecord};
    use crate::testing::{tiny_model, tiny_t5_config, write_tiny_checkpoint, TINY_VOCAB};

    fn batch(device: &Device) -> BatchTensors {
        let a = EncodedRecord {
            input_ids: vec![3, 5, 7, 1],
            attention_mask: vec![1; 4],
            labels: vec![5, 9, 1],
        };
        let b = EncodedRecord {
            input_ids: vec![4, 1],
            attention_mask: vec![1; 2],
            labels: vec![6, 1],
        };
        collate(&[&a, &b], 0, 0).unwrap().to_tensors(device).unwrap()
    }

    #[test]
    fn test_special_token_ids_from_config() {
        let (model, _) = tiny_model();
        assert_eq!(model.pad_token_id(), 0);
        assert_eq!(model.eos_token_id(), 1);
        assert_eq!(model.decoder_start_token_id(), 0);
    }

    #[test]
    fn test_loss_is_finite_scalar() {
        let (mut model, _) = tiny_model();
        let loss = model.loss(&batch(&Device::Cpu)).unwrap();

        assert!(loss.dims().is_empty());
        let value = loss.to_scalar::<f32>().unwrap();
        assert!(value.is_finite());
        assert!(value > 0.0);
    }

    #[test]
    fn test_trainable_copies_pretrained_weights() {
        let (mut source, source_vars) = tiny_model();
        let tensors: HashMap<String, Tensor> = source_vars
            .data()
            .lock()
            .unwrap()
            .iter()
            .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
            .collect();

        let varmap = VarMap::new();
        let mut copy =
            Seq2SeqModel::trainable(&varmap, &tensors, tiny_t5_config(), &Device::Cpu).unwrap();

        let expected = source.loss(&batch(&Device::Cpu)).unwrap().to_scalar::<f32>().unwrap();
        let actual = copy.loss(&batch(&Device::Cpu)).unwrap().to_scalar::<f32>().unwrap();
        assert!((expected - actual).abs() < 1e-5);
    }

    #[test]
    fn test_trainable_reports_missing_tensors() {
        let varmap = VarMap::new();
        let err = Seq2SeqModel::trainable(&varmap, &HashMap::new(), tiny_t5_config(), &Device::Cpu)
            .unwrap_err();
        assert_eq!(err.kind(), "checkpoint");
        assert!(err.to_string().contains("shared.weight"));
    }

    #[test]
    fn test_checkpoint_loads_frozen_model() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_checkpoint(dir.path());

        let config = load_model_config(&dir.path().join("config.json")).unwrap();
        assert!(!config.use_cache);
        let tensors = load_tensors(&[dir.path().join("model.safetensors")], &Device::Cpu).unwrap();
        let mut model = Seq2SeqModel::from_tensors(tensors, config, &Device::Cpu).unwrap();

        assert!(model.loss(&batch(&Device::Cpu)).is_ok());
    }

    #[test]
    fn test_step_scorer_rows_are_distributions() {
        let (mut model, _) = tiny_model();
        let input = Tensor::new(&[[3u32, 5, 1]], &Device::Cpu).unwrap();
        let mut scorer = ModelStepScorer::new(&mut model, &input).unwrap();

        let rows = scorer
            .next_token_log_probs(&[vec![0, 4], vec![0, 7]])
            .unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.len(), TINY_VOCAB);
            let mass: f32 = row.iter().map(|lp| lp.exp()).sum();
            assert!((mass - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_step_scorer_rejects_ragged_prefixes() {
        let (mut model, _) = tiny_model();
        let input = Tensor::new(&[[3u32, 1]], &Device::Cpu).unwrap();
        let mut scorer = ModelStepScorer::new(&mut model, &input).unwrap();
        assert!(scorer.next_token_log_probs(&[vec![0], vec![0, 4]]).is_err());
    }
}
