//! Fine-tunes the pretrained checkpoint on the encoded dataset.

use std::fs;
use std::path::Path;

use candle_core::backprop::GradStore;
use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{ModelTrainerConfig, TrainingParams};
use crate::core::{ArtifactKind, StageArtifact};
use crate::data::{collate, shuffled_batches, EncodedDataset, EncodedRecord};
use crate::errors::{FormatError, Result, SummarizerError};
use crate::model::hub::{CheckpointFiles, CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE};
use crate::model::seq2seq::{load_model_config, load_tensors, Seq2SeqModel};
use crate::model::select_device;

/// Training progress file written next to the weights.
pub const TRAINER_STATE_FILE: &str = "trainer_state.json";

/// Linear warmup to the peak rate, then linear decay to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSchedule {
    base_lr: f64,
    warmup_steps: usize,
    total_steps: usize,
}

impl LinearSchedule {
    /// Creates a schedule over `total_steps` optimizer steps.
    #[must_use]
    pub fn new(base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            base_lr,
            warmup_steps,
            total_steps,
        }
    }

    /// Rate for the optimizer step with zero-based index `step`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn learning_rate(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.base_lr * (step + 1) as f64 / self.warmup_steps as f64;
        }
        let remaining = self.total_steps.saturating_sub(step) as f64;
        let span = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        self.base_lr * (remaining / span).min(1.0)
    }
}

/// One logged training window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Optimizer step.
    pub step: usize,
    /// Epoch, zero-based.
    pub epoch: usize,
    /// Mean micro-batch loss since the previous entry.
    pub loss: f64,
    /// Rate used at `step`.
    pub learning_rate: f64,
}

/// One validation measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalEntry {
    /// Optimizer step.
    pub step: usize,
    /// Mean validation loss.
    pub eval_loss: f64,
}

/// Summary of a training run, persisted as `trainer_state.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    /// Optimizer steps taken.
    pub global_step: usize,
    /// Planned optimizer steps.
    pub total_steps: usize,
    /// Epochs fully or partly run.
    pub epochs: usize,
    /// Loss of the last micro-batch.
    pub final_loss: Option<f64>,
    /// Non-padding target tokens trained on.
    #[serde(default)]
    pub target_tokens: usize,
    /// Periodic training loss.
    pub log_history: Vec<LogEntry>,
    /// Periodic validation loss.
    pub eval_history: Vec<EvalEntry>,
}

/// Trainer worker.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    /// Creates a worker.
    #[must_use]
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    /// The worker's configuration.
    #[must_use]
    pub fn config(&self) -> &ModelTrainerConfig {
        &self.config
    }

    /// Fine-tunes the checkpoint and writes the model and tokenizer
    /// directories.
    pub fn train(&self, checkpoint: &CheckpointFiles) -> Result<StageArtifact> {
        let params = &self.config.training;
        let dataset = EncodedDataset::new(&self.config.data_path);
        let train = dataset.read_split("train")?;
        if train.is_empty() {
            return Err(SummarizerError::Model("training split is empty".to_string()));
        }
        let validation = match dataset.read_split("validation") {
            Ok(records) => records,
            Err(SummarizerError::Format(FormatError::MissingSplit { .. })) => Vec::new(),
            Err(e) => return Err(e),
        };

        let device = select_device(self.config.device)?;
        let model_config = load_model_config(&checkpoint.config)?;
        let varmap = VarMap::new();
        let mut model = {
            let tensors = load_tensors(&checkpoint.weights, &device)?;
            Seq2SeqModel::trainable(&varmap, &tensors, model_config, &device)?
        };
        let parameters: Vec<Tensor> = varmap
            .all_vars()
            .iter()
            .map(|var| var.as_tensor().clone())
            .collect();
        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: params.learning_rate,
                weight_decay: params.weight_decay,
                ..ParamsAdamW::default()
            },
        )?;

        let batch_size = params.per_device_train_batch_size.max(1);
        let accumulation = params.gradient_accumulation_steps.max(1);
        let total_steps = planned_steps(train.len(), params);
        let schedule = LinearSchedule::new(params.learning_rate, params.warmup_steps, total_steps);
        let mut rng = StdRng::seed_from_u64(params.seed);

        tracing::info!(
            records = train.len(),
            validation_records = validation.len(),
            epochs = params.num_train_epochs,
            batch_size,
            accumulation,
            total_steps,
            device = ?device,
            "Starting fine-tuning"
        );

        let mut state = TrainerState {
            total_steps,
            ..TrainerState::default()
        };
        let mut window = LossWindow::default();
        'epochs: for epoch in 0..params.num_train_epochs {
            state.epochs = epoch + 1;
            let batches = shuffled_batches(train.len(), batch_size, &mut rng);
            let last = batches.len().saturating_sub(1);
            let mut accumulated: Option<GradStore> = None;
            let mut micro = 0;

            for (i, indices) in batches.iter().enumerate() {
                let records: Vec<&EncodedRecord> = indices.iter().map(|&j| &train[j]).collect();
                let batch = collate(&records, model.pad_token_id(), model.decoder_start_token_id())?;
                state.target_tokens += batch.target_tokens();
                let loss = model.loss(&batch.to_tensors(&device)?)?;
                let value = f64::from(loss.to_scalar::<f32>()?);
                if !value.is_finite() {
                    return Err(SummarizerError::Model(format!(
                        "non-finite loss at step {}",
                        state.global_step
                    )));
                }
                window.push(value);
                state.final_loss = Some(value);

                #[allow(clippy::cast_precision_loss)]
                let grads = loss.affine(1.0 / accumulation as f64, 0.0)?.backward()?;
                match accumulated.as_mut() {
                    Some(existing) => merge_gradients(&parameters, existing, grads)?,
                    None => accumulated = Some(grads),
                }
                micro += 1;
                if micro < accumulation && i < last {
                    continue;
                }

                let Some(grads) = accumulated.take() else {
                    continue;
                };
                micro = 0;
                let lr = schedule.learning_rate(state.global_step);
                optimizer.set_learning_rate(lr);
                optimizer.step(&grads)?;
                state.global_step += 1;

                if state.global_step % params.logging_steps.max(1) == 0 {
                    if let Some(loss) = window.take_mean() {
                        tracing::info!(step = state.global_step, epoch, loss, lr, "Training");
                        state.log_history.push(LogEntry {
                            step: state.global_step,
                            epoch,
                            loss,
                            learning_rate: lr,
                        });
                    }
                }
                if !validation.is_empty() && state.global_step % params.eval_steps.max(1) == 0 {
                    let eval_loss = evaluate_loss(&mut model, &validation, batch_size, params.eval_batches)?;
                    tracing::info!(step = state.global_step, eval_loss, "Validation");
                    state.eval_history.push(EvalEntry {
                        step: state.global_step,
                        eval_loss,
                    });
                }
                if state.global_step >= total_steps {
                    break 'epochs;
                }
            }
        }

        self.save(&varmap, checkpoint, &state)
    }

    fn save(&self, varmap: &VarMap, checkpoint: &CheckpointFiles, state: &TrainerState) -> Result<StageArtifact> {
        let model_dir = &self.config.model_dir;
        let tokenizer_dir = &self.config.tokenizer_dir;
        for dir in [model_dir, tokenizer_dir] {
            fs::create_dir_all(dir).map_err(|e| SummarizerError::io(dir, e))?;
        }

        let weights = model_dir.join(WEIGHTS_FILE);
        varmap.save(&weights)?;
        copy(&checkpoint.config, &model_dir.join(CONFIG_FILE))?;
        copy(&checkpoint.tokenizer, &tokenizer_dir.join(TOKENIZER_FILE))?;
        let state_path = model_dir.join(TRAINER_STATE_FILE);
        fs::write(&state_path, serde_json::to_string_pretty(state)?)
            .map_err(|e| SummarizerError::io(&state_path, e))?;

        tracing::info!(
            model_dir = %model_dir.display(),
            tokenizer_dir = %tokenizer_dir.display(),
            steps = state.global_step,
            target_tokens = state.target_tokens,
            final_loss = ?state.final_loss,
            "Saved fine-tuned model"
        );
        Ok(StageArtifact::new(ArtifactKind::Model, model_dir)
            .with_metadata("global_step", serde_json::json!(state.global_step))
            .with_metadata("final_loss", serde_json::json!(state.final_loss))
            .with_metadata("tokenizer_dir", serde_json::json!(tokenizer_dir)))
    }
}

/// Optimizer steps a run will take.
fn planned_steps(records: usize, params: &TrainingParams) -> usize {
    let batches = records.div_ceil(params.per_device_train_batch_size.max(1));
    let per_epoch = batches.div_ceil(params.gradient_accumulation_steps.max(1));
    let planned = per_epoch * params.num_train_epochs;
    params.max_steps.map_or(planned, |cap| planned.min(cap))
}

/// Adds `grads` into `accum` for every trainable parameter.
fn merge_gradients(parameters: &[Tensor], accum: &mut GradStore, mut grads: GradStore) -> Result<()> {
    for param in parameters {
        if let Some(grad) = grads.remove(param) {
            let combined = match accum.remove(param) {
                Some(existing) => existing.add(&grad)?,
                None => grad,
            };
            accum.insert(param, combined);
        }
    }
    Ok(())
}

/// Mean loss over the first `max_batches` in-order validation batches.
fn evaluate_loss(
    model: &mut Seq2SeqModel,
    records: &[EncodedRecord],
    batch_size: usize,
    max_batches: usize,
) -> Result<f64> {
    let mut window = LossWindow::default();
    for chunk in records.chunks(batch_size).take(max_batches.max(1)) {
        let refs: Vec<&EncodedRecord> = chunk.iter().collect();
        let batch = collate(&refs, model.pad_token_id(), model.decoder_start_token_id())?
            .to_tensors(model.device())?;
        let loss = model.loss(&batch)?.detach();
        window.push(f64::from(loss.to_scalar::<f32>()?));
    }
    window
        .take_mean()
        .ok_or_else(|| SummarizerError::Model("no validation batches".to_string()))
}

fn copy(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|e| SummarizerError::io(from, e))?;
    Ok(())
}

#[derive(Debug, Default)]
struct LossWindow {
    sum: f64,
    count: usize,
}

impl LossWindow {
    fn push(&mut self, loss: f64) {
        self.sum += loss;
        self.count += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn take_mean(&mut self) -> Option<f64> {
        let mean = (self.count > 0).then(|| self.sum / self.count as f64);
        *self = Self::default();
        mean
    }
}
