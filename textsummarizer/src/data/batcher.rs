//! Batch collation: pads variable-length records into rectangular batches.

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::EncodedRecord;
use crate::errors::{Result, SummarizerError};

/// A padded batch held in flat row-major buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Number of records.
    pub size: usize,
    /// Longest source sequence in the batch.
    pub source_len: usize,
    /// Longest target sequence in the batch.
    pub target_len: usize,
    /// `[size, source_len]` source ids.
    pub input_ids: Vec<u32>,
    /// `[size, source_len]`, 1 on real tokens.
    pub attention_mask: Vec<u32>,
    /// `[size, target_len]` targets shifted right behind the start token.
    pub decoder_input_ids: Vec<u32>,
    /// `[size, target_len]` target ids.
    pub labels: Vec<u32>,
    /// `[size, target_len]`, 1.0 on real target tokens.
    pub label_mask: Vec<f32>,
}

/// A [`Batch`] moved onto a device.
#[derive(Debug, Clone)]
pub struct BatchTensors {
    /// `u32 [B, S]`.
    pub input_ids: Tensor,
    /// `u32 [B, S]`.
    pub attention_mask: Tensor,
    /// `u32 [B, T]`.
    pub decoder_input_ids: Tensor,
    /// `u32 [B, T]`.
    pub labels: Tensor,
    /// `f32 [B, T]`.
    pub label_mask: Tensor,
}

/// Pads records into one batch.
///
/// The decoder input of each row is `decoder_start_id` followed by the
/// labels minus their last token.
pub fn collate(records: &[&EncodedRecord], pad_id: u32, decoder_start_id: u32) -> Result<Batch> {
    if records.is_empty() {
        return Err(SummarizerError::Model("cannot collate an empty batch".to_string()));
    }
    let size = records.len();
    let source_len = records.iter().map(|r| r.input_ids.len()).max().unwrap_or(0);
    let target_len = records.iter().map(|r| r.labels.len()).max().unwrap_or(0);
    if source_len == 0 || target_len == 0 {
        return Err(SummarizerError::Model("batch holds an empty sequence".to_string()));
    }

    let mut batch = Batch {
        size,
        source_len,
        target_len,
        input_ids: Vec::with_capacity(size * source_len),
        attention_mask: Vec::with_capacity(size * source_len),
        decoder_input_ids: Vec::with_capacity(size * target_len),
        labels: Vec::with_capacity(size * target_len),
        label_mask: Vec::with_capacity(size * target_len),
    };

    for record in records {
        let source_pad = source_len - record.input_ids.len();
        batch.input_ids.extend_from_slice(&record.input_ids);
        batch.input_ids.extend(std::iter::repeat(pad_id).take(source_pad));
        batch.attention_mask.extend_from_slice(&record.attention_mask);
        batch.attention_mask.extend(std::iter::repeat(0).take(source_pad));

        let target_pad = target_len - record.labels.len();
        batch.decoder_input_ids.push(decoder_start_id);
        batch
            .decoder_input_ids
            .extend_from_slice(&record.labels[..record.labels.len() - 1]);
        batch.decoder_input_ids.extend(std::iter::repeat(pad_id).take(target_pad));
        batch.labels.extend_from_slice(&record.labels);
        batch.labels.extend(std::iter::repeat(pad_id).take(target_pad));
        batch.label_mask.extend(std::iter::repeat(1.0).take(record.labels.len()));
        batch.label_mask.extend(std::iter::repeat(0.0).take(target_pad));
    }

    Ok(batch)
}

impl Batch {
    /// Copies the buffers onto `device`.
    pub fn to_tensors(&self, device: &Device) -> Result<BatchTensors> {
        let source = (self.size, self.source_len);
        let target = (self.size, self.target_len);
        Ok(BatchTensors {
            input_ids: Tensor::from_slice(&self.input_ids, source, device)?,
            attention_mask: Tensor::from_slice(&self.attention_mask, source, device)?,
            decoder_input_ids: Tensor::from_slice(&self.decoder_input_ids, target, device)?,
            labels: Tensor::from_slice(&self.labels, target, device)?,
            label_mask: Tensor::from_slice(&self.label_mask, target, device)?,
        })
    }

    /// Number of real target tokens.
    #[must_use]
    pub fn target_tokens(&self) -> usize {
        self.label_mask.iter().filter(|m| **m > 0.0).count()
    }
}

/// Splits `0..len` into shuffled batches of at most `batch_size` indices.
pub fn shuffled_batches(len: usize, batch_size: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}
