//! Dataset I/O: raw dialogue records, their encoded form, and batching.

pub mod batcher;
pub mod dataset;
pub mod encoded;

pub use batcher::{collate, shuffled_batches, Batch, BatchTensors};
pub use dataset::{load_split, DialogueRecord};
pub use encoded::{DatasetInfo, EncodedDataset, EncodedRecord};
