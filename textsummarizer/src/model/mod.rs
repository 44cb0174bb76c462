//! Pretrained sequence-to-sequence model plumbing: device selection,
//! checkpoint resolution, tokenizer handling, the model wrapper used for
//! training and generation, and beam search.

pub mod beam;
pub mod device;
pub mod hub;
pub mod seq2seq;
pub mod summarizer;
pub mod tokenizer;

pub use beam::{BeamSearch, StepScorer};
pub use device::select_device;
pub use hub::{resolve_checkpoint, resolve_tokenizer, CheckpointFiles};
pub use seq2seq::Seq2SeqModel;
pub use summarizer::Seq2SeqSummarizer;
