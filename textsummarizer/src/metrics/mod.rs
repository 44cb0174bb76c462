//! Summarization quality metrics.

pub mod rouge;

pub use rouge::{RougeReport, RougeScore, RougeScorer};
