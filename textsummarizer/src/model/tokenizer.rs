//! Tokenizer loading and truncating encoders.

use std::path::Path;

use tokenizers::{Tokenizer, TruncationParams};

use crate::errors::{Result, SummarizerError};

/// Loads a `tokenizer.json` file.
pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| {
        SummarizerError::tokenizer(format!("cannot load '{}': {e}", path.display()))
    })
}

/// A tokenizer that truncates to a fixed length, special tokens included.
#[derive(Clone)]
pub struct TruncatingEncoder {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl std::fmt::Debug for TruncatingEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TruncatingEncoder")
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl TruncatingEncoder {
    /// Wraps a copy of `tokenizer` truncating to `max_length` tokens.
    pub fn new(tokenizer: &Tokenizer, max_length: usize) -> Result<Self> {
        let mut tokenizer = tokenizer.clone();
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(SummarizerError::tokenizer)?;
        tokenizer.with_padding(None);
        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    /// Encodes `text` with special tokens.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(SummarizerError::tokenizer)?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decodes ids back to text, dropping special tokens.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(SummarizerError::tokenizer)
    }
}
