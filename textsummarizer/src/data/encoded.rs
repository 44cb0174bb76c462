//! Tokenized dataset persisted between transformation and training.
//!
//! Layout: one `<split>.jsonl` per split plus a `dataset_info.json`
//! manifest. Sequences keep their natural lengths; padding happens at
//! batch time.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PreprocessingParams;
use crate::errors::{FormatError, Result, SummarizerError};

/// Manifest file name inside an encoded dataset directory.
pub const DATASET_INFO_FILE: &str = "dataset_info.json";

/// One tokenized dialogue/summary pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedRecord {
    /// Source token ids, special tokens included.
    pub input_ids: Vec<u32>,
    /// 1 for every source token.
    pub attention_mask: Vec<u32>,
    /// Target token ids, end-of-sequence included.
    pub labels: Vec<u32>,
}

/// Manifest describing an encoded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Tokenizer the records were produced with.
    pub tokenizer: String,
    /// Tokenization parameters.
    pub preprocessing: PreprocessingParams,
    /// Record count per split.
    pub splits: BTreeMap<String, usize>,
    /// When the dataset was written.
    pub created_at: DateTime<Utc>,
}

/// An encoded dataset directory.
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    dir: PathBuf,
}

impl EncodedDataset {
    /// Opens (or prepares to write) the dataset at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Dataset directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one split file.
    #[must_use]
    pub fn split_path(&self, split: &str) -> PathBuf {
        self.dir.join(format!("{split}.jsonl"))
    }

    /// Writes one split, replacing any previous file.
    pub fn write_split(&self, split: &str, records: &[EncodedRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| SummarizerError::io(&self.dir, e))?;
        let path = self.split_path(split);
        let file = File::create(&path).map_err(|e| SummarizerError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer
                .write_all(b"\n")
                .map_err(|e| SummarizerError::io(&path, e))?;
        }
        writer.flush().map_err(|e| SummarizerError::io(&path, e))?;
        Ok(path)
    }

    /// Reads one split.
    pub fn read_split(&self, split: &str) -> Result<Vec<EncodedRecord>> {
        let path = self.split_path(split);
        if !path.is_file() {
            return Err(FormatError::MissingSplit {
                dir: self.dir.clone(),
                split: split.to_string(),
            }
            .into());
        }
        let file = File::open(&path).map_err(|e| SummarizerError::io(&path, e))?;

        let mut records = Vec::new();
        for (row, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| SummarizerError::io(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: EncodedRecord =
                serde_json::from_str(&line).map_err(|e| FormatError::record(&path, row, e))?;
            if record.input_ids.is_empty() || record.labels.is_empty() {
                return Err(FormatError::record(&path, row, "empty token sequence").into());
            }
            if record.attention_mask.len() != record.input_ids.len() {
                return Err(FormatError::record(
                    &path,
                    row,
                    "attention_mask length differs from input_ids",
                )
                .into());
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Writes the manifest.
    pub fn write_info(&self, info: &DatasetInfo) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| SummarizerError::io(&self.dir, e))?;
        let path = self.dir.join(DATASET_INFO_FILE);
        let json = serde_json::to_string_pretty(info)?;
        fs::write(&path, json).map_err(|e| SummarizerError::io(&path, e))?;
        Ok(path)
    }

    /// Reads the manifest.
    pub fn read_info(&self) -> Result<DatasetInfo> {
        let path = self.dir.join(DATASET_INFO_FILE);
        let text = fs::read_to_string(&path).map_err(|e| SummarizerError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|e| FormatError::dataset(&path, e).into())
    }
}
