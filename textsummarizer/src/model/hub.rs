//! Resolves pretrained checkpoints and tokenizers to local files.
//!
//! A name is either a local directory (or, for tokenizers, a local
//! `tokenizer.json`) or a Hugging Face Hub model id downloaded into the
//! hub cache.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use hf_hub::api::tokio::{Api, ApiRepo};
use serde::Deserialize;

use crate::errors::{Result, SummarizerError};

/// Single-file weights name.
pub const WEIGHTS_FILE: &str = "model.safetensors";
/// Sharded weights index name.
pub const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";
/// Model config name.
pub const CONFIG_FILE: &str = "config.json";
/// Tokenizer name.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Local files making up a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointFiles {
    /// `config.json`.
    pub config: PathBuf,
    /// One or more safetensors files.
    pub weights: Vec<PathBuf>,
    /// `tokenizer.json`.
    pub tokenizer: PathBuf,
}

#[derive(Debug, Deserialize)]
struct WeightsIndex {
    weight_map: std::collections::HashMap<String, String>,
}

/// Resolves a checkpoint name to local files, downloading if needed.
pub async fn resolve_checkpoint(name: &str) -> Result<CheckpointFiles> {
    let local = Path::new(name);
    if local.is_dir() {
        return local_checkpoint(name, local);
    }

    tracing::info!(checkpoint = name, "Fetching checkpoint from the Hugging Face Hub");
    let repo = hub_repo(name)?;
    let config = fetch(&repo, name, CONFIG_FILE).await?;
    let tokenizer = fetch(&repo, name, TOKENIZER_FILE).await?;

    let weights = match repo.get(WEIGHTS_FILE).await {
        Ok(path) => vec![path],
        Err(single_err) => {
            tracing::debug!(error = %single_err, "No single weights file, trying sharded index");
            let index = fetch(&repo, name, WEIGHTS_INDEX_FILE).await?;
            let mut shards = Vec::new();
            for shard in shard_names(name, &index)? {
                shards.push(fetch(&repo, name, &shard).await?);
            }
            shards
        }
    };

    Ok(CheckpointFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Resolves a tokenizer name to a local `tokenizer.json`.
pub async fn resolve_tokenizer(name: &str) -> Result<PathBuf> {
    let local = Path::new(name);
    if local.is_file() {
        return Ok(local.to_path_buf());
    }
    if local.is_dir() {
        return existing(name, local.join(TOKENIZER_FILE));
    }

    tracing::info!(tokenizer = name, "Fetching tokenizer from the Hugging Face Hub");
    let repo = hub_repo(name)?;
    fetch(&repo, name, TOKENIZER_FILE).await
}

fn local_checkpoint(name: &str, dir: &Path) -> Result<CheckpointFiles> {
    Ok(CheckpointFiles {
        config: existing(name, dir.join(CONFIG_FILE))?,
        weights: local_weights(name, dir)?,
        tokenizer: existing(name, dir.join(TOKENIZER_FILE))?,
    })
}

/// Weight files of a local model directory: `model.safetensors`, or the
/// shards listed by `model.safetensors.index.json`.
pub fn local_weights(name: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    let single = dir.join(WEIGHTS_FILE);
    if single.is_file() {
        return Ok(vec![single]);
    }
    let index = existing(name, dir.join(WEIGHTS_INDEX_FILE))?;
    shard_names(name, &index)?
        .into_iter()
        .map(|shard| existing(name, dir.join(shard)))
        .collect()
}

fn shard_names(name: &str, index_path: &Path) -> Result<BTreeSet<String>> {
    let text = fs::read_to_string(index_path).map_err(|e| SummarizerError::io(index_path, e))?;
    let index: WeightsIndex = serde_json::from_str(&text)
        .map_err(|e| SummarizerError::checkpoint(name, format!("bad weights index: {e}")))?;
    Ok(index.weight_map.into_values().collect())
}

fn existing(name: &str, path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(SummarizerError::checkpoint(
            name,
            format!("'{}' not found", path.display()),
        ))
    }
}

fn hub_repo(name: &str) -> Result<ApiRepo> {
    let api = Api::new().map_err(|e| SummarizerError::checkpoint(name, e))?;
    Ok(api.model(name.to_string()))
}

async fn fetch(repo: &ApiRepo, name: &str, file: &str) -> Result<PathBuf> {
    repo.get(file)
        .await
        .map_err(|e| SummarizerError::checkpoint(name, format!("{file}: {e}")))
}
