//! Tokenizes the raw dialogue corpus into an encoded dataset.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::DataTransformationConfig;
use crate::core::{ArtifactKind, StageArtifact};
use crate::data::dataset::Columns;
use crate::data::{load_split, DatasetInfo, DialogueRecord, EncodedDataset, EncodedRecord};
use crate::errors::Result;
use crate::model::tokenizer::{load_tokenizer, TruncatingEncoder};

/// Transformation worker.
#[derive(Debug, Clone)]
pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl DataTransformation {
    /// Creates a worker.
    #[must_use]
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    /// The worker's configuration.
    #[must_use]
    pub fn config(&self) -> &DataTransformationConfig {
        &self.config
    }

    /// Encodes every configured split with the tokenizer at
    /// `tokenizer_file` and writes the encoded dataset to `output_dir`.
    pub fn convert(&self, tokenizer_file: &Path) -> Result<StageArtifact> {
        let tokenizer = load_tokenizer(tokenizer_file)?;
        let prep = &self.config.preprocessing;
        let sources = TruncatingEncoder::new(&tokenizer, prep.max_source_length)?;
        let targets = TruncatingEncoder::new(&tokenizer, prep.max_target_length)?;
        let columns = Columns {
            text: &prep.text_column,
            summary: &prep.summary_column,
        };

        let dataset = EncodedDataset::new(&self.config.output_dir);
        let mut counts = BTreeMap::new();
        for split in &self.config.splits {
            let raw = load_split(&self.config.data_path, split, columns)?;
            let encoded = raw
                .iter()
                .map(|record| self.encode_record(record, &sources, &targets))
                .collect::<Result<Vec<_>>>()?;
            let path = dataset.write_split(split, &encoded)?;
            tracing::info!(
                split = %split,
                records = encoded.len(),
                path = %path.display(),
                "Encoded split"
            );
            counts.insert(split.clone(), encoded.len());
        }

        dataset.write_info(&DatasetInfo {
            tokenizer: self.config.tokenizer_name.clone(),
            preprocessing: prep.clone(),
            splits: counts.clone(),
            created_at: chrono::Utc::now(),
        })?;

        Ok(StageArtifact::new(ArtifactKind::EncodedDataset, dataset.dir())
            .with_metadata("splits", serde_json::json!(counts)))
    }

    fn encode_record(
        &self,
        record: &DialogueRecord,
        sources: &TruncatingEncoder,
        targets: &TruncatingEncoder,
    ) -> Result<EncodedRecord> {
        let source = format!("{}{}", self.config.preprocessing.source_prefix, record.dialogue);
        let input_ids = sources.encode(&source)?;
        let labels = targets.encode(&record.summary)?;
        Ok(EncodedRecord {
            attention_mask: vec![1; input_ids.len()],
            input_ids,
            labels,
        })
    }
}
