//! Scores the fine-tuned model with ROUGE on the held-out split.

use std::fs;

use crate::config::ModelEvaluationConfig;
use crate::core::{ArtifactKind, StageArtifact};
use crate::data::dataset::Columns;
use crate::data::load_split;
use crate::errors::{Result, SummarizerError};
use crate::metrics::{RougeReport, RougeScorer};
use crate::model::Seq2SeqSummarizer;

/// Produces one summary per dialogue.
#[cfg_attr(test, mockall::automock)]
pub trait SummaryGenerator {
    /// Summarizes `dialogue`.
    fn generate(&mut self, dialogue: &str) -> Result<String>;
}

impl SummaryGenerator for Seq2SeqSummarizer {
    fn generate(&mut self, dialogue: &str) -> Result<String> {
        self.summarize(dialogue)
    }
}

/// Evaluation worker.
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
}

impl ModelEvaluation {
    /// Creates a worker.
    #[must_use]
    pub fn new(config: ModelEvaluationConfig) -> Self {
        Self { config }
    }

    /// Loads the fine-tuned model and scores it.
    pub fn evaluate(&self) -> Result<RougeReport> {
        let mut summarizer = Seq2SeqSummarizer::load(
            &self.config.model_path,
            &self.config.tokenizer_path,
            &self.config.generation,
            &self.config.preprocessing,
            self.config.device,
        )?;
        self.evaluate_with(&mut summarizer)
    }

    /// Scores `generator` on the first `max_samples` records of the
    /// held-out split and writes the CSV report.
    pub fn evaluate_with(&self, generator: &mut dyn SummaryGenerator) -> Result<RougeReport> {
        let prep = &self.config.preprocessing;
        let columns = Columns {
            text: &prep.text_column,
            summary: &prep.summary_column,
        };
        let mut records = load_split(&self.config.data_path, &self.config.split, columns)?;
        if let Some(limit) = self.config.max_samples {
            records.truncate(limit);
        }
        if records.is_empty() {
            return Err(SummarizerError::Model(format!(
                "split '{}' has no records to evaluate",
                self.config.split
            )));
        }

        let mut predictions = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let summary = generator.generate(&record.dialogue)?;
            tracing::debug!(index = i, id = %record.id, summary = %summary, "Generated evaluation summary");
            predictions.push(summary);
        }
        let references: Vec<&str> = records.iter().map(|r| r.summary.as_str()).collect();
        let report = RougeScorer::new().aggregate(&predictions, &references);

        let path = &self.config.metric_file_name;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SummarizerError::io(parent, e))?;
        }
        fs::write(path, report.to_csv(&self.config.model_name))
            .map_err(|e| SummarizerError::io(path, e))?;

        tracing::info!(
            samples = report.samples,
            rouge1 = report.rouge1,
            rouge2 = report.rouge2,
            rouge_l = report.rouge_l,
            rouge_lsum = report.rouge_lsum,
            report = %path.display(),
            "Evaluation finished"
        );
        Ok(report)
    }

    /// Artifact describing the written report.
    #[must_use]
    pub fn report_artifact(&self, report: &RougeReport) -> StageArtifact {
        StageArtifact::new(ArtifactKind::Report, &self.config.metric_file_name)
            .with_metadata("scores", serde_json::json!(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceChoice, GenerationParams, PreprocessingParams};
    use crate::testing::{write_jsonl_split, write_tiny_checkpoint};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn config(root: &Path, max_samples: Option<usize>) -> ModelEvaluationConfig {
        ModelEvaluationConfig {
            root_dir: root.join("model_evaluation"),
            data_path: root.join("raw"),
            model_path: root.join("model"),
            tokenizer_path: root.join("model"),
            metric_file_name: root.join("model_evaluation/metrics.csv"),
            split: "test".to_string(),
            max_samples,
            model_name: "flan-t5-samsum".to_string(),
            generation: GenerationParams {
                num_beams: 2,
                length_penalty: 0.8,
                max_length: 6,
            },
            preprocessing: PreprocessingParams {
                max_source_length: 32,
                max_target_length: 8,
                source_prefix: "summarize: ".to_string(),
                text_column: "dialogue".to_string(),
                summary_column: "summary".to_string(),
            },
            device: DeviceChoice::Cpu,
        }
    }

    fn write_test_split(root: &Path) {
        write_jsonl_split(
            &root.join("raw"),
            "test",
            &[
                ("Amanda: I baked cookies.", "Amanda baked cookies"),
                ("Tom: hi", "Tom greets"),
                ("Jerry: yo", "Jerry greets"),
            ],
        );
    }

    #[test]
    fn test_perfect_predictions_score_one_and_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_test_split(dir.path());
        let config = config(dir.path(), Some(2));

        let mut generator = MockSummaryGenerator::new();
        generator
            .expect_generate()
            .with(eq("Amanda: I baked cookies."))
            .times(1)
            .returning(|_| Ok("Amanda baked cookies".to_string()));
        generator
            .expect_generate()
            .with(eq("Tom: hi"))
            .times(1)
            .returning(|_| Ok("Tom greets".to_string()));

        let report = ModelEvaluation::new(config.clone())
            .evaluate_with(&mut generator)
            .unwrap();

        assert_eq!(report.samples, 2);
        assert!((report.rouge1 - 1.0).abs() < 1e-12);
        assert!((report.rouge_lsum - 1.0).abs() < 1e-12);
        assert_eq!(
            fs::read_to_string(&config.metric_file_name).unwrap(),
            ",rouge1,rouge2,rougeL,rougeLsum\nflan-t5-samsum,1,1,1,1\n"
        );
    }

    #[test]
    fn test_generator_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        write_test_split(dir.path());

        let mut generator = MockSummaryGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(SummarizerError::Model("out of memory".to_string())));

        let err = ModelEvaluation::new(config(dir.path(), None))
            .evaluate_with(&mut generator)
            .unwrap_err();
        assert_eq!(err.kind(), "model");
    }

    #[test]
    fn test_zero_max_samples_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_test_split(dir.path());

        let mut generator = MockSummaryGenerator::new();
        generator.expect_generate().times(0);

        assert!(ModelEvaluation::new(config(dir.path(), Some(0)))
            .evaluate_with(&mut generator)
            .is_err());
    }

    #[test]
    fn test_evaluation_is_deterministic_for_fixed_model() {
        let dir = tempfile::tempdir().unwrap();
        write_test_split(dir.path());
        write_tiny_checkpoint(&dir.path().join("model"));
        let evaluation = ModelEvaluation::new(config(dir.path(), None));

        let first = evaluation.evaluate().unwrap();
        let first_csv = fs::read_to_string(dir.path().join("model_evaluation/metrics.csv")).unwrap();
        let second = evaluation.evaluate().unwrap();
        let second_csv = fs::read_to_string(dir.path().join("model_evaluation/metrics.csv")).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_csv, second_csv);
        assert_eq!(first.samples, 3);
        assert!(evaluation.report_artifact(&first).path.ends_with("metrics.csv"));
    }
}
