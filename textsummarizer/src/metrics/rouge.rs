//! ROUGE-1, ROUGE-2, ROUGE-L and summary-level ROUGE-Lsum.
//!
//! Tokenization lowercases the text, replaces every run of characters
//! outside `[a-z0-9]` with a space and splits on whitespace. No stemming.
//! `rougeLsum` treats each line as a sentence and scores the union LCS of
//! every reference sentence against all candidate sentences.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Precision, recall and F-measure of one comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeScore {
    /// Matched units over candidate units.
    pub precision: f64,
    /// Matched units over reference units.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub fmeasure: f64,
}

impl RougeScore {
    fn from_counts(hits: usize, candidate_total: usize, reference_total: usize) -> Self {
        let precision = hits as f64 / candidate_total.max(1) as f64;
        let recall = hits as f64 / reference_total.max(1) as f64;
        let fmeasure = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            fmeasure,
        }
    }
}

/// All four scores for one prediction/reference pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeScores {
    /// Unigram overlap.
    pub rouge1: RougeScore,
    /// Bigram overlap.
    pub rouge2: RougeScore,
    /// Longest common subsequence over the whole text.
    pub rouge_l: RougeScore,
    /// Summary-level LCS over newline-separated sentences.
    pub rouge_lsum: RougeScore,
}

/// Corpus-level report: mean F-measure per variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeReport {
    /// Mean ROUGE-1 F-measure.
    pub rouge1: f64,
    /// Mean ROUGE-2 F-measure.
    pub rouge2: f64,
    /// Mean ROUGE-L F-measure.
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
    /// Mean ROUGE-Lsum F-measure.
    #[serde(rename = "rougeLsum")]
    pub rouge_lsum: f64,
    /// Number of scored pairs.
    pub samples: usize,
}

impl RougeReport {
    /// Renders the two-line CSV report with one row labelled `row_name`.
    #[must_use]
    pub fn to_csv(&self, row_name: &str) -> String {
        let mut csv = String::from(",rouge1,rouge2,rougeL,rougeLsum\n");
        // Writing into a String cannot fail.
        let _ = writeln!(
            csv,
            "{row_name},{},{},{},{}",
            self.rouge1, self.rouge2, self.rouge_l, self.rouge_lsum
        );
        csv
    }
}

#[allow(clippy::expect_used)]
static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+").expect("static pattern compiles"));

/// Scores predictions against references.
#[derive(Debug, Clone, Copy, Default)]
pub struct RougeScorer;

impl RougeScorer {
    /// Creates a scorer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Lowercased alphanumeric tokens of `text`.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        NON_ALPHANUMERIC
            .replace_all(&lowered, " ")
            .split_whitespace()
            .map(ToString::to_string)
            .collect()
    }

    /// Scores one pair.
    #[must_use]
    pub fn score(&self, prediction: &str, reference: &str) -> RougeScores {
        let candidate = self.tokenize(prediction);
        let target = self.tokenize(reference);

        let candidate_sents: Vec<Vec<String>> = sentences(prediction)
            .map(|s| self.tokenize(s))
            .collect();
        let target_sents: Vec<Vec<String>> =
            sentences(reference).map(|s| self.tokenize(s)).collect();

        RougeScores {
            rouge1: ngram_score(&candidate, &target, 1),
            rouge2: ngram_score(&candidate, &target, 2),
            rouge_l: lcs_score(&candidate, &target),
            rouge_lsum: summary_lcs_score(&candidate_sents, &target_sents),
        }
    }

    /// Mean F-measures over aligned prediction/reference lists.
    ///
    /// Extra entries in the longer list are ignored.
    #[must_use]
    pub fn aggregate<P, R>(&self, predictions: &[P], references: &[R]) -> RougeReport
    where
        P: AsRef<str>,
        R: AsRef<str>,
    {
        let mut report = RougeReport::default();
        for (prediction, reference) in predictions.iter().zip(references) {
            let scores = self.score(prediction.as_ref(), reference.as_ref());
            report.rouge1 += scores.rouge1.fmeasure;
            report.rouge2 += scores.rouge2.fmeasure;
            report.rouge_l += scores.rouge_l.fmeasure;
            report.rouge_lsum += scores.rouge_lsum.fmeasure;
            report.samples += 1;
        }
        if report.samples > 0 {
            let n = report.samples as f64;
            report.rouge1 /= n;
            report.rouge2 /= n;
            report.rouge_l /= n;
            report.rouge_lsum /= n;
        }
        report
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').filter(|s| !s.is_empty())
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

fn ngram_score(candidate: &[String], target: &[String], n: usize) -> RougeScore {
    let candidate_counts = ngram_counts(candidate, n);
    let target_counts = ngram_counts(target, n);

    let hits = target_counts
        .iter()
        .map(|(gram, count)| (*count).min(candidate_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    RougeScore::from_counts(
        hits,
        candidate_counts.values().sum(),
        target_counts.values().sum(),
    )
}

/// `(len(a)+1) x (len(b)+1)` LCS length table.
fn lcs_table(a: &[String], b: &[String]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }
    table
}

fn lcs_score(candidate: &[String], target: &[String]) -> RougeScore {
    if candidate.is_empty() || target.is_empty() {
        return RougeScore::default();
    }
    let lcs = lcs_table(target, candidate)[target.len()][candidate.len()];
    RougeScore::from_counts(lcs, candidate.len(), target.len())
}

/// Indices into `reference` of one LCS with `candidate`.
fn lcs_indices(reference: &[String], candidate: &[String]) -> Vec<usize> {
    let table = lcs_table(reference, candidate);
    let (mut i, mut j) = (reference.len(), candidate.len());
    let mut indices = Vec::new();
    while i > 0 && j > 0 {
        if reference[i - 1] == candidate[j - 1] {
            indices.push(i - 1);
            i -= 1;
            j -= 1;
        } else if table[i][j - 1] > table[i - 1][j] {
            j -= 1;
        } else {
            i -= 1;
        }
    }
    indices.reverse();
    indices
}

fn summary_lcs_score(candidate: &[Vec<String>], target: &[Vec<String>]) -> RougeScore {
    let candidate_total: usize = candidate.iter().map(Vec::len).sum();
    let target_total: usize = target.iter().map(Vec::len).sum();
    if candidate_total == 0 || target_total == 0 {
        return RougeScore::default();
    }

    let mut candidate_counts: HashMap<&str, usize> = HashMap::new();
    for token in candidate.iter().flatten() {
        *candidate_counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut target_counts: HashMap<&str, usize> = HashMap::new();
    for token in target.iter().flatten() {
        *target_counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut hits = 0;
    for sentence in target {
        let union: BTreeSet<usize> = candidate
            .iter()
            .flat_map(|c| lcs_indices(sentence, c))
            .collect();
        for index in union {
            let token = sentence[index].as_str();
            let in_candidate = candidate_counts.get(token).copied().unwrap_or(0);
            let in_target = target_counts.get(token).copied().unwrap_or(0);
            if in_candidate > 0 && in_target > 0 {
                hits += 1;
                candidate_counts.insert(token, in_candidate - 1);
                target_counts.insert(token, in_target - 1);
            }
        }
    }

    RougeScore::from_counts(hits, candidate_total, target_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_tokenize_lowercases_and_strips_punctuation() {
        let scorer = RougeScorer::new();
        assert_eq!(
            scorer.tokenize("Amanda: I baked  cookies. Jerry's 2nd!"),
            vec!["amanda", "i", "baked", "cookies", "jerry", "s", "2nd"]
        );
        assert!(scorer.tokenize("?!").is_empty());
    }

    #[test]
    fn test_identical_texts_score_one() {
        let scores = RougeScorer::new().score("the cat sat", "The cat sat.");
        assert!(close(scores.rouge1.fmeasure, 1.0));
        assert!(close(scores.rouge2.fmeasure, 1.0));
        assert!(close(scores.rouge_l.fmeasure, 1.0));
        assert!(close(scores.rouge_lsum.fmeasure, 1.0));
    }

    #[test]
    fn test_hand_checked_pair() {
        // reference: the cat was under the bed (6)
        // candidate: the cat was found under the bed (7)
        let scores = RougeScorer::new().score(
            "the cat was found under the bed",
            "the cat was under the bed",
        );

        assert!(close(scores.rouge1.precision, 6.0 / 7.0));
        assert!(close(scores.rouge1.recall, 1.0));
        // bigrams: 4 of the 5 reference bigrams appear; candidate has 6.
        assert!(close(scores.rouge2.recall, 4.0 / 5.0));
        assert!(close(scores.rouge2.precision, 4.0 / 6.0));
        // LCS = 6.
        assert!(close(scores.rouge_l.recall, 1.0));
        assert!(close(scores.rouge_l.precision, 6.0 / 7.0));
    }

    #[test]
    fn test_clipped_unigram_counts() {
        let scores = RougeScorer::new().score("the the the", "the cat");
        assert!(close(scores.rouge1.precision, 1.0 / 3.0));
        assert!(close(scores.rouge1.recall, 1.0 / 2.0));
    }

    #[test]
    fn test_disjoint_and_empty_texts_score_zero() {
        let scorer = RougeScorer::new();
        assert_eq!(scorer.score("alpha beta", "gamma delta").rouge1.fmeasure, 0.0);
        assert_eq!(scorer.score("", "gamma delta"), RougeScores::default());
    }

    #[test]
    fn test_rouge_lsum_uses_sentence_union() {
        // Reference sentence "a b c d" against candidate sentences "a b" and
        // "c d": each sentence-level LCS covers half, the union covers all.
        let scores = RougeScorer::new().score("a b\nc d", "a b c d");
        assert!(close(scores.rouge_lsum.recall, 1.0));
        assert!(close(scores.rouge_lsum.precision, 1.0));

        // Without sentence splitting order still matches.
        assert!(close(scores.rouge_l.fmeasure, 1.0));

        // Reordered sentences break plain LCS but not the summary-level one.
        let swapped = RougeScorer::new().score("c d\na b", "a b c d");
        assert!(close(swapped.rouge_lsum.fmeasure, 1.0));
        assert!(close(swapped.rouge_l.recall, 0.5));
    }

    #[test]
    fn test_aggregate_is_mean_fmeasure() {
        let scorer = RougeScorer::new();
        let report = scorer.aggregate(&["the cat sat", "dog"], &["the cat sat", "cat"]);

        assert_eq!(report.samples, 2);
        assert!(close(report.rouge1, 0.5));
        assert!(close(report.rouge_l, 0.5));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let scorer = RougeScorer::new();
        let predictions = ["Amanda baked cookies.", "Jerry wants some."];
        let references = ["Amanda baked cookies for Jerry.", "Jerry asks for cookies."];
        assert_eq!(
            scorer.aggregate(&predictions, &references),
            scorer.aggregate(&predictions, &references)
        );
    }

    #[test]
    fn test_csv_layout() {
        let report = RougeReport {
            rouge1: 0.5,
            rouge2: 0.25,
            rouge_l: 0.4,
            rouge_lsum: 0.45,
            samples: 10,
        };
        assert_eq!(
            report.to_csv("flan-t5-samsum"),
            ",rouge1,rouge2,rougeL,rougeLsum\nflan-t5-samsum,0.5,0.25,0.4,0.45\n"
        );
    }
}
