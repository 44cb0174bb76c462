//! Model-agnostic beam search.
//!
//! Hypotheses are ranked by `sum_logprob / len^length_penalty`, where `len`
//! counts the decoder start token but not the end-of-sequence token. Search
//! stops once `num_beams` hypotheses have finished and the best candidate of
//! the step, finishing or not, cannot beat the worst of them, or when the
//! live beams reach `max_length`.

use std::cmp::Ordering;

use crate::config::GenerationParams;
use crate::errors::{Result, SummarizerError};

/// Supplies next-token log-probabilities for a set of prefixes.
pub trait StepScorer {
    /// One log-probability vector over the vocabulary per prefix.
    ///
    /// Every prefix passed in a call has the same length.
    fn next_token_log_probs(&mut self, prefixes: &[Vec<u32>]) -> Result<Vec<Vec<f32>>>;
}

/// Beam search decoding parameters plus the special token ids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSearch {
    num_beams: usize,
    length_penalty: f64,
    max_length: usize,
    start_token: u32,
    eos_token: u32,
}

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<u32>,
    score: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    beam: usize,
    token: u32,
}

/// Finished hypotheses, capped at `num_beams`.
#[derive(Debug)]
struct Finished {
    capacity: usize,
    length_penalty: f64,
    hypotheses: Vec<(f64, Vec<u32>)>,
}

impl Finished {
    fn normalize(&self, sum_logprob: f64, len: usize) -> f64 {
        sum_logprob / (len as f64).powf(self.length_penalty)
    }

    fn worst(&self) -> f64 {
        self.hypotheses
            .iter()
            .map(|(score, _)| *score)
            .min_by(f64::total_cmp)
            .unwrap_or(f64::NEG_INFINITY)
    }

    fn add(&mut self, tokens: Vec<u32>, sum_logprob: f64) {
        let score = self.normalize(sum_logprob, tokens.len());
        if self.hypotheses.len() < self.capacity || score > self.worst() {
            self.hypotheses.push((score, tokens));
            if self.hypotheses.len() > self.capacity {
                if let Some(worst) = self
                    .hypotheses
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
                    .map(|(i, _)| i)
                {
                    self.hypotheses.remove(worst);
                }
            }
        }
    }

    fn is_full(&self) -> bool {
        self.hypotheses.len() >= self.capacity
    }

    /// Highest score; the earliest finished hypothesis wins ties.
    fn best(self) -> Option<Vec<u32>> {
        let mut best: Option<(f64, Vec<u32>)> = None;
        for (score, tokens) in self.hypotheses {
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, tokens));
            }
        }
        best.map(|(_, tokens)| tokens)
    }
}

/// Descending score; ties broken by beam then token for a stable order.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.beam.cmp(&b.beam))
        .then(a.token.cmp(&b.token))
}

impl BeamSearch {
    /// Creates a search from generation parameters.
    pub fn new(params: &GenerationParams, start_token: u32, eos_token: u32) -> Result<Self> {
        if params.num_beams == 0 {
            return Err(SummarizerError::Model("num_beams must be at least 1".to_string()));
        }
        if params.max_length < 2 {
            return Err(SummarizerError::Model(
                "max_length must leave room for one generated token".to_string(),
            ));
        }
        Ok(Self {
            num_beams: params.num_beams,
            length_penalty: params.length_penalty,
            max_length: params.max_length,
            start_token,
            eos_token,
        })
    }

    /// Runs the search and returns the best hypothesis without the start
    /// token or the end-of-sequence token.
    pub fn generate(&self, scorer: &mut dyn StepScorer) -> Result<Vec<u32>> {
        let width = 2 * self.num_beams;
        let mut finished = Finished {
            capacity: self.num_beams,
            length_penalty: self.length_penalty,
            hypotheses: Vec::new(),
        };
        let mut alive = vec![Beam {
            tokens: vec![self.start_token],
            score: 0.0,
        }];

        while alive[0].tokens.len() < self.max_length {
            let cur_len = alive[0].tokens.len();
            let prefixes: Vec<Vec<u32>> = alive.iter().map(|b| b.tokens.clone()).collect();
            let log_probs = scorer.next_token_log_probs(&prefixes)?;
            if log_probs.len() != alive.len() {
                return Err(SummarizerError::Model(format!(
                    "scorer returned {} rows for {} prefixes",
                    log_probs.len(),
                    alive.len()
                )));
            }

            let mut candidates = Vec::with_capacity(alive.len() * width);
            for (beam_idx, (beam, row)) in alive.iter().zip(&log_probs).enumerate() {
                candidates.extend(top_tokens(row, width).into_iter().map(|(token, lp)| {
                    Candidate {
                        score: beam.score + f64::from(lp),
                        beam: beam_idx,
                        token,
                    }
                }));
            }
            candidates.sort_by(rank);
            candidates.truncate(width);
            let best_candidate = candidates.first().map_or(f64::NEG_INFINITY, |c| c.score);

            let mut next = Vec::with_capacity(self.num_beams);
            for (position, candidate) in candidates.iter().enumerate() {
                let parent = &alive[candidate.beam];
                if candidate.token == self.eos_token {
                    if position < self.num_beams {
                        finished.add(parent.tokens.clone(), candidate.score);
                    }
                } else {
                    let mut tokens = parent.tokens.clone();
                    tokens.push(candidate.token);
                    next.push(Beam {
                        tokens,
                        score: candidate.score,
                    });
                }
                if next.len() == self.num_beams {
                    break;
                }
            }

            if next.is_empty() {
                break;
            }

            alive = next;
            if finished.is_full() && finished.worst() >= finished.normalize(best_candidate, cur_len) {
                return Ok(strip_start(finished.best()));
            }
        }

        for beam in alive {
            finished.add(beam.tokens, beam.score);
        }
        Ok(strip_start(finished.best()))
    }
}

fn strip_start(tokens: Option<Vec<u32>>) -> Vec<u32> {
    tokens
        .map(|mut t| {
            if !t.is_empty() {
                t.remove(0);
            }
            t
        })
        .unwrap_or_default()
}

/// The `k` highest log-probabilities of one row, as `(token, log_prob)`.
fn top_tokens(row: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = row
        .iter()
        .enumerate()
        .filter_map(|(i, lp)| u32::try_from(i).ok().map(|i| (i, *lp)))
        .collect();
    let by_score = |a: &(u32, f32), b: &(u32, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
    if indexed.len() > k {
        indexed.select_nth_unstable_by(k, by_score);
        indexed.truncate(k);
    }
    indexed.sort_by(by_score);
    indexed
}
