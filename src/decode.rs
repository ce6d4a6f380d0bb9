//! Greedy alignment-free (CTC-style) decoding of frame-wise model output.

use crate::error::{RecognizeError, Result};
use crate::labels::Alphabet;

/// Raw sequence-model output: `steps` rows of `classes` scores, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameGrid {
    steps: usize,
    classes: usize,
    scores: Vec<f32>,
}

impl FrameGrid {
    pub fn new(steps: usize, classes: usize, scores: Vec<f32>) -> Result<Self> {
        if steps == 0 {
            return Err(RecognizeError::InvalidModelOutput("frame grid has no time steps".into()));
        }
        if classes == 0 {
            return Err(RecognizeError::InvalidModelOutput("frame grid has no classes".into()));
        }
        if scores.len() != steps * classes {
            return Err(RecognizeError::InvalidModelOutput(format!(
                "frame grid of {steps}×{classes} holds {} scores",
                scores.len()
            )));
        }
        Ok(Self {
            steps,
            classes,
            scores,
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn step(&self, t: usize) -> &[f32] {
        &self.scores[t * self.classes..(t + 1) * self.classes]
    }
}

/// Decoded symbols plus the mean per-step top probability.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSequence {
    pub text: String,
    pub indices: Vec<usize>,
    pub confidence: f64,
}

/// Index of the highest score; the earliest index wins ties.
fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in scores.iter().enumerate() {
        if v > scores[best] {
            best = i;
        }
    }
    best
}

/// Largest softmax probability of one step, computed stably.
fn max_probability(scores: &[f32]) -> f64 {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let sum: f64 = scores.iter().map(|&v| (v as f64 - max).exp()).sum();
    1.0 / sum
}

/// Argmax per step, merge consecutive repeats, drop blanks.
///
/// A blank between two equal symbols keeps both: `X X X _ X` decodes to `XX`.
pub fn greedy_decode(grid: &FrameGrid, alphabet: &Alphabet) -> Result<DecodedSequence> {
    if grid.classes() != alphabet.len() {
        return Err(RecognizeError::InvalidModelOutput(format!(
            "frame grid has {} classes but the alphabet has {} symbols",
            grid.classes(),
            alphabet.len()
        )));
    }

    let blank = alphabet.blank_index();
    let mut indices = Vec::new();
    let mut text = String::new();
    let mut prev: Option<usize> = None;
    let mut confidence_sum = 0.0;

    for t in 0..grid.steps() {
        let scores = grid.step(t);
        confidence_sum += max_probability(scores);

        let best = argmax(scores);
        if best == blank {
            prev = None;
            continue;
        }
        if prev != Some(best) {
            indices.push(best);
            if let Some(symbol) = alphabet.symbol(best) {
                text.push_str(symbol);
            }
        }
        prev = Some(best);
    }

    Ok(DecodedSequence {
        text,
        indices,
        confidence: confidence_sum / grid.steps() as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet() -> Alphabet {
        Alphabet::new(vec!["<blank>".into(), "X".into(), "Y".into()]).unwrap()
    }

    /// One row per label; the labelled class gets a clear lead.
    fn grid(labels: &[usize]) -> FrameGrid {
        let mut scores = Vec::new();
        for &l in labels {
            let mut row = vec![0.0f32; 3];
            row[l] = 5.0;
            scores.extend(row);
        }
        FrameGrid::new(labels.len(), 3, scores).unwrap()
    }

    #[test]
    fn runs_split_by_blank_stay_separate() {
        let g = grid(&[1, 1, 1, 1, 1, 0, 0, 1, 1, 1]);
        let out = greedy_decode(&g, &alphabet()).unwrap();
        assert_eq!(out.text, "XX");
        assert_eq!(out.indices, vec![1, 1]);
    }

    #[test]
    fn adjacent_different_symbols_both_emitted() {
        let out = greedy_decode(&grid(&[1, 1, 2, 2, 1]), &alphabet()).unwrap();
        assert_eq!(out.text, "XYX");
    }

    #[test]
    fn all_blank_is_empty_with_step_confidence() {
        let out = greedy_decode(&grid(&[0, 0, 0]), &alphabet()).unwrap();
        assert_eq!(out.text, "");
        let expected = 5f64.exp() / (5f64.exp() + 2.0);
        assert!((out.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn confidence_averages_softmax_maxima() {
        let g = FrameGrid::new(2, 3, vec![0.0, 0.0, 0.0, 0.0, 10.0, 0.0]).unwrap();
        let out = greedy_decode(&g, &alphabet()).unwrap();
        let second = 10f64.exp() / (10f64.exp() + 2.0);
        assert!((out.confidence - (1.0 / 3.0 + second) / 2.0).abs() < 1e-9);
        // Flat first step ties to index 0, the blank.
        assert_eq!(out.text, "X");
    }

    #[test]
    fn zero_length_grid_is_rejected() {
        assert!(matches!(
            FrameGrid::new(0, 3, vec![]),
            Err(RecognizeError::InvalidModelOutput(_))
        ));
    }

    #[test]
    fn alphabet_width_mismatch_is_rejected() {
        let g = FrameGrid::new(1, 4, vec![0.0; 4]).unwrap();
        assert!(greedy_decode(&g, &alphabet()).is_err());
    }
}
