//! Weighted scoring and weighted random selection.
//!
//! - `overall_score`: 40/30/30 blend of relevance, confidence and priority
//! - `weighted_pick`: proportional pick by weight for A/B testing
//! - `RandomSource`: injectable randomness so selection is reproducible in
//!   tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sub-score weights in tenths (0.4 / 0.3 / 0.3)
pub const RELEVANCE_WEIGHT: u32 = 4;
pub const CONFIDENCE_WEIGHT: u32 = 3;
pub const PRIORITY_WEIGHT: u32 = 3;

/// Combine three 0-100 sub-scores into one overall 0-100 score
///
/// Computed in integer tenths so halves always round up.
pub fn overall_score(relevance: u8, confidence: u8, priority: u8) -> u8 {
    let tenths = relevance as u32 * RELEVANCE_WEIGHT
        + confidence as u32 * CONFIDENCE_WEIGHT
        + priority as u32 * PRIORITY_WEIGHT;
    ((tenths + 5) / 10).min(100) as u8
}

/// Confidence (0-100) from the number of observed samples
///
/// Uses sigmoid: confidence = 1 / (1 + e^(-(samples - 10) / 5))
/// - 0 samples → ~12
/// - 10 samples → 50
/// - 20 samples → ~88
pub fn confidence_from_samples(samples: u32) -> u8 {
    let x = (samples as f64 - 10.0) / 5.0;
    (100.0 / (1.0 + (-x).exp())).round() as u8
}

/// Source of uniform random values in [0, 1)
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Thread-local RNG from `rand`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&mut self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible RNG seeded from a u64
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Cycles through a fixed list of values
///
/// Values outside [0, 1) are clamped into range. An empty list always
/// yields 0.
#[derive(Debug, Clone)]
pub struct FixedSequence {
    values: Vec<f64>,
    index: usize,
}

impl FixedSequence {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, index: 0 }
    }
}

impl RandomSource for FixedSequence {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.index % self.values.len()];
        self.index += 1;
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Pick an index with probability proportional to its weight
///
/// Draws uniformly in [0, total) and returns the first positive-weight
/// index whose cumulative weight reaches the draw (`>=`). Zero-weight
/// entries are skipped, so they never win even for a draw of 0.
/// Returns `None` for an empty slice and index 0 when every weight is zero
/// (or negative / non-finite, which count as zero).
pub fn weighted_pick(weights: &[f64], rng: &mut dyn RandomSource) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let effective = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
    let total: f64 = weights.iter().copied().map(effective).sum();
    if total <= 0.0 {
        return Some(0);
    }

    let draw = rng.next_unit() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (index, weight) in weights.iter().copied().map(effective).enumerate() {
        if weight == 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = index;
        if cumulative >= draw {
            return Some(index);
        }
    }

    // Floating point rounding can leave the draw at the very top
    Some(last_positive)
}
