//! Injectable randomness for the scheduler and churn evaluator.
//!
//! Every probabilistic decision in the engine goes through [`RandomSource`],
//! so tests can script the exact sequence of draws instead of seeding a global
//! generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// A source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize {
        let scaled = (self.next_f64() * len as f64) as usize;
        scaled.min(len.saturating_sub(1))
    }

    /// In-place Fisher-Yates shuffle.
    fn shuffle<T>(&mut self, items: &mut [T])
    where
        Self: Sized,
    {
        shuffle_with(self, items);
    }
}

/// Fisher-Yates over a trait object.
pub fn shuffle_with<T, R: RandomSource + ?Sized>(rng: &mut R, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.pick_index(i + 1);
        items.swap(i, j);
    }
}

/// The default source, backed by `rand`'s [`StdRng`].
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, then repeats `fallback` forever.
///
/// ```
/// use agentroom::random::{RandomSource, ScriptedRandom};
///
/// let mut rng = ScriptedRandom::new([0.1, 0.9]).with_fallback(0.5);
/// assert_eq!(rng.next_f64(), 0.1);
/// assert_eq!(rng.next_f64(), 0.9);
/// assert_eq!(rng.next_f64(), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    draws: VecDeque<f64>,
    fallback: f64,
    consumed: usize,
}

impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            fallback: 0.0,
            consumed: 0,
        }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new([]).with_fallback(value)
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    /// Number of draws taken so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.consumed += 1;
        self.draws.pop_front().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_index_stays_in_range() {
        let mut rng = ScriptedRandom::new([0.0, 0.5, 0.999_999]);
        assert_eq!(rng.pick_index(4), 0);
        assert_eq!(rng.pick_index(4), 2);
        assert_eq!(rng.pick_index(4), 3);
    }

    #[test]
    fn test_shuffle_keeps_elements() {
        let mut rng = StdRandom::seeded(7);
        let mut items = vec![1, 2, 3, 4, 5];
        rng.shuffle(&mut items);
        items.sort();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_constant_source_counts_draws() {
        let mut rng = ScriptedRandom::constant(0.25);
        rng.next_f64();
        rng.next_f64();
        assert_eq!(rng.consumed(), 2);
    }
}
