//! Process-wide randomness.
//!
//! Every game draws from one [GameRng] handle. Clones share the same
//! underlying stream.

use rand::{
    distributions::{Distribution, WeightedIndex},
    seq::SliceRandom,
    Rng, SeedableRng,
};
use rand_chacha::ChaCha20Rng;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

struct Source {
    rng: ChaCha20Rng,
    /// Draws served before the stream (test builds only ever fill this).
    script: VecDeque<f64>,
}

impl Source {
    fn scripted(&mut self) -> Option<f64> {
        self.script.pop_front()
    }
}

/// Shared handle to a cryptographically seeded random source.
#[derive(Clone)]
pub struct GameRng {
    source: Arc<Mutex<Source>>,
}

impl GameRng {
    /// Seed from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self::from_rng(ChaCha20Rng::from_entropy())
    }

    fn from_rng(rng: ChaCha20Rng) -> Self {
        Self {
            source: Arc::new(Mutex::new(Source {
                rng,
                script: VecDeque::new(),
            })),
        }
    }

    /// Reproducible stream for tests.
    #[cfg(any(test, feature = "mocks"))]
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    /// Serve `draws` (each in `[0, 1)`) before falling back to a seeded stream.
    ///
    /// Every primitive consumes exactly one scripted draw, so a test can force
    /// any outcome by choosing where in the unit interval it lands.
    #[cfg(any(test, feature = "mocks"))]
    pub fn scripted(draws: impl IntoIterator<Item = f64>, seed: u64) -> Self {
        let rng = Self::seeded(seed);
        rng.push(draws);
        rng
    }

    /// Append scripted draws.
    #[cfg(any(test, feature = "mocks"))]
    pub fn push(&self, draws: impl IntoIterator<Item = f64>) {
        self.with(|source| source.script.extend(draws));
    }

    fn with<R>(&self, f: impl FnOnce(&mut Source) -> R) -> R {
        let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut source)
    }

    /// Uniform float in `[0, 1)`.
    pub fn float(&self) -> f64 {
        self.with(|source| match source.scripted() {
            Some(draw) => draw,
            None => source.rng.gen::<f64>(),
        })
    }

    /// Uniform float in `[low, high)` (or `low` when the range is empty).
    pub fn uniform(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        low + self.float() * (high - low)
    }

    /// `true` with probability `p`.
    pub fn chance(&self, p: f64) -> bool {
        self.float() < p
    }

    /// Uniform integer in `[low, high]`.
    pub fn int(&self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.with(|source| match source.scripted() {
            Some(draw) => {
                let span = (high - low) as f64 + 1.0;
                (low + (draw * span) as u64).min(high)
            }
            None => source.rng.gen_range(low..=high),
        })
    }

    /// Uniform element of a slice.
    pub fn choice<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.int(0, items.len() as u64 - 1) as usize;
        items.get(index)
    }

    /// Index drawn proportionally to `weights`.
    ///
    /// Returns [None] when no weight is positive or any weight is invalid.
    pub fn weighted(&self, weights: &[f64]) -> Option<usize> {
        let distribution = WeightedIndex::<f64>::new(weights).ok()?;
        self.with(|source| match source.scripted() {
            Some(draw) => {
                let total: f64 = weights.iter().sum();
                let target = draw * total;
                let mut cumulative = 0.0;
                let mut last = None;
                for (index, weight) in weights.iter().enumerate() {
                    if *weight <= 0.0 {
                        continue;
                    }
                    cumulative += weight;
                    last = Some(index);
                    if target < cumulative {
                        return last;
                    }
                }
                last
            }
            None => Some(distribution.sample(&mut source.rng)),
        })
    }

    /// `k` elements drawn with replacement, proportionally to `weights`.
    pub fn choices<'a, T>(&self, population: &'a [T], weights: &[f64], k: usize) -> Vec<&'a T> {
        if population.len() != weights.len() {
            return Vec::new();
        }
        (0..k)
            .filter_map(|_| self.weighted(weights).and_then(|i| population.get(i)))
            .collect()
    }

    pub fn shuffle<T>(&self, items: &mut [T]) {
        self.with(|source| items.shuffle(&mut source.rng));
    }
}
