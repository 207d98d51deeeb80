//! Uniform randomness consumed by setup.

#[cfg(any(test, feature = "test-support"))]
use std::collections::VecDeque;

use rand::{Rng, RngCore};

/// Source of the uniform draws used while generating a unit.
pub trait RandomSource {
    /// Uniform float in `[0, 1)`.
    fn next_unit(&mut self) -> f32;

    /// Uniform integer in `[0, bound)`. Returns 0 when `bound` is 0.
    fn next_below(&mut self, bound: u32) -> u32;

    /// Uniform float between `min` and `max`.
    fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_unit() * (max - min)
    }
}

impl<R: RngCore> RandomSource for R {
    fn next_unit(&mut self) -> f32 {
        self.gen::<f32>()
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.gen_range(0..bound)
    }
}

/// Replays a fixed script of draws, falling back to constants once exhausted.
///
/// Lets fixtures pin an exact maze layout without depending on a generator's
/// internal stream. Only built for tests and the `test-support` feature.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Debug)]
pub struct ScriptedRandom {
    units: VecDeque<f32>,
    indices: VecDeque<u32>,
    fallback_unit: f32,
    fallback_index: u32,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedRandom {
    /// Creates a script that answers every draw with the provided fallbacks.
    #[must_use]
    pub fn new(fallback_unit: f32, fallback_index: u32) -> Self {
        Self {
            units: VecDeque::new(),
            indices: VecDeque::new(),
            fallback_unit,
            fallback_index,
        }
    }

    /// Queues float draws to be returned before the fallback.
    #[must_use]
    pub fn with_units(mut self, units: impl IntoIterator<Item = f32>) -> Self {
        self.units.extend(units);
        self
    }

    /// Queues integer draws to be returned before the fallback.
    #[must_use]
    pub fn with_indices(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.indices.extend(indices);
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f32 {
        self.units
            .pop_front()
            .unwrap_or(self.fallback_unit)
            .clamp(0.0, 0.999_999)
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.indices.pop_front().unwrap_or(self.fallback_index) % bound
    }
}
