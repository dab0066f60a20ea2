//! Injectable randomness for the reward draw and the starting cursor.

use std::collections::VecDeque;

use mistake_types::Outcome;

/// Source of uniform samples in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&mut self) -> f64 {
        rand::random::<f64>()
    }
}

/// Replays a fixed list of samples, cycling when exhausted.
///
/// An empty script always yields `0.0`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    samples: VecDeque<f64>,
}

impl ScriptedRandom {
    #[must_use]
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        match self.samples.pop_front() {
            Some(sample) => {
                self.samples.push_back(sample);
                sample
            }
            None => 0.0,
        }
    }
}

/// Uniform index in `[0, len)`. `len` must be non-zero.
pub fn uniform_index(source: &mut dyn RandomSource, len: usize) -> usize {
    debug_assert!(len > 0);
    let sample = source.next_unit().clamp(0.0, 1.0);
    ((sample * len as f64) as usize).min(len.saturating_sub(1))
}

/// Bernoulli draw: rewarded with probability `p_correct`.
pub fn draw_outcome(source: &mut dyn RandomSource, p_correct: f64, reward: u32) -> Outcome {
    if source.next_unit() < p_correct {
        Outcome::correct(reward)
    } else {
        Outcome::incorrect()
    }
}
