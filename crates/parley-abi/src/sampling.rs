use serde::{Deserialize, Serialize};

/// Seed value that asks the engine to pick a random seed (llama.cpp's `LLAMA_DEFAULT_SEED`).
pub const RANDOM_SEED: u32 = 0xFFFF_FFFF;

/// Sampler chain settings: min-p filter → temperature scaling → distribution draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Minimum probability relative to the most likely token; `0.0` disables the filter.
    pub min_p: f32,
    /// Temperature applied before the final draw; `0.0` collapses to greedy.
    pub temperature: f32,
    pub seed: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            min_p: 0.05,
            temperature: 0.8,
            seed: RANDOM_SEED,
        }
    }
}

impl SamplingParams {
    /// Returns a clamped copy that every backend can apply without special cases.
    ///
    /// - `min_p` outside `[0, 1]` (or NaN) → clamped, NaN → 0
    /// - negative or NaN temperature → 0
    pub fn normalized(&self) -> Self {
        let mut p = *self;
        p.min_p = if p.min_p.is_nan() {
            0.0
        } else {
            p.min_p.clamp(0.0, 1.0)
        };
        if p.temperature.is_nan() || p.temperature < 0.0 {
            p.temperature = 0.0;
        }
        p
    }
}
