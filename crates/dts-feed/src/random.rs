//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Random sources driving synthetic telemetry."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use rand::prelude::*;

/// Source of randomness consumed by the synthetic generator.
///
/// Every draw the controller makes goes through this trait so tests can pin
/// the generator to exact values.
pub trait RandomSource: Send + std::fmt::Debug {
    /// Real value in `[low, high)`; returns `low` when the range is empty.
    fn uniform(&mut self, low: f64, high: f64) -> f64;

    /// Integer in `[low, high]` inclusive.
    fn uniform_int(&mut self, low: u32, high: u32) -> u32;

    /// Slot index in `[0, len)`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize;
}

/// `StdRng`-backed source, reproducible when constructed from a seed.
#[derive(Debug)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is present, entropy-backed otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if low < high {
            self.rng.gen_range(low..high)
        } else {
            low
        }
    }

    fn uniform_int(&mut self, low: u32, high: u32) -> u32 {
        if low < high {
            self.rng.gen_range(low..=high)
        } else {
            low
        }
    }

    fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "index drawn from an empty range");
        self.rng.gen_range(0..len.max(1))
    }
}

/// Deterministic source returning the same draw on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixedRandom {
    /// Always this value, clamped into the requested range.
    Value(f64),
    /// Always the upper end of the requested range.
    Upper,
    /// Always the lower end of the requested range.
    Lower,
}

impl RandomSource for FixedRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        match *self {
            FixedRandom::Value(value) => value.clamp(low.min(high), high.max(low)),
            FixedRandom::Upper => high,
            FixedRandom::Lower => low,
        }
    }

    fn uniform_int(&mut self, low: u32, high: u32) -> u32 {
        match *self {
            FixedRandom::Value(value) => {
                let rounded = value.round().max(0.0) as u32;
                rounded.clamp(low.min(high), high.max(low))
            }
            FixedRandom::Upper => high,
            FixedRandom::Lower => low,
        }
    }

    fn index(&mut self, len: usize) -> usize {
        let last = len.saturating_sub(1);
        match *self {
            FixedRandom::Value(value) => (value.max(0.0) as usize).min(last),
            FixedRandom::Upper => last,
            FixedRandom::Lower => 0,
        }
    }
}
