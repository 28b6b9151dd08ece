//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Bounded scalar gauge used for transformer temperature."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Single value constrained to `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarGauge {
    value: f64,
    low: f64,
    high: f64,
}

impl ScalarGauge {
    /// Gauge starting at `initial`; the start value is taken as given.
    pub fn new(initial: f64, low: f64, high: f64) -> Self {
        Self {
            value: initial.clamp(low, high),
            low,
            high,
        }
    }

    /// Raw value, unrounded.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// `(low, high)`.
    pub fn bounds(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    /// Overwrite the value ahead of the next step. Not clamped here: the
    /// following [`ScalarGauge::step`] brings it back into bounds.
    pub fn set(&mut self, value: f64) {
        self.value = value;
    }

    /// `value = clamp(value + delta, low, high)`; returns the new value.
    pub fn step(&mut self, delta: f64) -> f64 {
        self.value = (self.value + delta).clamp(self.low, self.high);
        self.value
    }

    /// Whole-degree reading shown on the dashboard.
    pub fn display(&self) -> i64 {
        self.value.round() as i64
    }

    /// Band of the raw value, see [`TemperatureBand::classify`].
    pub fn band(&self) -> TemperatureBand {
        TemperatureBand::classify(self.value)
    }
}

/// Colour band used when presenting the temperature gauge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureBand {
    Normal,
    Elevated,
    Critical,
}

impl TemperatureBand {
    /// Critical above 75, elevated above 65, normal otherwise. Boundaries belong to the lower band.
    pub fn classify(value: f64) -> Self {
        if value > 75.0 {
            TemperatureBand::Critical
        } else if value > 65.0 {
            TemperatureBand::Elevated
        } else {
            TemperatureBand::Normal
        }
    }

    /// CSS colour for the band.
    pub fn colour(&self) -> &'static str {
        match self {
            TemperatureBand::Normal => "#4299e1",
            TemperatureBand::Elevated => "#ed8936",
            TemperatureBand::Critical => "#f56565",
        }
    }
}
