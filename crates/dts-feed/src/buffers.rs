//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Bounded buffers backing the voltage and current charts."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamped value held by a [`TimeSeriesBuffer`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    /// Wall-clock time the value was recorded.
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Labelled point handed to a render sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    /// Axis label: `HH:MM:SS` for time series, the slot number for bars.
    pub label: String,
    pub value: f64,
}

/// Rolling series with FIFO eviction once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl TimeSeriesBuffer {
    /// Create an empty buffer holding at most `capacity` samples (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a sample, returning the evicted oldest entry if the buffer overflowed.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) -> Option<Sample> {
        self.samples.push_back(Sample { timestamp, value });
        if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        }
    }

    /// Drop every sample; the capacity is kept.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no sample has been pushed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Samples oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Points labelled with wall-clock time, oldest first.
    pub fn points(&self) -> Vec<SeriesPoint> {
        self.samples
            .iter()
            .map(|sample| SeriesPoint {
                label: sample.timestamp.format("%H:%M:%S").to_string(),
                value: sample.value,
            })
            .collect()
    }
}

/// Fixed set of slots updated by overwriting one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotBuffer {
    slots: Vec<f64>,
    last_written: Option<usize>,
}

impl SlotBuffer {
    /// Create a buffer whose slot count and initial values come from `seed`.
    pub fn new(seed: impl Into<Vec<f64>>) -> Self {
        Self {
            slots: seed.into(),
            last_written: None,
        }
    }

    /// Replace the slot at `index`, returning the previous value.
    ///
    /// Out-of-range indices leave the buffer untouched.
    pub fn overwrite(&mut self, index: usize, value: f64) -> Option<f64> {
        let slot = self.slots.get_mut(index)?;
        self.last_written = Some(index);
        Some(std::mem::replace(slot, value))
    }

    /// Value most recently written by [`SlotBuffer::overwrite`]; `None` while only seed values are held.
    pub fn latest(&self) -> Option<f64> {
        self.last_written.map(|index| self.slots[index])
    }

    /// Number of slots; constant for the lifetime of the buffer.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the buffer was seeded without slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot values in label order.
    pub fn values(&self) -> &[f64] {
        &self.slots
    }

    /// Points labelled `"1"`..`"n"`.
    pub fn points(&self) -> Vec<SeriesPoint> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, value)| SeriesPoint {
                label: (idx + 1).to_string(),
                value: *value,
            })
            .collect()
    }
}
