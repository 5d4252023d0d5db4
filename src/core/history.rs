//! Bounded per-key sample history.
//!
//! Series are values: appending returns a new series and leaves the old one
//! untouched, so a snapshot holding the old series stays consistent while a
//! refresh builds the next one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RATE_HISTORY_CAPACITY: usize = 30;
pub const PRICE_HISTORY_CAPACITY: usize = 20;

pub trait Sample: Clone + Send + Sync + 'static {
    fn value(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
}

impl Sample for RateSample {
    fn value(&self) -> f64 {
        self.rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSample {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl Sample for QuoteSample {
    fn value(&self) -> f64 {
        self.price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSeries<S> {
    samples: Vec<S>,
    capacity: usize,
}

impl<S: Sample> TrackedSeries<S> {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TrackedSeries {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns a new series with `sample` appended, evicting the oldest
    /// samples so that `len() <= capacity()`.
    pub fn append(&self, sample: S) -> Self {
        let keep = (self.capacity - 1).min(self.samples.len());
        let mut samples = Vec::with_capacity(self.capacity);
        samples.extend_from_slice(&self.samples[self.samples.len() - keep..]);
        samples.push(sample);
        TrackedSeries {
            samples,
            capacity: self.capacity,
        }
    }

    /// Newest value minus the one before it.
    pub fn delta(&self) -> Option<f64> {
        match self.samples.as_slice() {
            [.., previous, last] => Some(last.value() - previous.value()),
            _ => None,
        }
    }

    pub fn samples(&self) -> &[S] {
        &self.samples
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

}

/// One series per tracked key. Series are created on the first recorded
/// sample and never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBook<S> {
    capacity: usize,
    series: BTreeMap<String, TrackedSeries<S>>,
}

impl<S: Sample> SeriesBook<S> {
    pub fn new(capacity: usize) -> Self {
        SeriesBook {
            capacity,
            series: BTreeMap::new(),
        }
    }

    pub fn record(&self, key: &str, sample: S) -> Self {
        let updated = match self.series.get(key) {
            Some(existing) => existing.append(sample),
            None => TrackedSeries::new(self.capacity).append(sample),
        };
        let mut series = self.series.clone();
        series.insert(key.to_string(), updated);
        SeriesBook {
            capacity: self.capacity,
            series,
        }
    }

    pub fn get(&self, key: &str) -> Option<&TrackedSeries<S>> {
        self.series.get(key)
    }

    pub fn delta(&self, key: &str) -> Option<f64> {
        self.series.get(key).and_then(TrackedSeries::delta)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
