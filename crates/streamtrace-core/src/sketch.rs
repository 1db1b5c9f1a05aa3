//! DDSketch quantile sketch (component C).
//!
//! Summarizes a distribution of `f64` samples with bounded relative
//! accuracy, partitioned into three stores: negative values, a zero count,
//! and positive values, each positive/negative side backed by a
//! [`DenseStore`] addressed through a [`LogarithmicMapping`].

use crate::dense_store::DenseStore;
use crate::mapping::{LogarithmicMapping, MappingError};

/// Default target relative accuracy for a freshly constructed sketch.
pub const DEFAULT_RELATIVE_ACCURACY: f64 = 0.01;

/// Error type for sketch operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SketchError {
    /// `add_with_count` was called with a negative count.
    NegativeCount(f64),
    /// `get_value_at_quantile` was called outside `[0, 1]`.
    QuantileOutOfRange(f64),
    /// The mapping could not be constructed.
    Mapping(MappingError),
}

impl core::fmt::Display for SketchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NegativeCount(c) => write!(f, "count {c} must be >= 0"),
            Self::QuantileOutOfRange(q) => write!(f, "quantile {q} is not in [0, 1]"),
            Self::Mapping(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SketchError {}

impl From<MappingError> for SketchError {
    fn from(e: MappingError) -> Self {
        Self::Mapping(e)
    }
}

/// A DDSketch quantile summary.
#[derive(Debug, Clone)]
pub struct DDSketch {
    mapping: LogarithmicMapping,
    positive_store: DenseStore,
    negative_store: DenseStore,
    zero_count: f64,
}

impl DDSketch {
    /// Builds a sketch with the given target relative accuracy.
    pub fn new(relative_accuracy: f64) -> Result<Self, SketchError> {
        Ok(Self {
            mapping: LogarithmicMapping::new(relative_accuracy)?,
            positive_store: DenseStore::new(),
            negative_store: DenseStore::new(),
            zero_count: 0.0,
        })
    }

    /// Builds a sketch with the default relative accuracy (`0.01`), the
    /// construction used throughout the aggregator.
    pub fn with_default_accuracy() -> Self {
        Self::new(DEFAULT_RELATIVE_ACCURACY).expect("default relative accuracy is always valid")
    }

    pub fn mapping(&self) -> &LogarithmicMapping {
        &self.mapping
    }

    pub fn positive_store(&self) -> &DenseStore {
        &self.positive_store
    }

    pub fn negative_store(&self) -> &DenseStore {
        &self.negative_store
    }

    pub fn zero_count(&self) -> f64 {
        self.zero_count
    }

    pub fn total_count(&self) -> f64 {
        self.zero_count + self.positive_store.total_count() + self.negative_store.total_count()
    }

    pub fn empty(&self) -> bool {
        self.total_count() == 0.0
    }

    /// Adds one occurrence of `v`.
    pub fn add(&mut self, v: f64) -> Result<(), SketchError> {
        self.add_with_count(v, 1.0)
    }

    /// Adds `v` with an explicit (non-negative) count.
    pub fn add_with_count(&mut self, v: f64, count: f64) -> Result<(), SketchError> {
        if count < 0.0 {
            return Err(SketchError::NegativeCount(count));
        }
        if count == 0.0 {
            return Ok(());
        }
        if v > 0.0 {
            self.positive_store.add(self.mapping.index(v), count);
        } else if v < 0.0 {
            self.negative_store.add(self.mapping.index(-v), count);
        } else {
            self.zero_count += count;
        }
        Ok(())
    }

    /// The value at quantile `q`, or `None` if the sketch has no samples.
    pub fn get_value_at_quantile(&self, q: f64) -> Result<Option<f64>, SketchError> {
        if !(0.0..=1.0).contains(&q) {
            return Err(SketchError::QuantileOutOfRange(q));
        }
        let n = self.total_count();
        if n == 0.0 {
            return Ok(None);
        }
        let rank = q * (n - 1.0);

        if rank < self.negative_store.total_count() {
            // Rank falls in the negative partition: the negative store is
            // scanned from its high end (closest to zero) since negative
            // magnitudes grow as values move away from zero.
            let reversed_rank = self.negative_store.total_count() - 1.0 - rank;
            let key = self.negative_store.key_at_rank(reversed_rank);
            return Ok(Some(-self.mapping.value(key)));
        }
        if rank < self.negative_store.total_count() + self.zero_count {
            return Ok(Some(0.0));
        }
        let positive_rank = rank - self.negative_store.total_count() - self.zero_count;
        let key = self.positive_store.key_at_rank(positive_rank);
        Ok(Some(self.mapping.value(key)))
    }

    /// Merges `other` into `self` in place. Both sketches must share an
    /// equal mapping; this is a programmer-bug precondition, not a
    /// recoverable error.
    pub fn merge_from(&mut self, other: &DDSketch) {
        debug_assert!(
            self.mapping.equals(&other.mapping),
            "cannot merge sketches with incompatible mappings"
        );
        self.zero_count += other.zero_count;
        for (index, count) in dense_store_entries(&other.positive_store) {
            self.positive_store.add(index, count);
        }
        for (index, count) in dense_store_entries(&other.negative_store) {
            self.negative_store.add(index, count);
        }
    }
}

fn dense_store_entries(store: &DenseStore) -> Vec<(i32, f64)> {
    if store.empty() {
        return Vec::new();
    }
    let (wire, offset) = store.to_wire();
    wire.into_iter()
        .enumerate()
        .filter(|(_, c)| *c != 0.0)
        .map(|(i, c)| (offset + i as i32, c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_on_empty_sketch_is_none() {
        let sketch = DDSketch::with_default_accuracy();
        assert_eq!(sketch.get_value_at_quantile(0.5).unwrap(), None);
    }

    #[test]
    fn quantile_out_of_range_is_an_error() {
        let sketch = DDSketch::with_default_accuracy();
        assert!(sketch.get_value_at_quantile(-0.1).is_err());
        assert!(sketch.get_value_at_quantile(1.1).is_err());
    }

    #[test]
    fn negative_count_is_rejected() {
        let mut sketch = DDSketch::with_default_accuracy();
        assert!(sketch.add_with_count(1.0, -1.0).is_err());
    }

    #[test]
    fn zero_count_add_is_a_noop() {
        let mut sketch = DDSketch::with_default_accuracy();
        sketch.add_with_count(5.0, 0.0).unwrap();
        assert!(sketch.empty());
    }

    #[test]
    fn count_invariant_holds() {
        let mut sketch = DDSketch::with_default_accuracy();
        for v in [-3.0, -1.0, 0.0, 0.0, 2.0, 5.0, 100.0] {
            sketch.add(v).unwrap();
        }
        assert_eq!(sketch.total_count(), 7.0);
        assert_eq!(sketch.zero_count(), 2.0);
    }

    #[test]
    fn quantile_is_within_min_max_of_inserted_values() {
        let mut sketch = DDSketch::with_default_accuracy();
        let values = [0.5, 1.0, 2.5, 10.0, 42.0, 99.9];
        for &v in &values {
            sketch.add(v).unwrap();
        }
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        for q in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let got = sketch.get_value_at_quantile(q).unwrap().unwrap();
            let accuracy = sketch.mapping().relative_accuracy();
            assert!(got >= min * (1.0 - accuracy) - 1e-9);
            assert!(got <= max * (1.0 + accuracy) + 1e-9);
        }
    }

    #[test]
    fn negative_values_round_trip_through_quantiles() {
        let mut sketch = DDSketch::with_default_accuracy();
        for v in [-50.0, -20.0, -5.0, -1.0] {
            sketch.add(v).unwrap();
        }
        let median = sketch.get_value_at_quantile(0.5).unwrap().unwrap();
        assert!(median < 0.0);
    }

    #[test]
    fn merge_from_combines_counts_and_preserves_min_max() {
        let mut a = DDSketch::with_default_accuracy();
        for v in [1.0, 2.0, 3.0] {
            a.add(v).unwrap();
        }
        let mut b = DDSketch::with_default_accuracy();
        for v in [100.0, 200.0] {
            b.add(v).unwrap();
        }

        a.merge_from(&b);

        assert_eq!(a.total_count(), 5.0);
        let min = a.get_value_at_quantile(0.0).unwrap().unwrap();
        let max = a.get_value_at_quantile(1.0).unwrap().unwrap();
        assert!(min <= 1.0 * 1.02, "min={min}");
        assert!(max >= 200.0 * 0.98, "max={max}");
    }
}
