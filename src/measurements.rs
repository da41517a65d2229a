//! Measurement sets and the measurement-source collaborator
//!
//! A `MeasurementSet` maps object ids to their raw samples. Objects keep the
//! order in which they were first recorded; that order seeds tie-breaks in the
//! depth-based rankers, so it is part of the observable output.

use crate::error::{RankError, Result};
use std::collections::HashMap;

/// Raw samples per object, in first-insertion order
///
/// Samples are append-only: nothing in the ranking pipeline removes or
/// rewrites a recorded value (outlier filtering works on copies).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementSet {
    order: Vec<String>,
    samples: HashMap<String, Vec<f64>>,
}

impl MeasurementSet {
    /// Create an empty measurement set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object without samples (keeps its position in the order)
    pub fn add_object(&mut self, object: &str) {
        if !self.samples.contains_key(object) {
            self.order.push(object.to_string());
            self.samples.insert(object.to_string(), Vec::new());
        }
    }

    /// Append one sample for `object`, registering it on first use
    pub fn record(&mut self, object: &str, value: f64) {
        self.add_object(object);
        if let Some(values) = self.samples.get_mut(object) {
            values.push(value);
        }
    }

    /// Append several samples for `object`
    pub fn extend<I: IntoIterator<Item = f64>>(&mut self, object: &str, values: I) {
        self.add_object(object);
        if let Some(samples) = self.samples.get_mut(object) {
            samples.extend(values);
        }
    }

    /// Object ids in first-insertion order
    pub fn objects(&self) -> &[String] {
        &self.order
    }

    /// Samples recorded for `object`
    pub fn get(&self, object: &str) -> Option<&[f64]> {
        self.samples.get(object).map(Vec::as_slice)
    }

    /// Samples recorded for `object`, or `UnknownObject`
    pub fn samples(&self, object: &str) -> Result<&[f64]> {
        self.get(object).ok_or_else(|| RankError::UnknownObject {
            object: object.to_string(),
        })
    }

    pub fn contains(&self, object: &str) -> bool {
        self.samples.contains_key(object)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Smallest sample count over all objects (0 for an empty set)
    pub fn min_sample_count(&self) -> usize {
        self.samples.values().map(Vec::len).min().unwrap_or(0)
    }

    /// Iterate `(object, samples)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.order
            .iter()
            .filter_map(|name| self.samples.get(name).map(|v| (name.as_str(), v.as_slice())))
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<f64>)> for MeasurementSet {
    fn from_iter<T: IntoIterator<Item = (S, Vec<f64>)>>(iter: T) -> Self {
        let mut set = MeasurementSet::new();
        for (name, values) in iter {
            let name = name.into();
            set.extend(&name, values);
        }
        set
    }
}

/// External producer of measurements
///
/// The convergence driver calls `measure` once per iteration and then reads
/// the accumulated set back. `measure` is treated as blocking: it must have
/// appended all `rep_steps` samples per object before it returns.
pub trait MeasurementSource {
    /// Append `rep_steps` new samples for every object
    fn measure(&mut self, run_id: usize, rep_steps: usize) -> Result<()>;

    /// All samples collected so far
    fn measurements(&self) -> &MeasurementSet;
}

/// A source that replays a fixed measurement set
///
/// Each `measure` call appends the first `rep_steps` samples of the fixed
/// pattern again (cycling), so quantile bounds never move when every pattern
/// has zero variance.
#[derive(Debug, Clone)]
pub struct FixedSource {
    pattern: MeasurementSet,
    collected: MeasurementSet,
}

impl FixedSource {
    pub fn new(pattern: MeasurementSet) -> Self {
        let mut collected = MeasurementSet::new();
        for name in pattern.objects() {
            collected.add_object(name);
        }
        Self { pattern, collected }
    }
}

impl MeasurementSource for FixedSource {
    fn measure(&mut self, _run_id: usize, rep_steps: usize) -> Result<()> {
        for (name, values) in self.pattern.iter() {
            if values.is_empty() {
                return Err(RankError::EmptyMeasurement {
                    object: name.to_string(),
                });
            }
            let batch: Vec<f64> = values.iter().copied().cycle().take(rep_steps).collect();
            self.collected.extend(name, batch);
        }
        Ok(())
    }

    fn measurements(&self) -> &MeasurementSet {
        &self.collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut set = MeasurementSet::new();
        set.record("zeta", 1.0);
        set.record("alpha", 2.0);
        set.record("zeta", 3.0);

        assert_eq!(set.objects(), &["zeta".to_string(), "alpha".to_string()]);
        assert_eq!(set.get("zeta").unwrap(), &[1.0, 3.0]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_samples_unknown_object() {
        let set = MeasurementSet::new();
        assert!(matches!(
            set.samples("missing"),
            Err(RankError::UnknownObject { .. })
        ));
    }

    #[test]
    fn test_from_iter() {
        let set: MeasurementSet = vec![("a", vec![1.0, 2.0]), ("b", vec![3.0])]
            .into_iter()
            .collect();
        assert_eq!(set.min_sample_count(), 1);
        assert!(set.contains("b"));
    }

    #[test]
    fn test_fixed_source_appends_cycled_pattern() {
        let pattern: MeasurementSet = vec![("a", vec![1.0, 2.0])].into_iter().collect();
        let mut source = FixedSource::new(pattern);

        source.measure(0, 3).unwrap();
        assert_eq!(source.measurements().get("a").unwrap(), &[1.0, 2.0, 1.0]);

        source.measure(1, 1).unwrap();
        assert_eq!(source.measurements().get("a").unwrap().len(), 4);
    }

    #[test]
    fn test_fixed_source_rejects_empty_pattern() {
        let mut pattern = MeasurementSet::new();
        pattern.add_object("empty");
        let mut source = FixedSource::new(pattern);
        assert!(matches!(
            source.measure(0, 2),
            Err(RankError::EmptyMeasurement { .. })
        ));
    }
}
