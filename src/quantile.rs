//! Quantile bounds and the quantile-overlap comparator
//!
//! Each object is summarised by an `(upper, lower)` pair taken at percentiles
//! `q_max` and `q_min` of its samples. Two objects are ordered only when their
//! ranges do not overlap:
//!
//! ```text
//! upper(a) < lower(b)   =>  a better than b
//! upper(b) < lower(a)   =>  a worse than b
//! otherwise             =>  a equal to b
//! ```
//!
//! The relation is memoized per unordered pair and not transitive on its
//! own; the ranking strategies reconcile it into rank levels.

use crate::comparison::{ComparisonMatrix, Relation};
use crate::error::{RankError, Result};
use crate::measurements::MeasurementSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default `(q_max, q_min)` pairs used for multi-quantile mean ranks
pub const DEFAULT_QUANTILE_PAIRS: [(f64, f64); 8] = [
    (95.0, 5.0),
    (90.0, 10.0),
    (85.0, 15.0),
    (80.0, 20.0),
    (75.0, 25.0),
    (70.0, 30.0),
    (65.0, 35.0),
    (55.0, 45.0),
];

/// Upper and lower percentile used to bound an object's samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantilePair {
    pub q_max: f64,
    pub q_min: f64,
}

impl QuantilePair {
    /// Create a validated pair (`0 <= q_min < q_max <= 100`)
    pub fn new(q_max: f64, q_min: f64) -> Result<Self> {
        let pair = Self { q_max, q_min };
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |q: f64| (0.0..=100.0).contains(&q);
        if !in_range(self.q_max) || !in_range(self.q_min) || self.q_max <= self.q_min {
            return Err(RankError::InvalidQuantile {
                q_max: self.q_max,
                q_min: self.q_min,
            });
        }
        Ok(())
    }

    /// Column label, e.g. `q75-q25`
    pub fn label(&self) -> String {
        format!("q{}-q{}", self.q_max, self.q_min)
    }

    /// The eight default pairs spanning 55-95 / 5-45
    pub fn defaults() -> Vec<QuantilePair> {
        DEFAULT_QUANTILE_PAIRS
            .iter()
            .map(|&(q_max, q_min)| QuantilePair { q_max, q_min })
            .collect()
    }
}

/// Percentile bounds of one object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileBounds {
    pub upper: f64,
    pub lower: f64,
}

/// Percentile of sorted data using linear interpolation between closest ranks
///
/// `percentile` is in `[0, 100]`; returns `None` for empty input.
pub fn percentile(sorted_data: &[f64], percentile: f64) -> Option<f64> {
    if sorted_data.is_empty() {
        return None;
    }
    if sorted_data.len() == 1 {
        return Some(sorted_data[0]);
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        Some(sorted_data[lower])
    } else {
        let weight = index - lower as f64;
        Some(sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight)
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Drop points outside the 1.5×IQR fence of the unfiltered data
///
/// Points exactly on a fence are dropped. If nothing survives, the original
/// values are returned unchanged.
pub fn remove_outliers(values: &[f64]) -> Vec<f64> {
    let data = sorted(values);
    let (Some(q1), Some(q3)) = (percentile(&data, 25.0), percentile(&data, 75.0)) else {
        return Vec::new();
    };
    let iqr = q3 - q1;
    let fence_low = q1 - 1.5 * iqr;
    let fence_high = q3 + 1.5 * iqr;

    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|&x| x > fence_low && x < fence_high)
        .collect();

    if kept.is_empty() {
        values.to_vec()
    } else {
        kept
    }
}

/// Compute `(upper, lower)` bounds for one sample set
pub fn quantile_bounds(values: &[f64], pair: QuantilePair, outliers: bool) -> Option<QuantileBounds> {
    let data = if outliers {
        sorted(&remove_outliers(values))
    } else {
        sorted(values)
    };
    Some(QuantileBounds {
        upper: percentile(&data, pair.q_max)?,
        lower: percentile(&data, pair.q_min)?,
    })
}

/// Cache key for one bounds configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BoundsKey {
    q_max: u64,
    q_min: u64,
    remove_outliers: bool,
}

impl BoundsKey {
    fn new(pair: QuantilePair, remove_outliers: bool) -> Self {
        Self {
            q_max: pair.q_max.to_bits(),
            q_min: pair.q_min.to_bits(),
            remove_outliers,
        }
    }
}

/// Pairwise comparator over a measurement set
///
/// Bounds are cached per `(q_max, q_min, remove_outliers)` configuration so
/// that switching back to an earlier pair does not recompute percentiles.
/// Every cache is dropped when the measurements change.
///
/// # Example
/// ```
/// use partial_ranker::comparison::Relation;
/// use partial_ranker::measurements::MeasurementSet;
/// use partial_ranker::quantile::QuantileComparer;
///
/// let set: MeasurementSet = vec![
///     ("A", vec![1.0, 1.0, 1.0, 1.0]),
///     ("B", vec![5.0, 5.0, 5.0, 5.0]),
/// ].into_iter().collect();
///
/// let mut comparer = QuantileComparer::new(set);
/// comparer.compute_quantiles(75.0, 25.0, false).unwrap();
/// assert_eq!(comparer.better_than("A", "B").unwrap(), Relation::Better);
/// ```
#[derive(Debug, Clone)]
pub struct QuantileComparer {
    measurements: MeasurementSet,
    objects: Vec<String>,
    index: HashMap<String, usize>,
    bounds_cache: HashMap<BoundsKey, Vec<QuantileBounds>>,
    active: Option<(QuantilePair, bool)>,
    matrix: ComparisonMatrix,
    evaluations: usize,
    self_queries: usize,
}

impl QuantileComparer {
    pub fn new(measurements: MeasurementSet) -> Self {
        let objects = measurements.objects().to_vec();
        let index = objects
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let matrix = ComparisonMatrix::new(objects.len());
        Self {
            measurements,
            objects,
            index,
            bounds_cache: HashMap::new(),
            active: None,
            matrix,
            evaluations: 0,
            self_queries: 0,
        }
    }

    /// Replace the measurement set, dropping every cached bound and relation
    pub fn update_measurements(&mut self, measurements: MeasurementSet) {
        *self = Self::new(measurements);
    }

    /// Drop cached bounds for every configuration and reset the matrix
    pub fn invalidate(&mut self) {
        self.bounds_cache.clear();
        self.active = None;
        self.matrix.clear();
        self.evaluations = 0;
    }

    /// Compute bounds for `(q_max, q_min)` and reset the matrix to unknown
    pub fn compute_quantiles(&mut self, q_max: f64, q_min: f64, remove_outliers: bool) -> Result<()> {
        let pair = QuantilePair::new(q_max, q_min)?;
        self.compute_quantiles_for(pair, remove_outliers)
    }

    /// Same as `compute_quantiles` for an already-built pair
    pub fn compute_quantiles_for(&mut self, pair: QuantilePair, remove_outliers: bool) -> Result<()> {
        pair.validate()?;
        let key = BoundsKey::new(pair, remove_outliers);

        if !self.bounds_cache.contains_key(&key) {
            let mut bounds = Vec::with_capacity(self.objects.len());
            for name in &self.objects {
                let values = self.measurements.samples(name)?;
                let b = quantile_bounds(values, pair, remove_outliers).ok_or_else(|| {
                    RankError::EmptyMeasurement {
                        object: name.clone(),
                    }
                })?;
                bounds.push(b);
            }
            tracing::debug!(
                q_max = pair.q_max,
                q_min = pair.q_min,
                remove_outliers,
                objects = self.objects.len(),
                "computed quantile bounds"
            );
            self.bounds_cache.insert(key, bounds);
        }

        self.active = Some((pair, remove_outliers));
        self.matrix.clear();
        self.evaluations = 0;
        self.self_queries = 0;
        Ok(())
    }

    fn active_bounds(&self) -> Result<&[QuantileBounds]> {
        let (pair, outliers) = self.active.ok_or_else(|| {
            RankError::InvalidConfig("quantile bounds requested before compute_quantiles".to_string())
        })?;
        self.bounds_cache
            .get(&BoundsKey::new(pair, outliers))
            .map(Vec::as_slice)
            .ok_or_else(|| RankError::InvalidConfig("quantile bounds cache was invalidated".to_string()))
    }

    /// Memoized relation of object `i` to object `j`
    ///
    /// Positions outside the object list fail with `UnknownObject`.
    pub fn better_than_index(&mut self, i: usize, j: usize) -> Result<Relation> {
        if let Some(&out) = [i, j].iter().find(|&&k| k >= self.objects.len()) {
            return Err(RankError::UnknownObject {
                object: format!("#{}", out),
            });
        }
        if i == j {
            self.self_queries += 1;
            return Ok(Relation::Equal);
        }
        if let Some(rel) = self.matrix.get(i, j) {
            return Ok(rel);
        }

        let bounds = self.active_bounds()?;
        let (b1, b2) = (bounds[i], bounds[j]);

        let rel = if b1.upper < b2.lower {
            Relation::Better
        } else if b2.upper < b1.lower {
            Relation::Worse
        } else {
            Relation::Equal
        };

        self.matrix.set_pair(i, j, rel);
        self.evaluations += 1;
        Ok(rel)
    }

    /// Memoized relation of `obj1` to `obj2`
    pub fn better_than(&mut self, obj1: &str, obj2: &str) -> Result<Relation> {
        let i = self.index_of(obj1)?;
        let j = self.index_of(obj2)?;
        self.better_than_index(i, j)
    }

    /// Evaluate every unordered pair once
    pub fn compare_all(&mut self) -> Result<()> {
        let n = self.objects.len();
        for i in 0..n {
            for j in (i + 1)..n {
                self.better_than_index(i, j)?;
            }
        }
        Ok(())
    }

    /// Position of `object` in the comparer's order
    pub fn index_of(&self, object: &str) -> Result<usize> {
        self.index
            .get(object)
            .copied()
            .ok_or_else(|| RankError::UnknownObject {
                object: object.to_string(),
            })
    }

    /// Evaluated relation between positions `i` and `j`, without computing it
    pub fn relation(&self, i: usize, j: usize) -> Result<Relation> {
        self.matrix
            .get(i, j)
            .ok_or_else(|| RankError::ComparisonPending {
                first: self.objects.get(i).cloned().unwrap_or_default(),
                second: self.objects.get(j).cloned().unwrap_or_default(),
            })
    }

    /// Fail with `ComparisonPending` unless every pair has been evaluated
    pub fn ensure_complete(&self) -> Result<()> {
        match self.matrix.first_pending() {
            None => Ok(()),
            Some((i, j)) => Err(RankError::ComparisonPending {
                first: self.objects[i].clone(),
                second: self.objects[j].clone(),
            }),
        }
    }

    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    pub fn measurements(&self) -> &MeasurementSet {
        &self.measurements
    }

    pub fn matrix(&self) -> &ComparisonMatrix {
        &self.matrix
    }

    /// Active `(pair, remove_outliers)` configuration
    pub fn active_pair(&self) -> Option<(QuantilePair, bool)> {
        self.active
    }

    /// Bounds of the object at position `i` under the active configuration
    pub fn bounds_at(&self, i: usize) -> Result<QuantileBounds> {
        let bounds = self.active_bounds()?;
        bounds.get(i).copied().ok_or_else(|| RankError::UnknownObject {
            object: format!("#{}", i),
        })
    }

    pub fn bounds(&self, object: &str) -> Result<QuantileBounds> {
        self.bounds_at(self.index_of(object)?)
    }

    pub fn upper(&self, object: &str) -> Result<f64> {
        Ok(self.bounds(object)?.upper)
    }

    pub fn lower(&self, object: &str) -> Result<f64> {
        Ok(self.bounds(object)?.lower)
    }

    /// Relations actually computed since the last `compute_quantiles`
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Times `better_than` was asked to compare an object with itself
    pub fn self_queries(&self) -> usize {
        self.self_queries
    }

    /// Number of bound configurations currently cached
    pub fn cached_configurations(&self) -> usize {
        self.bounds_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(entries: &[(&str, &[f64])]) -> MeasurementSet {
        entries.iter().map(|(n, v)| (*n, v.to_vec())).collect()
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 50.0), Some(2.5));
        assert_eq!(percentile(&data, 0.0), Some(1.0));
        assert_eq!(percentile(&data, 100.0), Some(4.0));
        assert!((percentile(&data, 25.0).unwrap() - 1.75).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[7.0], 90.0), Some(7.0));
    }

    #[test]
    fn test_remove_outliers_drops_spike() {
        let values = [10.0, 11.0, 10.5, 10.2, 10.8, 100.0];
        let kept = remove_outliers(&values);
        assert!(!kept.contains(&100.0));
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn test_remove_outliers_constant_keeps_everything() {
        // IQR = 0 puts every point on the fence
        let values = [3.0, 3.0, 3.0];
        assert_eq!(remove_outliers(&values), values.to_vec());
    }

    #[test]
    fn test_outlier_removal_does_not_mutate_measurements() {
        let m = set(&[("a", &[1.0, 1.1, 1.2, 1.05, 50.0]), ("b", &[2.0, 2.1, 2.2, 2.05, 2.1])]);
        let mut comparer = QuantileComparer::new(m.clone());
        comparer.compute_quantiles(95.0, 5.0, true).unwrap();
        assert_eq!(comparer.measurements(), &m);
        assert!(comparer.upper("a").unwrap() < 2.0);
    }

    #[test]
    fn test_invalid_quantiles() {
        let mut comparer = QuantileComparer::new(set(&[("a", &[1.0])]));
        for (hi, lo) in [(25.0, 75.0), (50.0, 50.0), (101.0, 5.0), (90.0, -1.0)] {
            assert!(matches!(
                comparer.compute_quantiles(hi, lo, false),
                Err(RankError::InvalidQuantile { .. })
            ));
        }
    }

    #[test]
    fn test_empty_measurement_rejected() {
        let mut m = set(&[("a", &[1.0])]);
        m.add_object("empty");
        let mut comparer = QuantileComparer::new(m);
        assert_eq!(
            comparer.compute_quantiles(75.0, 25.0, false),
            Err(RankError::EmptyMeasurement {
                object: "empty".to_string()
            })
        );
    }

    #[test]
    fn test_better_than_scenario() {
        let m = set(&[
            ("A", &[1.0, 1.0, 1.0, 1.0]),
            ("B", &[5.0, 5.0, 5.0, 5.0]),
            ("C", &[1.0, 1.0, 1.0, 1.0]),
        ]);
        let mut comparer = QuantileComparer::new(m);
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();

        assert_eq!(comparer.better_than("A", "B").unwrap(), Relation::Better);
        assert_eq!(comparer.better_than("B", "A").unwrap(), Relation::Worse);
        assert_eq!(comparer.better_than("A", "C").unwrap(), Relation::Equal);
    }

    #[test]
    fn test_memoization_counts_single_evaluation() {
        let m = set(&[("A", &[1.0, 2.0]), ("B", &[8.0, 9.0])]);
        let mut comparer = QuantileComparer::new(m);
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();

        for _ in 0..5 {
            assert_eq!(comparer.better_than("A", "B").unwrap(), Relation::Better);
            assert_eq!(comparer.better_than("B", "A").unwrap(), Relation::Worse);
        }
        assert_eq!(comparer.evaluations(), 1);
    }

    #[test]
    fn test_compare_all_evaluates_each_pair_once() {
        let m = set(&[
            ("a", &[1.0]),
            ("b", &[2.0]),
            ("c", &[3.0]),
            ("d", &[4.0]),
        ]);
        let mut comparer = QuantileComparer::new(m);
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        comparer.compare_all().unwrap();
        assert_eq!(comparer.evaluations(), 6);
        assert!(comparer.matrix().is_complete());
        comparer.compare_all().unwrap();
        assert_eq!(comparer.evaluations(), 6);
    }

    #[test]
    fn test_recompute_resets_matrix_and_caches_bounds() {
        let m = set(&[("a", &[1.0, 2.0, 3.0]), ("b", &[2.5, 3.5, 4.5])]);
        let mut comparer = QuantileComparer::new(m);

        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        comparer.compare_all().unwrap();
        assert!(comparer.matrix().is_complete());

        comparer.compute_quantiles(95.0, 5.0, false).unwrap();
        assert_eq!(comparer.matrix().evaluated_pairs(), 0);
        assert_eq!(comparer.cached_configurations(), 2);

        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        assert_eq!(comparer.cached_configurations(), 2);
        assert_eq!(comparer.evaluations(), 0);
    }

    #[test]
    fn test_update_measurements_drops_cache() {
        let mut comparer = QuantileComparer::new(set(&[("a", &[1.0]), ("b", &[2.0])]));
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        assert_eq!(comparer.upper("a").unwrap(), 1.0);

        comparer.update_measurements(set(&[("a", &[10.0]), ("b", &[2.0])]));
        assert_eq!(comparer.cached_configurations(), 0);
        assert!(comparer.upper("a").is_err());

        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        assert_eq!(comparer.upper("a").unwrap(), 10.0);
    }

    #[test]
    fn test_unknown_object() {
        let mut comparer = QuantileComparer::new(set(&[("a", &[1.0])]));
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        assert!(matches!(
            comparer.better_than("a", "zzz"),
            Err(RankError::UnknownObject { .. })
        ));
    }

    #[test]
    fn test_index_out_of_range_is_unknown_object() {
        let mut comparer = QuantileComparer::new(set(&[("a", &[1.0]), ("b", &[2.0])]));
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        for (i, j) in [(0, 7), (7, 0), (2, 2)] {
            assert!(matches!(
                comparer.better_than_index(i, j),
                Err(RankError::UnknownObject { .. })
            ));
        }
        assert_eq!(comparer.evaluations(), 0);
        assert_eq!(comparer.self_queries(), 0);
        assert_eq!(comparer.better_than_index(0, 1).unwrap(), Relation::Better);
    }

    #[test]
    fn test_compare_before_quantiles_fails() {
        let mut comparer = QuantileComparer::new(set(&[("a", &[1.0]), ("b", &[2.0])]));
        assert!(matches!(
            comparer.better_than("a", "b"),
            Err(RankError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pair_label() {
        assert_eq!(QuantilePair::new(75.0, 25.0).unwrap().label(), "q75-q25");
        assert_eq!(QuantilePair::new(72.5, 25.0).unwrap().label(), "q72.5-q25");
        assert_eq!(QuantilePair::defaults().len(), 8);
    }
}
