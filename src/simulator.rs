//! Synthetic measurement source
//!
//! Draws normally distributed samples for a fixed set of objects. The random
//! generator belongs to the simulator instance, so two simulators never share
//! seed state and a run is reproducible from its seed alone.

use crate::error::{RankError, Result};
use crate::measurements::{MeasurementSet, MeasurementSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Normal-distribution parameters of one simulated object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalParams {
    pub mean: f64,
    pub std: f64,
}

impl NormalParams {
    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }
}

/// Measurement source backed by per-object normal distributions
///
/// # Example
/// ```
/// use partial_ranker::measurements::MeasurementSource;
/// use partial_ranker::simulator::{MeasurementsSimulator, NormalParams};
///
/// let mut sim = MeasurementsSimulator::with_seed(
///     vec![("fast", NormalParams::new(1.0, 0.1)), ("slow", NormalParams::new(2.0, 0.1))],
///     7,
/// ).unwrap();
/// sim.measure(0, 5).unwrap();
/// assert_eq!(sim.measurements().get("fast").unwrap().len(), 5);
/// ```
#[derive(Debug)]
pub struct MeasurementsSimulator<R: Rng = StdRng> {
    objects: Vec<(String, Normal<f64>)>,
    measurements: MeasurementSet,
    rng: R,
}

impl MeasurementsSimulator<StdRng> {
    /// Create a simulator with its own `StdRng` seeded from `seed`
    pub fn with_seed<S: Into<String>>(
        params: impl IntoIterator<Item = (S, NormalParams)>,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MeasurementsSimulator<R> {
    /// Create a simulator drawing from a caller-supplied generator
    pub fn with_rng<S: Into<String>>(
        params: impl IntoIterator<Item = (S, NormalParams)>,
        rng: R,
    ) -> Result<Self> {
        let mut objects = Vec::new();
        let mut measurements = MeasurementSet::new();
        for (name, p) in params {
            let name = name.into();
            let dist = Normal::new(p.mean, p.std).map_err(|e| {
                RankError::InvalidConfig(format!(
                    "normal(mean={}, std={}) for '{}': {}",
                    p.mean, p.std, name, e
                ))
            })?;
            if objects.iter().any(|(existing, _)| *existing == name) {
                return Err(RankError::InvalidConfig(format!(
                    "object '{}' is configured more than once",
                    name
                )));
            }
            measurements.add_object(&name);
            objects.push((name, dist));
        }
        Ok(Self {
            objects,
            measurements,
            rng,
        })
    }

    /// Append one sample for `object`
    pub fn add_measurement(&mut self, object: &str, value: f64) {
        self.measurements.record(object, value);
    }

    /// Draw `reps` samples for every configured object
    pub fn sample(&mut self, reps: usize) {
        for (name, dist) in &self.objects {
            let values: Vec<f64> = (0..reps).map(|_| dist.sample(&mut self.rng)).collect();
            self.measurements.extend(name, values);
        }
    }
}

impl<R: Rng> MeasurementSource for MeasurementsSimulator<R> {
    fn measure(&mut self, run_id: usize, rep_steps: usize) -> Result<()> {
        tracing::debug!(run_id, rep_steps, "simulating measurements");
        self.sample(rep_steps);
        Ok(())
    }

    fn measurements(&self) -> &MeasurementSet {
        &self.measurements
    }
}
