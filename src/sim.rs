//! Synthetic still-pattern generator.
//!
//! Produces randomly oriented copies of a base cell, predicts which
//! reflections each orientation excites, and fills in partial intensities
//! from a shared full-reflection list: I = G * p * I_full, optionally
//! with gaussian noise. Useful for exercising the scaling and merging
//! machinery without any detector data.

use crate::cell::UnitCell;
use crate::crystal::{Crystal, Observation};
use crate::error::Result;
use crate::geometry;
use crate::stream::{Chunk, StreamSource};
use crate::symmetry::SymOpList;
use crate::types::Hkl;
use nalgebra::{UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Knobs for the generator.
#[derive(Clone, Debug)]
pub struct SimOptions {
    pub n_patterns: usize,
    pub lambda: f64,
    pub divergence: f64,
    pub bandwidth: f64,
    pub profile_radius: f64,
    /// Resolution cutoff s = 1/(2d) in inverse metres.
    pub max_resolution: f64,
    /// Spread of the per-pattern scale factor around 1.
    pub osf_sigma: f64,
    /// Percent flat noise applied to the stream copy of each cell.
    pub cell_noise_percent: f64,
    /// Absolute gaussian noise on each partial intensity; 0 for none.
    pub intensity_noise: f64,
    pub seed: u64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            n_patterns: 10,
            lambda: 1.3e-10,
            divergence: 0.5e-3,
            bandwidth: 0.01,
            profile_radius: 4e6,
            max_resolution: 1.0 / (2.0 * 5e-10),
            osf_sigma: 0.3,
            cell_noise_percent: 0.0,
            intensity_noise: 0.0,
            seed: 1,
        }
    }
}

/// Box-Muller gaussian around `mean`.
fn gaussian_noise(rng: &mut StdRng, mean: f64, sigma: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    mean + sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Uniformly distributed rotation.
fn random_orientation(rng: &mut StdRng) -> UnitQuaternion<f64> {
    let q = nalgebra::Quaternion::new(
        gaussian_noise(rng, 0.0, 1.0),
        gaussian_noise(rng, 0.0, 1.0),
        gaussian_noise(rng, 0.0, 1.0),
        gaussian_noise(rng, 0.0, 1.0),
    );
    UnitQuaternion::from_quaternion(q)
}

fn flat_noise(rng: &mut StdRng, value: f64, width: f64) -> f64 {
    if width <= 0.0 {
        value
    } else {
        value + rng.gen_range(-width..width)
    }
}

/// Stream of simulated patterns.
pub struct SyntheticStream {
    options: SimOptions,
    base_cell: UnitCell,
    sym: SymOpList,
    rng: StdRng,
    emitted: usize,
    /// Full intensities, created on demand per asymmetric-unit key.
    full: HashMap<Hkl, f64>,
    /// Scale factor actually applied to each emitted pattern.
    applied_scales: Vec<f64>,
}

impl SyntheticStream {
    pub fn new(base_cell: UnitCell, sym: SymOpList, options: SimOptions) -> Self {
        let rng = StdRng::seed_from_u64(options.seed);
        Self {
            options,
            base_cell,
            sym,
            rng,
            emitted: 0,
            full: HashMap::new(),
            applied_scales: Vec::new(),
        }
    }

    /// The full intensities the partials were drawn from.
    pub fn reference(&self) -> &HashMap<Hkl, f64> {
        &self.full
    }

    /// Ground-truth scale factor of each emitted pattern.
    pub fn applied_scales(&self) -> &[f64] {
        &self.applied_scales
    }

    fn full_intensity(&mut self, asu: Hkl) -> f64 {
        if let Some(&i) = self.full.get(&asu) {
            return i;
        }
        let i = gaussian_noise(&mut self.rng, 0.0, 1000.0).abs();
        self.full.insert(asu, i);
        i
    }

    fn make_crystal(&mut self) -> Crystal {
        let o = self.options.clone();
        let orientation = random_orientation(&mut self.rng);
        let cell = self.base_cell.rotated(&orientation);
        let osf = gaussian_noise(&mut self.rng, 1.0, o.osf_sigma).max(0.1);
        self.applied_scales.push(osf);

        let predictions = geometry::predict_reflections(
            &cell,
            o.lambda,
            o.divergence,
            o.bandwidth,
            o.profile_radius,
            o.max_resolution,
            0.05,
        );

        let mut crystal = Crystal::new(cell, o.lambda, o.divergence, o.bandwidth, o.profile_radius);
        for pred in predictions {
            let asu = self.sym.to_asu(pred.hkl);
            let i_full = self.full_intensity(asu);
            let mut intensity = osf * pred.partiality * i_full;
            if o.intensity_noise > 0.0 {
                intensity = gaussian_noise(&mut self.rng, intensity, o.intensity_noise);
            }
            let sigma = if o.intensity_noise > 0.0 {
                o.intensity_noise
            } else {
                1e-3_f64.max(intensity.abs() * 1e-4)
            };
            crystal.observations.push(Observation {
                hkl: pred.hkl,
                asu,
                intensity,
                sigma,
                partiality: pred.partiality,
                lorentz: pred.lorentz,
                resolution: pred.resolution,
                r_low: pred.r_low,
                r_high: pred.r_high,
                clamp_low: pred.clamp_low,
                clamp_high: pred.clamp_high,
                redundancy: 1,
            });
        }

        // The stream reports a slightly wrong cell, like a real indexing
        // result would.
        if o.cell_noise_percent > 0.0 {
            let f = o.cell_noise_percent / 100.0;
            let jitter = |rng: &mut StdRng, v: Vector3<f64>| {
                Vector3::new(
                    flat_noise(rng, v.x, f * v.x.abs()),
                    flat_noise(rng, v.y, f * v.y.abs()),
                    flat_noise(rng, v.z, f * v.z.abs()),
                )
            };
            let a = jitter(&mut self.rng, crystal.cell.astar());
            let b = jitter(&mut self.rng, crystal.cell.bstar());
            let c = jitter(&mut self.rng, crystal.cell.cstar());
            crystal.cell.set_reciprocal(a, b, c);
        }

        crystal
    }
}

impl StreamSource for SyntheticStream {
    fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.emitted >= self.options.n_patterns {
            return Ok(None);
        }
        self.emitted += 1;
        let crystal = self.make_crystal();
        Ok(Some(Chunk {
            image: format!("simulated-{:05}.h5", self.emitted),
            crystals: vec![crystal],
        }))
    }
}
