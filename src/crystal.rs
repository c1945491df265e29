//! Per-snapshot crystal state: beam geometry, model parameters and the
//! partial observations integrated from one still pattern.

use crate::cell::UnitCell;
use crate::error::{EngineError, Result};
use crate::geometry;
use crate::symmetry::SymOpList;
use crate::types::Hkl;

/// Why a crystal is excluded from the current macrocycle, if at all.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CrystalFlag {
    #[default]
    Ok,
    /// Scaling or post-refinement went wrong this cycle; the crystal gets
    /// another chance next macrocycle.
    RejectedScaling,
    /// The input itself is defective; never retried.
    RejectedPermanently,
}

/// One measured partial reflection.
#[derive(Clone, Copy, Debug)]
pub struct Observation {
    /// Indices as predicted on this crystal's lattice.
    pub hkl: Hkl,
    /// Asymmetric-unit representative of `hkl`; the merge key.
    pub asu: Hkl,
    pub intensity: f64,
    pub sigma: f64,
    /// Fraction of the full reflection swept through the Ewald sphere.
    pub partiality: f64,
    pub lorentz: f64,
    /// s = 1/(2d) in inverse metres.
    pub resolution: f64,
    pub r_low: f64,
    pub r_high: f64,
    pub clamp_low: bool,
    pub clamp_high: bool,
    pub redundancy: u32,
}

/// A crystal from the indexed stream, alive for the whole run.
#[derive(Clone, Debug)]
pub struct Crystal {
    pub cell: UnitCell,
    pub lambda: f64,
    pub divergence: f64,
    pub bandwidth: f64,
    pub profile_radius: f64,
    /// Per-crystal scale factor G; the model is
    /// I_obs = G * p * L * I_full * exp(-2 B s^2).
    pub scale: f64,
    /// Temperature factor B in square metres.
    pub b_factor: f64,
    pub flag: CrystalFlag,
    pub observations: Vec<Observation>,
}

impl Crystal {
    pub fn new(
        cell: UnitCell,
        lambda: f64,
        divergence: f64,
        bandwidth: f64,
        profile_radius: f64,
    ) -> Self {
        Self {
            cell,
            lambda,
            divergence,
            bandwidth,
            profile_radius,
            scale: 1.0,
            b_factor: 0.0,
            flag: CrystalFlag::Ok,
            observations: Vec::new(),
        }
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.flag == CrystalFlag::Ok
    }

    /// Reset the per-cycle rejection; permanent rejections stick.
    pub fn reset_scaling_flag(&mut self) {
        if self.flag == CrystalFlag::RejectedScaling {
            self.flag = CrystalFlag::Ok;
        }
    }

    /// Recompute partialities, excitation errors and ASU folding of the
    /// existing observations from the current cell and beam parameters.
    /// Called after post-refinement shifts the model.
    pub fn update_partialities(&mut self, sym: &SymOpList) {
        for obs in &mut self.observations {
            let q = self.cell.reciprocal(obs.hkl);
            obs.resolution = 0.5 * q.norm();
            obs.asu = sym.to_asu(obs.hkl);
            match geometry::estimate(
                &q,
                self.lambda,
                self.divergence,
                self.bandwidth,
                self.profile_radius,
            ) {
                Some(est) => {
                    obs.partiality = est.partiality;
                    obs.r_low = est.r_low;
                    obs.r_high = est.r_high;
                    obs.clamp_low = est.clamp_low;
                    obs.clamp_high = est.clamp_high;
                }
                None => {
                    // The shifted model no longer excites this spot.
                    obs.partiality = 0.0;
                    obs.clamp_low = true;
                    obs.clamp_high = true;
                }
            }
        }
    }

    /// Check the invariants a stream record must satisfy.
    pub fn validate(&self) -> Result<()> {
        if !self.cell.is_finite() {
            return Err(EngineError::BadStream {
                detail: "non-finite reciprocal basis".into(),
            });
        }
        if !(self.lambda > 0.0 && self.profile_radius > 0.0) {
            return Err(EngineError::BadStream {
                detail: "wavelength and profile radius must be positive".into(),
            });
        }
        for obs in &self.observations {
            if obs.hkl.is_origin() {
                return Err(EngineError::BadStream {
                    detail: "observation with indices (0,0,0)".into(),
                });
            }
            if !(obs.sigma > 0.0) {
                return Err(EngineError::BadStream {
                    detail: format!("observation {} with sigma <= 0", obs.hkl),
                });
            }
            if !(0.0..=1.0).contains(&obs.partiality) {
                return Err(EngineError::BadStream {
                    detail: format!("observation {} with partiality outside [0,1]", obs.hkl),
                });
            }
            if !obs.intensity.is_finite() {
                return Err(EngineError::BadStream {
                    detail: format!("observation {} with non-finite intensity", obs.hkl),
                });
            }
        }
        Ok(())
    }
}
